use std::sync::Arc;

use async_stream::stream;
use futures::StreamExt;
use retina_flow::{Arity, BoxOperator, ExecutionScope, Flow, FlowError, Operator};
use tracing::{debug, trace, warn};

use crate::{
	model::{Descriptor, Ingested, IngestedRef},
	schema::Field,
	storage::Writer,
	Error,
};

/// The analyser-specific part of an extractor: turning a retrievable's content into descriptors.
pub trait ExtractionKernel: Send + Sync + 'static {
	/// Descriptors for `ingested`, empty if none of its content is of a supported type.
	fn extract(&self, field: &Field, ingested: &Ingested) -> Result<Vec<Descriptor>, Error>;
}

/// Describes every retrievable passing by and persists the descriptors through its field.
///
/// Retrievables are always forwarded, whether or not anything was extracted from them. A kernel
/// failure only skips the element at hand, a storage failure ends the flow.
pub struct Extractor<K> {
	name: String,
	field: Arc<Field>,
	input: BoxOperator<IngestedRef>,
	kernel: K,
}

impl<K: ExtractionKernel> Extractor<K> {
	pub fn new(
		field: Arc<Field>,
		analyser: &str,
		input: BoxOperator<IngestedRef>,
		kernel: K,
	) -> Result<Self, Error> {
		field.ensure_analyser(analyser)?;

		Ok(Self {
			name: format!("{}:extractor", field.name()),
			field,
			input,
			kernel,
		})
	}
}

impl<K: ExtractionKernel> Operator<IngestedRef> for Extractor<K> {
	fn name(&self) -> &str {
		&self.name
	}

	fn arity(&self) -> Arity {
		Arity::Unary
	}

	fn into_flow(self: Box<Self>, scope: &ExecutionScope) -> Flow<IngestedRef> {
		let Self {
			name,
			field,
			input,
			kernel,
		} = *self;
		let mut upstream = input.into_flow(scope);

		stream! {
			let mut described = 0u64;

			while let Some(next) = upstream.next().await {
				let ingested = match next {
					Ok(ingested) => ingested,
					Err(e) => {
						yield Err(e);
						return;
					}
				};

				if ingested.is_terminal() {
					yield Ok(ingested);
					continue;
				}

				let mut descriptors = match kernel.extract(&field, &ingested) {
					Ok(descriptors) => descriptors,
					Err(e) => {
						warn!(extractor = %name, id = %ingested.id(), %e, "Extraction failed, forwarding as is;");
						yield Ok(ingested);
						continue;
					}
				};

				if descriptors.is_empty() {
					trace!(extractor = %name, id = %ingested.id(), "Nothing to extract;");
					yield Ok(ingested);
					continue;
				}

				if let Err(e) = descriptors
					.iter_mut()
					.try_for_each(|descriptor| descriptor.assign(ingested.id()))
				{
					yield Err(FlowError::stage_on(name.clone(), ingested.id(), e));
					return;
				}

				if !ingested.is_transient() {
					match field.writer().add_all(descriptors.clone()).await {
						Ok(true) => descriptors
							.iter_mut()
							.for_each(|descriptor| descriptor.bind(field.name())),
						Ok(false) => warn!(extractor = %name, id = %ingested.id(), "Descriptors rejected by storage;"),
						Err(e) => {
							yield Err(FlowError::stage_on(name.clone(), ingested.id(), e));
							return;
						}
					}
				}

				described += 1;
				ingested.add_descriptors(descriptors);
				yield Ok(ingested);
			}

			debug!(extractor = %name, described, "Extraction finished;");
		}
		.boxed()
	}
}
