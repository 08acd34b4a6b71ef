use std::sync::Arc;

use async_stream::stream;
use futures::StreamExt;
use retina_flow::{Arity, BoxOperator, ExecutionScope, Flow, FlowError, Operator};
use tracing::{debug, warn};

use crate::{
	model::IngestedRef,
	storage::{RetrievableWriter, Writer},
};

/// Stores every retrievable a segmenter produces before any extractor describes it.
///
/// Transient retrievables and the terminal sentinel are forwarded without being written.
pub struct PersistRetrievable {
	name: String,
	writer: Arc<dyn RetrievableWriter>,
	input: BoxOperator<IngestedRef>,
}

impl PersistRetrievable {
	pub fn new(writer: Arc<dyn RetrievableWriter>, input: BoxOperator<IngestedRef>) -> Self {
		Self {
			name: format!("{}:persist", input.name()),
			writer,
			input,
		}
	}
}

impl Operator<IngestedRef> for PersistRetrievable {
	fn name(&self) -> &str {
		&self.name
	}

	fn arity(&self) -> Arity {
		Arity::Unary
	}

	fn into_flow(self: Box<Self>, scope: &ExecutionScope) -> Flow<IngestedRef> {
		let Self {
			name,
			writer,
			input,
		} = *self;
		let mut upstream = input.into_flow(scope);

		stream! {
			let mut persisted = 0u64;

			while let Some(next) = upstream.next().await {
				let ingested = match next {
					Ok(ingested) => ingested,
					Err(e) => {
						yield Err(e);
						return;
					}
				};

				if !ingested.is_terminal() && !ingested.is_transient() {
					match writer.add(ingested.to_retrievable()).await {
						Ok(true) => persisted += 1,
						Ok(false) => warn!(stage = %name, id = %ingested.id(), "Retrievable already stored;"),
						Err(e) => {
							yield Err(FlowError::stage_on(name.clone(), ingested.id(), e));
							return;
						}
					}
				}

				yield Ok(ingested);
			}

			debug!(stage = %name, persisted, "Retrievables persisted;");
		}
		.boxed()
	}
}
