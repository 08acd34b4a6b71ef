use async_stream::stream;
use futures::StreamExt;
use retina_flow::{Arity, BoxOperator, ExecutionScope, Flow, Operator};
use tracing::info;

use crate::{
	context::{IndexContext, Parameters},
	model::{IngestedRef, Source},
	register_stage, Error,
};

/// Logs every retrievable passing by.
pub struct LogExporter {
	name: String,
	input: BoxOperator<IngestedRef>,
}

impl LogExporter {
	pub fn new(name: impl Into<String>, input: BoxOperator<IngestedRef>) -> Self {
		Self {
			name: name.into(),
			input,
		}
	}
}

impl Operator<IngestedRef> for LogExporter {
	fn name(&self) -> &str {
		&self.name
	}

	fn arity(&self) -> Arity {
		Arity::Unary
	}

	fn into_flow(self: Box<Self>, scope: &ExecutionScope) -> Flow<IngestedRef> {
		let Self { name, input } = *self;
		let mut upstream = input.into_flow(scope);

		stream! {
			while let Some(next) = upstream.next().await {
				if let Ok(ingested) = &next {
					if !ingested.is_terminal() {
						info!(
							exporter = %name,
							id = %ingested.id(),
							kind = ingested.kind(),
							source = ingested.source().map(|s| s.name()),
							descriptors = ingested.descriptors().len(),
							"Retrievable;"
						);
					}
				}

				let failed = next.is_err();
				yield next;
				if failed {
					return;
				}
			}
		}
		.boxed()
	}
}

fn new_log_exporter(
	input: BoxOperator<IngestedRef>,
	parameters: &Parameters,
	_context: &IndexContext,
) -> Result<BoxOperator<IngestedRef>, Error> {
	Ok(Box::new(LogExporter::new(parameters.stage(), input)))
}

register_stage!("LogExporter", Exporter, new_log_exporter);
