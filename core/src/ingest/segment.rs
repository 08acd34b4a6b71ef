use std::sync::Arc;

use async_stream::stream;
use futures::StreamExt;
use retina_flow::{Arity, BoxOperator, ExecutionScope, Flow, Operator};
use tracing::{debug, trace};

use crate::{
	context::{IndexContext, Parameters},
	model::{ContentElement, Ingested, IngestedRef},
	register_stage, Error,
};

pub const SEGMENT_KIND: &str = "SEGMENT";

/// Wraps every content element into a retrievable of its own.
///
/// Emits the terminal sentinel once its upstream is exhausted, so that sinks downstream of a
/// broadcast know when to stop.
pub struct PassThroughSegmenter {
	name: String,
	input: BoxOperator<ContentElement>,
}

impl PassThroughSegmenter {
	pub fn new(name: impl Into<String>, input: BoxOperator<ContentElement>) -> Self {
		Self {
			name: name.into(),
			input,
		}
	}
}

impl Operator<IngestedRef> for PassThroughSegmenter {
	fn name(&self) -> &str {
		&self.name
	}

	fn arity(&self) -> Arity {
		Arity::Unary
	}

	fn into_flow(self: Box<Self>, scope: &ExecutionScope) -> Flow<IngestedRef> {
		let Self { name, input } = *self;
		let mut elements = input.into_flow(scope);

		stream! {
			let mut segments = 0u64;

			while let Some(next) = elements.next().await {
				match next {
					Ok(element) => {
						let source = element.source().cloned();
						let segment = Arc::new(Ingested::new(SEGMENT_KIND, vec![element], source));
						segments += 1;
						trace!(segmenter = %name, id = %segment.id(), "Segment created;");
						yield Ok(segment);
					}
					Err(e) => {
						yield Err(e);
						return;
					}
				}
			}

			debug!(segmenter = %name, segments, "Segmentation finished;");
			yield Ok(Ingested::terminal());
		}
		.boxed()
	}
}

fn new_pass_through(
	input: BoxOperator<ContentElement>,
	parameters: &Parameters,
	_context: &IndexContext,
) -> Result<BoxOperator<IngestedRef>, Error> {
	Ok(Box::new(PassThroughSegmenter::new(parameters.stage(), input)))
}

register_stage!("PassThroughSegmenter", Segmenter, new_pass_through);

#[cfg(test)]
mod tests {
	use futures::TryStreamExt;
	use retina_flow::Values;

	use super::*;

	#[tokio::test]
	async fn one_segment_per_element_then_terminal() {
		let segmenter = PassThroughSegmenter::new(
			"segmenter",
			Box::new(Values::new(
				"content",
				vec![ContentElement::text("a"), ContentElement::text("b")],
			)),
		);

		let segments = Box::new(segmenter)
			.into_flow(&ExecutionScope::new())
			.try_collect::<Vec<_>>()
			.await
			.unwrap();

		assert_eq!(segments.len(), 3);
		assert!(segments[..2]
			.iter()
			.all(|s| s.kind() == SEGMENT_KIND && s.content().len() == 1));
		assert!(segments[2].is_terminal());
	}
}
