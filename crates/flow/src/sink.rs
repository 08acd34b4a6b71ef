use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::StreamExt;
use tracing::{debug, error, info, instrument, trace};

use super::{
	error::FlowError,
	operator::{BoxOperator, Sink},
	scope::ExecutionScope,
};

/// Outcome of draining a graph into a [`Sink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkReport {
	pub sink: String,
	pub passed: u64,
	pub elapsed: Duration,
}

/// Drains its upstream to completion, counting the elements that passed through.
///
/// An upstream error is logged together with the number of elements that made it and handed back
/// to the caller. A sentinel predicate can be installed with [`DefaultSink::stop_when`] for
/// upstreams that signal their end through a marker element instead of completing.
pub struct DefaultSink<T> {
	name: String,
	input: BoxOperator<T>,
	stop_when: Option<fn(&T) -> bool>,
}

impl<T: Send + 'static> DefaultSink<T> {
	pub fn new(name: impl Into<String>, input: BoxOperator<T>) -> Self {
		Self {
			name: name.into(),
			input,
			stop_when: None,
		}
	}

	#[must_use]
	pub fn stop_when(mut self, predicate: fn(&T) -> bool) -> Self {
		self.stop_when = Some(predicate);
		self
	}
}

#[async_trait]
impl<T: Send + 'static> Sink for DefaultSink<T> {
	fn name(&self) -> &str {
		&self.name
	}

	#[instrument(skip_all, fields(sink = %self.name, upstream = %self.input.name()), err)]
	async fn drain(self: Box<Self>, scope: &ExecutionScope) -> Result<SinkReport, FlowError> {
		let Self {
			name,
			input,
			stop_when,
		} = *self;

		let started = Instant::now();
		let mut passed = 0u64;
		let mut flow = input.into_flow(scope);

		loop {
			let next = tokio::select! {
				biased;
				() = scope.cancelled() => return Err(FlowError::Cancelled),
				next = flow.next() => next,
			};

			match next {
				None => break,
				Some(Ok(element)) => {
					if stop_when.is_some_and(|is_sentinel| is_sentinel(&element)) {
						debug!("Received end-of-stream sentinel;");
						break;
					}
					passed += 1;
					trace!(passed, "Element passed;");
				}
				Some(Err(e)) => {
					error!(passed, %e, "Upstream failed;");
					return Err(e);
				}
			}
		}

		let elapsed = started.elapsed();
		info!(passed, ?elapsed, "Sink drained;");

		Ok(SinkReport {
			sink: name,
			passed,
			elapsed,
		})
	}
}
