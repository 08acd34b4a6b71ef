use async_channel as chan;
use async_stream::stream;
use futures::StreamExt;
use futures_concurrency::future::Join;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn, Instrument};

use super::{
	error::FlowError,
	operator::{Arity, BoxOperator, Flow, Operator},
	scope::ExecutionScope,
};

/// Capacity of the channel all [`Merge`] writers share.
pub const MERGE_CHANNEL_CAPACITY: usize = 128;

/// Fan-in of N upstreams into a single flow.
///
/// Every upstream is driven by its own writer task, all of them feeding one bounded channel.
/// A writer facing a full channel suspends until the consumer catches up. Output order across
/// upstreams is unspecified.
///
/// The first upstream error cancels every sibling writer and is forwarded downstream once all
/// writers have joined.
pub struct Merge<T> {
	name: String,
	inputs: Vec<BoxOperator<T>>,
}

impl<T> Merge<T> {
	pub fn new(name: impl Into<String>, inputs: Vec<BoxOperator<T>>) -> Self {
		Self {
			name: name.into(),
			inputs,
		}
	}
}

impl<T: Send + 'static> Operator<T> for Merge<T> {
	fn name(&self) -> &str {
		&self.name
	}

	fn arity(&self) -> Arity {
		Arity::NAry(self.inputs.len())
	}

	fn into_flow(self: Box<Self>, scope: &ExecutionScope) -> Flow<T> {
		let Self { name, inputs } = *self;
		let scope = scope.child();

		stream! {
			let (tx, rx) = chan::bounded(MERGE_CHANNEL_CAPACITY);

			// Dropping this flow early tears down all writers.
			let _guard = scope.drop_guard();

			let writers = inputs
				.into_iter()
				.map(|input| spawn_writer(input, &scope, tx.clone()))
				.collect::<Vec<_>>();
			drop(tx);

			debug!(merge = %name, writers = writers.len(), "Started merge writers;");

			let mut failure = None;
			loop {
				let next = tokio::select! {
					biased;
					() = scope.cancelled() => break,
					next = rx.recv() => next,
				};

				match next {
					Ok(Ok(element)) => yield Ok(element),
					Ok(Err(e)) => {
						scope.cancel();
						failure = Some(e);
						break;
					}
					// Every writer dropped its sender
					Err(chan::RecvError) => break,
				}
			}
			rx.close();

			for res in writers.join().await {
				if let Err(e) = res {
					warn!(merge = %name, ?e, "Merge writer could not be joined;");
					if e.is_panic() {
						failure.get_or_insert_with(|| FlowError::Join {
							stage: name.clone(),
							reason: e.to_string(),
						});
					}
				}
			}

			if let Some(e) = failure {
				yield Err(e);
			} else if scope.is_cancelled() {
				yield Err(FlowError::Cancelled);
			}
		}
		.boxed()
	}
}

fn spawn_writer<T: Send + 'static>(
	input: BoxOperator<T>,
	scope: &ExecutionScope,
	tx: chan::Sender<Result<T, FlowError>>,
) -> JoinHandle<()> {
	let scope = scope.clone();

	tokio::spawn(
		async move {
			let upstream = input.name().to_owned();
			let mut flow = input.into_flow(&scope);

			loop {
				let next = tokio::select! {
					biased;
					() = scope.cancelled() => break,
					next = flow.next() => next,
				};

				let Some(next) = next else {
					trace!(%upstream, "Upstream completed;");
					break;
				};

				let failed = next.is_err();
				let sent = tokio::select! {
					biased;
					() = scope.cancelled() => break,
					sent = tx.send(next) => sent,
				};

				if sent.is_err() || failed {
					break;
				}
			}
		}
		.in_current_span(),
	)
}
