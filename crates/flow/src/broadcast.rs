use std::sync::Arc;

use async_channel as chan;
use async_stream::stream;
use futures::StreamExt;
use futures_concurrency::future::Join;
use parking_lot::Mutex;
use tracing::{debug, trace, Instrument};

use super::{
	error::FlowError,
	merge::MERGE_CHANNEL_CAPACITY,
	operator::{Arity, BoxOperator, Flow, Operator},
	scope::ExecutionScope,
};

type Sender<T> = chan::Sender<Result<T, FlowError>>;
type Receiver<T> = chan::Receiver<Result<T, FlowError>>;

/// Fan-out of one upstream to many downstream chains.
///
/// Every [`Subscriber`] receives every upstream element. The upstream is only started once all
/// subscribers created through [`Broadcast::subscribe`] have been driven (or dropped), so the
/// subscribers have to be driven concurrently. Each subscriber owns a bounded channel, making the
/// slowest subscriber pace the upstream.
pub struct Broadcast<T> {
	shared: Arc<Shared<T>>,
}

struct Shared<T> {
	name: String,
	state: Mutex<State<T>>,
}

struct State<T> {
	upstream: Option<BoxOperator<T>>,
	senders: Vec<Sender<T>>,
	pending: usize,
	scope: Option<ExecutionScope>,
}

impl<T: Clone + Send + Sync + 'static> Broadcast<T> {
	pub fn new(upstream: BoxOperator<T>) -> Self {
		Self {
			shared: Arc::new(Shared {
				name: format!("{}:broadcast", upstream.name()),
				state: Mutex::new(State {
					upstream: Some(upstream),
					senders: Vec::new(),
					pending: 0,
					scope: None,
				}),
			}),
		}
	}

	#[must_use]
	pub fn subscribe(&self) -> Subscriber<T> {
		let (tx, rx) = chan::bounded(MERGE_CHANNEL_CAPACITY);

		let mut state = self.shared.state.lock();
		state.senders.push(tx);
		state.pending += 1;

		Subscriber {
			shared: Arc::clone(&self.shared),
			receiver: rx,
			started: false,
		}
	}
}

impl<T: Clone + Send + Sync + 'static> Shared<T> {
	fn arrive(&self, scope: Option<&ExecutionScope>) {
		let mut state = self.state.lock();
		state.pending = state.pending.saturating_sub(1);
		if let Some(scope) = scope {
			state.scope.get_or_insert_with(|| scope.child());
		}

		if state.pending > 0 {
			return;
		}

		let (Some(upstream), Some(scope)) = (state.upstream.take(), state.scope.clone()) else {
			return;
		};
		let senders = std::mem::take(&mut state.senders);
		drop(state);

		debug!(broadcast = %self.name, subscribers = senders.len(), "All subscribers arrived, starting upstream;");
		tokio::spawn(pump(upstream, senders, scope).in_current_span());
	}
}

async fn pump<T: Clone + Send + Sync + 'static>(
	upstream: BoxOperator<T>,
	mut senders: Vec<Sender<T>>,
	scope: ExecutionScope,
) {
	let mut flow = upstream.into_flow(&scope);

	loop {
		let next = tokio::select! {
			biased;
			() = scope.cancelled() => break,
			next = flow.next() => next,
		};
		let Some(next) = next else {
			break;
		};
		let failed = next.is_err();

		let sent = senders
			.iter()
			.map(|tx| tx.send(next.clone()))
			.collect::<Vec<_>>()
			.join()
			.await;

		// Subscribers whose flow was dropped stop receiving.
		let mut results = sent.into_iter();
		senders.retain(|_| results.next().is_some_and(|res| res.is_ok()));

		if failed || senders.is_empty() {
			break;
		}
	}

	trace!("Broadcast upstream finished;");
}

/// One downstream end of a [`Broadcast`].
pub struct Subscriber<T: Clone + Send + Sync + 'static> {
	shared: Arc<Shared<T>>,
	receiver: Receiver<T>,
	started: bool,
}

impl<T: Clone + Send + Sync + 'static> Drop for Subscriber<T> {
	fn drop(&mut self) {
		if !self.started {
			// Never driven, release the upstream for the remaining subscribers.
			self.receiver.close();
			self.shared.arrive(None);
		}
	}
}

impl<T: Clone + Send + Sync + 'static> Operator<T> for Subscriber<T> {
	fn name(&self) -> &str {
		&self.shared.name
	}

	fn arity(&self) -> Arity {
		Arity::Unary
	}

	fn into_flow(self: Box<Self>, scope: &ExecutionScope) -> Flow<T> {
		let mut subscriber = *self;
		let scope = scope.clone();

		stream! {
			subscriber.started = true;
			subscriber.shared.arrive(Some(&scope));

			loop {
				let next = tokio::select! {
					biased;
					() = scope.cancelled() => None,
					next = subscriber.receiver.recv() => Some(next),
				};

				let Some(next) = next else {
					subscriber.receiver.close();
					yield Err(FlowError::Cancelled);
					break;
				};

				match next {
					Ok(Ok(element)) => yield Ok(element),
					Ok(Err(e)) => {
						yield Err(e);
						break;
					}
					Err(chan::RecvError) => break,
				}
			}
		}
		.boxed()
	}
}
