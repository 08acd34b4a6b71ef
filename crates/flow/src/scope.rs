use std::{future::Future, time::Duration};

use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, DropGuard, WaitForCancellationFuture};
use tracing::{debug, Instrument};
use uuid::Uuid;

/// The single logical scope a pipeline execution runs in.
///
/// Every task spawned on behalf of a graph observes the scope's cancellation. Cancelling a
/// scope cancels all of its children, while cancelling a child leaves the parent untouched.
#[derive(Debug, Clone)]
pub struct ExecutionScope {
	id: Uuid,
	token: CancellationToken,
}

impl Default for ExecutionScope {
	fn default() -> Self {
		Self::new()
	}
}

impl ExecutionScope {
	#[must_use]
	pub fn new() -> Self {
		Self {
			id: Uuid::new_v4(),
			token: CancellationToken::new(),
		}
	}

	#[must_use]
	pub const fn id(&self) -> Uuid {
		self.id
	}

	#[must_use]
	pub fn child(&self) -> Self {
		Self {
			id: self.id,
			token: self.token.child_token(),
		}
	}

	pub fn cancel(&self) {
		self.token.cancel();
	}

	#[must_use]
	pub fn is_cancelled(&self) -> bool {
		self.token.is_cancelled()
	}

	pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
		self.token.cancelled()
	}

	/// Cancels this scope once the returned guard is dropped.
	#[must_use]
	pub fn drop_guard(&self) -> DropGuard {
		self.token.clone().drop_guard()
	}

	/// Cancels this scope once `deadline` elapses, unless it was cancelled before.
	pub fn cancel_after(&self, deadline: Duration) -> JoinHandle<()> {
		let token = self.token.clone();
		let id = self.id;
		tokio::spawn(async move {
			tokio::select! {
				() = token.cancelled() => {}
				() = tokio::time::sleep(deadline) => {
					debug!(%id, ?deadline, "Deadline exceeded, cancelling scope;");
					token.cancel();
				}
			}
		})
	}

	/// Spawns `fut` on the runtime, dropping it as soon as the scope is cancelled.
	///
	/// Resolves to `None` if the future was cut short by cancellation.
	pub fn spawn<F>(&self, fut: F) -> JoinHandle<Option<F::Output>>
	where
		F: Future + Send + 'static,
		F::Output: Send + 'static,
	{
		let token = self.token.clone();
		tokio::spawn(
			async move {
				tokio::select! {
					biased;
					() = token.cancelled() => None,
					out = fut => Some(out),
				}
			}
			.in_current_span(),
		)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn child_cancellation_stays_local() {
		let parent = ExecutionScope::new();
		let child = parent.child();

		child.cancel();

		assert!(child.is_cancelled());
		assert!(!parent.is_cancelled());
		assert_eq!(parent.id(), child.id());
	}

	#[tokio::test]
	async fn parent_cancellation_reaches_children() {
		let parent = ExecutionScope::new();
		let grandchild = parent.child().child();

		parent.cancel();

		assert!(grandchild.is_cancelled());
	}

	#[tokio::test(start_paused = true)]
	async fn deadline_cancels_scope() {
		let scope = ExecutionScope::new();
		let timer = scope.cancel_after(Duration::from_secs(5));

		tokio::time::sleep(Duration::from_secs(6)).await;
		timer.await.unwrap();

		assert!(scope.is_cancelled());
	}

	#[tokio::test]
	async fn spawned_future_is_dropped_on_cancel() {
		let scope = ExecutionScope::new();
		let handle = scope.spawn(futures::future::pending::<()>());

		scope.cancel();

		assert_eq!(handle.await.unwrap(), None);
	}
}
