use std::collections::{HashMap, HashSet};

use async_stream::stream;
use futures::StreamExt;
use futures_concurrency::future::Join;
use retina_flow::{Arity, BoxOperator, ExecutionScope, Flow, FlowError, Operator};
use tracing::debug;

use crate::model::{Retrievable, RetrievableId, ScoreAttribute};

/// Drives all inputs concurrently and collects their results.
///
/// The first failing input cancels its siblings, its error is the one returned.
async fn collect_all(
	inputs: Vec<BoxOperator<Retrievable>>,
	scope: &ExecutionScope,
) -> Result<Vec<Vec<Retrievable>>, FlowError> {
	let scope = scope.child();
	let _guard = scope.drop_guard();

	let results = inputs
		.into_iter()
		.map(|input| {
			let scope = scope.clone();
			async move {
				let mut flow = input.into_flow(&scope);
				let mut collected = Vec::new();
				loop {
					let next = tokio::select! {
						biased;
						() = scope.cancelled() => return Err(FlowError::Cancelled),
						next = flow.next() => next,
					};

					match next {
						Some(Ok(retrievable)) => collected.push(retrievable),
						Some(Err(e)) => {
							scope.cancel();
							return Err(e);
						}
						None => return Ok(collected),
					}
				}
			}
		})
		.collect::<Vec<_>>()
		.join()
		.await;

	let mut collected = Vec::with_capacity(results.len());
	let mut failure: Option<FlowError> = None;
	for result in results {
		match result {
			Ok(retrievables) => collected.push(retrievables),
			Err(e) if failure.as_ref().map_or(true, FlowError::is_cancelled) => failure = Some(e),
			Err(_) => {}
		}
	}

	failure.map_or(Ok(collected), Err)
}

/// Fuses the scores of several retrievers into a weighted mean per retrievable.
///
/// A retrievable missing from an input, or carrying no score there, contributes 0 for that input.
pub struct WeightedScoreFusion {
	name: String,
	inputs: Vec<BoxOperator<Retrievable>>,
	weights: Vec<f32>,
}

impl WeightedScoreFusion {
	/// Weights beyond the number of inputs are ignored, missing ones default to 1.0.
	pub fn new(
		name: impl Into<String>,
		inputs: Vec<BoxOperator<Retrievable>>,
		mut weights: Vec<f32>,
	) -> Self {
		weights.resize(inputs.len(), 1.0);

		Self {
			name: name.into(),
			inputs,
			weights,
		}
	}
}

impl Operator<Retrievable> for WeightedScoreFusion {
	fn name(&self) -> &str {
		&self.name
	}

	fn arity(&self) -> Arity {
		Arity::NAry(self.inputs.len())
	}

	fn into_flow(self: Box<Self>, scope: &ExecutionScope) -> Flow<Retrievable> {
		let Self {
			name,
			mut inputs,
			weights,
		} = *self;

		if inputs.len() <= 1 {
			return inputs.pop().map_or_else(
				|| futures::stream::empty().boxed(),
				|input| input.into_flow(scope),
			);
		}

		let scope = scope.clone();
		stream! {
			let results = match collect_all(inputs, &scope).await {
				Ok(results) => results,
				Err(e) => {
					yield Err(e);
					return;
				}
			};

			// Nothing to fuse with a single populated input.
			if results.iter().filter(|r| !r.is_empty()).count() < 2 {
				for retrievable in results.into_iter().flatten() {
					yield Ok(retrievable);
				}
				return;
			}

			let total: f32 = weights.iter().sum();
			let mut order = Vec::<RetrievableId>::new();
			let mut fused = HashMap::<RetrievableId, (Retrievable, f32)>::new();

			for (retrievables, weight) in results.into_iter().zip(&weights) {
				for retrievable in retrievables {
					let contribution = retrievable.score().unwrap_or(0.0) * weight;
					fused
						.entry(retrievable.id)
						.and_modify(|(_, score)| *score += contribution)
						.or_insert_with(|| {
							order.push(retrievable.id);
							(retrievable, contribution)
						});
				}
			}

			debug!(aggregator = %name, fused = order.len(), "Scores fused;");
			for id in order {
				if let Some((mut retrievable, score)) = fused.remove(&id) {
					retrievable.set_score(ScoreAttribute::Global(score / total));
					yield Ok(retrievable);
				}
			}
		}
		.boxed()
	}
}

/// Emits the retrievables found by every input, as reported by the first one.
pub struct Intersection {
	name: String,
	inputs: Vec<BoxOperator<Retrievable>>,
}

impl Intersection {
	pub fn new(name: impl Into<String>, inputs: Vec<BoxOperator<Retrievable>>) -> Self {
		Self {
			name: name.into(),
			inputs,
		}
	}
}

impl Operator<Retrievable> for Intersection {
	fn name(&self) -> &str {
		&self.name
	}

	fn arity(&self) -> Arity {
		Arity::NAry(self.inputs.len())
	}

	fn into_flow(self: Box<Self>, scope: &ExecutionScope) -> Flow<Retrievable> {
		let Self { name, inputs } = *self;
		let scope = scope.clone();

		stream! {
			let mut results = match collect_all(inputs, &scope).await {
				Ok(results) => results.into_iter(),
				Err(e) => {
					yield Err(e);
					return;
				}
			};

			let Some(first) = results.next() else {
				return;
			};
			let others = results
				.map(|r| r.into_iter().map(|retrievable| retrievable.id).collect::<HashSet<_>>())
				.collect::<Vec<_>>();

			let mut emitted = 0usize;
			for retrievable in first {
				if others.iter().all(|ids| ids.contains(&retrievable.id)) {
					emitted += 1;
					yield Ok(retrievable);
				}
			}
			debug!(aggregator = %name, emitted, "Intersection computed;");
		}
		.boxed()
	}
}

#[cfg(test)]
mod tests {
	use std::{io, time::Duration};

	use futures::TryStreamExt;
	use retina_flow::Values;
	use uuid::Uuid;

	use super::*;

	fn scored(id: RetrievableId, score: f32) -> Retrievable {
		let mut retrievable = Retrievable::new(id, "SEGMENT");
		retrievable.set_score(ScoreAttribute::Global(score));
		retrievable
	}

	async fn drain(operator: BoxOperator<Retrievable>) -> Vec<Retrievable> {
		operator
			.into_flow(&ExecutionScope::new())
			.try_collect()
			.await
			.unwrap()
	}

	#[tokio::test]
	async fn fusion_weights_scores() {
		let (a, b) = (Uuid::new_v4(), Uuid::new_v4());

		let inputs: Vec<BoxOperator<Retrievable>> = vec![
			Box::new(Values::new("left", vec![scored(a, 0.8), scored(b, 0.4)])),
			Box::new(Values::new("right", vec![scored(a, 0.2)])),
		];
		let fused = drain(Box::new(WeightedScoreFusion::new("fusion", inputs, vec![3.0]))).await;

		let scores = fused
			.iter()
			.map(|r| (r.id, r.score().unwrap()))
			.collect::<HashMap<_, _>>();
		assert_eq!(fused.len(), 2);
		assert!((scores[&a] - (0.8 * 3.0 + 0.2) / 4.0).abs() < 1e-6);
		assert!((scores[&b] - (0.4 * 3.0) / 4.0).abs() < 1e-6);
	}

	#[tokio::test]
	async fn fusion_passes_single_populated_input() {
		let a = Uuid::new_v4();

		let inputs: Vec<BoxOperator<Retrievable>> = vec![
			Box::new(Values::new("left", vec![scored(a, 0.8)])),
			Box::new(Values::new("right", Vec::new())),
		];
		let fused = drain(Box::new(WeightedScoreFusion::new("fusion", inputs, Vec::new()))).await;

		assert_eq!(fused.len(), 1);
		assert_eq!(fused[0].score(), Some(0.8));
	}

	#[tokio::test]
	async fn intersection_keeps_common_ids() {
		let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

		let inputs: Vec<BoxOperator<Retrievable>> = vec![
			Box::new(Values::new("first", vec![scored(a, 0.1), scored(b, 0.2), scored(c, 0.3)])),
			Box::new(Values::new("second", vec![scored(c, 0.9), scored(a, 0.5)])),
		];
		let common = drain(Box::new(Intersection::new("intersection", inputs))).await;

		assert_eq!(common.iter().map(|r| r.id).collect::<Vec<_>>(), vec![a, c]);
		assert_eq!(common[1].score(), Some(0.3));
	}

	/// Never yields nor completes.
	struct Stalled;

	impl Operator<Retrievable> for Stalled {
		fn name(&self) -> &str {
			"stalled"
		}

		fn arity(&self) -> Arity {
			Arity::Nullary
		}

		fn into_flow(self: Box<Self>, _scope: &ExecutionScope) -> Flow<Retrievable> {
			futures::stream::pending().boxed()
		}
	}

	fn broken() -> BoxOperator<Retrievable> {
		struct Broken;

		impl Operator<Retrievable> for Broken {
			fn name(&self) -> &str {
				"broken"
			}

			fn arity(&self) -> Arity {
				Arity::Nullary
			}

			fn into_flow(self: Box<Self>, _scope: &ExecutionScope) -> Flow<Retrievable> {
				futures::stream::once(async {
					Err(FlowError::stage("broken", io::Error::other("retriever failed")))
				})
				.boxed()
			}
		}

		Box::new(Broken)
	}

	#[tokio::test]
	async fn failing_input_ends_aggregation() {
		let aggregators: Vec<BoxOperator<Retrievable>> = vec![
			Box::new(WeightedScoreFusion::new(
				"fusion",
				vec![Box::new(Stalled), broken()],
				Vec::new(),
			)),
			Box::new(Intersection::new("intersection", vec![broken(), Box::new(Stalled)])),
		];

		for aggregator in aggregators {
			let results = tokio::time::timeout(
				Duration::from_secs(5),
				aggregator
					.into_flow(&ExecutionScope::new())
					.collect::<Vec<_>>(),
			)
			.await
			.expect("aggregation must end once an input fails");

			assert!(matches!(
				&results[..],
				[Err(FlowError::Stage { stage, .. })] if stage == "broken"
			));
		}
	}
}
