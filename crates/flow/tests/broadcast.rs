use retina_flow::{BoxOperator, Broadcast, ExecutionScope, FlowError, Operator, Values};

use std::time::Duration;

use futures::StreamExt;
use futures_concurrency::future::Join;
use tracing_test::traced_test;

mod common;

use common::{Broken, Scale};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[traced_test]
async fn every_subscriber_receives_every_element() {
	let values = (0..500).collect::<Vec<u64>>();
	let broadcast = Broadcast::new(Box::new(Values::new("values", values.clone())) as BoxOperator<u64>);

	let scope = ExecutionScope::new();
	let left = Box::new(broadcast.subscribe()).into_flow(&scope);
	let right = Box::new(Scale {
		factor: 2,
		input: Box::new(broadcast.subscribe()),
	})
	.into_flow(&scope);

	let (left, right) = (
		left.map(Result::unwrap).collect::<Vec<_>>(),
		right.map(Result::unwrap).collect::<Vec<_>>(),
	)
		.join()
		.await;

	// Order within a single chain is preserved
	assert_eq!(left, values);
	assert_eq!(right, values.iter().map(|v| v * 2).collect::<Vec<_>>());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[traced_test]
async fn upstream_failure_reaches_all_subscribers() {
	let broadcast = Broadcast::new(Box::new(Broken {
		name: "broken".to_string(),
		values: vec![7, 8],
	}) as BoxOperator<u64>);

	let scope = ExecutionScope::new();
	let flows = [broadcast.subscribe(), broadcast.subscribe()]
		.into_iter()
		.map(|subscriber| Box::new(subscriber).into_flow(&scope).collect::<Vec<_>>())
		.collect::<Vec<_>>();

	for results in flows.join().await {
		assert_eq!(results.len(), 3);
		assert!(matches!(results[2], Err(FlowError::Stage { .. })));
	}
}

#[tokio::test]
#[traced_test]
async fn dropped_subscriber_does_not_stall_the_others() {
	let broadcast = Broadcast::new(Box::new(Values::new("values", vec![1u64, 2, 3])) as BoxOperator<u64>);

	let driven = broadcast.subscribe();
	drop(broadcast.subscribe());

	let results = tokio::time::timeout(
		Duration::from_secs(1),
		Box::new(driven)
			.into_flow(&ExecutionScope::new())
			.map(Result::unwrap)
			.collect::<Vec<_>>(),
	)
	.await
	.expect("upstream must start once the remaining subscriber arrives");

	assert_eq!(results, vec![1, 2, 3]);
}
