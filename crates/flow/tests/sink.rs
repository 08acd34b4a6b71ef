use retina_flow::{BoxOperator, DefaultSink, ExecutionScope, FlowError, Sink, Values};

use std::time::Duration;

use tracing_test::traced_test;

mod common;

use common::{Broken, Ticker};

#[tokio::test]
#[traced_test]
async fn sink_counts_passed_elements() {
	let input: BoxOperator<u64> = Box::new(Values::new("values", (0..42).collect()));

	let report = Box::new(DefaultSink::new("sink", input))
		.drain(&ExecutionScope::new())
		.await
		.unwrap();

	assert_eq!(report.sink, "sink");
	assert_eq!(report.passed, 42);
}

#[tokio::test]
#[traced_test]
async fn sink_stops_on_sentinel() {
	let input: BoxOperator<u64> = Box::new(Values::new("values", vec![1, 2, 0, 3, 4]));

	let report = Box::new(DefaultSink::new("sink", input).stop_when(|value| *value == 0))
		.drain(&ExecutionScope::new())
		.await
		.unwrap();

	assert_eq!(report.passed, 2);
}

#[tokio::test]
#[traced_test]
async fn sink_surfaces_upstream_failure() {
	let input: BoxOperator<u64> = Box::new(Broken {
		name: "decoder".to_string(),
		values: vec![1, 2],
	});

	let res = Box::new(DefaultSink::new("sink", input))
		.drain(&ExecutionScope::new())
		.await;

	assert!(matches!(res, Err(FlowError::Stage { ref stage, .. }) if stage == "decoder"));
	assert!(logs_contain("Upstream failed"));
}

#[tokio::test]
#[traced_test]
async fn sink_observes_deadline() {
	let (ticker, _) = Ticker::new("ticker", 0, Duration::from_millis(1));
	let scope = ExecutionScope::new();
	scope.cancel_after(Duration::from_millis(50));

	let res = tokio::time::timeout(
		Duration::from_secs(1),
		Box::new(DefaultSink::new("sink", Box::new(ticker) as BoxOperator<u64>)).drain(&scope),
	)
	.await
	.expect("deadline must cancel the drain");

	assert!(matches!(res, Err(FlowError::Cancelled)));
}
