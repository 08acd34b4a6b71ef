#![allow(dead_code)]

use std::{
	io,
	sync::{
		atomic::{AtomicU64, Ordering},
		Arc,
	},
	time::Duration,
};

use async_stream::stream;
use futures::StreamExt;
use retina_flow::{Arity, BoxOperator, ExecutionScope, Flow, FlowError, Operator};

/// Emits `start, start + 1, ...` forever, one element per `period`.
pub struct Ticker {
	pub name: String,
	pub start: u64,
	pub period: Duration,
	pub emitted: Arc<AtomicU64>,
}

impl Ticker {
	pub fn new(name: &str, start: u64, period: Duration) -> (Self, Arc<AtomicU64>) {
		let emitted = Arc::new(AtomicU64::new(0));
		(
			Self {
				name: name.to_string(),
				start,
				period,
				emitted: Arc::clone(&emitted),
			},
			emitted,
		)
	}
}

impl Operator<u64> for Ticker {
	fn name(&self) -> &str {
		&self.name
	}

	fn arity(&self) -> Arity {
		Arity::Nullary
	}

	fn into_flow(self: Box<Self>, _scope: &ExecutionScope) -> Flow<u64> {
		let Self {
			start,
			period,
			emitted,
			..
		} = *self;

		stream! {
			let mut next = start;
			loop {
				tokio::time::sleep(period).await;
				emitted.fetch_add(1, Ordering::SeqCst);
				yield Ok(next);
				next += 1;
			}
		}
		.boxed()
	}
}

/// Emits its values, then fails.
pub struct Broken {
	pub name: String,
	pub values: Vec<u64>,
}

impl Operator<u64> for Broken {
	fn name(&self) -> &str {
		&self.name
	}

	fn arity(&self) -> Arity {
		Arity::Nullary
	}

	fn into_flow(self: Box<Self>, _scope: &ExecutionScope) -> Flow<u64> {
		let Self { name, values } = *self;

		stream! {
			for value in values {
				yield Ok(value);
			}
			yield Err(FlowError::stage(name, io::Error::other("broken upstream")));
		}
		.boxed()
	}
}

/// Unary stage multiplying every element by a constant.
pub struct Scale {
	pub factor: u64,
	pub input: BoxOperator<u64>,
}

impl Operator<u64> for Scale {
	fn name(&self) -> &str {
		"scale"
	}

	fn arity(&self) -> Arity {
		Arity::Unary
	}

	fn into_flow(self: Box<Self>, scope: &ExecutionScope) -> Flow<u64> {
		let factor = self.factor;
		self.input
			.into_flow(scope)
			.map(move |res| res.map(|value| value * factor))
			.boxed()
	}
}
