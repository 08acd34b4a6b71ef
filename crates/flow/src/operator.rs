use std::fmt;

use async_trait::async_trait;
use futures::{stream::BoxStream, StreamExt};

use super::{error::FlowError, scope::ExecutionScope, sink::SinkReport};

/// A lazy, non-restartable sequence of elements produced by an [`Operator`].
///
/// Nothing runs until the stream is polled. An `Err` item is terminal: the producing stage
/// yields nothing after it.
pub type Flow<T> = BoxStream<'static, Result<T, FlowError>>;

pub type BoxOperator<T> = Box<dyn Operator<T>>;

/// How many upstreams an operator consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Arity {
	/// No upstream, e.g. an enumerator.
	Nullary,
	/// Exactly one upstream, e.g. a decoder, segmenter or extractor.
	Unary,
	/// N upstreams merged into one output.
	NAry(usize),
	/// One upstream and no output.
	Sink,
}

impl fmt::Display for Arity {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Nullary => write!(f, "nullary"),
			Self::Unary => write!(f, "unary"),
			Self::NAry(n) => write!(f, "{n}-ary"),
			Self::Sink => write!(f, "sink"),
		}
	}
}

/// A single pipeline stage.
///
/// [`Operator::into_flow`] consumes the operator, so a graph can only be driven once; callers
/// build a new graph for every execution.
pub trait Operator<T>: Send + 'static {
	fn name(&self) -> &str;

	fn arity(&self) -> Arity;

	fn into_flow(self: Box<Self>, scope: &ExecutionScope) -> Flow<T>;
}

/// Terminal stage of a graph, the only one allowed to materialize its upstream.
#[async_trait]
pub trait Sink: Send + 'static {
	fn name(&self) -> &str;

	async fn drain(self: Box<Self>, scope: &ExecutionScope) -> Result<SinkReport, FlowError>;
}

/// Nullary operator emitting a fixed list of elements.
#[derive(Debug)]
pub struct Values<T> {
	name: String,
	values: Vec<T>,
}

impl<T> Values<T> {
	pub fn new(name: impl Into<String>, values: Vec<T>) -> Self {
		Self {
			name: name.into(),
			values,
		}
	}
}

impl<T: Send + 'static> Operator<T> for Values<T> {
	fn name(&self) -> &str {
		&self.name
	}

	fn arity(&self) -> Arity {
		Arity::Nullary
	}

	fn into_flow(self: Box<Self>, scope: &ExecutionScope) -> Flow<T> {
		let scope = scope.clone();
		futures::stream::iter(self.values)
			.take_while(move |_| futures::future::ready(!scope.is_cancelled()))
			.map(Ok)
			.boxed()
	}
}
