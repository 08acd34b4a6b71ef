//!
//! # Flow
//!
//! Retina's Flow crate is the dataflow runtime every indexing and retrieval pipeline runs on.
//!
//! A pipeline is a graph of [`Operator`]s. Each operator turns an [`ExecutionScope`] into a lazy,
//! non-restartable [`Flow`] of its output elements, and stages are composed by handing an upstream
//! operator to the constructor of its downstream. Aside from the basic contract, the crate provides:
//! - [`Merge`], a fan-in over N upstreams backed by a bounded channel with cooperative backpressure;
//! - [`Broadcast`], a fan-out that hands every upstream element to each of its subscribers;
//! - [`DefaultSink`], the terminal drain that anchors cleanup for the whole graph;
//! - Structured cancellation and deadlines through [`ExecutionScope`];
//!
//!
//! ## Basic example
//!
//! ```
//! use retina_flow::{BoxOperator, DefaultSink, ExecutionScope, Merge, Sink, Values};
//!
//! #[tokio::main]
//! async fn main() {
//!     let inputs: Vec<BoxOperator<u32>> = vec![
//!         Box::new(Values::new("left", vec![1, 2, 3])),
//!         Box::new(Values::new("right", vec![4, 5])),
//!     ];
//!     let merge: BoxOperator<u32> = Box::new(Merge::new("merge", inputs));
//!
//!     let report = Box::new(DefaultSink::new("sink", merge))
//!         .drain(&ExecutionScope::new())
//!         .await
//!         .unwrap();
//!
//!     assert_eq!(report.passed, 5);
//! }
//! ```

#![warn(
	clippy::all,
	clippy::pedantic,
	clippy::correctness,
	clippy::perf,
	clippy::style,
	clippy::suspicious,
	clippy::complexity,
	clippy::nursery,
	clippy::unwrap_used,
	unused_qualifications,
	rust_2018_idioms,
	trivial_casts,
	trivial_numeric_casts,
	unused_allocation,
	clippy::unnecessary_cast,
	clippy::cast_lossless,
	clippy::cast_possible_truncation,
	clippy::cast_possible_wrap,
	clippy::cast_precision_loss,
	clippy::cast_sign_loss,
	clippy::dbg_macro,
	clippy::deprecated_cfg_attr,
	clippy::separated_literal_suffix,
	deprecated
)]
#![forbid(deprecated_in_future)]
#![allow(clippy::missing_errors_doc, clippy::module_name_repetitions)]

mod broadcast;
mod error;
mod merge;
mod operator;
mod scope;
mod sink;

pub use broadcast::{Broadcast, Subscriber};
pub use error::FlowError;
pub use merge::{Merge, MERGE_CHANNEL_CAPACITY};
pub use operator::{Arity, BoxOperator, Flow, Operator, Sink, Values};
pub use scope::ExecutionScope;
pub use sink::{DefaultSink, SinkReport};
