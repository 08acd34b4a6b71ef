//!
//! # Retina Core
//!
//! Multimedia indexing and retrieval on top of [`retina_flow`].
//!
//! Content is enumerated, decoded, segmented into [`Ingested`](model::Ingested) retrievables and
//! analysed into typed [`Descriptor`](model::Descriptor)s that are persisted through a schema
//! [`Field`](schema::Field)'s storage writer. At query time a [`Query`](retrieve::Query) is handed
//! to a retriever bound to a field, which ranks what the storage reader returns by converting raw
//! distances into similarity scores.
//!
//! Stage implementations, analysers and storage backends register themselves in process-wide
//! registries (see [`registry`]), which the [`PipelineBuilder`](ingest::PipelineBuilder) and the
//! [`SchemaManager`](schema::SchemaManager) resolve configuration `type` names against.

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

pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod features;
pub mod ingest;
pub mod logging;
pub mod model;
pub mod registry;
pub mod retrieve;
pub mod schema;
pub mod storage;

pub use engine::Engine;
pub use error::{Error, FileIOError, QueryStatus};
pub use logging::{init_logging, LogConfig};

// Used by the registration macros
#[doc(hidden)]
pub use inventory;
