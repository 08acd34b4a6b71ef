//! Indexing: the built-in stages and the builder wiring them into a pipeline.
//!
//! Every stage but the extractors registers itself under a `type` name, extractors are built by
//! the analyser of the field they write to.

mod builder;
mod decode;
mod enumerate;
mod export;
mod extract;
mod persist;
mod segment;
mod transform;

pub use builder::{Leaf, Pipeline, PipelineBuilder};
pub use decode::Decoder;
pub use enumerate::FileSystemEnumerator;
pub use export::LogExporter;
pub use extract::{ExtractionKernel, Extractor};
pub use persist::PersistRetrievable;
pub use segment::{PassThroughSegmenter, SEGMENT_KIND};
pub use transform::PassThroughTransformer;
