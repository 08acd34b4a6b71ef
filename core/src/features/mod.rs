//! Built-in analysers.

pub mod average_color;
pub mod file_metadata;

pub use average_color::AverageColor;
pub use file_metadata::FileMetadata;
