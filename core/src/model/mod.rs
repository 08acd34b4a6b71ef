//! Data model shared by indexing and retrieval.

pub mod content;
pub mod descriptor;
pub mod retrievable;
pub mod source;
pub mod value;

pub use content::{Content, ContentElement, ContentType};
pub use descriptor::{
	AttributeSchema, Descriptor, DescriptorId, DescriptorValue, Persistence, StructAttribute,
};
pub use retrievable::{
	Attribute, DistanceAttribute, Ingested, IngestedRef, Relationship, Retrievable, RetrievableId,
	RetrievableRef, ScoreAttribute, PART_OF,
};
pub use source::{FileSource, MediaType, MemorySource, Source, SourceReader, SourceRef};
pub use value::{FloatVector, Value, ValueType};
