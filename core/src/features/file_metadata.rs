use std::sync::Arc;

use retina_flow::BoxOperator;

use crate::{
	context::{IndexContext, QueryContext},
	ingest::{ExtractionKernel, Extractor},
	model::{
		source::{METADATA_PATH, METADATA_SIZE},
		AttributeSchema, ContentType, Descriptor, DescriptorValue, Ingested, IngestedRef,
		Retrievable, Source, StructAttribute, Value, ValueType,
	},
	register_analyser,
	retrieve::{CorrespondenceFunction, FieldRetriever, Query},
	schema::{Analyser, Field},
	Error,
};

pub const NAME: &str = "FileMetadata";

/// Describes a retrievable by the path and size of the source it was decoded from.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileMetadata;

fn new() -> Arc<dyn Analyser> {
	Arc::new(FileMetadata)
}

register_analyser!("FileMetadata", new);

fn describe(path: String, size: Option<i64>) -> Descriptor {
	Descriptor::new(
		NAME,
		DescriptorValue::Struct(vec![
			StructAttribute {
				schema: AttributeSchema::new("path", ValueType::String, false),
				value: Some(Value::String(path)),
			},
			StructAttribute {
				schema: AttributeSchema::new("size", ValueType::Long, true),
				value: size.map(Value::Long),
			},
		]),
	)
}

struct Kernel;

impl ExtractionKernel for Kernel {
	fn extract(&self, _field: &Field, ingested: &Ingested) -> Result<Vec<Descriptor>, Error> {
		let Some(source) = ingested.source() else {
			return Ok(Vec::new());
		};

		let metadata = source.metadata();
		let path = metadata
			.get(METADATA_PATH)
			.cloned()
			.unwrap_or_else(|| source.name().to_string());
		let size = metadata
			.get(METADATA_SIZE)
			.and_then(|size| size.parse().ok());

		Ok(vec![describe(path, size)])
	}
}

impl Analyser for FileMetadata {
	fn name(&self) -> &'static str {
		NAME
	}

	fn content_types(&self) -> &'static [ContentType] {
		&[ContentType::Image, ContentType::Text]
	}

	fn prototype(&self) -> Descriptor {
		describe(String::new(), Some(0))
	}

	fn new_extractor(
		&self,
		field: Arc<Field>,
		input: BoxOperator<IngestedRef>,
		_context: &IndexContext,
	) -> Result<BoxOperator<IngestedRef>, Error> {
		Ok(Box::new(Extractor::new(field, NAME, input, Kernel)?))
	}

	fn new_retriever_for_query(
		&self,
		field: Arc<Field>,
		query: Query,
		_context: &QueryContext,
	) -> Result<BoxOperator<Retrievable>, Error> {
		match query {
			Query::Boolean(_) | Query::Fulltext(_) => Ok(Box::new(FieldRetriever::new(
				&field,
				NAME,
				query,
				CorrespondenceFunction::default(),
			)?)),
			Query::Proximity(_) => Err(Error::UnsupportedQuery {
				field: field.name().to_string(),
				reason: format!("{NAME} has no vector to compare"),
			}),
		}
	}
}

#[cfg(test)]
mod tests {
	use crate::{
		config::{FieldConfig, SchemaConfig},
		model::{ContentElement, MediaType, MemorySource, SourceRef},
		schema::Schema,
	};

	use super::*;

	#[test]
	fn source_without_path_falls_back_to_name() {
		let source: SourceRef = Arc::new(MemorySource::new(
			"notes.txt",
			MediaType::Text,
			"text/plain",
			b"hi".to_vec(),
		));
		let ingested = Ingested::new("SEGMENT", vec![ContentElement::text("hi")], Some(source));

		let descriptors = ingested_descriptors(&ingested);
		assert_eq!(descriptors.len(), 1);
		assert_eq!(descriptors[0].attribute(Some("path")), Some(Value::from("notes.txt")));
		assert_eq!(descriptors[0].attribute(Some("size")), Some(Value::Long(2)));
	}

	#[test]
	fn nothing_without_source() {
		let ingested = Ingested::new("SEGMENT", vec![ContentElement::text("hi")], None);
		assert!(ingested_descriptors(&ingested).is_empty());
	}

	fn ingested_descriptors(ingested: &Ingested) -> Vec<Descriptor> {
		// The kernel never looks at the field, any field of a throwaway schema will do.
		let schema =
			Schema::open(&SchemaConfig::new("metadata").with_field(FieldConfig::new("file", NAME)))
				.unwrap();
		Kernel.extract(schema.require_field("file").unwrap(), ingested).unwrap()
	}
}
