use retina_core::{
	config::{self, EngineConfig, FieldConfig, SchemaConfig},
	model::{Descriptor, DescriptorValue, FloatVector, Retrievable, ValueType},
	schema::SchemaManager,
	storage::{Initializer, Reader, Writer},
	Engine, Error,
};

use std::sync::Arc;

use futures_concurrency::future::Join;
use tracing_test::traced_test;
use uuid::Uuid;

mod common;

use common::{schema_config, SCHEMA};

#[test]
fn schemas_are_published_once() {
	let manager = SchemaManager::new();

	let schema = manager.load(&schema_config(SCHEMA)).unwrap();
	assert!(Arc::ptr_eq(&schema, &manager.require(SCHEMA).unwrap()));
	assert!(matches!(
		manager.load(&schema_config(SCHEMA)),
		Err(Error::DuplicateSchema(name)) if name == SCHEMA
	));

	manager.load(&schema_config("lsc")).unwrap();
	assert_eq!(
		manager.list().iter().map(|s| s.name().to_string()).collect::<Vec<_>>(),
		vec!["lsc", SCHEMA]
	);

	let missing = manager.require("mvk").unwrap_err();
	assert!(matches!(missing, Error::UnknownSchema(_)));
	assert_eq!(missing.status().code, 404);
	assert!(manager.get("mvk").is_none());
}

#[test]
fn invalid_schemas_are_rejected() {
	let manager = SchemaManager::new();

	let dotted = SchemaConfig::new("dotted").with_field(FieldConfig::new("average.color", "AverageColor"));
	assert!(matches!(
		manager.load(&dotted),
		Err(Error::InvalidFieldName(name)) if name == "average.color"
	));

	let twice = SchemaConfig::new("twice")
		.with_field(FieldConfig::new("file", "FileMetadata"))
		.with_field(FieldConfig::new("file", "FileMetadata"));
	assert!(matches!(manager.load(&twice), Err(Error::DuplicateField { .. })));

	let unknown = SchemaConfig::new("unknown").with_field(FieldConfig::new("ocr", "OCR"));
	assert!(matches!(
		manager.load(&unknown),
		Err(Error::UnknownAnalyser(name)) if name == "OCR"
	));

	let mut remote = schema_config("remote");
	remote.connection.database = "cottontail".to_string();
	assert!(matches!(
		manager.load(&remote),
		Err(Error::UnknownConnection(name)) if name == "cottontail"
	));

	let mut metric = schema_config("metric");
	metric
		.connection
		.parameters
		.insert("distance".to_string(), "hamming".to_string());
	assert!(matches!(manager.load(&metric), Err(Error::InvalidParameter { .. })));

	// Nothing half-built was published.
	assert!(manager.list().is_empty());
}

#[test]
fn fields_expose_analyser_prototypes() {
	let manager = SchemaManager::new();
	let schema = manager.load(&schema_config(SCHEMA)).unwrap();

	assert_eq!(
		schema.fields().iter().map(|f| f.name()).collect::<Vec<_>>(),
		vec!["averagecolor", "file"]
	);

	let color = schema.require_field("averagecolor").unwrap();
	assert_eq!(color.analyser().name(), "AverageColor");
	assert_eq!(color.prototype().vector().map(FloatVector::dimension), Some(3));
	assert_eq!(color.schema_name(), SCHEMA);

	let file = schema.require_field("file").unwrap();
	assert_eq!(
		file.prototype()
			.schema()
			.into_iter()
			.map(|attribute| (attribute.name, attribute.kind))
			.collect::<Vec<_>>(),
		vec![
			("path".to_string(), ValueType::String),
			("size".to_string(), ValueType::Long)
		]
	);

	assert!(matches!(
		schema.require_field("clip"),
		Err(Error::UnknownField { field, .. }) if field == "clip"
	));
}

#[tokio::test]
#[traced_test]
async fn initialize_and_truncate() {
	let manager = SchemaManager::new();
	let schema = manager.load(&schema_config(SCHEMA)).unwrap();
	let field = schema.require_field("averagecolor").unwrap();

	assert!(!field.initializer().is_initialized().await);
	schema.initialize().await.unwrap();
	schema.initialize().await.unwrap();
	assert!(field.initializer().is_initialized().await);

	let id = Uuid::new_v4();
	schema
		.retrievables()
		.writer
		.add(Retrievable::new(id, "SEGMENT"))
		.await
		.unwrap();
	let mut descriptor = Descriptor::new(
		"AverageColor",
		DescriptorValue::Vector(FloatVector(vec![0.2, 0.4, 0.6])),
	);
	descriptor.assign(id).unwrap();
	let descriptor_id = descriptor.id();
	field.writer().add(descriptor).await.unwrap();

	let stored = field.reader().get(descriptor_id).await.unwrap().unwrap();
	assert_eq!(stored.retrievable_id(), Some(id));

	schema.truncate().await.unwrap();
	assert_eq!(field.reader().count().await.unwrap(), 0);
	assert_eq!(schema.retrievables().reader.count().await.unwrap(), 0);
	assert!(field.initializer().is_initialized().await);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[traced_test]
async fn concurrent_readers_see_loaded_schemas() {
	let manager = Arc::new(SchemaManager::new());
	manager.load(&schema_config(SCHEMA)).unwrap();

	let readers = (0..16)
		.map(|_| {
			let manager = Arc::clone(&manager);
			async move {
				tokio::spawn(async move { manager.require(SCHEMA).map(|s| s.fields().len()) })
					.await
					.unwrap()
			}
		})
		.collect::<Vec<_>>()
		.join()
		.await;

	assert!(readers.into_iter().all(|fields| fields.unwrap() == 2));
}

#[tokio::test]
#[traced_test]
async fn engine_opens_from_file() {
	let dir = tempfile::tempdir().unwrap();
	let path = dir.path().join("retina.toml");
	std::fs::write(
		&path,
		r#"
		[[schemas]]
		name = "vitrivr"

		[[schemas.fields]]
		name = "averagecolor"
		factory = "AverageColor"
		parameters = { distance = "manhattan" }
		"#,
	)
	.unwrap();

	let loaded: EngineConfig = config::load(&path).await.unwrap();
	let engine = Engine::open(loaded).await.unwrap();

	let schema = engine.schemas().require(SCHEMA).unwrap();
	assert_eq!(schema.connection().provider(), "memory");
	assert!(schema
		.require_field("averagecolor")
		.unwrap()
		.initializer()
		.is_initialized()
		.await);

	let yaml = dir.path().join("retina.yaml");
	std::fs::write(&yaml, "schemas: []").unwrap();
	assert!(matches!(
		config::load::<EngineConfig>(&yaml).await,
		Err(Error::ConfigFile { .. })
	));
	assert!(matches!(
		config::load::<EngineConfig>(dir.path().join("missing.json")).await,
		Err(Error::FileIO(_))
	));
}
