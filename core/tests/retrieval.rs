use retina_core::{
	context::QueryContext,
	model::{
		AttributeSchema, ContentElement, Descriptor, DescriptorValue, DistanceAttribute,
		FloatVector, Relationship, Retrievable, StructAttribute, Value, ValueType, PART_OF,
	},
	retrieve::{
		BooleanQuery, Comparison, CorrespondenceFunction, FieldLookup, FieldRetriever,
		FulltextQuery, Predicate, ProximityQuery, Query, RelationExpander, SortOrder,
	},
	storage::{RetrievableWriter, Writer},
	Engine, Error,
};

use futures::TryStreamExt;
use image::{Rgb, RgbImage};
use retina_flow::{ExecutionScope, FlowError, Operator, Values};
use tracing_test::traced_test;
use uuid::Uuid;

mod common;

use common::{engine_config, SCHEMA};

const EPSILON: f32 = 1e-6;

/// Stores ten retrievables described by `[i / 10, 0, 0]`, returned in insertion order.
async fn ten_vectors(engine: &Engine) -> Vec<Uuid> {
	let schema = engine.schemas().require(SCHEMA).unwrap();
	let field = schema.require_field("averagecolor").unwrap();

	let mut ids = Vec::new();
	for i in 0..10u8 {
		let id = Uuid::new_v4();
		assert!(schema
			.retrievables()
			.writer
			.add(Retrievable::new(id, "SEGMENT"))
			.await
			.unwrap());

		let mut descriptor = Descriptor::new(
			"AverageColor",
			DescriptorValue::Vector(FloatVector(vec![f32::from(i) * 0.1, 0.0, 0.0])),
		);
		descriptor.assign(id).unwrap();
		assert!(field.writer().add(descriptor).await.unwrap());

		ids.push(id);
	}

	ids
}

fn file(path: &str, size: i64) -> DescriptorValue {
	DescriptorValue::Struct(vec![
		StructAttribute {
			schema: AttributeSchema::new("path", ValueType::String, false),
			value: Some(Value::from(path)),
		},
		StructAttribute {
			schema: AttributeSchema::new("size", ValueType::Long, true),
			value: Some(Value::Long(size)),
		},
	])
}

async fn three_files(engine: &Engine) -> Vec<Uuid> {
	let schema = engine.schemas().require(SCHEMA).unwrap();
	let field = schema.require_field("file").unwrap();

	let mut ids = Vec::new();
	for (path, size) in [
		("/media/red.png", 120),
		("/media/blue.png", 4_096),
		("/media/notes.txt", 25),
	] {
		let id = Uuid::new_v4();
		schema
			.retrievables()
			.writer
			.add(Retrievable::new(id, "SEGMENT"))
			.await
			.unwrap();

		let mut descriptor = Descriptor::new("FileMetadata", file(path, size));
		descriptor.assign(id).unwrap();
		field.writer().add(descriptor).await.unwrap();

		ids.push(id);
	}

	ids
}

#[tokio::test]
#[traced_test]
async fn nearest_five_scored_with_bounded_correspondence() {
	let engine = Engine::open(engine_config()).await.unwrap();
	let ids = ten_vectors(&engine).await;
	let schema = engine.schemas().require(SCHEMA).unwrap();

	let query = ProximityQuery::new(vec![0.0, 0.0, 0.0], 5).with_order(SortOrder::Asc);
	let retriever = FieldRetriever::new(
		schema.require_field("averagecolor").unwrap(),
		"AverageColor",
		Query::Proximity(query),
		CorrespondenceFunction::bounded(0.0, 1.0).unwrap(),
	)
	.unwrap();

	let results = Box::new(retriever)
		.into_flow(&ExecutionScope::new())
		.try_collect::<Vec<_>>()
		.await
		.unwrap();

	assert_eq!(results.len(), 5);
	for (i, result) in results.iter().enumerate() {
		let expected = f32::from(u8::try_from(i).unwrap()) * 0.1;

		assert_eq!(result.id, ids[i]);
		assert!(matches!(
			result.distance(),
			Some(DistanceAttribute::Global(d)) if (d - expected).abs() < EPSILON
		));
		// (max - d) / (max - min) with min = 0, max = 1
		let score = result.score().unwrap();
		assert!((score - (1.0 - expected)).abs() < EPSILON, "{score} for {expected}");
	}
}

#[tokio::test]
#[traced_test]
async fn descending_order_yields_farthest() {
	let engine = Engine::open(engine_config()).await.unwrap();
	let ids = ten_vectors(&engine).await;

	let results = engine
		.retrieve(
			SCHEMA,
			"averagecolor",
			Query::Proximity(
				ProximityQuery::new(vec![0.0, 0.0, 0.0], 3).with_order(SortOrder::Desc),
			),
			&QueryContext::default(),
		)
		.await
		.unwrap();

	assert_eq!(
		results.iter().map(|r| r.id).collect::<Vec<_>>(),
		vec![ids[7], ids[8], ids[9]]
	);
	// Linear over a maximum distance of 3
	assert!((results[0].score().unwrap() - (1.0 - 0.7 / 3.0)).abs() < EPSILON);
}

#[tokio::test]
#[traced_test]
async fn engine_ranks_by_score() {
	let engine = Engine::open(engine_config()).await.unwrap();
	let ids = ten_vectors(&engine).await;

	let results = engine
		.retrieve(
			SCHEMA,
			"averagecolor",
			Query::Proximity(ProximityQuery::new(vec![0.45, 0.0, 0.0], 4)),
			&QueryContext::default(),
		)
		.await
		.unwrap();

	assert_eq!(results.len(), 4);
	assert!(results
		.windows(2)
		.all(|pair| pair[0].score() >= pair[1].score()));
	let mut found = results.iter().map(|r| r.id).collect::<Vec<_>>();
	found.sort();
	let mut expected = ids[3..7].to_vec();
	expected.sort();
	assert_eq!(found, expected);
}

#[tokio::test]
#[traced_test]
async fn content_query_honors_context_limit() {
	let engine = Engine::open(engine_config()).await.unwrap();
	let ids = ten_vectors(&engine).await;

	let black = ContentElement::image(RgbImage::from_pixel(4, 4, Rgb([0, 0, 0])));
	let results = engine
		.retrieve_by_content(
			SCHEMA,
			"averagecolor",
			vec![black, ContentElement::text("ignored")],
			&QueryContext::default().with_global("limit", "2"),
		)
		.await
		.unwrap();

	assert_eq!(
		results.iter().map(|r| r.id).collect::<Vec<_>>(),
		vec![ids[0], ids[1]]
	);
	assert_eq!(results[0].score(), Some(1.0));
	assert!(results.iter().all(|r| r.descriptors.is_empty()));

	let example = Descriptor::new(
		"AverageColor",
		DescriptorValue::Vector(FloatVector(vec![0.9, 0.0, 0.0])),
	);
	let results = engine
		.retrieve_by_descriptors(
			SCHEMA,
			"averagecolor",
			vec![example],
			&QueryContext::default()
				.with_global("limit", "1")
				.with_global("returnDescriptor", "true"),
		)
		.await
		.unwrap();

	assert_eq!(results.len(), 1);
	assert_eq!(results[0].id, ids[9]);
	assert_eq!(results[0].descriptors.len(), 1);
}

#[tokio::test]
#[traced_test]
async fn boolean_and_fulltext_on_metadata() {
	let engine = Engine::open(engine_config()).await.unwrap();
	let ids = three_files(&engine).await;

	let images = engine
		.retrieve(
			SCHEMA,
			"file",
			Query::Boolean(BooleanQuery {
				predicate: Predicate::and(vec![
					Predicate::simple(Some("path"), Comparison::like("%.png").unwrap()),
					Predicate::simple(Some("size"), Comparison::Greater(Value::Long(1_000))),
				]),
				limit: None,
			}),
			&QueryContext::default(),
		)
		.await
		.unwrap();
	assert_eq!(images.iter().map(|r| r.id).collect::<Vec<_>>(), vec![ids[1]]);
	assert_eq!(images[0].descriptors.len(), 1);

	let notes = engine
		.retrieve(
			SCHEMA,
			"file",
			Query::Fulltext(FulltextQuery::new("NOTES")),
			&QueryContext::default(),
		)
		.await
		.unwrap();
	assert_eq!(notes.len(), 1);
	assert_eq!(notes[0].id, ids[2]);
	assert_eq!(notes[0].score(), Some(1.0));
}

#[tokio::test]
#[traced_test]
async fn query_errors_carry_a_status() {
	let engine = Engine::open(engine_config()).await.unwrap();
	ten_vectors(&engine).await;

	let unknown = engine
		.retrieve(
			"lsc",
			"averagecolor",
			Query::Fulltext(FulltextQuery::new("red")),
			&QueryContext::default(),
		)
		.await
		.unwrap_err();
	assert_eq!(unknown.status().code, 404);

	let unsupported = engine
		.retrieve(
			SCHEMA,
			"averagecolor",
			Query::Fulltext(FulltextQuery::new("red")),
			&QueryContext::default(),
		)
		.await
		.unwrap_err();
	assert!(matches!(unsupported, Error::UnsupportedQuery { .. }));
	assert_eq!(unsupported.status().code, 400);

	let proximity = engine
		.retrieve(
			SCHEMA,
			"file",
			Query::Proximity(ProximityQuery::new(vec![0.0, 0.0, 0.0], 1)),
			&QueryContext::default(),
		)
		.await
		.unwrap_err();
	assert!(matches!(proximity, Error::UnsupportedQuery { .. }));

	let wrong_dimension = engine
		.retrieve(
			SCHEMA,
			"averagecolor",
			Query::Proximity(ProximityQuery::new(vec![0.0, 0.0], 1)),
			&QueryContext::default(),
		)
		.await
		.unwrap_err();
	assert!(matches!(
		wrong_dimension,
		Error::Flow(FlowError::Stage { stage, .. }) if stage == "averagecolor:retriever"
	));

	let bad_limit = engine
		.retrieve_by_content(
			SCHEMA,
			"averagecolor",
			vec![ContentElement::image(RgbImage::new(1, 1))],
			&QueryContext::default().with_global("limit", "many"),
		)
		.await
		.unwrap_err();
	assert_eq!(bad_limit.status().code, 400);
}

#[tokio::test]
#[traced_test]
async fn retriever_refuses_foreign_field() {
	let engine = Engine::open(engine_config()).await.unwrap();
	let schema = engine.schemas().require(SCHEMA).unwrap();

	assert!(matches!(
		FieldRetriever::new(
			schema.require_field("file").unwrap(),
			"AverageColor",
			Query::Proximity(ProximityQuery::new(vec![0.0, 0.0, 0.0], 1)),
			CorrespondenceFunction::default(),
		),
		Err(Error::AnalyserMismatch { field, found, .. }) if field == "file" && found == "FileMetadata"
	));
}

#[tokio::test]
#[traced_test]
async fn expander_follows_part_of_both_ways() {
	let engine = Engine::open(engine_config()).await.unwrap();
	let ids = three_files(&engine).await;
	let schema = engine.schemas().require(SCHEMA).unwrap();
	let retrievables = schema.retrievables();

	let video = Uuid::new_v4();
	retrievables
		.writer
		.add(Retrievable::new(video, "SOURCE:VIDEO"))
		.await
		.unwrap();
	retrievables
		.writer
		.connect_all(&[
			Relationship::by_id(ids[0], PART_OF, video),
			Relationship::by_id(ids[1], PART_OF, video),
		])
		.await
		.unwrap();

	let input = Values::new(
		"results",
		vec![
			Retrievable::new(video, "SOURCE:VIDEO"),
			Retrievable::new(ids[2], "SEGMENT"),
		],
	);
	let expanded: Vec<Retrievable> = Box::new(RelationExpander::new(
		"parts",
		Box::new(input),
		vec![PART_OF.to_string()],
		Vec::new(),
		retrievables.reader.clone(),
	))
	.into_flow(&ExecutionScope::new())
	.try_collect()
	.await
	.unwrap();

	assert_eq!(expanded.len(), 2);
	let mut parts = expanded[0].parts();
	parts.sort();
	let mut expected = vec![ids[0], ids[1]];
	expected.sort();
	assert_eq!(parts, expected);
	assert!(expanded[1].relationships.is_empty());

	// Outgoing edges point from the part to its whole.
	let input = Values::new("results", vec![Retrievable::new(ids[0], "SEGMENT")]);
	let expanded: Vec<Retrievable> = Box::new(RelationExpander::new(
		"whole",
		Box::new(input),
		Vec::new(),
		vec![PART_OF.to_string()],
		retrievables.reader.clone(),
	))
	.into_flow(&ExecutionScope::new())
	.try_collect()
	.await
	.unwrap();

	assert_eq!(expanded[0].part_of(), vec![video]);
	assert!(expanded[0].parts().is_empty());
}

#[tokio::test]
#[traced_test]
async fn lookup_attaches_descriptors_of_another_field() {
	let engine = Engine::open(engine_config()).await.unwrap();
	let ids = three_files(&engine).await;
	let schema = engine.schemas().require(SCHEMA).unwrap();

	let stranger = Uuid::new_v4();
	let input = Values::new(
		"results",
		vec![
			Retrievable::new(ids[1], "SEGMENT"),
			Retrievable::new(stranger, "SEGMENT"),
		],
	);
	let looked_up: Vec<Retrievable> = Box::new(FieldLookup::new(
		schema.require_field("file").unwrap(),
		Box::new(input),
		vec!["path".to_string(), "size".to_string()],
	))
	.into_flow(&ExecutionScope::new())
	.try_collect()
	.await
	.unwrap();

	assert_eq!(looked_up.len(), 2);

	let blue = &looked_up[0];
	assert_eq!(blue.id, ids[1]);
	assert_eq!(blue.descriptors.len(), 1);
	assert!(!blue.descriptors[0].is_transient());
	let properties = blue.properties();
	assert_eq!(properties.get("path").map(String::as_str), Some("/media/blue.png"));
	assert_eq!(properties.get("size").map(String::as_str), Some("4096"));

	assert_eq!(looked_up[1].id, stranger);
	assert!(looked_up[1].descriptors.is_empty());
	assert!(looked_up[1].properties().is_empty());
}
