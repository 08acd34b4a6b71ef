use std::{cmp::Ordering, sync::Arc};

use futures::TryStreamExt;
use retina_flow::{BoxOperator, ExecutionScope};
use tracing::{debug, info, instrument};

use crate::{
	config::{EngineConfig, PipelineConfig, SchemaConfig},
	context::{IndexContext, QueryContext},
	ingest::{Pipeline, PipelineBuilder},
	logging::init_logging,
	model::{ContentElement, Descriptor, Retrievable},
	retrieve::Query,
	schema::{Schema, SchemaManager},
	Error,
};

/// Entry point for embedding retina: owns the loaded schemas and runs pipelines and queries
/// against them.
#[derive(Debug, Default)]
pub struct Engine {
	schemas: SchemaManager,
}

impl Engine {
	/// Installs logging if configured, then loads and initializes every schema of `config`.
	pub async fn open(config: EngineConfig) -> Result<Self, Error> {
		if let Some(log) = &config.log {
			init_logging(log)?;
		}

		let engine = Self::default();
		for schema in &config.schemas {
			engine.load_schema(schema).await?;
		}

		info!(schemas = config.schemas.len(), "Engine started;");

		Ok(engine)
	}

	#[must_use]
	pub const fn schemas(&self) -> &SchemaManager {
		&self.schemas
	}

	/// Loads `config` and creates the entities of the new schema.
	pub async fn load_schema(&self, config: &SchemaConfig) -> Result<Arc<Schema>, Error> {
		let schema = self.schemas.load(config)?;
		schema.initialize().await?;
		Ok(schema)
	}

	/// A builder for pipelines over schema `name`, for callers that need to adjust the context
	/// or the stage registry.
	pub fn pipeline_builder(&self, name: &str) -> Result<PipelineBuilder, Error> {
		Ok(PipelineBuilder::new(IndexContext::new(
			self.schemas.require(name)?,
		)))
	}

	pub fn build_pipeline(&self, config: &PipelineConfig) -> Result<Pipeline, Error> {
		self.pipeline_builder(&config.schema)?.build(config)
	}

	/// Executes `query` against `field` of `schema`, best scored results first.
	#[instrument(skip(self, query, context), fields(query = query.kind()), err)]
	pub async fn retrieve(
		&self,
		schema: &str,
		field: &str,
		query: Query,
		context: &QueryContext,
	) -> Result<Vec<Retrievable>, Error> {
		let schema = self.schemas.require(schema)?;
		let retriever = schema
			.require_field(field)?
			.new_retriever_for_query(query, context)?;

		run(retriever).await
	}

	/// Looks up stored retrievables similar to `content`.
	#[instrument(skip(self, content, context), fields(elements = content.len()), err)]
	pub async fn retrieve_by_content(
		&self,
		schema: &str,
		field: &str,
		content: Vec<ContentElement>,
		context: &QueryContext,
	) -> Result<Vec<Retrievable>, Error> {
		let schema = self.schemas.require(schema)?;
		let retriever = schema
			.require_field(field)?
			.new_retriever_for_content(content, context)?;

		run(retriever).await
	}

	/// Looks up stored retrievables similar to `descriptors`.
	#[instrument(skip(self, descriptors, context), fields(descriptors = descriptors.len()), err)]
	pub async fn retrieve_by_descriptors(
		&self,
		schema: &str,
		field: &str,
		descriptors: Vec<Descriptor>,
		context: &QueryContext,
	) -> Result<Vec<Retrievable>, Error> {
		let schema = self.schemas.require(schema)?;
		let retriever = schema
			.require_field(field)?
			.new_retriever_for_descriptors(descriptors, context)?;

		run(retriever).await
	}
}

async fn run(retriever: BoxOperator<Retrievable>) -> Result<Vec<Retrievable>, Error> {
	let scope = ExecutionScope::new();
	let _guard = scope.drop_guard();

	let mut results = retriever.into_flow(&scope).try_collect::<Vec<_>>().await?;
	results.sort_by(|a, b| by_score(b, a));
	debug!(results = results.len(), "Retrieval finished;");

	Ok(results)
}

/// Unscored results rank below every scored one.
fn by_score(a: &Retrievable, b: &Retrievable) -> Ordering {
	match (a.score(), b.score()) {
		(Some(a), Some(b)) => a.total_cmp(&b),
		(Some(_), None) => Ordering::Greater,
		(None, Some(_)) => Ordering::Less,
		(None, None) => Ordering::Equal,
	}
}
