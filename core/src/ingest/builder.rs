use std::{
	sync::Arc,
	time::{Duration, Instant},
};

use futures_concurrency::future::Join;
use retina_flow::{Broadcast, BoxOperator, DefaultSink, ExecutionScope, FlowError, Sink, SinkReport};
use tracing::{debug, info, instrument};

use crate::{
	config::{ExtractorConfig, PipelineConfig, SegmenterConfig},
	context::IndexContext,
	model::{ContentElement, IngestedRef},
	registry::{StageRegistry, ANALYSERS},
	schema::Schema,
	Error,
};

use super::persist::PersistRetrievable;

/// A terminal operator of a built pipeline, along with the stage types leading up to it.
pub struct Leaf {
	lineage: Vec<String>,
	operator: BoxOperator<IngestedRef>,
}

impl Leaf {
	#[must_use]
	pub fn lineage(&self) -> &[String] {
		&self.lineage
	}

	#[must_use]
	pub fn operator(&self) -> &BoxOperator<IngestedRef> {
		&self.operator
	}
}

/// A fully wired, not yet started indexing graph.
///
/// Executing consumes the pipeline; build a new one from the same configuration to run again.
pub struct Pipeline {
	name: String,
	leaves: Vec<Leaf>,
}

impl Pipeline {
	#[must_use]
	pub fn name(&self) -> &str {
		&self.name
	}

	#[must_use]
	pub fn leaves(&self) -> &[Leaf] {
		&self.leaves
	}

	/// Drives every leaf to completion concurrently, each through its own sink.
	///
	/// The first failing leaf cancels the others, its error is the one returned.
	#[instrument(skip_all, fields(pipeline = %self.name, leaves = self.leaves.len()), err)]
	pub async fn execute(self, scope: &ExecutionScope) -> Result<Vec<SinkReport>, Error> {
		let scope = scope.child();
		let started = Instant::now();
		info!("Pipeline started;");

		let results = self
			.leaves
			.into_iter()
			.map(|Leaf { lineage, operator }| {
				let scope = scope.clone();
				async move {
					let sink = DefaultSink::new(lineage.join(">"), operator)
						.stop_when(|ingested| ingested.is_terminal());
					let result = Box::new(sink).drain(&scope).await;
					if result.is_err() {
						scope.cancel();
					}
					result
				}
			})
			.collect::<Vec<_>>()
			.join()
			.await;

		let mut reports = Vec::with_capacity(results.len());
		let mut failure: Option<FlowError> = None;
		for result in results {
			match result {
				Ok(report) => reports.push(report),
				// Siblings of the failing leaf only report the cancellation it caused.
				Err(e) if failure.as_ref().map_or(true, FlowError::is_cancelled) => failure = Some(e),
				Err(_) => {}
			}
		}
		if let Some(e) = failure {
			return Err(e.into());
		}

		info!(
			passed = reports.iter().map(|report| report.passed).sum::<u64>(),
			elapsed = ?started.elapsed(),
			"Pipeline finished;"
		);

		Ok(reports)
	}

	/// Like [`Pipeline::execute`], cancelling the execution once `deadline` elapses.
	pub async fn execute_with_timeout(
		self,
		scope: &ExecutionScope,
		deadline: Duration,
	) -> Result<Vec<SinkReport>, Error> {
		let scope = scope.child();
		let started = Instant::now();
		let timer = scope.cancel_after(deadline);

		let result = self.execute(&scope).await;
		timer.abort();

		match result {
			Err(Error::Flow(e)) if e.is_cancelled() && started.elapsed() >= deadline => {
				Err(FlowError::TimedOut(deadline).into())
			}
			other => other,
		}
	}
}

/// Turns a [`PipelineConfig`] into a [`Pipeline`], resolving every stage before anything runs.
pub struct PipelineBuilder {
	registry: StageRegistry,
	context: IndexContext,
}

impl PipelineBuilder {
	#[must_use]
	pub fn new(context: IndexContext) -> Self {
		Self {
			registry: StageRegistry::default(),
			context,
		}
	}

	#[must_use]
	pub fn with_registry(mut self, registry: StageRegistry) -> Self {
		self.registry = registry;
		self
	}

	#[must_use]
	pub fn schema(&self) -> &Arc<Schema> {
		self.context.schema()
	}

	#[instrument(skip_all, fields(pipeline = %config.name, schema = %config.schema), err)]
	pub fn build(&self, config: &PipelineConfig) -> Result<Pipeline, Error> {
		if config.schema != self.schema().name() {
			return Err(Error::SchemaMismatch {
				pipeline: config.name.clone(),
				expected: config.schema.clone(),
				found: self.schema().name().to_string(),
			});
		}

		let mut context = self.context.clone();
		let properties = context.properties_mut();
		properties.global.extend(config.context.global.clone());
		for (operator, values) in &config.context.local {
			properties.set_local(operator.clone(), values.clone());
		}

		let enumerator = &config.enumerator;
		let decoder = &enumerator.decoder;
		let transformer = &decoder.transformer;

		let sources = self.registry.enumerator(&enumerator.kind)?(
			&context.parameters(&enumerator.kind).overlay(&enumerator.parameters),
			&context,
		)?;
		let content = self.registry.decoder(&decoder.kind)?(
			sources,
			&context.parameters(&decoder.kind).overlay(&decoder.parameters),
			&context,
		)?;
		let content = self.registry.transformer(&transformer.kind)?(
			content,
			&context.parameters(&transformer.kind).overlay(&transformer.parameters),
			&context,
		)?;

		let lineage = vec![
			enumerator.kind.clone(),
			decoder.kind.clone(),
			transformer.kind.clone(),
		];
		let mut leaves = Vec::new();
		for (segmenter, input) in transformer
			.segmenters
			.iter()
			.zip(fan_out(content, transformer.segmenters.len()))
		{
			self.segmenter(segmenter, input, &lineage, &context, &mut leaves)?;
		}

		debug!(leaves = leaves.len(), "Pipeline built;");

		Ok(Pipeline {
			name: config.name.clone(),
			leaves,
		})
	}

	fn segmenter(
		&self,
		config: &SegmenterConfig,
		input: BoxOperator<ContentElement>,
		lineage: &[String],
		context: &IndexContext,
		leaves: &mut Vec<Leaf>,
	) -> Result<(), Error> {
		let segments = self.registry.segmenter(&config.kind)?(
			input,
			&context.parameters(&config.kind).overlay(&config.parameters),
			context,
		)?;
		let segments: BoxOperator<IngestedRef> = Box::new(PersistRetrievable::new(
			Arc::clone(&self.schema().retrievables().writer),
			segments,
		));

		let mut lineage = lineage.to_vec();
		lineage.push(config.kind.clone());
		let consumers = config.extractors.len() + config.exporters.len();
		if consumers == 0 {
			leaves.push(Leaf {
				lineage,
				operator: segments,
			});
			return Ok(());
		}

		let mut inputs = fan_out(segments, consumers).into_iter();
		for (extractor, input) in config.extractors.iter().zip(inputs.by_ref()) {
			self.extractor(extractor, input, &lineage, context, leaves)?;
		}
		for (exporter, input) in config.exporters.iter().zip(inputs) {
			let operator = self.registry.exporter(&exporter.kind)?(
				input,
				&context.parameters(&exporter.kind).overlay(&exporter.parameters),
				context,
			)?;
			let mut lineage = lineage.clone();
			lineage.push(exporter.kind.clone());
			leaves.push(Leaf { lineage, operator });
		}

		Ok(())
	}

	fn extractor(
		&self,
		config: &ExtractorConfig,
		input: BoxOperator<IngestedRef>,
		lineage: &[String],
		context: &IndexContext,
		leaves: &mut Vec<Leaf>,
	) -> Result<(), Error> {
		if !ANALYSERS.contains_key(config.kind.as_str()) {
			return Err(Error::UnknownAnalyser(config.kind.clone()));
		}
		let field = self.schema().require_field(&config.field)?;
		field.ensure_analyser(&config.kind)?;

		let mut context = context.clone();
		context
			.properties_mut()
			.set_local(field.name(), config.parameters.clone());
		let described = field.new_extractor(input, &context)?;

		let mut lineage = lineage.to_vec();
		lineage.push(config.kind.clone());
		if config.extractors.is_empty() {
			leaves.push(Leaf {
				lineage,
				operator: described,
			});
			return Ok(());
		}

		for (child, input) in config
			.extractors
			.iter()
			.zip(fan_out(described, config.extractors.len()))
		{
			self.extractor(child, input, &lineage, &context, leaves)?;
		}

		Ok(())
	}
}

/// Hands `upstream` to `consumers` downstream chains, through a broadcast if there's more than one.
fn fan_out<T: Clone + Send + Sync + 'static>(
	upstream: BoxOperator<T>,
	consumers: usize,
) -> Vec<BoxOperator<T>> {
	if consumers <= 1 {
		return vec![upstream];
	}

	let broadcast = Broadcast::new(upstream);
	(0..consumers)
		.map(|_| Box::new(broadcast.subscribe()) as BoxOperator<T>)
		.collect()
}
