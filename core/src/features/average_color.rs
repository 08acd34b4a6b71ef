use std::sync::Arc;

use image::{Rgb, RgbImage};
use retina_flow::BoxOperator;
use tracing::debug;

use crate::{
	context::{IndexContext, QueryContext, DEFAULT_LIMIT, LIMIT, RETURN_DESCRIPTOR},
	ingest::{ExtractionKernel, Extractor},
	model::{
		Content, ContentElement, ContentType, Descriptor, DescriptorValue, FloatVector, Ingested,
		IngestedRef, Retrievable,
	},
	register_analyser,
	retrieve::{CorrespondenceFunction, FieldRetriever, ProximityQuery, Query},
	schema::{Analyser, Field},
	Error,
};

pub const NAME: &str = "AverageColor";

/// Largest euclidean distance between two colors normalised to the unit cube, rounded up.
pub const MAXIMUM_DISTANCE: f32 = 3.0;

/// Describes images by their mean color, as a normalised RGB vector.
#[derive(Debug, Default, Clone, Copy)]
pub struct AverageColor;

fn new() -> Arc<dyn Analyser> {
	Arc::new(AverageColor)
}

register_analyser!("AverageColor", new);

/// Mean of every pixel, each channel scaled to `[0, 1]`.
#[must_use]
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
pub fn average(image: &RgbImage) -> FloatVector {
	let pixels = u64::from(image.width()) * u64::from(image.height());
	if pixels == 0 {
		return FloatVector::zeros(3);
	}

	let mut sum = [0u64; 3];
	for Rgb(pixel) in image.pixels() {
		for (channel, value) in sum.iter_mut().zip(pixel) {
			*channel += u64::from(*value);
		}
	}

	FloatVector(
		sum.iter()
			.map(|channel| (*channel as f64 / pixels as f64 / 255.0) as f32)
			.collect(),
	)
}

struct Kernel;

impl ExtractionKernel for Kernel {
	fn extract(&self, _field: &Field, ingested: &Ingested) -> Result<Vec<Descriptor>, Error> {
		Ok(ingested
			.content()
			.iter()
			.filter_map(|element| match element.content() {
				Content::Image(image) => Some(Descriptor::new(
					NAME,
					DescriptorValue::Vector(average(image)),
				)),
				Content::Text(_) => None,
			})
			.collect())
	}
}

fn proximity(field: &Field, vector: FloatVector, context: &QueryContext) -> Result<Query, Error> {
	let parameters = context.parameters(field.name());
	let k = parameters.parse(LIMIT)?.unwrap_or(DEFAULT_LIMIT);
	let fetch_vector = parameters.parse(RETURN_DESCRIPTOR)?.unwrap_or(false);

	Ok(Query::Proximity(
		ProximityQuery::new(vector, k).fetch_vector(fetch_vector),
	))
}

fn retriever(field: &Arc<Field>, query: Query) -> Result<BoxOperator<Retrievable>, Error> {
	Ok(Box::new(FieldRetriever::new(
		field,
		NAME,
		query,
		CorrespondenceFunction::linear(MAXIMUM_DISTANCE)?,
	)?))
}

impl Analyser for AverageColor {
	fn name(&self) -> &'static str {
		NAME
	}

	fn content_types(&self) -> &'static [ContentType] {
		&[ContentType::Image]
	}

	fn prototype(&self) -> Descriptor {
		Descriptor::new(NAME, DescriptorValue::Vector(FloatVector::zeros(3)))
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
			Query::Proximity(_) => retriever(&field, query),
			other => Err(Error::UnsupportedQuery {
				field: field.name().to_string(),
				reason: format!("{NAME} only answers proximity queries, got {}", other.kind()),
			}),
		}
	}

	/// Queries with the mean of the average colors of all images in `content`.
	#[allow(clippy::cast_precision_loss)]
	fn new_retriever_for_content(
		&self,
		field: Arc<Field>,
		content: Vec<ContentElement>,
		context: &QueryContext,
	) -> Result<BoxOperator<Retrievable>, Error> {
		field.ensure_analyser(NAME)?;

		let colors = content
			.iter()
			.filter_map(|element| match element.content() {
				Content::Image(image) => Some(average(image)),
				Content::Text(_) => None,
			})
			.collect::<Vec<_>>();
		if colors.is_empty() {
			return Err(Error::UnsupportedQuery {
				field: field.name().to_string(),
				reason: "no image content to query with".to_string(),
			});
		}

		let mut mean = vec![0.0f32; 3];
		for color in &colors {
			for (sum, value) in mean.iter_mut().zip(color.as_slice()) {
				*sum += value;
			}
		}
		mean.iter_mut()
			.for_each(|sum| *sum /= colors.len() as f32);
		debug!(field = %field.name(), images = colors.len(), ?mean, "Querying by content;");

		let query = proximity(&field, FloatVector(mean), context)?;
		retriever(&field, query)
	}

	/// Queries with the first vector among `descriptors`.
	fn new_retriever_for_descriptors(
		&self,
		field: Arc<Field>,
		descriptors: Vec<Descriptor>,
		context: &QueryContext,
	) -> Result<BoxOperator<Retrievable>, Error> {
		field.ensure_analyser(NAME)?;

		let Some(vector) = descriptors.iter().find_map(Descriptor::vector) else {
			return Err(Error::UnsupportedQuery {
				field: field.name().to_string(),
				reason: "no vector descriptor to query with".to_string(),
			});
		};

		let query = proximity(&field, vector.clone(), context)?;
		retriever(&field, query)
	}
}
