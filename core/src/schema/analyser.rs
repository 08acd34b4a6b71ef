use std::sync::Arc;

use retina_flow::BoxOperator;

use crate::{
	context::{IndexContext, QueryContext},
	model::{ContentElement, ContentType, Descriptor, IngestedRef, Retrievable},
	retrieve::Query,
	Error,
};

use super::Field;

/// The capability set behind a field: describing content and querying what was described.
///
/// Analysers are plugged in by name through [`register_analyser!`](crate::register_analyser).
/// Every constructor receives the field it builds for and must refuse fields bound to another
/// analyser.
pub trait Analyser: Send + Sync + 'static {
	fn name(&self) -> &'static str;

	/// Content this analyser knows how to describe.
	fn content_types(&self) -> &'static [ContentType];

	/// Zero-valued descriptor, used only to introspect the attribute schema.
	fn prototype(&self) -> Descriptor;

	fn new_extractor(
		&self,
		field: Arc<Field>,
		input: BoxOperator<IngestedRef>,
		context: &IndexContext,
	) -> Result<BoxOperator<IngestedRef>, Error>;

	fn new_retriever_for_query(
		&self,
		field: Arc<Field>,
		query: Query,
		context: &QueryContext,
	) -> Result<BoxOperator<Retrievable>, Error>;

	/// Builds a retriever looking for stored descriptors similar to `content`.
	fn new_retriever_for_content(
		&self,
		field: Arc<Field>,
		content: Vec<ContentElement>,
		context: &QueryContext,
	) -> Result<BoxOperator<Retrievable>, Error> {
		let _ = (content, context);
		Err(Error::UnsupportedQuery {
			field: field.name().to_string(),
			reason: format!("{} cannot query by content", self.name()),
		})
	}

	/// Builds a retriever looking for stored descriptors similar to `descriptors`.
	fn new_retriever_for_descriptors(
		&self,
		field: Arc<Field>,
		descriptors: Vec<Descriptor>,
		context: &QueryContext,
	) -> Result<BoxOperator<Retrievable>, Error> {
		let _ = (descriptors, context);
		Err(Error::UnsupportedQuery {
			field: field.name().to_string(),
			reason: format!("{} cannot query by example descriptors", self.name()),
		})
	}
}
