use std::sync::Arc;

use image::RgbImage;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

use super::source::SourceRef;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
#[serde(rename_all = "UPPERCASE")]
pub enum ContentType {
	Image,
	Text,
}

/// Decoded payload of one modality. Never persisted, only the descriptors derived from it are.
#[derive(Debug, Clone)]
pub enum Content {
	Image(Arc<RgbImage>),
	Text(Arc<str>),
}

impl Content {
	#[must_use]
	pub const fn content_type(&self) -> ContentType {
		match self {
			Self::Image(_) => ContentType::Image,
			Self::Text(_) => ContentType::Text,
		}
	}
}

#[derive(Debug, Clone)]
pub struct ContentElement {
	id: Uuid,
	source: Option<SourceRef>,
	content: Content,
}

impl ContentElement {
	#[must_use]
	pub fn new(content: Content, source: Option<SourceRef>) -> Self {
		Self {
			id: Uuid::new_v4(),
			source,
			content,
		}
	}

	#[must_use]
	pub fn image(image: RgbImage) -> Self {
		Self::new(Content::Image(Arc::new(image)), None)
	}

	#[must_use]
	pub fn text(text: impl Into<Arc<str>>) -> Self {
		Self::new(Content::Text(text.into()), None)
	}

	#[must_use]
	pub const fn id(&self) -> Uuid {
		self.id
	}

	#[must_use]
	pub const fn source(&self) -> Option<&SourceRef> {
		self.source.as_ref()
	}

	#[must_use]
	pub const fn content(&self) -> &Content {
		&self.content
	}

	#[must_use]
	pub const fn content_type(&self) -> ContentType {
		self.content.content_type()
	}
}
