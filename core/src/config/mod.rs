//! Declarative configuration of schemas, pipelines and the engine, read from JSON or TOML.

use std::path::Path;

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tokio::fs;
use tracing::debug;

use crate::{error::FileIOError, logging::LogConfig, Error};

mod pipeline;
mod schema;

pub use pipeline::{
	ContextConfig, DecoderConfig, EnumeratorConfig, ExporterConfig, ExtractorConfig,
	PipelineConfig, SegmenterConfig, TransformerConfig,
};
pub use schema::{ConnectionConfig, FieldConfig, SchemaConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
	Json,
	Toml,
}

impl Format {
	fn of(path: &Path) -> Option<Self> {
		match path.extension()?.to_str()?.to_ascii_lowercase().as_str() {
			"json" => Some(Self::Json),
			"toml" => Some(Self::Toml),
			_ => None,
		}
	}
}

/// Parses `text` as a configuration of type `T`.
pub fn parse<T: DeserializeOwned>(text: &str, format: Format) -> Result<T, String> {
	match format {
		Format::Json => serde_json::from_str(text).map_err(|e| e.to_string()),
		Format::Toml => toml::from_str(text).map_err(|e| e.to_string()),
	}
}

/// Reads a configuration file, picking the format from its extension.
pub async fn load<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T, Error> {
	let path = path.as_ref();

	let format = Format::of(path).ok_or_else(|| Error::ConfigFile {
		path: path.into(),
		reason: "expected a .json or .toml file".to_string(),
	})?;

	let text = fs::read_to_string(path)
		.await
		.map_err(|e| FileIOError::from((path, e, "reading configuration")))?;

	debug!(path = %path.display(), ?format, "Parsing configuration;");
	parse(&text, format).map_err(|reason| Error::ConfigFile {
		path: path.into(),
		reason,
	})
}

/// Everything [`Engine::open`](crate::Engine::open) needs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
	/// Installs a global subscriber when set.
	pub log: Option<LogConfig>,
	pub schemas: Vec<SchemaConfig>,
}
