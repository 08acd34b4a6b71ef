use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::context::Properties;

/// Properties handed to the stages of a pipeline; `local` is keyed by stage `type`.
pub type ContextConfig = Properties;

/// The stage tree of one indexing pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
	pub name: String,
	/// Name of the schema the pipeline indexes into.
	pub schema: String,
	#[serde(default)]
	pub context: ContextConfig,
	pub enumerator: EnumeratorConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumeratorConfig {
	#[serde(rename = "type")]
	pub kind: String,
	#[serde(default)]
	pub parameters: HashMap<String, String>,
	pub decoder: DecoderConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecoderConfig {
	#[serde(rename = "type")]
	pub kind: String,
	#[serde(default)]
	pub parameters: HashMap<String, String>,
	pub transformer: TransformerConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformerConfig {
	#[serde(rename = "type")]
	pub kind: String,
	#[serde(default)]
	pub parameters: HashMap<String, String>,
	#[serde(default)]
	pub segmenters: Vec<SegmenterConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmenterConfig {
	#[serde(rename = "type")]
	pub kind: String,
	#[serde(default)]
	pub parameters: HashMap<String, String>,
	#[serde(default)]
	pub extractors: Vec<ExtractorConfig>,
	#[serde(default)]
	pub exporters: Vec<ExporterConfig>,
}

/// An extractor node. `kind` names the analyser, which must be the one serving `field`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractorConfig {
	#[serde(rename = "type")]
	pub kind: String,
	pub field: String,
	#[serde(default)]
	pub parameters: HashMap<String, String>,
	/// Extractors chained downstream of this one.
	#[serde(default)]
	pub extractors: Vec<ExtractorConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExporterConfig {
	#[serde(rename = "type")]
	pub kind: String,
	#[serde(default)]
	pub parameters: HashMap<String, String>,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn nested_tree_from_json() {
		let config: PipelineConfig = serde_json::from_str(
			r#"{
				"name": "images",
				"schema": "vitrivr",
				"context": { "global": { "limit": "10" } },
				"enumerator": {
					"type": "FileSystemEnumerator",
					"parameters": { "path": "/media", "mediaTypes": "IMAGE" },
					"decoder": {
						"type": "ImageDecoder",
						"transformer": {
							"type": "PassThroughTransformer",
							"segmenters": [{
								"type": "PassThroughSegmenter",
								"extractors": [{
									"type": "AverageColor",
									"field": "averagecolor",
									"extractors": [{ "type": "FileMetadata", "field": "file" }]
								}],
								"exporters": [{ "type": "LogExporter" }]
							}]
						}
					}
				}
			}"#,
		)
		.unwrap();

		let segmenter = &config.enumerator.decoder.transformer.segmenters[0];
		assert_eq!(config.context.global["limit"], "10");
		assert_eq!(segmenter.extractors[0].field, "averagecolor");
		assert_eq!(segmenter.extractors[0].extractors[0].kind, "FileMetadata");
		assert_eq!(segmenter.exporters[0].kind, "LogExporter");
		assert!(config.enumerator.decoder.parameters.is_empty());
	}
}
