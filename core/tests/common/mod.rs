#![allow(dead_code)]

use std::{collections::HashMap, io::Cursor, path::Path};

use image::{ImageOutputFormat, Rgb, RgbImage};
use retina_core::config::{
	DecoderConfig, EngineConfig, EnumeratorConfig, ExtractorConfig, FieldConfig, PipelineConfig,
	SchemaConfig, SegmenterConfig, TransformerConfig,
};
use tempfile::TempDir;

pub const SCHEMA: &str = "vitrivr";

pub const RED: [u8; 3] = [255, 0, 0];
pub const BLUE: [u8; 3] = [0, 0, 255];

pub fn png(color: [u8; 3]) -> Vec<u8> {
	let mut bytes = Cursor::new(Vec::new());
	RgbImage::from_pixel(8, 8, Rgb(color))
		.write_to(&mut bytes, ImageOutputFormat::Png)
		.unwrap();
	bytes.into_inner()
}

/// Two images and a text file, the images in a nested directory.
pub fn media() -> TempDir {
	let dir = tempfile::tempdir().unwrap();
	std::fs::create_dir(dir.path().join("images")).unwrap();
	std::fs::write(dir.path().join("images/red.png"), png(RED)).unwrap();
	std::fs::write(dir.path().join("images/blue.png"), png(BLUE)).unwrap();
	std::fs::write(dir.path().join("notes.txt"), "a short note about colors").unwrap();
	dir
}

pub fn schema_config(name: &str) -> SchemaConfig {
	SchemaConfig::new(name)
		.with_field(FieldConfig::new("averagecolor", "AverageColor"))
		.with_field(FieldConfig::new("file", "FileMetadata"))
}

pub fn engine_config() -> EngineConfig {
	EngineConfig {
		log: None,
		schemas: vec![schema_config(SCHEMA)],
	}
}

pub fn extractor(kind: &str, field: &str) -> ExtractorConfig {
	ExtractorConfig {
		kind: kind.to_string(),
		field: field.to_string(),
		parameters: HashMap::new(),
		extractors: Vec::new(),
	}
}

/// Filesystem enumeration of `root` down to a single segmenter feeding `extractors`.
pub fn pipeline_config(root: &Path, extractors: Vec<ExtractorConfig>) -> PipelineConfig {
	PipelineConfig {
		name: "ingest".to_string(),
		schema: SCHEMA.to_string(),
		context: Default::default(),
		enumerator: EnumeratorConfig {
			kind: "FileSystemEnumerator".to_string(),
			parameters: HashMap::from([("path".to_string(), root.display().to_string())]),
			decoder: DecoderConfig {
				kind: "ContentDecoder".to_string(),
				parameters: HashMap::new(),
				transformer: TransformerConfig {
					kind: "PassThroughTransformer".to_string(),
					parameters: HashMap::new(),
					segmenters: vec![SegmenterConfig {
						kind: "PassThroughSegmenter".to_string(),
						parameters: HashMap::new(),
						extractors,
						exporters: Vec::new(),
					}],
				},
			},
		},
	}
}
