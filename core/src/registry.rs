//! Process-wide, self-registering tables of stage factories, analysers and connection providers.
//!
//! Built-in implementations submit themselves through [`register_stage!`], [`register_analyser!`]
//! and [`register_connection!`]. The tables are assembled from those submissions on first access
//! and never written again, so concurrent readers always observe a complete table.
//!
//! ```ignore
//! fn new_logger(
//! 	input: BoxOperator<IngestedRef>,
//! 	parameters: &Parameters,
//! 	context: &IndexContext,
//! ) -> Result<BoxOperator<IngestedRef>, Error> {
//! 	/* ... */
//! }
//! register_stage!("LogExporter", Exporter, new_logger);
//! ```

use std::{collections::HashMap, sync::Arc};

use once_cell::sync::Lazy;
use retina_flow::BoxOperator;
use strum::{Display, EnumString};

use crate::{
	context::{IndexContext, Parameters},
	model::{ContentElement, IngestedRef, SourceRef},
	schema::Analyser,
	storage::Connection,
	Error,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum StageKind {
	Enumerator,
	Decoder,
	Transformer,
	Segmenter,
	Exporter,
}

pub type EnumeratorFactory =
	fn(&Parameters, &IndexContext) -> Result<BoxOperator<SourceRef>, Error>;

pub type DecoderFactory = fn(
	BoxOperator<SourceRef>,
	&Parameters,
	&IndexContext,
) -> Result<BoxOperator<ContentElement>, Error>;

pub type TransformerFactory = fn(
	BoxOperator<ContentElement>,
	&Parameters,
	&IndexContext,
) -> Result<BoxOperator<ContentElement>, Error>;

pub type SegmenterFactory = fn(
	BoxOperator<ContentElement>,
	&Parameters,
	&IndexContext,
) -> Result<BoxOperator<IngestedRef>, Error>;

pub type ExporterFactory = fn(
	BoxOperator<IngestedRef>,
	&Parameters,
	&IndexContext,
) -> Result<BoxOperator<IngestedRef>, Error>;

/// A stage constructor, tagged by the position it takes in a pipeline.
#[derive(Clone, Copy)]
pub enum StageFactory {
	Enumerator(EnumeratorFactory),
	Decoder(DecoderFactory),
	Transformer(TransformerFactory),
	Segmenter(SegmenterFactory),
	Exporter(ExporterFactory),
}

impl StageFactory {
	#[must_use]
	pub const fn kind(&self) -> StageKind {
		match self {
			Self::Enumerator(_) => StageKind::Enumerator,
			Self::Decoder(_) => StageKind::Decoder,
			Self::Transformer(_) => StageKind::Transformer,
			Self::Segmenter(_) => StageKind::Segmenter,
			Self::Exporter(_) => StageKind::Exporter,
		}
	}
}

pub struct StageEntry {
	pub name: &'static str,
	pub factory: StageFactory,
}

pub type AnalyserConstructor = fn() -> Arc<dyn Analyser>;

pub struct AnalyserEntry {
	pub name: &'static str,
	pub constructor: AnalyserConstructor,
}

/// Opens a connection for `schema` from the provider-specific parameters.
pub type ConnectionOpener =
	fn(&str, &HashMap<String, String>) -> Result<Arc<dyn Connection>, Error>;

pub struct ConnectionEntry {
	pub provider: &'static str,
	pub open: ConnectionOpener,
}

inventory::collect!(StageEntry);
inventory::collect!(AnalyserEntry);
inventory::collect!(ConnectionEntry);

pub static STAGES: Lazy<HashMap<&'static str, StageFactory>> = Lazy::new(|| {
	let mut map = HashMap::new();
	for entry in inventory::iter::<StageEntry>() {
		map.insert(entry.name, entry.factory);
	}
	map
});

pub static ANALYSERS: Lazy<HashMap<&'static str, AnalyserConstructor>> = Lazy::new(|| {
	let mut map = HashMap::new();
	for entry in inventory::iter::<AnalyserEntry>() {
		map.insert(entry.name, entry.constructor);
	}
	map
});

pub static CONNECTIONS: Lazy<HashMap<&'static str, ConnectionOpener>> = Lazy::new(|| {
	let mut map = HashMap::new();
	for entry in inventory::iter::<ConnectionEntry>() {
		map.insert(entry.provider, entry.open);
	}
	map
});

pub fn analyser(name: &str) -> Result<Arc<dyn Analyser>, Error> {
	ANALYSERS
		.get(name)
		.map(|constructor| constructor())
		.ok_or_else(|| Error::UnknownAnalyser(name.to_string()))
}

pub fn open_connection(
	provider: &str,
	schema: &str,
	parameters: &HashMap<String, String>,
) -> Result<Arc<dyn Connection>, Error> {
	let open = CONNECTIONS
		.get(provider)
		.ok_or_else(|| Error::UnknownConnection(provider.to_string()))?;

	open(schema, parameters)
}

/// Stage factories visible to one pipeline builder.
///
/// Starts out as a copy of the global table; tests add their own stages with
/// [`StageRegistry::with_stage`] without touching process-wide state.
#[derive(Clone)]
pub struct StageRegistry {
	stages: HashMap<String, StageFactory>,
}

impl Default for StageRegistry {
	fn default() -> Self {
		Self {
			stages: STAGES
				.iter()
				.map(|(name, factory)| ((*name).to_string(), *factory))
				.collect(),
		}
	}
}

impl StageRegistry {
	#[must_use]
	pub fn with_stage(mut self, name: impl Into<String>, factory: StageFactory) -> Self {
		self.stages.insert(name.into(), factory);
		self
	}

	pub fn get(&self, name: &str, kind: StageKind) -> Result<StageFactory, Error> {
		let factory = self.stages.get(name).ok_or_else(|| Error::UnknownStage {
			kind,
			name: name.to_string(),
		})?;

		if factory.kind() != kind {
			return Err(Error::StageKindMismatch {
				name: name.to_string(),
				expected: kind,
				found: factory.kind(),
			});
		}

		Ok(*factory)
	}

	pub fn names(&self) -> impl Iterator<Item = &str> {
		self.stages.keys().map(String::as_str)
	}

	pub fn enumerator(&self, name: &str) -> Result<EnumeratorFactory, Error> {
		match self.get(name, StageKind::Enumerator)? {
			StageFactory::Enumerator(factory) => Ok(factory),
			other => Err(mismatch(name, StageKind::Enumerator, other)),
		}
	}

	pub fn decoder(&self, name: &str) -> Result<DecoderFactory, Error> {
		match self.get(name, StageKind::Decoder)? {
			StageFactory::Decoder(factory) => Ok(factory),
			other => Err(mismatch(name, StageKind::Decoder, other)),
		}
	}

	pub fn transformer(&self, name: &str) -> Result<TransformerFactory, Error> {
		match self.get(name, StageKind::Transformer)? {
			StageFactory::Transformer(factory) => Ok(factory),
			other => Err(mismatch(name, StageKind::Transformer, other)),
		}
	}

	pub fn segmenter(&self, name: &str) -> Result<SegmenterFactory, Error> {
		match self.get(name, StageKind::Segmenter)? {
			StageFactory::Segmenter(factory) => Ok(factory),
			other => Err(mismatch(name, StageKind::Segmenter, other)),
		}
	}

	pub fn exporter(&self, name: &str) -> Result<ExporterFactory, Error> {
		match self.get(name, StageKind::Exporter)? {
			StageFactory::Exporter(factory) => Ok(factory),
			other => Err(mismatch(name, StageKind::Exporter, other)),
		}
	}
}

fn mismatch(name: &str, expected: StageKind, found: StageFactory) -> Error {
	Error::StageKindMismatch {
		name: name.to_string(),
		expected,
		found: found.kind(),
	}
}

/// Registers a stage factory under a `type` name usable from pipeline configurations.
#[macro_export]
macro_rules! register_stage {
	($name:literal, $kind:ident, $factory:path) => {
		$crate::inventory::submit! {
			$crate::registry::StageEntry {
				name: $name,
				factory: $crate::registry::StageFactory::$kind($factory),
			}
		}
	};
}

/// Registers an analyser under the name schema fields refer to it by.
#[macro_export]
macro_rules! register_analyser {
	($name:literal, $constructor:path) => {
		$crate::inventory::submit! {
			$crate::registry::AnalyserEntry { name: $name, constructor: $constructor }
		}
	};
}

/// Registers a storage provider under the `database` name of a schema's connection.
#[macro_export]
macro_rules! register_connection {
	($provider:literal, $open:path) => {
		$crate::inventory::submit! {
			$crate::registry::ConnectionEntry { provider: $provider, open: $open }
		}
	};
}
