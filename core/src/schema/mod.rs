//! The schema metamodel: named fields bound to an analyser and to a storage backend.

use std::{collections::HashMap, fmt, sync::Arc};

use retina_flow::BoxOperator;
use tracing::{debug, instrument};

use crate::{
	config::SchemaConfig,
	context::{IndexContext, QueryContext},
	model::{ContentElement, Descriptor, IngestedRef, Retrievable},
	registry,
	retrieve::Query,
	storage::{
		Connection, DescriptorReader, DescriptorStorage, Initializer, RetrievableStorage, Writer,
	},
	Error,
};

mod analyser;
mod manager;

pub use analyser::Analyser;
pub use manager::SchemaManager;

/// One field of a [`Schema`], fixed once the schema is loaded.
pub struct Field {
	name: String,
	schema: String,
	analyser: Arc<dyn Analyser>,
	parameters: HashMap<String, String>,
	prototype: Descriptor,
	storage: DescriptorStorage,
}

impl fmt::Debug for Field {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Field")
			.field("name", &self.name)
			.field("schema", &self.schema)
			.field("analyser", &self.analyser.name())
			.field("parameters", &self.parameters)
			.finish_non_exhaustive()
	}
}

impl Field {
	#[must_use]
	pub fn name(&self) -> &str {
		&self.name
	}

	#[must_use]
	pub fn schema_name(&self) -> &str {
		&self.schema
	}

	#[must_use]
	pub const fn analyser(&self) -> &Arc<dyn Analyser> {
		&self.analyser
	}

	#[must_use]
	pub const fn parameters(&self) -> &HashMap<String, String> {
		&self.parameters
	}

	#[must_use]
	pub const fn prototype(&self) -> &Descriptor {
		&self.prototype
	}

	#[must_use]
	pub const fn reader(&self) -> &Arc<dyn DescriptorReader> {
		&self.storage.reader
	}

	#[must_use]
	pub const fn writer(&self) -> &Arc<dyn Writer<Descriptor>> {
		&self.storage.writer
	}

	#[must_use]
	pub const fn initializer(&self) -> &Arc<dyn Initializer> {
		&self.storage.initializer
	}

	/// Rejects extractors and retrievers of another analyser built for this field.
	pub fn ensure_analyser(&self, analyser: &str) -> Result<(), Error> {
		if self.analyser.name() == analyser {
			Ok(())
		} else {
			Err(Error::AnalyserMismatch {
				field: self.name.clone(),
				expected: analyser.to_string(),
				found: self.analyser.name().to_string(),
			})
		}
	}

	pub fn new_extractor(
		self: &Arc<Self>,
		input: BoxOperator<IngestedRef>,
		context: &IndexContext,
	) -> Result<BoxOperator<IngestedRef>, Error> {
		self.analyser
			.new_extractor(Arc::clone(self), input, context)
	}

	pub fn new_retriever_for_query(
		self: &Arc<Self>,
		query: Query,
		context: &QueryContext,
	) -> Result<BoxOperator<Retrievable>, Error> {
		self.analyser
			.new_retriever_for_query(Arc::clone(self), query, context)
	}

	pub fn new_retriever_for_content(
		self: &Arc<Self>,
		content: Vec<ContentElement>,
		context: &QueryContext,
	) -> Result<BoxOperator<Retrievable>, Error> {
		self.analyser
			.new_retriever_for_content(Arc::clone(self), content, context)
	}

	pub fn new_retriever_for_descriptors(
		self: &Arc<Self>,
		descriptors: Vec<Descriptor>,
		context: &QueryContext,
	) -> Result<BoxOperator<Retrievable>, Error> {
		self.analyser
			.new_retriever_for_descriptors(Arc::clone(self), descriptors, context)
	}
}

/// A named, ordered set of fields sharing one storage connection.
pub struct Schema {
	name: String,
	connection: Arc<dyn Connection>,
	retrievables: RetrievableStorage,
	fields: Vec<Arc<Field>>,
}

impl fmt::Debug for Schema {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Schema")
			.field("name", &self.name)
			.field("connection", &self.connection)
			.field("fields", &self.fields)
			.finish_non_exhaustive()
	}
}

impl Schema {
	/// Resolves connection and analysers and builds the fields `config` declares.
	#[instrument(skip_all, fields(schema = %config.name), err)]
	pub fn open(config: &SchemaConfig) -> Result<Self, Error> {
		let mut seen = Vec::with_capacity(config.fields.len());
		for field in &config.fields {
			if field.name.contains('.') {
				return Err(Error::InvalidFieldName(field.name.clone()));
			}
			if seen.contains(&field.name.as_str()) {
				return Err(Error::DuplicateField {
					schema: config.name.clone(),
					field: field.name.clone(),
				});
			}
			seen.push(field.name.as_str());
		}

		let connection = registry::open_connection(
			&config.connection.database,
			&config.name,
			&config.connection.parameters,
		)?;

		let fields = config
			.fields
			.iter()
			.map(|field| {
				let analyser = registry::analyser(&field.factory)?;
				let prototype = analyser.prototype();
				let storage = connection.descriptors(&field.name, &prototype, &field.parameters)?;
				debug!(field = %field.name, analyser = analyser.name(), "Field opened;");

				Ok(Arc::new(Field {
					name: field.name.clone(),
					schema: config.name.clone(),
					analyser,
					parameters: field.parameters.clone(),
					prototype,
					storage,
				}))
			})
			.collect::<Result<Vec<_>, Error>>()?;

		Ok(Self {
			name: config.name.clone(),
			retrievables: connection.retrievables(),
			connection,
			fields,
		})
	}

	#[must_use]
	pub fn name(&self) -> &str {
		&self.name
	}

	#[must_use]
	pub fn connection(&self) -> &Arc<dyn Connection> {
		&self.connection
	}

	#[must_use]
	pub const fn retrievables(&self) -> &RetrievableStorage {
		&self.retrievables
	}

	#[must_use]
	pub fn fields(&self) -> &[Arc<Field>] {
		&self.fields
	}

	#[must_use]
	pub fn field(&self, name: &str) -> Option<&Arc<Field>> {
		self.fields.iter().find(|field| field.name == name)
	}

	pub fn require_field(&self, name: &str) -> Result<&Arc<Field>, Error> {
		self.field(name).ok_or_else(|| Error::UnknownField {
			schema: self.name.clone(),
			field: name.to_string(),
		})
	}

	/// Creates the retrievable entity and one descriptor entity per field.
	#[instrument(skip_all, fields(schema = %self.name), err)]
	pub async fn initialize(&self) -> Result<(), Error> {
		self.retrievables.initializer.initialize().await?;
		for field in &self.fields {
			field.initializer().initialize().await?;
		}

		debug!(fields = self.fields.len(), "Schema initialized;");
		Ok(())
	}

	/// Empties every entity of the schema.
	#[instrument(skip_all, fields(schema = %self.name), err)]
	pub async fn truncate(&self) -> Result<(), Error> {
		for field in &self.fields {
			field.initializer().truncate().await?;
		}
		self.retrievables.initializer.truncate().await?;

		debug!("Schema truncated;");
		Ok(())
	}
}
