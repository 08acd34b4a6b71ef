use std::{collections::HashMap, sync::Arc};

use parking_lot::RwLock;
use tracing::info;

use crate::{config::SchemaConfig, Error};

use super::Schema;

/// Registry of the loaded schemas, by name.
///
/// Written while schemas load at startup, read by every pipeline and query afterwards.
#[derive(Debug, Default)]
pub struct SchemaManager {
	schemas: RwLock<HashMap<String, Arc<Schema>>>,
}

impl SchemaManager {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	/// Builds the schema `config` describes and publishes it under its name.
	pub fn load(&self, config: &SchemaConfig) -> Result<Arc<Schema>, Error> {
		if self.schemas.read().contains_key(&config.name) {
			return Err(Error::DuplicateSchema(config.name.clone()));
		}

		let schema = Arc::new(Schema::open(config)?);

		let mut schemas = self.schemas.write();
		if schemas.contains_key(&config.name) {
			return Err(Error::DuplicateSchema(config.name.clone()));
		}
		schemas.insert(config.name.clone(), Arc::clone(&schema));

		info!(
			schema = %config.name,
			fields = schema.fields().len(),
			provider = schema.connection().provider(),
			"Schema loaded;"
		);

		Ok(schema)
	}

	#[must_use]
	pub fn get(&self, name: &str) -> Option<Arc<Schema>> {
		self.schemas.read().get(name).cloned()
	}

	pub fn require(&self, name: &str) -> Result<Arc<Schema>, Error> {
		self.get(name)
			.ok_or_else(|| Error::UnknownSchema(name.to_string()))
	}

	/// All loaded schemas, ordered by name.
	#[must_use]
	pub fn list(&self) -> Vec<Arc<Schema>> {
		let mut schemas = self.schemas.read().values().cloned().collect::<Vec<_>>();
		schemas.sort_by(|a, b| a.name().cmp(b.name()));
		schemas
	}
}
