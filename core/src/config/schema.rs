use std::collections::HashMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaConfig {
	pub name: String,
	#[serde(default)]
	pub connection: ConnectionConfig,
	#[serde(default)]
	pub fields: Vec<FieldConfig>,
}

/// Storage backend of a schema; `database` names the connection provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionConfig {
	pub database: String,
	#[serde(default)]
	pub parameters: HashMap<String, String>,
}

impl Default for ConnectionConfig {
	fn default() -> Self {
		Self {
			database: "memory".to_string(),
			parameters: HashMap::new(),
		}
	}
}

/// A field and the analyser, named by `factory`, that serves it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldConfig {
	pub name: String,
	pub factory: String,
	#[serde(default)]
	pub parameters: HashMap<String, String>,
}

impl FieldConfig {
	pub fn new(name: impl Into<String>, factory: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			factory: factory.into(),
			parameters: HashMap::new(),
		}
	}
}

impl SchemaConfig {
	pub fn new(name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			connection: ConnectionConfig::default(),
			fields: Vec::new(),
		}
	}

	#[must_use]
	pub fn with_field(mut self, field: FieldConfig) -> Self {
		self.fields.push(field);
		self
	}
}
