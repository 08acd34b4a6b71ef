use std::{collections::HashMap, fmt::Display, str::FromStr, sync::Arc};

use serde::{Deserialize, Serialize};

use crate::{model::SourceRef, schema::Schema, Error};

/// Global properties plus per-operator local overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Properties {
	pub global: HashMap<String, String>,
	pub local: HashMap<String, HashMap<String, String>>,
}

impl Properties {
	/// Looks `key` up for `operator`; a local value shadows the global one.
	#[must_use]
	pub fn get(&self, operator: &str, key: &str) -> Option<&str> {
		self.local
			.get(operator)
			.and_then(|local| local.get(key))
			.or_else(|| self.global.get(key))
			.map(String::as_str)
	}

	pub fn set_local(&mut self, operator: impl Into<String>, values: HashMap<String, String>) {
		self.local.entry(operator.into()).or_default().extend(values);
	}

	/// All properties visible to `operator`, flattened.
	#[must_use]
	pub fn parameters(&self, operator: &str) -> Parameters {
		let mut values = self.global.clone();
		if let Some(local) = self.local.get(operator) {
			values.extend(local.iter().map(|(k, v)| (k.clone(), v.clone())));
		}

		Parameters::new(operator, values)
	}
}

/// Flattened string parameters of a single stage, with typed accessors.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Parameters {
	stage: String,
	values: HashMap<String, String>,
}

impl Parameters {
	pub fn new(stage: impl Into<String>, values: HashMap<String, String>) -> Self {
		Self {
			stage: stage.into(),
			values,
		}
	}

	#[must_use]
	pub fn stage(&self) -> &str {
		&self.stage
	}

	#[must_use]
	pub fn get(&self, key: &str) -> Option<&str> {
		self.values.get(key).map(String::as_str)
	}

	pub fn require(&self, key: &str) -> Result<&str, Error> {
		self.get(key).ok_or_else(|| Error::MissingParameter {
			stage: self.stage.clone(),
			key: key.to_string(),
		})
	}

	pub fn parse<T>(&self, key: &str) -> Result<Option<T>, Error>
	where
		T: FromStr,
		T::Err: Display,
	{
		self.get(key)
			.map(|value| {
				value.trim().parse().map_err(|e: T::Err| Error::InvalidParameter {
					stage: self.stage.clone(),
					key: key.to_string(),
					value: value.to_string(),
					reason: e.to_string(),
				})
			})
			.transpose()
	}

	/// Values of `other` replace the ones in `self`.
	#[must_use]
	pub fn overlay(mut self, other: &HashMap<String, String>) -> Self {
		self.values
			.extend(other.iter().map(|(k, v)| (k.clone(), v.clone())));
		self
	}

	#[must_use]
	pub const fn values(&self) -> &HashMap<String, String> {
		&self.values
	}
}

/// Everything an indexing stage gets to see while it is constructed.
#[derive(Debug, Clone)]
pub struct IndexContext {
	schema: Arc<Schema>,
	properties: Properties,
	sources: Vec<SourceRef>,
}

impl IndexContext {
	#[must_use]
	pub fn new(schema: Arc<Schema>) -> Self {
		Self {
			schema,
			properties: Properties::default(),
			sources: Vec::new(),
		}
	}

	#[must_use]
	pub fn with_properties(mut self, properties: Properties) -> Self {
		self.properties = properties;
		self
	}

	/// Sources handed to list enumerators instead of being discovered.
	#[must_use]
	pub fn with_sources(mut self, sources: Vec<SourceRef>) -> Self {
		self.sources = sources;
		self
	}

	#[must_use]
	pub const fn schema(&self) -> &Arc<Schema> {
		&self.schema
	}

	#[must_use]
	pub const fn properties(&self) -> &Properties {
		&self.properties
	}

	pub fn properties_mut(&mut self) -> &mut Properties {
		&mut self.properties
	}

	#[must_use]
	pub fn sources(&self) -> &[SourceRef] {
		&self.sources
	}

	#[must_use]
	pub fn parameters(&self, stage: &str) -> Parameters {
		self.properties.parameters(stage)
	}
}

pub const LIMIT: &str = "limit";
pub const RETURN_DESCRIPTOR: &str = "returnDescriptor";
pub const DEFAULT_LIMIT: usize = 1000;

/// Properties of a single query execution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryContext {
	pub properties: Properties,
}

impl QueryContext {
	#[must_use]
	pub fn new(properties: Properties) -> Self {
		Self { properties }
	}

	#[must_use]
	pub fn with_global(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.properties.global.insert(key.into(), value.into());
		self
	}

	#[must_use]
	pub fn get(&self, operator: &str, key: &str) -> Option<&str> {
		self.properties.get(operator, key)
	}

	#[must_use]
	pub fn parameters(&self, operator: &str) -> Parameters {
		self.properties.parameters(operator)
	}
}
