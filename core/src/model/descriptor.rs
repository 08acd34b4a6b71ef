use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Error;

use super::{
	retrievable::RetrievableId,
	value::{FloatVector, Value, ValueType},
};

pub type DescriptorId = Uuid;

/// Name, type and nullability of one descriptor attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeSchema {
	pub name: String,
	pub kind: ValueType,
	pub nullable: bool,
}

impl AttributeSchema {
	pub fn new(name: impl Into<String>, kind: ValueType, nullable: bool) -> Self {
		Self {
			name: name.into(),
			kind,
			nullable,
		}
	}
}

/// One named attribute of a struct descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructAttribute {
	pub schema: AttributeSchema,
	pub value: Option<Value>,
}

/// Payload of a [`Descriptor`], tagged by capability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DescriptorValue {
	Scalar(Value),
	Vector(FloatVector),
	Struct(Vec<StructAttribute>),
}

/// Whether a descriptor is backed by a storage entry.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Persistence {
	#[default]
	Unbound,
	Bound { field: String },
}

/// A typed feature describing exactly one retrievable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Descriptor {
	id: DescriptorId,
	retrievable_id: Option<RetrievableId>,
	describer: String,
	#[serde(skip)]
	persistence: Persistence,
	value: DescriptorValue,
}

impl Descriptor {
	pub fn new(describer: impl Into<String>, value: DescriptorValue) -> Self {
		Self {
			id: Uuid::new_v4(),
			retrievable_id: None,
			describer: describer.into(),
			persistence: Persistence::Unbound,
			value,
		}
	}

	#[must_use]
	pub const fn id(&self) -> DescriptorId {
		self.id
	}

	#[must_use]
	pub const fn retrievable_id(&self) -> Option<RetrievableId> {
		self.retrievable_id
	}

	/// Name of the analyser that produced this descriptor.
	#[must_use]
	pub fn describer(&self) -> &str {
		&self.describer
	}

	#[must_use]
	pub const fn value(&self) -> &DescriptorValue {
		&self.value
	}

	#[must_use]
	pub const fn persistence(&self) -> &Persistence {
		&self.persistence
	}

	#[must_use]
	pub const fn is_transient(&self) -> bool {
		matches!(self.persistence, Persistence::Unbound)
	}

	/// Sets the retrievable this descriptor describes. Once set, it can't be changed.
	pub fn assign(&mut self, retrievable: RetrievableId) -> Result<(), Error> {
		match self.retrievable_id {
			Some(bound) if bound != retrievable => Err(Error::AlreadyAssigned {
				descriptor: self.id,
				bound,
			}),
			_ => {
				self.retrievable_id = Some(retrievable);
				Ok(())
			}
		}
	}

	pub fn bind(&mut self, field: impl Into<String>) {
		self.persistence = Persistence::Bound {
			field: field.into(),
		};
	}

	#[must_use]
	pub fn with_id(mut self, id: DescriptorId) -> Self {
		self.id = id;
		self
	}

	#[must_use]
	pub fn vector(&self) -> Option<&FloatVector> {
		match &self.value {
			DescriptorValue::Vector(vector) => Some(vector),
			_ => None,
		}
	}

	/// The attribute list storage backends materialize columns from.
	#[must_use]
	pub fn schema(&self) -> Vec<AttributeSchema> {
		match &self.value {
			DescriptorValue::Scalar(value) => {
				vec![AttributeSchema::new("value", value.value_type(), false)]
			}
			DescriptorValue::Vector(_) => {
				vec![AttributeSchema::new("vector", ValueType::FloatVector, false)]
			}
			DescriptorValue::Struct(attributes) => attributes
				.iter()
				.map(|attribute| attribute.schema.clone())
				.collect(),
		}
	}

	#[must_use]
	pub fn values(&self) -> Vec<(String, Option<Value>)> {
		match &self.value {
			DescriptorValue::Scalar(value) => vec![("value".to_string(), Some(value.clone()))],
			DescriptorValue::Vector(vector) => {
				vec![("vector".to_string(), Some(Value::FloatVector(vector.clone())))]
			}
			DescriptorValue::Struct(attributes) => attributes
				.iter()
				.map(|attribute| (attribute.schema.name.clone(), attribute.value.clone()))
				.collect(),
		}
	}

	/// Value of the named attribute, or of the only attribute if `name` is `None`.
	#[must_use]
	pub fn attribute(&self, name: Option<&str>) -> Option<Value> {
		let mut values = self.values();
		match name {
			Some(name) => values
				.into_iter()
				.find(|(attribute, _)| attribute == name)
				.and_then(|(_, value)| value),
			None if values.len() == 1 => values.pop().and_then(|(_, value)| value),
			None => None,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn retrievable_is_assigned_once() {
		let mut descriptor = Descriptor::new(
			"AverageColor",
			DescriptorValue::Vector(FloatVector::zeros(3)),
		);
		let first = Uuid::new_v4();

		descriptor.assign(first).unwrap();
		descriptor.assign(first).unwrap();

		assert!(matches!(
			descriptor.assign(Uuid::new_v4()),
			Err(Error::AlreadyAssigned { bound, .. }) if bound == first
		));
	}

	#[test]
	fn transience_follows_binding() {
		let mut descriptor = Descriptor::new("FileMetadata", DescriptorValue::Scalar(Value::Long(7)));
		assert!(descriptor.is_transient());

		descriptor.bind("file");
		assert!(!descriptor.is_transient());
		assert_eq!(
			descriptor.persistence(),
			&Persistence::Bound {
				field: "file".to_string()
			}
		);
	}

	#[test]
	fn struct_schema_is_introspectable() {
		let descriptor = Descriptor::new(
			"FileMetadata",
			DescriptorValue::Struct(vec![
				StructAttribute {
					schema: AttributeSchema::new("path", ValueType::String, false),
					value: Some(Value::from("/a.png")),
				},
				StructAttribute {
					schema: AttributeSchema::new("size", ValueType::Long, true),
					value: None,
				},
			]),
		);

		assert_eq!(
			descriptor
				.schema()
				.iter()
				.map(|s| (s.name.as_str(), s.kind, s.nullable))
				.collect::<Vec<_>>(),
			vec![("path", ValueType::String, false), ("size", ValueType::Long, true)]
		);
		assert_eq!(descriptor.attribute(Some("path")), Some(Value::from("/a.png")));
		assert_eq!(descriptor.attribute(Some("size")), None);
		assert_eq!(descriptor.attribute(None), None);
	}
}
