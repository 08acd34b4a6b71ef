use std::{
	cmp::Ordering,
	fmt,
	hash::{Hash, Hasher},
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

/// Fixed-dimensionality float vector, compared and hashed by content.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FloatVector(pub Vec<f32>);

impl FloatVector {
	#[must_use]
	pub fn zeros(dimension: usize) -> Self {
		Self(vec![0.0; dimension])
	}

	#[must_use]
	pub fn dimension(&self) -> usize {
		self.0.len()
	}

	#[must_use]
	pub fn as_slice(&self) -> &[f32] {
		&self.0
	}
}

impl PartialEq for FloatVector {
	fn eq(&self, other: &Self) -> bool {
		self.0.len() == other.0.len()
			&& self
				.0
				.iter()
				.zip(&other.0)
				.all(|(a, b)| a.to_bits() == b.to_bits())
	}
}

impl Eq for FloatVector {}

impl Hash for FloatVector {
	fn hash<H: Hasher>(&self, state: &mut H) {
		self.0.len().hash(state);
		for v in &self.0 {
			v.to_bits().hash(state);
		}
	}
}

impl From<Vec<f32>> for FloatVector {
	fn from(values: Vec<f32>) -> Self {
		Self(values)
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValueType {
	String,
	Text,
	Boolean,
	Byte,
	Short,
	Int,
	Long,
	Float,
	Double,
	DateTime,
	Uuid,
	FloatVector,
}

/// A typed value as stored in a descriptor attribute.
///
/// `String` is meant for short identifiers and exact matching, `Text` for content that is searched
/// through fulltext queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Value {
	String(String),
	Text(String),
	Boolean(bool),
	Byte(i8),
	Short(i16),
	Int(i32),
	Long(i64),
	Float(f32),
	Double(f64),
	DateTime(DateTime<Utc>),
	Uuid(Uuid),
	FloatVector(FloatVector),
}

impl Value {
	#[must_use]
	pub const fn value_type(&self) -> ValueType {
		match self {
			Self::String(_) => ValueType::String,
			Self::Text(_) => ValueType::Text,
			Self::Boolean(_) => ValueType::Boolean,
			Self::Byte(_) => ValueType::Byte,
			Self::Short(_) => ValueType::Short,
			Self::Int(_) => ValueType::Int,
			Self::Long(_) => ValueType::Long,
			Self::Float(_) => ValueType::Float,
			Self::Double(_) => ValueType::Double,
			Self::DateTime(_) => ValueType::DateTime,
			Self::Uuid(_) => ValueType::Uuid,
			Self::FloatVector(_) => ValueType::FloatVector,
		}
	}

	#[must_use]
	pub fn as_str(&self) -> Option<&str> {
		match self {
			Self::String(s) | Self::Text(s) => Some(s),
			_ => None,
		}
	}

	#[must_use]
	#[allow(clippy::cast_precision_loss)]
	pub fn as_f64(&self) -> Option<f64> {
		match self {
			Self::Byte(v) => Some(f64::from(*v)),
			Self::Short(v) => Some(f64::from(*v)),
			Self::Int(v) => Some(f64::from(*v)),
			Self::Long(v) => Some(*v as f64),
			Self::Float(v) => Some(f64::from(*v)),
			Self::Double(v) => Some(*v),
			_ => None,
		}
	}

	/// Orders two values of compatible types; numbers of different widths compare numerically.
	#[must_use]
	pub fn compare(&self, other: &Self) -> Option<Ordering> {
		match (self, other) {
			(Self::Boolean(a), Self::Boolean(b)) => Some(a.cmp(b)),
			(Self::DateTime(a), Self::DateTime(b)) => Some(a.cmp(b)),
			(Self::Uuid(a), Self::Uuid(b)) => Some(a.cmp(b)),
			(Self::FloatVector(a), Self::FloatVector(b)) => (a == b).then_some(Ordering::Equal),
			(a, b) => match (a.as_str(), b.as_str()) {
				(Some(a), Some(b)) => Some(a.cmp(b)),
				_ => a.as_f64()?.partial_cmp(&b.as_f64()?),
			},
		}
	}
}

impl fmt::Display for Value {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::String(value) | Self::Text(value) => f.write_str(value),
			Self::Boolean(value) => write!(f, "{value}"),
			Self::Byte(value) => write!(f, "{value}"),
			Self::Short(value) => write!(f, "{value}"),
			Self::Int(value) => write!(f, "{value}"),
			Self::Long(value) => write!(f, "{value}"),
			Self::Float(value) => write!(f, "{value}"),
			Self::Double(value) => write!(f, "{value}"),
			Self::DateTime(value) => f.write_str(&value.to_rfc3339()),
			Self::Uuid(value) => write!(f, "{value}"),
			Self::FloatVector(vector) => write!(f, "{:?}", vector.as_slice()),
		}
	}
}

impl From<&str> for Value {
	fn from(s: &str) -> Self {
		Self::String(s.to_string())
	}
}

impl From<i32> for Value {
	fn from(v: i32) -> Self {
		Self::Int(v)
	}
}

impl From<i64> for Value {
	fn from(v: i64) -> Self {
		Self::Long(v)
	}
}

impl From<f32> for Value {
	fn from(v: f32) -> Self {
		Self::Float(v)
	}
}

impl From<bool> for Value {
	fn from(v: bool) -> Self {
		Self::Boolean(v)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn numbers_compare_across_widths() {
		assert_eq!(Value::Int(3).compare(&Value::Double(3.0)), Some(Ordering::Equal));
		assert_eq!(Value::Byte(-1).compare(&Value::Long(7)), Some(Ordering::Less));
		assert_eq!(Value::Int(3).compare(&Value::from("3")), None);
	}

	#[test]
	fn vectors_compare_by_content() {
		let a = FloatVector(vec![0.1, 0.2, 0.3]);
		let b = FloatVector(vec![0.1, 0.2, 0.3]);
		assert_eq!(a, b);

		let mut set = std::collections::HashSet::new();
		set.insert(a);
		assert!(set.contains(&b));
		assert!(!set.contains(&FloatVector(vec![0.1, 0.2])));
	}

	#[test]
	fn values_render_as_plain_text() {
		assert_eq!(Value::from("/media/red.png").to_string(), "/media/red.png");
		assert_eq!(Value::Long(1024).to_string(), "1024");
		assert_eq!(Value::Boolean(true).to_string(), "true");
		assert_eq!(Value::FloatVector(FloatVector(vec![0.5, 1.0])).to_string(), "[0.5, 1.0]");
	}

	#[test]
	fn value_type_parses_case_insensitively() {
		assert_eq!("float_vector".parse::<ValueType>().ok(), Some(ValueType::FloatVector));
		assert_eq!(ValueType::DateTime.to_string(), "DATE_TIME");
	}
}
