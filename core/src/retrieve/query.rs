use std::cmp::Ordering;

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::model::{Descriptor, FloatVector, Value};

/// A query against a single field, tagged by kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Query {
	Proximity(ProximityQuery),
	Boolean(BooleanQuery),
	Fulltext(FulltextQuery),
}

impl Query {
	#[must_use]
	pub const fn kind(&self) -> &'static str {
		match self {
			Self::Proximity(_) => "proximity",
			Self::Boolean(_) => "boolean",
			Self::Fulltext(_) => "fulltext",
		}
	}
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortOrder {
	#[default]
	Asc,
	Desc,
}

/// Metric a proximity query ranks stored vectors by.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum Distance {
	#[default]
	Euclidean,
	Manhattan,
	Cosine,
}

impl Distance {
	/// Distance between two vectors of equal dimension, `None` if the dimensions differ.
	#[must_use]
	pub fn between(self, a: &[f32], b: &[f32]) -> Option<f32> {
		if a.len() != b.len() {
			return None;
		}

		let pairs = a.iter().zip(b);
		let distance = match self {
			Self::Euclidean => pairs.map(|(x, y)| (x - y).powi(2)).sum::<f32>().sqrt(),
			Self::Manhattan => pairs.map(|(x, y)| (x - y).abs()).sum(),
			Self::Cosine => {
				let (dot, norm_a, norm_b) = pairs.fold((0.0f32, 0.0f32, 0.0f32), |(dot, na, nb), (x, y)| {
					(x.mul_add(*y, dot), x.mul_add(*x, na), y.mul_add(*y, nb))
				});
				let norm = norm_a.sqrt() * norm_b.sqrt();
				if norm == 0.0 {
					1.0
				} else {
					1.0 - dot / norm
				}
			}
		};

		Some(distance)
	}
}

/// Nearest neighbours of `value`, at most `k` of them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProximityQuery {
	pub value: FloatVector,
	pub k: usize,
	#[serde(default)]
	pub order: SortOrder,
	/// Overrides the metric configured for the field.
	#[serde(default)]
	pub distance: Option<Distance>,
	/// Whether results carry the matched descriptor.
	#[serde(default)]
	pub fetch_vector: bool,
}

impl ProximityQuery {
	#[must_use]
	pub fn new(value: impl Into<FloatVector>, k: usize) -> Self {
		Self {
			value: value.into(),
			k,
			order: SortOrder::Asc,
			distance: None,
			fetch_vector: false,
		}
	}

	#[must_use]
	pub const fn with_order(mut self, order: SortOrder) -> Self {
		self.order = order;
		self
	}

	#[must_use]
	pub const fn with_distance(mut self, distance: Distance) -> Self {
		self.distance = Some(distance);
		self
	}

	#[must_use]
	pub const fn fetch_vector(mut self, fetch: bool) -> Self {
		self.fetch_vector = fetch;
		self
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "operator", content = "value", rename_all = "camelCase")]
pub enum Comparison {
	Equal(Value),
	NotEqual(Value),
	Less(Value),
	Greater(Value),
	LessOrEqual(Value),
	GreaterOrEqual(Value),
	Like(LikePattern),
	In(Vec<Value>),
}

impl Comparison {
	pub fn like(pattern: impl Into<String>) -> Result<Self, regex::Error> {
		LikePattern::new(pattern).map(Self::Like)
	}

	#[must_use]
	pub fn matches(&self, value: &Value) -> bool {
		let ordering = |literal: &Value| value.compare(literal);

		match self {
			Self::Equal(literal) => ordering(literal) == Some(Ordering::Equal),
			Self::NotEqual(literal) => ordering(literal).is_some_and(Ordering::is_ne),
			Self::Less(literal) => ordering(literal) == Some(Ordering::Less),
			Self::Greater(literal) => ordering(literal) == Some(Ordering::Greater),
			Self::LessOrEqual(literal) => ordering(literal).is_some_and(Ordering::is_le),
			Self::GreaterOrEqual(literal) => ordering(literal).is_some_and(Ordering::is_ge),
			Self::Like(pattern) => value.as_str().is_some_and(|text| pattern.is_match(text)),
			Self::In(literals) => literals
				.iter()
				.any(|literal| ordering(literal) == Some(Ordering::Equal)),
		}
	}
}

/// Upper bound on the compiled size of a like pattern.
const LIKE_SIZE_LIMIT: usize = 1 << 20;

/// SQL pattern, `%` matches any run of characters and `_` a single one.
///
/// Compiled on construction, so a pattern that can't be compiled is rejected when the query
/// is parsed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LikePattern {
	pattern: String,
	regex: Regex,
}

impl LikePattern {
	pub fn new(pattern: impl Into<String>) -> Result<Self, regex::Error> {
		let pattern = pattern.into();

		let mut expression = String::with_capacity(pattern.len() + 8);
		expression.push_str("(?s)^");
		for c in pattern.chars() {
			match c {
				'%' => expression.push_str(".*"),
				'_' => expression.push('.'),
				c => expression.push_str(&regex::escape(c.encode_utf8(&mut [0; 4]))),
			}
		}
		expression.push('$');

		let regex = RegexBuilder::new(&expression)
			.size_limit(LIKE_SIZE_LIMIT)
			.build()?;

		Ok(Self { pattern, regex })
	}

	#[must_use]
	pub fn as_str(&self) -> &str {
		&self.pattern
	}

	#[must_use]
	pub fn is_match(&self, text: &str) -> bool {
		self.regex.is_match(text)
	}
}

impl PartialEq for LikePattern {
	fn eq(&self, other: &Self) -> bool {
		self.pattern == other.pattern
	}
}

impl TryFrom<String> for LikePattern {
	type Error = regex::Error;

	fn try_from(pattern: String) -> Result<Self, Self::Error> {
		Self::new(pattern)
	}
}

impl From<LikePattern> for String {
	fn from(pattern: LikePattern) -> Self {
		pattern.pattern
	}
}

/// Boolean predicate over the attributes of scalar and struct descriptors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Predicate {
	Simple {
		/// Required for struct descriptors, scalar descriptors have a single attribute.
		#[serde(default)]
		attribute: Option<String>,
		comparison: Comparison,
	},
	And {
		predicates: Vec<Predicate>,
	},
	Or {
		predicates: Vec<Predicate>,
	},
	Not {
		predicate: Box<Predicate>,
	},
}

impl Predicate {
	pub fn simple(attribute: Option<&str>, comparison: Comparison) -> Self {
		Self::Simple {
			attribute: attribute.map(ToString::to_string),
			comparison,
		}
	}

	#[must_use]
	pub fn and(predicates: Vec<Self>) -> Self {
		Self::And { predicates }
	}

	#[must_use]
	pub fn or(predicates: Vec<Self>) -> Self {
		Self::Or { predicates }
	}

	#[must_use]
	pub fn negate(predicate: Self) -> Self {
		Self::Not {
			predicate: Box::new(predicate),
		}
	}

	/// Missing or null attributes never satisfy a simple comparison.
	#[must_use]
	pub fn evaluate(&self, descriptor: &Descriptor) -> bool {
		match self {
			Self::Simple {
				attribute,
				comparison,
			} => descriptor
				.attribute(attribute.as_deref())
				.is_some_and(|value| comparison.matches(&value)),
			Self::And { predicates } => predicates.iter().all(|p| p.evaluate(descriptor)),
			Self::Or { predicates } => predicates.iter().any(|p| p.evaluate(descriptor)),
			Self::Not { predicate } => !predicate.evaluate(descriptor),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BooleanQuery {
	pub predicate: Predicate,
	#[serde(default)]
	pub limit: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FulltextQuery {
	pub value: String,
	/// Needed when a descriptor has more than one text attribute.
	#[serde(default)]
	pub attribute: Option<String>,
	#[serde(default)]
	pub limit: Option<usize>,
	#[serde(default)]
	pub filter: Option<Predicate>,
}

impl FulltextQuery {
	pub fn new(value: impl Into<String>) -> Self {
		Self {
			value: value.into(),
			attribute: None,
			limit: None,
			filter: None,
		}
	}

	/// Share of query terms found in the descriptor's text, `None` if none is.
	///
	/// Matching is case-insensitive containment of each whitespace separated term.
	#[must_use]
	#[allow(clippy::cast_precision_loss)]
	pub fn score(&self, descriptor: &Descriptor) -> Option<f32> {
		if let Some(filter) = &self.filter {
			if !filter.evaluate(descriptor) {
				return None;
			}
		}

		let texts = match &self.attribute {
			Some(name) => descriptor
				.attribute(Some(name))
				.and_then(|value| value.as_str().map(str::to_lowercase))
				.into_iter()
				.collect::<Vec<_>>(),
			None => descriptor
				.values()
				.into_iter()
				.filter_map(|(_, value)| value?.as_str().map(str::to_lowercase))
				.collect(),
		};

		let terms = self
			.value
			.split_whitespace()
			.map(str::to_lowercase)
			.collect::<Vec<_>>();
		if terms.is_empty() {
			return None;
		}

		let found = terms
			.iter()
			.filter(|term| texts.iter().any(|text| text.contains(term.as_str())))
			.count();

		(found > 0).then(|| found as f32 / terms.len() as f32)
	}
}
