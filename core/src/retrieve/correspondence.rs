use serde::{de, Deserialize, Deserializer, Serialize};
use thiserror::Error;

use crate::model::{DistanceAttribute, ScoreAttribute};

#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum InvalidCorrespondence {
	#[error("maximum distance must be positive and finite, got {0}")]
	MaximumDistance(f32),
	#[error("bounds must be finite with min < max, got [{min}, {max}]")]
	Bounds { min: f32, max: f32 },
}

/// Maps a raw distance reported by a storage backend to a similarity score.
///
/// Scores are not clamped: a distance beyond the configured range yields a score below zero.
/// Every way of building one, deserialisation included, rejects ranges that would divide by zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(transparent)]
pub struct CorrespondenceFunction(Shape);

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
enum Shape {
	#[serde(rename_all = "camelCase")]
	Linear { maximum_distance: f32 },
	Bounded { min: f32, max: f32 },
}

impl Default for CorrespondenceFunction {
	fn default() -> Self {
		Self(Shape::Bounded { min: 0.0, max: 1.0 })
	}
}

impl<'de> Deserialize<'de> for CorrespondenceFunction {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		match Shape::deserialize(deserializer)? {
			Shape::Linear { maximum_distance } => Self::linear(maximum_distance),
			Shape::Bounded { min, max } => Self::bounded(min, max),
		}
		.map_err(de::Error::custom)
	}
}

impl CorrespondenceFunction {
	/// Scores `0` as one and `maximum_distance` as zero.
	pub fn linear(maximum_distance: f32) -> Result<Self, InvalidCorrespondence> {
		if maximum_distance.is_finite() && maximum_distance > 0.0 {
			Ok(Self(Shape::Linear { maximum_distance }))
		} else {
			Err(InvalidCorrespondence::MaximumDistance(maximum_distance))
		}
	}

	/// Scores `min` as one and `max` as zero.
	pub fn bounded(min: f32, max: f32) -> Result<Self, InvalidCorrespondence> {
		if min.is_finite() && max.is_finite() && min < max {
			Ok(Self(Shape::Bounded { min, max }))
		} else {
			Err(InvalidCorrespondence::Bounds { min, max })
		}
	}

	#[must_use]
	pub fn score(&self, distance: f32) -> f32 {
		match self.0 {
			Shape::Linear { maximum_distance } => 1.0 - distance / maximum_distance,
			Shape::Bounded { min, max } => (max - distance) / (max - min),
		}
	}

	/// Scores a distance attribute, keeping the descriptor a local distance refers to.
	#[must_use]
	pub fn apply(&self, distance: &DistanceAttribute) -> ScoreAttribute {
		match *distance {
			DistanceAttribute::Global(distance) => ScoreAttribute::Global(self.score(distance)),
			DistanceAttribute::Local {
				descriptor_id,
				distance,
			} => ScoreAttribute::Local {
				descriptor_id,
				score: self.score(distance),
			},
		}
	}
}
