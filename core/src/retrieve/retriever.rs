use std::sync::Arc;

use async_stream::stream;
use futures::StreamExt;
use retina_flow::{Arity, ExecutionScope, Flow, FlowError, Operator};
use tracing::{debug, trace, warn};

use crate::{
	model::{Retrievable, ScoreAttribute},
	schema::Field,
	storage::DescriptorReader,
	Error,
};

use super::{correspondence::CorrespondenceFunction, query::Query};

/// Executes one query against the reader of a field.
///
/// Proximity results get their distance turned into a score through the field's
/// [`CorrespondenceFunction`]; boolean and fulltext results are forwarded as the backend
/// returned them.
pub struct FieldRetriever {
	name: String,
	reader: Arc<dyn DescriptorReader>,
	query: Query,
	correspondence: CorrespondenceFunction,
}

impl FieldRetriever {
	/// Binds `query` to `field`, failing if `field` isn't served by `analyser`.
	pub fn new(
		field: &Arc<Field>,
		analyser: &str,
		query: Query,
		correspondence: CorrespondenceFunction,
	) -> Result<Self, Error> {
		field.ensure_analyser(analyser)?;

		Ok(Self {
			name: format!("{}:retriever", field.name()),
			reader: Arc::clone(field.reader()),
			query,
			correspondence,
		})
	}

	#[must_use]
	pub const fn query(&self) -> &Query {
		&self.query
	}
}

impl Operator<Retrievable> for FieldRetriever {
	fn name(&self) -> &str {
		&self.name
	}

	fn arity(&self) -> Arity {
		Arity::Nullary
	}

	fn into_flow(self: Box<Self>, scope: &ExecutionScope) -> Flow<Retrievable> {
		let Self {
			name,
			reader,
			query,
			correspondence,
		} = *self;
		let scope = scope.clone();

		stream! {
			debug!(retriever = %name, query = query.kind(), "Executing query;");
			let mut results = reader.query(&query);
			let mut emitted = 0u64;

			loop {
				let next = tokio::select! {
					biased;
					() = scope.cancelled() => None,
					next = results.next() => Some(next),
				};

				let Some(next) = next else {
					yield Err(FlowError::Cancelled);
					break;
				};

				match next {
					None => break,
					Some(Ok(mut retrievable)) => {
						if matches!(query, Query::Proximity(_)) {
							score(&mut retrievable, correspondence);
						}
						emitted += 1;
						trace!(id = %retrievable.id, "Retrieved;");
						yield Ok(retrievable);
					}
					Some(Err(e)) => {
						yield Err(FlowError::stage(name.clone(), e));
						break;
					}
				}
			}

			debug!(retriever = %name, emitted, "Query finished;");
		}
		.boxed()
	}
}

fn score(retrievable: &mut Retrievable, correspondence: CorrespondenceFunction) {
	let score = match retrievable.distance() {
		Some(distance) => correspondence.apply(distance),
		None => {
			warn!(id = %retrievable.id, "Result carries no distance, scoring it 0;");
			ScoreAttribute::Global(0.0)
		}
	};

	retrievable.set_score(score);
}

#[cfg(test)]
mod tests {
	use uuid::Uuid;

	use crate::model::{Attribute, DistanceAttribute};

	use super::*;

	#[test]
	fn missing_distance_scores_zero() {
		let mut retrievable = Retrievable::new(Uuid::new_v4(), "SEGMENT");
		score(&mut retrievable, CorrespondenceFunction::default());

		assert_eq!(retrievable.score(), Some(0.0));
	}

	#[test]
	fn distance_is_converted() {
		let mut retrievable = Retrievable::new(Uuid::new_v4(), "SEGMENT");
		retrievable
			.attributes
			.push(Attribute::Distance(DistanceAttribute::Global(0.3)));
		score(&mut retrievable, CorrespondenceFunction::linear(3.0).unwrap());

		assert!((retrievable.score().unwrap() - 0.9).abs() < 1e-6);
	}
}
