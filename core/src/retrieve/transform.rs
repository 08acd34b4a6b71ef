//! Unary operators enriching query results with what storage knows about them.

use std::{
	collections::{BTreeMap, HashMap, HashSet},
	sync::Arc,
};

use async_stream::stream;
use futures::{StreamExt, TryStreamExt};
use retina_flow::{Arity, BoxOperator, ExecutionScope, Flow, FlowError, Operator};
use tracing::debug;

use crate::{
	model::{Attribute, Descriptor, Relationship, Retrievable, RetrievableId},
	schema::Field,
	storage::{DescriptorReader, Reader},
};

async fn collect(
	input: BoxOperator<Retrievable>,
	scope: &ExecutionScope,
) -> Result<Vec<Retrievable>, FlowError> {
	let flow = input.into_flow(scope);

	tokio::select! {
		biased;
		() = scope.cancelled() => Err(FlowError::Cancelled),
		collected = flow.try_collect::<Vec<_>>() => collected,
	}
}

/// The other end of `relationship` if it is worth following from `id`.
fn follow(
	id: RetrievableId,
	relationship: &Relationship,
	incoming: &[String],
	outgoing: &[String],
) -> Option<RetrievableId> {
	let predicate = relationship.predicate();

	if relationship.object_id() == id && incoming.iter().any(|p| p == predicate) {
		Some(relationship.subject_id())
	} else if relationship.subject_id() == id && outgoing.iter().any(|p| p == predicate) {
		Some(relationship.object_id())
	} else {
		None
	}
}

/// Attaches the stored relationships of every retrievable passing by.
///
/// Relationships with a predicate in `incoming` are followed from their object (`partOf` finds
/// the parts of a retrievable), those in `outgoing` from their subject (`partOf` finds what a
/// retrievable belongs to). A relationship is only attached if its other end still exists.
pub struct RelationExpander {
	name: String,
	input: BoxOperator<Retrievable>,
	incoming: Vec<String>,
	outgoing: Vec<String>,
	reader: Arc<dyn Reader<Retrievable>>,
}

impl RelationExpander {
	pub fn new(
		name: impl Into<String>,
		input: BoxOperator<Retrievable>,
		incoming: Vec<String>,
		outgoing: Vec<String>,
		reader: Arc<dyn Reader<Retrievable>>,
	) -> Self {
		Self {
			name: name.into(),
			input,
			incoming,
			outgoing,
			reader,
		}
	}
}

impl Operator<Retrievable> for RelationExpander {
	fn name(&self) -> &str {
		&self.name
	}

	fn arity(&self) -> Arity {
		Arity::Unary
	}

	fn into_flow(self: Box<Self>, scope: &ExecutionScope) -> Flow<Retrievable> {
		let Self {
			name,
			input,
			incoming,
			outgoing,
			reader,
		} = *self;
		let scope = scope.clone();

		stream! {
			let retrieved = match collect(input, &scope).await {
				Ok(retrieved) => retrieved,
				Err(e) => {
					yield Err(e);
					return;
				}
			};

			if retrieved.is_empty() || (incoming.is_empty() && outgoing.is_empty()) {
				for retrievable in retrieved {
					yield Ok(retrievable);
				}
				return;
			}

			let ids = retrieved.iter().map(|r| r.id).collect::<HashSet<_>>();
			let stored = match reader.get_all(&ids.into_iter().collect::<Vec<_>>()).await {
				Ok(stored) => stored,
				Err(e) => {
					yield Err(FlowError::stage(name.clone(), e));
					return;
				}
			};

			let mut followed = HashMap::<RetrievableId, Vec<(Relationship, RetrievableId)>>::new();
			for retrievable in &stored {
				for relationship in &retrievable.relationships {
					if let Some(other) = follow(retrievable.id, relationship, &incoming, &outgoing) {
						followed
							.entry(retrievable.id)
							.or_default()
							.push((relationship.to_by_id(), other));
					}
				}
			}

			let others = followed
				.values()
				.flatten()
				.map(|(_, other)| *other)
				.collect::<HashSet<_>>();
			let existing = if others.is_empty() {
				HashSet::new()
			} else {
				match reader.get_all(&others.into_iter().collect::<Vec<_>>()).await {
					Ok(found) => found.into_iter().map(|r| r.id).collect::<HashSet<_>>(),
					Err(e) => {
						yield Err(FlowError::stage(name.clone(), e));
						return;
					}
				}
			};

			let mut attached = 0usize;
			for mut retrievable in retrieved {
				if scope.is_cancelled() {
					yield Err(FlowError::Cancelled);
					return;
				}

				for (relationship, other) in followed.get(&retrievable.id).into_iter().flatten() {
					if existing.contains(other) && !retrievable.relationships.contains(relationship) {
						retrievable.relationships.push(relationship.clone());
						attached += 1;
					}
				}
				yield Ok(retrievable);
			}

			debug!(operator = %name, attached, "Expanded relationships;");
		}
		.boxed()
	}
}

/// Attaches the descriptors `field` holds for every retrievable passing by.
///
/// The descriptor attributes named in `keys` are also copied into the retrievable's properties,
/// rendered as text. Retrievables the field doesn't describe pass through untouched.
pub struct FieldLookup {
	name: String,
	input: BoxOperator<Retrievable>,
	reader: Arc<dyn DescriptorReader>,
	keys: Vec<String>,
}

impl FieldLookup {
	pub fn new(field: &Arc<Field>, input: BoxOperator<Retrievable>, keys: Vec<String>) -> Self {
		Self {
			name: format!("{}:lookup", field.name()),
			input,
			reader: Arc::clone(field.reader()),
			keys,
		}
	}
}

fn key_properties(descriptor: &Descriptor, keys: &[String]) -> BTreeMap<String, String> {
	keys.iter()
		.filter_map(|key| {
			descriptor
				.attribute(Some(key))
				.map(|value| (key.clone(), value.to_string()))
		})
		.collect()
}

impl Operator<Retrievable> for FieldLookup {
	fn name(&self) -> &str {
		&self.name
	}

	fn arity(&self) -> Arity {
		Arity::Unary
	}

	fn into_flow(self: Box<Self>, scope: &ExecutionScope) -> Flow<Retrievable> {
		let Self {
			name,
			input,
			reader,
			keys,
		} = *self;
		let scope = scope.clone();

		stream! {
			let retrieved = match collect(input, &scope).await {
				Ok(retrieved) => retrieved,
				Err(e) => {
					yield Err(e);
					return;
				}
			};

			let ids = retrieved
				.iter()
				.map(|r| r.id)
				.collect::<HashSet<_>>()
				.into_iter()
				.collect::<Vec<_>>();
			let descriptors = if ids.is_empty() {
				Vec::new()
			} else {
				match reader.get_all_for_retrievables(&ids).await {
					Ok(descriptors) => descriptors,
					Err(e) => {
						yield Err(FlowError::stage(name.clone(), e));
						return;
					}
				}
			};

			let mut by_retrievable = HashMap::<RetrievableId, Vec<Descriptor>>::new();
			for descriptor in descriptors {
				if let Some(id) = descriptor.retrievable_id() {
					by_retrievable.entry(id).or_default().push(descriptor);
				}
			}

			let mut attached = 0usize;
			for mut retrievable in retrieved {
				if scope.is_cancelled() {
					yield Err(FlowError::Cancelled);
					return;
				}

				if let Some(found) = by_retrievable.get(&retrievable.id) {
					let properties = found
						.iter()
						.flat_map(|descriptor| key_properties(descriptor, &keys))
						.collect::<BTreeMap<_, _>>();
					if !properties.is_empty() {
						retrievable.attributes.push(Attribute::Properties(properties));
					}
					retrievable.descriptors.extend(found.iter().cloned());
					attached += found.len();
				}
				yield Ok(retrievable);
			}

			debug!(operator = %name, attached, "Looked up descriptors;");
		}
		.boxed()
	}
}
