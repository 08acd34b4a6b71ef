use std::{
	collections::BTreeMap,
	fmt,
	sync::{Arc, Weak},
};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{
	content::ContentElement,
	descriptor::{Descriptor, DescriptorId},
	source::SourceRef,
};

pub type RetrievableId = Uuid;

pub type IngestedRef = Arc<Ingested>;

/// Predicate linking a part to the retrievable it belongs to.
pub const PART_OF: &str = "partOf";

pub const TERMINAL_KIND: &str = "TERMINAL";

/// A live handle to an [`Ingested`] that still knows the id once the retrievable is gone.
#[derive(Clone)]
pub struct RetrievableRef {
	id: RetrievableId,
	handle: Weak<Ingested>,
}

impl RetrievableRef {
	#[must_use]
	pub fn new(retrievable: &IngestedRef) -> Self {
		Self {
			id: retrievable.id(),
			handle: Arc::downgrade(retrievable),
		}
	}

	#[must_use]
	pub const fn id(&self) -> RetrievableId {
		self.id
	}

	#[must_use]
	pub fn upgrade(&self) -> Option<IngestedRef> {
		self.handle.upgrade()
	}
}

impl fmt::Debug for RetrievableRef {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "RetrievableRef<{}>", self.id)
	}
}

/// Directed, named edge between two retrievables.
///
/// `ByRef` only exists while a pipeline is running, storage and query results use `ById`.
#[derive(Debug, Clone)]
pub enum Relationship {
	ByRef {
		subject: RetrievableRef,
		predicate: String,
		object: RetrievableRef,
	},
	ById {
		subject: RetrievableId,
		predicate: String,
		object: RetrievableId,
	},
}

impl Relationship {
	pub fn by_ref(subject: &IngestedRef, predicate: impl Into<String>, object: &IngestedRef) -> Self {
		Self::ByRef {
			subject: RetrievableRef::new(subject),
			predicate: predicate.into(),
			object: RetrievableRef::new(object),
		}
	}

	pub fn by_id(
		subject: RetrievableId,
		predicate: impl Into<String>,
		object: RetrievableId,
	) -> Self {
		Self::ById {
			subject,
			predicate: predicate.into(),
			object,
		}
	}

	#[must_use]
	pub const fn subject_id(&self) -> RetrievableId {
		match self {
			Self::ByRef { subject, .. } => subject.id(),
			Self::ById { subject, .. } => *subject,
		}
	}

	#[must_use]
	pub const fn object_id(&self) -> RetrievableId {
		match self {
			Self::ByRef { object, .. } => object.id(),
			Self::ById { object, .. } => *object,
		}
	}

	#[must_use]
	pub fn predicate(&self) -> &str {
		match self {
			Self::ByRef { predicate, .. } | Self::ById { predicate, .. } => predicate,
		}
	}

	#[must_use]
	pub fn to_by_id(&self) -> Self {
		Self::by_id(self.subject_id(), self.predicate(), self.object_id())
	}
}

impl PartialEq for Relationship {
	fn eq(&self, other: &Self) -> bool {
		self.subject_id() == other.subject_id()
			&& self.predicate() == other.predicate()
			&& self.object_id() == other.object_id()
	}
}

impl Eq for Relationship {}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum DistanceAttribute {
	Global(f32),
	Local {
		descriptor_id: DescriptorId,
		distance: f32,
	},
}

impl DistanceAttribute {
	#[must_use]
	pub const fn distance(&self) -> f32 {
		match self {
			Self::Global(distance) | Self::Local { distance, .. } => *distance,
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ScoreAttribute {
	Global(f32),
	Local {
		descriptor_id: DescriptorId,
		score: f32,
	},
}

impl ScoreAttribute {
	#[must_use]
	pub const fn score(&self) -> f32 {
		match self {
			Self::Global(score) | Self::Local { score, .. } => *score,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Attribute {
	Distance(DistanceAttribute),
	Score(ScoreAttribute),
	Properties(BTreeMap<String, String>),
}

/// A retrievable as stored or as returned by a query.
#[derive(Debug, Clone, PartialEq)]
pub struct Retrievable {
	pub id: RetrievableId,
	pub kind: String,
	pub descriptors: Vec<Descriptor>,
	pub attributes: Vec<Attribute>,
	pub relationships: Vec<Relationship>,
}

impl Retrievable {
	pub fn new(id: RetrievableId, kind: impl Into<String>) -> Self {
		Self {
			id,
			kind: kind.into(),
			descriptors: Vec::new(),
			attributes: Vec::new(),
			relationships: Vec::new(),
		}
	}

	#[must_use]
	pub fn distance(&self) -> Option<&DistanceAttribute> {
		self.attributes.iter().find_map(|attribute| match attribute {
			Attribute::Distance(distance) => Some(distance),
			_ => None,
		})
	}

	#[must_use]
	pub fn score_attribute(&self) -> Option<&ScoreAttribute> {
		self.attributes.iter().find_map(|attribute| match attribute {
			Attribute::Score(score) => Some(score),
			_ => None,
		})
	}

	#[must_use]
	pub fn score(&self) -> Option<f32> {
		self.score_attribute().map(ScoreAttribute::score)
	}

	/// Replaces any score this retrievable carried so far.
	pub fn set_score(&mut self, score: ScoreAttribute) {
		self.attributes
			.retain(|attribute| !matches!(attribute, Attribute::Score(_)));
		self.attributes.push(Attribute::Score(score));
	}

	#[must_use]
	pub fn properties(&self) -> BTreeMap<String, String> {
		self.attributes
			.iter()
			.filter_map(|attribute| match attribute {
				Attribute::Properties(properties) => Some(properties.clone()),
				_ => None,
			})
			.flatten()
			.collect()
	}

	#[must_use]
	pub fn part_of(&self) -> Vec<RetrievableId> {
		part_of(self.id, &self.relationships)
	}

	#[must_use]
	pub fn parts(&self) -> Vec<RetrievableId> {
		parts(self.id, &self.relationships)
	}
}

fn part_of(id: RetrievableId, relationships: &[Relationship]) -> Vec<RetrievableId> {
	relationships
		.iter()
		.filter(|rel| rel.predicate() == PART_OF && rel.subject_id() == id)
		.map(Relationship::object_id)
		.collect()
}

fn parts(id: RetrievableId, relationships: &[Relationship]) -> Vec<RetrievableId> {
	relationships
		.iter()
		.filter(|rel| rel.predicate() == PART_OF && rel.object_id() == id)
		.map(Relationship::subject_id)
		.collect()
}

/// A retrievable under construction while it travels through an indexing pipeline.
///
/// Shared between sibling extractor chains, so descriptors and relationships live behind locks.
#[derive(Debug)]
pub struct Ingested {
	id: RetrievableId,
	kind: String,
	transient: bool,
	content: Vec<ContentElement>,
	source: Option<SourceRef>,
	descriptors: RwLock<Vec<Descriptor>>,
	relationships: RwLock<Vec<Relationship>>,
}

impl Ingested {
	pub fn new(kind: impl Into<String>, content: Vec<ContentElement>, source: Option<SourceRef>) -> Self {
		Self {
			id: Uuid::new_v4(),
			kind: kind.into(),
			transient: false,
			content,
			source,
			descriptors: RwLock::new(Vec::new()),
			relationships: RwLock::new(Vec::new()),
		}
	}

	/// Marks the retrievable as never to be persisted.
	#[must_use]
	pub fn into_transient(mut self) -> Self {
		self.transient = true;
		self
	}

	/// End-of-stream sentinel for stages that can't signal completion otherwise.
	#[must_use]
	pub fn terminal() -> IngestedRef {
		Arc::new(Self {
			id: Uuid::nil(),
			kind: TERMINAL_KIND.to_string(),
			transient: true,
			content: Vec::new(),
			source: None,
			descriptors: RwLock::new(Vec::new()),
			relationships: RwLock::new(Vec::new()),
		})
	}

	#[must_use]
	pub fn is_terminal(&self) -> bool {
		self.id.is_nil() && self.kind == TERMINAL_KIND
	}

	#[must_use]
	pub const fn id(&self) -> RetrievableId {
		self.id
	}

	#[must_use]
	pub fn kind(&self) -> &str {
		&self.kind
	}

	#[must_use]
	pub const fn is_transient(&self) -> bool {
		self.transient
	}

	#[must_use]
	pub fn content(&self) -> &[ContentElement] {
		&self.content
	}

	#[must_use]
	pub const fn source(&self) -> Option<&SourceRef> {
		self.source.as_ref()
	}

	#[must_use]
	pub fn descriptors(&self) -> Vec<Descriptor> {
		self.descriptors.read().clone()
	}

	pub fn add_descriptors(&self, descriptors: impl IntoIterator<Item = Descriptor>) {
		self.descriptors.write().extend(descriptors);
	}

	#[must_use]
	pub fn relationships(&self) -> Vec<Relationship> {
		self.relationships.read().clone()
	}

	pub fn add_relationship(&self, relationship: Relationship) {
		let mut relationships = self.relationships.write();
		if !relationships.contains(&relationship) {
			relationships.push(relationship);
		}
	}

	#[must_use]
	pub fn part_of(&self) -> Vec<RetrievableId> {
		part_of(self.id, &self.relationships.read())
	}

	#[must_use]
	pub fn parts(&self) -> Vec<RetrievableId> {
		parts(self.id, &self.relationships.read())
	}

	/// Snapshot in the form storage backends persist.
	#[must_use]
	pub fn to_retrievable(&self) -> Retrievable {
		Retrievable {
			id: self.id,
			kind: self.kind.clone(),
			descriptors: self.descriptors(),
			attributes: Vec::new(),
			relationships: self
				.relationships
				.read()
				.iter()
				.map(Relationship::to_by_id)
				.collect(),
		}
	}
}
