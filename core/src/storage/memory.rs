//! Storage backend keeping every entity in process memory.
//!
//! Proximity queries are answered by a brute-force scan over the stored vectors.

use std::{
	collections::{HashMap, HashSet},
	str::FromStr,
	sync::{
		atomic::{AtomicBool, Ordering as AtomicOrdering},
		Arc,
	},
};

use async_trait::async_trait;
use futures::{stream::BoxStream, StreamExt};
use indexmap::IndexMap;
use parking_lot::RwLock;
use tracing::{debug, trace};
use uuid::Uuid;

use crate::{
	model::{
		Attribute, Descriptor, DescriptorId, DistanceAttribute, Relationship, Retrievable,
		RetrievableId, ScoreAttribute,
	},
	register_connection,
	retrieve::{BooleanQuery, BoundedTopK, Distance, FulltextQuery, ProximityQuery, Query, SortOrder},
	Error,
};

use super::{
	Connection, DescriptorReader, DescriptorStorage, Initializer, Reader, RetrievableStorage,
	RetrievableWriter, StorageError, Writer,
};

pub const PROVIDER: &str = "memory";

/// Field parameter selecting the metric of proximity queries.
pub const DISTANCE: &str = "distance";

#[derive(Debug)]
pub struct MemoryConnection {
	schema: String,
	metric: Distance,
	retrievables: Arc<RetrievableTable>,
	fields: RwLock<HashMap<String, Arc<DescriptorTable>>>,
}

fn open(schema: &str, parameters: &HashMap<String, String>) -> Result<Arc<dyn Connection>, Error> {
	let metric = metric(schema, parameters)?;
	Ok(Arc::new(MemoryConnection::new(schema, metric)))
}

register_connection!("memory", open);

fn metric(stage: &str, parameters: &HashMap<String, String>) -> Result<Distance, Error> {
	parameters
		.get(DISTANCE)
		.map_or(Ok(Distance::default()), |value| {
			Distance::from_str(value).map_err(|e| Error::InvalidParameter {
				stage: stage.to_string(),
				key: DISTANCE.to_string(),
				value: value.clone(),
				reason: e.to_string(),
			})
		})
}

impl MemoryConnection {
	/// `metric` applies to every field that doesn't configure its own.
	pub fn new(schema: impl Into<String>, metric: Distance) -> Self {
		let schema = schema.into();
		Self {
			retrievables: Arc::new(RetrievableTable::new(format!("{schema}.retrievable"))),
			schema,
			metric,
			fields: RwLock::new(HashMap::new()),
		}
	}
}

impl Connection for MemoryConnection {
	fn provider(&self) -> &str {
		PROVIDER
	}

	fn schema_name(&self) -> &str {
		&self.schema
	}

	fn retrievables(&self) -> RetrievableStorage {
		RetrievableStorage {
			initializer: Arc::clone(&self.retrievables) as _,
			reader: Arc::clone(&self.retrievables) as _,
			writer: Arc::clone(&self.retrievables) as _,
		}
	}

	fn descriptors(
		&self,
		name: &str,
		prototype: &Descriptor,
		parameters: &HashMap<String, String>,
	) -> Result<DescriptorStorage, StorageError> {
		let metric = if parameters.contains_key(DISTANCE) {
			metric(name, parameters).map_err(|e| StorageError::Backend {
				provider: PROVIDER.to_string(),
				reason: e.to_string(),
			})?
		} else {
			self.metric
		};

		let table = Arc::clone(
			self.fields
				.write()
				.entry(name.to_string())
				.or_insert_with(|| {
					Arc::new(DescriptorTable {
						name: format!("{}.descriptor.{name}", self.schema),
						field: name.to_string(),
						dimension: prototype.vector().map(|v| v.dimension()),
						metric,
						initialized: AtomicBool::new(false),
						rows: RwLock::new(IndexMap::new()),
						retrievables: Arc::clone(&self.retrievables),
					})
				}),
		);

		Ok(DescriptorStorage {
			initializer: Arc::clone(&table) as _,
			reader: Arc::clone(&table) as _,
			writer: table,
		})
	}
}

#[derive(Debug)]
struct RetrievableTable {
	name: String,
	initialized: AtomicBool,
	rows: RwLock<HashMap<RetrievableId, String>>,
	relationships: RwLock<HashSet<(RetrievableId, String, RetrievableId)>>,
}

impl RetrievableTable {
	fn new(name: String) -> Self {
		Self {
			name,
			initialized: AtomicBool::new(false),
			rows: RwLock::new(HashMap::new()),
			relationships: RwLock::new(HashSet::new()),
		}
	}

	fn check(&self) -> Result<(), StorageError> {
		if self.initialized.load(AtomicOrdering::Acquire) {
			Ok(())
		} else {
			Err(StorageError::NotInitialized(self.name.clone()))
		}
	}

	fn contains(&self, id: RetrievableId) -> bool {
		self.rows.read().contains_key(&id)
	}

	/// Rebuilds a retrievable, with every relationship it takes part in.
	fn load(&self, id: RetrievableId) -> Option<Retrievable> {
		let kind = self.rows.read().get(&id)?.clone();
		let mut retrievable = Retrievable::new(id, kind);
		retrievable.relationships = self
			.relationships
			.read()
			.iter()
			.filter(|(subject, _, object)| *subject == id || *object == id)
			.map(|(subject, predicate, object)| Relationship::by_id(*subject, predicate, *object))
			.collect();

		Some(retrievable)
	}

	fn edge(relationship: &Relationship) -> (RetrievableId, String, RetrievableId) {
		(
			relationship.subject_id(),
			relationship.predicate().to_string(),
			relationship.object_id(),
		)
	}
}

#[async_trait]
impl Initializer for RetrievableTable {
	async fn initialize(&self) -> Result<(), StorageError> {
		if !self.initialized.swap(true, AtomicOrdering::AcqRel) {
			debug!(entity = %self.name, "Entity created;");
		}
		Ok(())
	}

	async fn truncate(&self) -> Result<(), StorageError> {
		self.check()?;
		self.rows.write().clear();
		self.relationships.write().clear();
		Ok(())
	}

	async fn is_initialized(&self) -> bool {
		self.initialized.load(AtomicOrdering::Acquire)
	}
}

#[async_trait]
impl Reader<Retrievable> for RetrievableTable {
	async fn get(&self, id: Uuid) -> Result<Option<Retrievable>, StorageError> {
		self.check()?;
		Ok(self.load(id))
	}

	async fn get_all(&self, ids: &[Uuid]) -> Result<Vec<Retrievable>, StorageError> {
		self.check()?;
		Ok(ids.iter().filter_map(|id| self.load(*id)).collect())
	}

	async fn count(&self) -> Result<u64, StorageError> {
		self.check()?;
		Ok(self.rows.read().len() as u64)
	}
}

#[async_trait]
impl Writer<Retrievable> for RetrievableTable {
	async fn add(&self, item: Retrievable) -> Result<bool, StorageError> {
		self.add_all(vec![item]).await
	}

	async fn add_all(&self, items: Vec<Retrievable>) -> Result<bool, StorageError> {
		self.check()?;

		let mut rows = self.rows.write();
		let mut batch = HashSet::with_capacity(items.len());
		if items
			.iter()
			.any(|item| rows.contains_key(&item.id) || !batch.insert(item.id))
		{
			return Ok(false);
		}

		let mut relationships = self.relationships.write();
		for item in items {
			relationships.extend(item.relationships.iter().map(Self::edge));
			rows.insert(item.id, item.kind);
		}

		Ok(true)
	}

	async fn update(&self, item: Retrievable) -> Result<bool, StorageError> {
		self.check()?;

		let mut rows = self.rows.write();
		let Some(kind) = rows.get_mut(&item.id) else {
			return Ok(false);
		};
		*kind = item.kind;

		Ok(true)
	}

	async fn delete(&self, id: Uuid) -> Result<bool, StorageError> {
		self.delete_all(&[id]).await
	}

	async fn delete_all(&self, ids: &[Uuid]) -> Result<bool, StorageError> {
		self.check()?;

		let mut rows = self.rows.write();
		let removed = ids.iter().filter(|id| rows.remove(*id).is_some()).count();
		self.relationships
			.write()
			.retain(|(subject, _, object)| !ids.contains(subject) && !ids.contains(object));

		Ok(removed > 0)
	}
}

#[async_trait]
impl RetrievableWriter for RetrievableTable {
	async fn connect(&self, relationship: &Relationship) -> Result<bool, StorageError> {
		self.connect_all(std::slice::from_ref(relationship)).await
	}

	async fn connect_all(&self, relationships: &[Relationship]) -> Result<bool, StorageError> {
		self.check()?;

		let rows = self.rows.read();
		if let Some(missing) = relationships.iter().find_map(|r| {
			[r.subject_id(), r.object_id()]
				.into_iter()
				.find(|id| !rows.contains_key(id))
		}) {
			return Err(StorageError::NotFound(missing));
		}

		let mut edges = self.relationships.write();
		let added = relationships
			.iter()
			.filter(|relationship| edges.insert(Self::edge(relationship)))
			.count();

		Ok(added > 0)
	}

	async fn disconnect(&self, relationship: &Relationship) -> Result<bool, StorageError> {
		self.check()?;
		Ok(self.relationships.write().remove(&Self::edge(relationship)))
	}
}

#[derive(Debug)]
struct DescriptorTable {
	name: String,
	field: String,
	dimension: Option<usize>,
	metric: Distance,
	initialized: AtomicBool,
	/// In insertion order, so that the earlier of two equally distant rows is the incumbent.
	rows: RwLock<IndexMap<DescriptorId, Descriptor>>,
	retrievables: Arc<RetrievableTable>,
}

impl DescriptorTable {
	fn check(&self) -> Result<(), StorageError> {
		if self.initialized.load(AtomicOrdering::Acquire) {
			Ok(())
		} else {
			Err(StorageError::NotInitialized(self.name.clone()))
		}
	}

	fn invalid(&self, reason: impl Into<String>) -> StorageError {
		StorageError::InvalidQuery {
			field: self.field.clone(),
			reason: reason.into(),
		}
	}

	/// Looks up the retrievable `descriptor` describes and attaches `attributes` to it.
	fn hit(
		&self,
		descriptor: &Descriptor,
		attributes: Vec<Attribute>,
		with_descriptor: bool,
	) -> Option<Retrievable> {
		let mut retrievable = self.retrievables.load(descriptor.retrievable_id()?)?;
		retrievable.attributes = attributes;
		if with_descriptor {
			retrievable.descriptors.push(descriptor.clone());
		}

		Some(retrievable)
	}

	fn proximity(&self, query: &ProximityQuery) -> Result<Vec<Retrievable>, StorageError> {
		if let Some(dimension) = self.dimension {
			if query.value.dimension() != dimension {
				return Err(self.invalid(format!(
					"expected a vector of dimension {dimension}, got {}",
					query.value.dimension()
				)));
			}
		}

		let metric = query.distance.unwrap_or(self.metric);
		let order = query.order;
		let mut topk = BoundedTopK::new(query.k, move |a: &(f32, DescriptorId), b: &(f32, DescriptorId)| {
			match order {
				SortOrder::Asc => a.0.total_cmp(&b.0),
				SortOrder::Desc => b.0.total_cmp(&a.0),
			}
		})
		.map_err(|e| self.invalid(e.to_string()))?;

		let rows = self.rows.read();
		for descriptor in rows.values() {
			let distance = descriptor
				.vector()
				.and_then(|vector| metric.between(vector.as_slice(), query.value.as_slice()));
			if let Some(distance) = distance {
				topk.add((distance, descriptor.id()));
			}
		}

		Ok(topk
			.into_vec()
			.into_iter()
			.filter_map(|(distance, id)| {
				self.hit(
					rows.get(&id)?,
					vec![Attribute::Distance(DistanceAttribute::Global(distance))],
					query.fetch_vector,
				)
			})
			.collect())
	}

	fn boolean(&self, query: &BooleanQuery) -> Vec<Retrievable> {
		let rows = self.rows.read();
		let mut matches = rows
			.values()
			.filter(|descriptor| query.predicate.evaluate(descriptor))
			.collect::<Vec<_>>();
		matches.sort_by_key(|descriptor| (descriptor.retrievable_id(), descriptor.id()));

		matches
			.into_iter()
			.filter_map(|descriptor| self.hit(descriptor, Vec::new(), true))
			.take(query.limit.unwrap_or(usize::MAX))
			.collect()
	}

	fn fulltext(&self, query: &FulltextQuery) -> Vec<Retrievable> {
		let rows = self.rows.read();
		let mut matches = rows
			.values()
			.filter_map(|descriptor| Some((query.score(descriptor)?, descriptor)))
			.collect::<Vec<_>>();
		matches.sort_by(|(a, da), (b, db)| {
			b.total_cmp(a)
				.then_with(|| da.retrievable_id().cmp(&db.retrievable_id()))
		});

		matches
			.into_iter()
			.filter_map(|(score, descriptor)| {
				self.hit(
					descriptor,
					vec![Attribute::Score(ScoreAttribute::Global(score))],
					true,
				)
			})
			.take(query.limit.unwrap_or(usize::MAX))
			.collect()
	}
}

#[async_trait]
impl Initializer for DescriptorTable {
	async fn initialize(&self) -> Result<(), StorageError> {
		if !self.initialized.swap(true, AtomicOrdering::AcqRel) {
			debug!(entity = %self.name, metric = %self.metric, "Entity created;");
		}
		Ok(())
	}

	async fn truncate(&self) -> Result<(), StorageError> {
		self.check()?;
		self.rows.write().clear();
		Ok(())
	}

	async fn is_initialized(&self) -> bool {
		self.initialized.load(AtomicOrdering::Acquire)
	}
}

#[async_trait]
impl Reader<Descriptor> for DescriptorTable {
	async fn get(&self, id: Uuid) -> Result<Option<Descriptor>, StorageError> {
		self.check()?;
		Ok(self.rows.read().get(&id).cloned())
	}

	async fn get_all(&self, ids: &[Uuid]) -> Result<Vec<Descriptor>, StorageError> {
		self.check()?;
		let rows = self.rows.read();
		Ok(ids.iter().filter_map(|id| rows.get(id).cloned()).collect())
	}

	async fn count(&self) -> Result<u64, StorageError> {
		self.check()?;
		Ok(self.rows.read().len() as u64)
	}
}

#[async_trait]
impl DescriptorReader for DescriptorTable {
	fn query(&self, query: &Query) -> BoxStream<'static, Result<Retrievable, StorageError>> {
		let results = self.check().and_then(|()| match query {
			Query::Proximity(query) => self.proximity(query),
			Query::Boolean(query) => Ok(self.boolean(query)),
			Query::Fulltext(query) => Ok(self.fulltext(query)),
		});

		match results {
			Ok(results) => {
				trace!(entity = %self.name, query = query.kind(), hits = results.len(), "Query answered;");
				futures::stream::iter(results.into_iter().map(Ok)).boxed()
			}
			Err(e) => futures::stream::once(async move { Err::<Retrievable, _>(e) }).boxed(),
		}
	}

	async fn get_all_for_retrievables(
		&self,
		retrievables: &[RetrievableId],
	) -> Result<Vec<Descriptor>, StorageError> {
		self.check()?;

		let wanted = retrievables.iter().copied().collect::<HashSet<_>>();
		Ok(self
			.rows
			.read()
			.values()
			.filter(|descriptor| {
				descriptor
					.retrievable_id()
					.is_some_and(|id| wanted.contains(&id))
			})
			.cloned()
			.collect())
	}
}

#[async_trait]
impl Writer<Descriptor> for DescriptorTable {
	async fn add(&self, item: Descriptor) -> Result<bool, StorageError> {
		self.add_all(vec![item]).await
	}

	async fn add_all(&self, items: Vec<Descriptor>) -> Result<bool, StorageError> {
		self.check()?;

		for item in &items {
			let retrievable = item
				.retrievable_id()
				.ok_or_else(|| StorageError::Unassigned(item.id()))?;
			if !self.retrievables.contains(retrievable) {
				return Err(StorageError::DanglingDescriptor {
					descriptor: item.id(),
					retrievable,
				});
			}
		}

		let mut rows = self.rows.write();
		let mut batch = HashSet::with_capacity(items.len());
		if items
			.iter()
			.any(|item| rows.contains_key(&item.id()) || !batch.insert(item.id()))
		{
			return Ok(false);
		}

		rows.extend(items.into_iter().map(|mut item| {
			item.bind(&self.field);
			(item.id(), item)
		}));
		Ok(true)
	}

	async fn update(&self, item: Descriptor) -> Result<bool, StorageError> {
		self.check()?;

		let mut rows = self.rows.write();
		let Some(row) = rows.get_mut(&item.id()) else {
			return Ok(false);
		};
		*row = item;
		row.bind(&self.field);

		Ok(true)
	}

	async fn delete(&self, id: Uuid) -> Result<bool, StorageError> {
		self.delete_all(&[id]).await
	}

	async fn delete_all(&self, ids: &[Uuid]) -> Result<bool, StorageError> {
		self.check()?;

		let mut rows = self.rows.write();
		Ok(ids.iter().filter(|id| rows.shift_remove(*id).is_some()).count() > 0)
	}
}
