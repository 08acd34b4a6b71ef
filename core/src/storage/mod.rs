//! Storage contracts the core writes to and reads from.
//!
//! Every entity kind (retrievables and the descriptors of each field) is served by an
//! initializer, a reader and a writer. Implementations must be safe to share between tasks; the
//! core never retries a failed operation.

use std::{collections::HashMap, fmt, sync::Arc};

use async_trait::async_trait;
use futures::stream::BoxStream;
use thiserror::Error;
use uuid::Uuid;

use crate::{
	model::{Descriptor, Relationship, Retrievable, RetrievableId},
	retrieve::Query,
};

pub mod memory;

#[derive(Debug, Error)]
pub enum StorageError {
	#[error("entity not found: <id='{0}'>")]
	NotFound(Uuid),
	#[error("entity <name='{0}'> is not initialized")]
	NotInitialized(String),
	#[error("invalid query for <field='{field}'>: {reason}")]
	InvalidQuery { field: String, reason: String },
	#[error("descriptor <id='{descriptor}'> references unknown <retrievable='{retrievable}'>")]
	DanglingDescriptor { descriptor: Uuid, retrievable: Uuid },
	#[error("descriptor <id='{0}'> is not assigned to a retrievable")]
	Unassigned(Uuid),
	#[error("storage backend <provider='{provider}'> failed: {reason}")]
	Backend { provider: String, reason: String },
}

#[async_trait]
pub trait Initializer: Send + Sync {
	/// Creates the backing entity; calling it again is a no-op.
	async fn initialize(&self) -> Result<(), StorageError>;

	/// Removes all entries, keeping the entity itself.
	async fn truncate(&self) -> Result<(), StorageError>;

	async fn is_initialized(&self) -> bool;
}

#[async_trait]
pub trait Reader<T>: Send + Sync {
	async fn get(&self, id: Uuid) -> Result<Option<T>, StorageError>;

	/// Entries that don't exist are left out.
	async fn get_all(&self, ids: &[Uuid]) -> Result<Vec<T>, StorageError>;

	async fn count(&self) -> Result<u64, StorageError>;
}

/// Reader over the descriptors of one field.
#[async_trait]
pub trait DescriptorReader: Reader<Descriptor> {
	/// Executes `query`, yielding the retrievables it matched.
	///
	/// Proximity results carry a [`Distance`](crate::model::Attribute::Distance) attribute,
	/// fulltext results a [`Score`](crate::model::Attribute::Score).
	fn query(&self, query: &Query) -> BoxStream<'static, Result<Retrievable, StorageError>>;

	/// Every descriptor describing one of `retrievables`.
	async fn get_all_for_retrievables(
		&self,
		retrievables: &[RetrievableId],
	) -> Result<Vec<Descriptor>, StorageError>;
}

/// Write access to an entity. `Ok(false)` reports an operation that was rejected without error,
/// for instance adding an id that already exists.
#[async_trait]
pub trait Writer<T>: Send + Sync {
	async fn add(&self, item: T) -> Result<bool, StorageError>;

	/// Adds either all of `items` or none of them.
	async fn add_all(&self, items: Vec<T>) -> Result<bool, StorageError>;

	async fn update(&self, item: T) -> Result<bool, StorageError>;

	async fn delete(&self, id: Uuid) -> Result<bool, StorageError>;

	async fn delete_all(&self, ids: &[Uuid]) -> Result<bool, StorageError>;
}

#[async_trait]
pub trait RetrievableWriter: Writer<Retrievable> {
	async fn connect(&self, relationship: &Relationship) -> Result<bool, StorageError>;

	async fn connect_all(&self, relationships: &[Relationship]) -> Result<bool, StorageError>;

	async fn disconnect(&self, relationship: &Relationship) -> Result<bool, StorageError>;
}

#[derive(Clone)]
pub struct RetrievableStorage {
	pub initializer: Arc<dyn Initializer>,
	pub reader: Arc<dyn Reader<Retrievable>>,
	pub writer: Arc<dyn RetrievableWriter>,
}

#[derive(Clone)]
pub struct DescriptorStorage {
	pub initializer: Arc<dyn Initializer>,
	pub reader: Arc<dyn DescriptorReader>,
	pub writer: Arc<dyn Writer<Descriptor>>,
}

/// Handle to the storage backend of one schema.
pub trait Connection: Send + Sync + fmt::Debug {
	fn provider(&self) -> &str;

	fn schema_name(&self) -> &str;

	fn retrievables(&self) -> RetrievableStorage;

	/// Storage for the descriptors of field `name`, shaped after `prototype`.
	fn descriptors(
		&self,
		name: &str,
		prototype: &Descriptor,
		parameters: &HashMap<String, String>,
	) -> Result<DescriptorStorage, StorageError>;
}
