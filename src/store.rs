//! Persistence layer interface
//!
//! The nested write engine never owns storage. It drives a [`ModelStore`],
//! which provides row lookup, row creation and saving, and the edge
//! primitives (`set`, `add`, `remove`) used by collection relations.
//!
//! [`InMemoryStore`] is a reference implementation used by tests and
//! prototypes.

pub mod memory;

pub use memory::InMemoryStore;

use serde_json::{Map, Value};

use crate::pk::PrimaryKey;

/// A persisted row as handed back by the store
///
/// Single-valued relations are stored as the related row's primary key under
/// the relation field's name.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
	pub pk: PrimaryKey,
	pub attrs: Map<String, Value>,
}

impl Row {
	pub fn new(pk: impl Into<PrimaryKey>, attrs: Map<String, Value>) -> Self {
		Self {
			pk: pk.into(),
			attrs,
		}
	}

	pub fn get(&self, attr: &str) -> Option<&Value> {
		self.attrs.get(attr)
	}

	pub fn set(&mut self, attr: impl Into<String>, value: Value) {
		self.attrs.insert(attr.into(), value);
	}

	/// Primary key of the row referenced by a single-valued relation attribute
	pub fn related_pk(&self, attr: &str) -> Option<PrimaryKey> {
		self.attrs.get(attr).and_then(PrimaryKey::from_value)
	}
}

/// How a collection relation is stored
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EdgeKind {
	/// Link rows in a through table; the child rows are shared
	ManyToMany,
	/// Foreign key `column` on the child row pointing at the parent
	ReverseForeignKey { column: String, nullable: bool },
}

/// A collection relation between a parent model and a child model
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Edge {
	/// Through table name for many-to-many edges, relation name otherwise
	pub name: String,
	pub parent_model: String,
	pub child_model: String,
	pub kind: EdgeKind,
}

/// Errors raised by a [`ModelStore`]
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
	#[error("{model} matching query does not exist (pk={pk})")]
	NotFound { model: String, pk: PrimaryKey },
	#[error("Integrity error: {0}")]
	Integrity(String),
	#[error("Backend error: {0}")]
	Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Relational store the nested write engine calls into
///
/// Each call is expected to be atomic on its own; no atomicity is assumed
/// across calls.
pub trait ModelStore: Send + Sync {
	/// Fetch a row by primary key
	fn get(&self, model: &str, pk: &PrimaryKey) -> StoreResult<Option<Row>>;

	/// Fetch every row whose primary key is in `pks`
	fn filter(&self, model: &str, pks: &[PrimaryKey]) -> StoreResult<Vec<Row>>;

	/// Insert a row and return it with its assigned primary key
	fn create(&self, model: &str, attrs: Map<String, Value>) -> StoreResult<Row>;

	/// Persist the attributes of an existing row
	fn save(&self, model: &str, row: &Row) -> StoreResult<()>;

	/// Delete rows by primary key, returning how many were removed
	fn delete(&self, model: &str, pks: &[PrimaryKey]) -> StoreResult<usize>;

	/// Primary keys of the child rows currently attached to `parent`
	fn related(&self, edge: &Edge, parent: &PrimaryKey) -> StoreResult<Vec<PrimaryKey>>;

	/// Replace the children attached to `parent` with exactly `pks`
	fn set(&self, edge: &Edge, parent: &PrimaryKey, pks: &[PrimaryKey]) -> StoreResult<()>;

	/// Attach existing child rows to `parent`
	fn add(&self, edge: &Edge, parent: &PrimaryKey, pks: &[PrimaryKey]) -> StoreResult<()>;

	/// Detach child rows from `parent` without deleting them
	fn remove(&self, edge: &Edge, parent: &PrimaryKey, pks: &[PrimaryKey]) -> StoreResult<()>;

	/// Primary keys from `pks` that do not resolve to a row of `model`
	fn missing(&self, model: &str, pks: &[PrimaryKey]) -> StoreResult<Vec<PrimaryKey>> {
		let found: Vec<PrimaryKey> = self.filter(model, pks)?.into_iter().map(|r| r.pk).collect();
		Ok(pks
			.iter()
			.filter(|pk| !found.contains(pk))
			.cloned()
			.collect())
	}
}
