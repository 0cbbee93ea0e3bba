//! In-memory model store

use std::collections::HashMap;

use indexmap::{IndexMap, IndexSet};
use parking_lot::RwLock;
use serde_json::{Map, Value};

use super::{Edge, EdgeKind, ModelStore, Row, StoreError, StoreResult};
use crate::pk::PrimaryKey;

#[derive(Debug, Default)]
struct Table {
	rows: IndexMap<PrimaryKey, Map<String, Value>>,
	next_id: i64,
}

impl Table {
	fn insert(&mut self, pk: PrimaryKey, attrs: Map<String, Value>) {
		if let PrimaryKey::Int(id) = pk {
			self.next_id = self.next_id.max(id);
		}
		self.rows.insert(pk, attrs);
	}

	fn allocate(&mut self) -> PrimaryKey {
		self.next_id += 1;
		PrimaryKey::Int(self.next_id)
	}
}

/// Many-to-many link set of one parent row
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct LinkKey {
	through: String,
	child_model: String,
	parent: PrimaryKey,
}

impl LinkKey {
	fn of(edge: &Edge, parent: &PrimaryKey) -> Self {
		Self {
			through: edge.name.clone(),
			child_model: edge.child_model.clone(),
			parent: parent.clone(),
		}
	}
}

#[derive(Debug, Default)]
struct Inner {
	tables: HashMap<String, Table>,
	links: HashMap<LinkKey, IndexSet<PrimaryKey>>,
	writes: usize,
}

impl Inner {
	fn table(&self, model: &str) -> Option<&Table> {
		self.tables.get(model)
	}

	fn table_mut(&mut self, model: &str) -> &mut Table {
		self.tables.entry(model.to_string()).or_default()
	}

	fn require(&self, model: &str, pks: &[PrimaryKey]) -> StoreResult<()> {
		for pk in pks {
			let exists = self
				.table(model)
				.is_some_and(|table| table.rows.contains_key(pk));
			if !exists {
				return Err(StoreError::NotFound {
					model: model.to_string(),
					pk: pk.clone(),
				});
			}
		}
		Ok(())
	}

	fn fk_members(&self, edge: &Edge, column: &str, parent: &PrimaryKey) -> Vec<PrimaryKey> {
		let parent_value = parent.to_value();
		self.table(&edge.child_model)
			.map(|table| {
				table
					.rows
					.iter()
					.filter(|(_, attrs)| attrs.get(column) == Some(&parent_value))
					.map(|(pk, _)| pk.clone())
					.collect()
			})
			.unwrap_or_default()
	}

	fn set_fk(&mut self, model: &str, column: &str, pks: &[PrimaryKey], value: &Value) {
		let table = self.table_mut(model);
		for pk in pks {
			if let Some(attrs) = table.rows.get_mut(pk) {
				attrs.insert(column.to_string(), value.clone());
			}
		}
	}
}

/// Thread-safe in-memory [`ModelStore`]
///
/// Tables are created on first insert. Integer primary keys are allocated
/// sequentially per model, continuing after the highest seeded key.
///
/// # Examples
///
/// ```
/// use reinhardt_nested_writes::{InMemoryStore, ModelStore, PrimaryKey};
/// use serde_json::{json, Map};
///
/// let store = InMemoryStore::new();
/// let mut attrs = Map::new();
/// attrs.insert("title".to_string(), json!("Dune"));
/// let row = store.create("book", attrs).unwrap();
/// assert_eq!(row.pk, PrimaryKey::Int(1));
/// assert!(store.get("book", &row.pk).unwrap().is_some());
/// ```
#[derive(Debug, Default)]
pub struct InMemoryStore {
	inner: RwLock<Inner>,
}

impl InMemoryStore {
	pub fn new() -> Self {
		Self::default()
	}

	/// Seed a row with an explicit primary key
	///
	/// Seeding does not count as a write.
	pub fn insert(&self, model: &str, pk: impl Into<PrimaryKey>, attrs: Value) -> Row {
		let pk = pk.into();
		let attrs = match attrs {
			Value::Object(map) => map,
			_ => Map::new(),
		};
		self.inner.write().table_mut(model).insert(pk.clone(), attrs.clone());
		Row { pk, attrs }
	}

	/// Seed many-to-many links to rows of `child_model` without counting a write
	pub fn link(
		&self,
		through: &str,
		child_model: &str,
		parent: impl Into<PrimaryKey>,
		children: &[PrimaryKey],
	) {
		let key = LinkKey {
			through: through.to_string(),
			child_model: child_model.to_string(),
			parent: parent.into(),
		};
		self.inner
			.write()
			.links
			.entry(key)
			.or_default()
			.extend(children.iter().cloned());
	}

	/// Number of mutating calls made through the [`ModelStore`] interface
	pub fn write_count(&self) -> usize {
		self.inner.read().writes
	}

	/// Number of rows stored for `model`
	pub fn count(&self, model: &str) -> usize {
		self.inner
			.read()
			.table(model)
			.map(|table| table.rows.len())
			.unwrap_or(0)
	}

	/// Every row of `model` in insertion order
	pub fn all(&self, model: &str) -> Vec<Row> {
		self.inner
			.read()
			.table(model)
			.map(|table| {
				table
					.rows
					.iter()
					.map(|(pk, attrs)| Row::new(pk.clone(), attrs.clone()))
					.collect()
			})
			.unwrap_or_default()
	}
}

impl ModelStore for InMemoryStore {
	fn get(&self, model: &str, pk: &PrimaryKey) -> StoreResult<Option<Row>> {
		Ok(self
			.inner
			.read()
			.table(model)
			.and_then(|table| table.rows.get(pk))
			.map(|attrs| Row::new(pk.clone(), attrs.clone())))
	}

	fn filter(&self, model: &str, pks: &[PrimaryKey]) -> StoreResult<Vec<Row>> {
		let inner = self.inner.read();
		let Some(table) = inner.table(model) else {
			return Ok(Vec::new());
		};
		let mut seen = IndexSet::new();
		Ok(pks
			.iter()
			.filter(|pk| seen.insert(*pk))
			.filter_map(|pk| {
				table
					.rows
					.get(pk)
					.map(|attrs| Row::new(pk.clone(), attrs.clone()))
			})
			.collect())
	}

	fn create(&self, model: &str, attrs: Map<String, Value>) -> StoreResult<Row> {
		let mut inner = self.inner.write();
		inner.writes += 1;
		let table = inner.table_mut(model);
		let pk = table.allocate();
		table.rows.insert(pk.clone(), attrs.clone());
		Ok(Row { pk, attrs })
	}

	fn save(&self, model: &str, row: &Row) -> StoreResult<()> {
		let mut inner = self.inner.write();
		inner.require(model, std::slice::from_ref(&row.pk))?;
		inner.writes += 1;
		inner
			.table_mut(model)
			.rows
			.insert(row.pk.clone(), row.attrs.clone());
		Ok(())
	}

	fn delete(&self, model: &str, pks: &[PrimaryKey]) -> StoreResult<usize> {
		let mut inner = self.inner.write();
		inner.writes += 1;
		let table = inner.table_mut(model);
		let removed = pks
			.iter()
			.filter(|pk| table.rows.shift_remove(*pk).is_some())
			.count();
		for (key, members) in inner.links.iter_mut() {
			if key.child_model == model {
				members.retain(|pk| !pks.contains(pk));
			}
		}
		Ok(removed)
	}

	fn related(&self, edge: &Edge, parent: &PrimaryKey) -> StoreResult<Vec<PrimaryKey>> {
		let inner = self.inner.read();
		Ok(match &edge.kind {
			EdgeKind::ManyToMany => {
				// Sorted like a primary-key ordered query.
				let mut members: Vec<PrimaryKey> = inner
					.links
					.get(&LinkKey::of(edge, parent))
					.map(|members| members.iter().cloned().collect())
					.unwrap_or_default();
				members.sort();
				members
			}
			EdgeKind::ReverseForeignKey { column, .. } => inner.fk_members(edge, column, parent),
		})
	}

	fn set(&self, edge: &Edge, parent: &PrimaryKey, pks: &[PrimaryKey]) -> StoreResult<()> {
		let mut inner = self.inner.write();
		inner.require(&edge.child_model, pks)?;
		match &edge.kind {
			EdgeKind::ManyToMany => {
				inner.writes += 1;
				inner
					.links
					.insert(LinkKey::of(edge, parent), pks.iter().cloned().collect());
			}
			EdgeKind::ReverseForeignKey { column, nullable } => {
				let dropped: Vec<PrimaryKey> = inner
					.fk_members(edge, column, parent)
					.into_iter()
					.filter(|pk| !pks.contains(pk))
					.collect();
				if !dropped.is_empty() && !nullable {
					return Err(StoreError::Integrity(format!(
						"{}.{} is not nullable, cannot detach {} rows",
						edge.child_model,
						column,
						dropped.len()
					)));
				}
				inner.writes += 1;
				inner.set_fk(&edge.child_model, column, &dropped, &Value::Null);
				inner.set_fk(&edge.child_model, column, pks, &parent.to_value());
			}
		}
		Ok(())
	}

	fn add(&self, edge: &Edge, parent: &PrimaryKey, pks: &[PrimaryKey]) -> StoreResult<()> {
		let mut inner = self.inner.write();
		inner.require(&edge.child_model, pks)?;
		inner.writes += 1;
		match &edge.kind {
			EdgeKind::ManyToMany => {
				inner
					.links
					.entry(LinkKey::of(edge, parent))
					.or_default()
					.extend(pks.iter().cloned());
			}
			EdgeKind::ReverseForeignKey { column, .. } => {
				inner.set_fk(&edge.child_model, column, pks, &parent.to_value());
			}
		}
		Ok(())
	}

	fn remove(&self, edge: &Edge, parent: &PrimaryKey, pks: &[PrimaryKey]) -> StoreResult<()> {
		let mut inner = self.inner.write();
		match &edge.kind {
			EdgeKind::ManyToMany => {
				inner.writes += 1;
				if let Some(members) = inner.links.get_mut(&LinkKey::of(edge, parent)) {
					members.retain(|pk| !pks.contains(pk));
				}
			}
			EdgeKind::ReverseForeignKey { column, nullable } => {
				if !nullable {
					return Err(StoreError::Integrity(format!(
						"{}.{} is not nullable, rows can only be deleted",
						edge.child_model, column
					)));
				}
				let members = inner.fk_members(edge, column, parent);
				if let Some(stranger) = pks.iter().find(|pk| !members.contains(pk)) {
					return Err(StoreError::Integrity(format!(
						"{} {} is not related to {} {}",
						edge.child_model, stranger, edge.parent_model, parent
					)));
				}
				inner.writes += 1;
				inner.set_fk(&edge.child_model, column, pks, &Value::Null);
			}
		}
		Ok(())
	}
}
