//! Nested write orchestration
//!
//! [`NestedWriter`] turns validated payloads into store calls. The create path
//! resolves single relations first, creates the parent row, then applies
//! collection values against the new parent. The update path mutates single
//! relations and plain attributes on the existing row, saves it, then applies
//! collection operations in payload order.
//!
//! Validation runs to completion before the first write, so a rejected payload
//! never touches the store. Writes are not transactional: when a store call
//! fails midway, earlier writes stay committed and the failure is reported as
//! [`FieldError::Persistence`] on the field being written.

use http::Method;
use serde_json::{Map, Value};

use crate::classifier::classify;
use crate::error::{FieldError, NestedWriteResult, ValidationErrors};
use crate::field::RemovePolicy;
use crate::nested::{NestedField, NestedValue, OperationValue};
use crate::operation::{Operation, WriteContext};
use crate::pk::PrimaryKey;
use crate::resource::{ResourceDescriptor, ValidatedData, ValidatedValue};
use crate::scope::WriteScope;
use crate::settings::NestedWriteSettings;
use crate::store::{Edge, EdgeKind, ModelStore, Row, StoreError};

/// Creates and updates object graphs through a [`ModelStore`]
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use reinhardt_nested_writes::{
///     FieldSpec, FieldType, InMemoryStore, ModelStore, NestedWriter, ResourceDescriptor,
/// };
/// use serde_json::json;
///
/// let book = Arc::new(
///     ResourceDescriptor::builder("BookResource", "book")
///         .field("title", FieldSpec::plain(FieldType::string()))
///         .build(),
/// );
/// let course = ResourceDescriptor::builder("CourseResource", "course")
///     .field("name", FieldSpec::plain(FieldType::string()))
///     .field("books", FieldSpec::write_many(book).through("course_books"))
///     .build();
///
/// let store = InMemoryStore::new();
/// let writer = NestedWriter::new(&store);
/// let row = writer
///     .create(&course, &json!({"name": "Algorithms", "books": {"create": [{"title": "CLRS"}]}}))
///     .unwrap();
///
/// let rendered = course.to_representation(&store, &row).unwrap();
/// assert_eq!(rendered, json!({"name": "Algorithms", "books": [{"title": "CLRS"}]}));
/// ```
#[derive(Clone)]
pub struct NestedWriter<'a> {
	store: &'a dyn ModelStore,
	settings: NestedWriteSettings,
}

impl<'a> NestedWriter<'a> {
	pub fn new(store: &'a dyn ModelStore) -> Self {
		Self {
			store,
			settings: NestedWriteSettings::default(),
		}
	}

	pub fn with_settings(mut self, settings: NestedWriteSettings) -> Self {
		self.settings = settings;
		self
	}

	pub fn store(&self) -> &'a dyn ModelStore {
		self.store
	}

	pub fn settings(&self) -> &NestedWriteSettings {
		&self.settings
	}

	/// Top-level validation scope for `context`
	pub fn scope(&self, context: WriteContext) -> WriteScope<'_> {
		WriteScope::new(self.store, context, &self.settings)
	}

	/// Validate `payload` and create a new row with its relations
	pub fn create(&self, resource: &ResourceDescriptor, payload: &Value) -> NestedWriteResult<Row> {
		let data = resource.validate(payload, &self.scope(WriteContext::Create))?;
		self.create_validated(resource, data)
	}

	/// Validate `payload` as a partial update and apply it to `instance`
	pub fn update(
		&self,
		resource: &ResourceDescriptor,
		instance: &Row,
		payload: &Value,
	) -> NestedWriteResult<Row> {
		let scope = self.scope(WriteContext::Update).with_instance(Some(instance));
		let data = resource.validate(payload, &scope)?;
		self.update_validated(resource, instance, data)
	}

	/// Dispatch on the request method
	///
	/// `POST` creates; `PUT` and `PATCH` update `instance`, which must be given.
	pub fn write(
		&self,
		method: &Method,
		resource: &ResourceDescriptor,
		instance: Option<&Row>,
		payload: &Value,
	) -> NestedWriteResult<Row> {
		let context = WriteContext::from_method(method)?;
		tracing::debug!(resource = %resource.name(), %method, %context, "nested write");
		match (context, instance) {
			(WriteContext::Create, _) => self.create(resource, payload),
			(WriteContext::Update, Some(instance)) => self.update(resource, instance, payload),
			(WriteContext::Update, None) => Err(FieldError::Shape {
				field: None,
				message: format!("Method \"{}\" requires an existing instance.", method),
			}
			.into()),
		}
	}

	/// Create a row from already validated data
	pub fn create_validated(
		&self,
		resource: &ResourceDescriptor,
		mut data: ValidatedData,
	) -> NestedWriteResult<Row> {
		let keys: Vec<String> = data.keys().map(str::to_string).collect();
		let classified = classify(resource, &keys);
		let mut attrs = Map::new();

		for name in classified.simple_related.replaceable {
			if let Some(ValidatedValue::Nested(NestedValue::Reference(pk))) = data.take(name) {
				attrs.insert(name.to_string(), reference_value(pk));
			}
		}

		for name in classified.simple_related.writable {
			match data.take(name) {
				Some(ValidatedValue::Nested(NestedValue::Child(child_data))) => {
					let Some(nested) = nested_field(resource, name) else {
						continue;
					};
					let child = self
						.create_validated(nested.child(), child_data)
						.map_err(|errors| wrap_child(name, errors))?;
					attrs.insert(name.to_string(), child.pk.to_value());
				}
				Some(ValidatedValue::Nested(NestedValue::Reference(pk))) => {
					attrs.insert(name.to_string(), reference_value(pk));
				}
				_ => {}
			}
		}

		for name in classified.plain {
			if let Some(ValidatedValue::Plain(value)) = data.take(name) {
				attrs.insert(name.to_string(), value);
			}
		}

		let row = self
			.store
			.create(resource.model(), attrs)
			.map_err(|err| self.store_failure(resource, None, err))?;
		tracing::debug!(resource = %resource.name(), pk = %row.pk, "created row");

		self.apply_collections(resource, &row.pk, classified.many_related, &mut data)?;
		Ok(row)
	}

	/// Apply already validated data to `instance` and return the stored row
	pub fn update_validated(
		&self,
		resource: &ResourceDescriptor,
		instance: &Row,
		mut data: ValidatedData,
	) -> NestedWriteResult<Row> {
		let keys: Vec<String> = data.keys().map(str::to_string).collect();
		let classified = classify(resource, &keys);
		let mut row = instance.clone();

		for name in classified.simple_related.replaceable {
			if let Some(ValidatedValue::Nested(NestedValue::Reference(pk))) = data.take(name) {
				row.set(name, reference_value(pk));
			}
		}

		for name in classified.simple_related.writable {
			match data.take(name) {
				Some(ValidatedValue::Nested(NestedValue::Child(child_data))) => {
					let Some(nested) = nested_field(resource, name) else {
						continue;
					};
					let child = self
						.write_single_child(resource, nested, name, &row, child_data)
						.map_err(|errors| wrap_child(name, errors))?;
					row.set(name, child.pk.to_value());
				}
				Some(ValidatedValue::Nested(NestedValue::Reference(pk))) => {
					row.set(name, reference_value(pk));
				}
				_ => {}
			}
		}

		for name in classified.plain {
			if let Some(ValidatedValue::Plain(value)) = data.take(name) {
				row.set(name, value);
			}
		}

		self.store
			.save(resource.model(), &row)
			.map_err(|err| self.store_failure(resource, None, err))?;
		tracing::debug!(resource = %resource.name(), pk = %row.pk, "updated row");

		self.apply_collections(resource, &row.pk, classified.many_related, &mut data)?;
		self.reload(resource, &row.pk)
	}

	/// Current state of a row as the store has it
	pub(crate) fn reload(&self, resource: &ResourceDescriptor, pk: &PrimaryKey) -> NestedWriteResult<Row> {
		match self.store.get(resource.model(), pk) {
			Ok(Some(row)) => Ok(row),
			Ok(None) => Err(self.store_failure(
				resource,
				None,
				StoreError::NotFound {
					model: resource.model().to_string(),
					pk: pk.clone(),
				},
			)),
			Err(err) => Err(self.store_failure(resource, None, err)),
		}
	}

	/// Update the child a single relation points at, or create one
	fn write_single_child(
		&self,
		resource: &ResourceDescriptor,
		nested: &NestedField,
		field: &str,
		parent: &Row,
		data: ValidatedData,
	) -> NestedWriteResult<Row> {
		let child = nested.child();
		let current = match parent.related_pk(field) {
			Some(pk) => self
				.store
				.get(child.model(), &pk)
				.map_err(|err| self.store_failure(resource, Some(field), err))?,
			None => None,
		};
		match current {
			Some(current) => self.update_validated(child, &current, data),
			None => self.create_validated(child, data),
		}
	}

	fn apply_collections(
		&self,
		resource: &ResourceDescriptor,
		parent: &PrimaryKey,
		fields: Vec<&str>,
		data: &mut ValidatedData,
	) -> NestedWriteResult<()> {
		for name in fields {
			let Some(ValidatedValue::Nested(value)) = data.take(name) else {
				continue;
			};
			let Some(nested) = nested_field(resource, name) else {
				continue;
			};
			self.apply_collection(resource, nested, name, parent, value)?;
		}
		Ok(())
	}

	fn apply_collection(
		&self,
		resource: &ResourceDescriptor,
		nested: &NestedField,
		field: &str,
		parent: &PrimaryKey,
		value: NestedValue,
	) -> NestedWriteResult<()> {
		let edge = nested.edge(resource.model(), field);
		match value {
			NestedValue::Replace(pks) => self.replace(resource, nested, field, &edge, parent, &pks),
			NestedValue::ReplaceWith(children) => {
				let pks = self.create_children(nested, field, None, children)?;
				self.replace(resource, nested, field, &edge, parent, &pks)
			}
			NestedValue::Operations(ops) => {
				for op in ops {
					self.apply_operation(resource, nested, field, &edge, parent, op)?;
				}
				Ok(())
			}
			// Single-valued shapes are never produced for collections.
			NestedValue::Reference(_) | NestedValue::Child(_) => Ok(()),
		}
	}

	fn apply_operation(
		&self,
		resource: &ResourceDescriptor,
		nested: &NestedField,
		field: &str,
		edge: &Edge,
		parent: &PrimaryKey,
		op: OperationValue,
	) -> NestedWriteResult<()> {
		tracing::debug!(
			resource = %resource.name(),
			field,
			operation = %op.operation(),
			parent = %parent,
			"applying collection operation"
		);
		match op {
			OperationValue::Add(pks) => self
				.store
				.add(edge, parent, &pks)
				.map_err(|err| self.store_failure(resource, Some(field), err)),
			OperationValue::Create(children) => {
				let pks = self.create_children(nested, field, Some(Operation::Create), children)?;
				self.store
					.add(edge, parent, &pks)
					.map_err(|err| self.store_failure(resource, Some(field), err))
			}
			OperationValue::Remove(pks) => self.detach(resource, nested, field, edge, parent, &pks),
			OperationValue::Update(updates) => {
				let child = nested.child();
				for (pk, data) in updates {
					let current = self
						.store
						.get(child.model(), &pk)
						.map_err(|err| self.store_failure(resource, Some(field), err))?
						.ok_or_else(|| {
							ValidationErrors::from(FieldError::NotFound {
								field: field.to_string(),
								pk: pk.to_string(),
							})
						})?;
					self.update_validated(child, &current, data).map_err(|errors| {
						wrap_item(field, Some(Operation::Update), &pk.to_string(), errors)
					})?;
				}
				Ok(())
			}
		}
	}

	fn create_children(
		&self,
		nested: &NestedField,
		field: &str,
		operation: Option<Operation>,
		children: Vec<ValidatedData>,
	) -> NestedWriteResult<Vec<PrimaryKey>> {
		let mut pks = Vec::with_capacity(children.len());
		for (index, data) in children.into_iter().enumerate() {
			let row = self
				.create_validated(nested.child(), data)
				.map_err(|errors| wrap_item(field, operation, &index.to_string(), errors))?;
			pks.push(row.pk);
		}
		Ok(pks)
	}

	/// Make `pks` the exact membership of the collection
	pub(crate) fn replace(
		&self,
		resource: &ResourceDescriptor,
		nested: &NestedField,
		field: &str,
		edge: &Edge,
		parent: &PrimaryKey,
		pks: &[PrimaryKey],
	) -> NestedWriteResult<()> {
		let fail = |err| self.store_failure(resource, Some(field), err);
		if nested.remove_policy() == RemovePolicy::Delete {
			let dropped: Vec<PrimaryKey> = self
				.store
				.related(edge, parent)
				.map_err(fail)?
				.into_iter()
				.filter(|pk| !pks.contains(pk))
				.collect();
			self.delete_members(edge, parent, &dropped).map_err(fail)?;
		}
		self.store.set(edge, parent, pks).map_err(fail)
	}

	/// Remove `pks` from the collection according to its remove policy
	pub(crate) fn detach(
		&self,
		resource: &ResourceDescriptor,
		nested: &NestedField,
		field: &str,
		edge: &Edge,
		parent: &PrimaryKey,
		pks: &[PrimaryKey],
	) -> NestedWriteResult<()> {
		let fail = |err| self.store_failure(resource, Some(field), err);
		match nested.remove_policy() {
			RemovePolicy::Detach => self.store.remove(edge, parent, pks).map_err(fail),
			RemovePolicy::Delete => {
				let members = self.store.related(edge, parent).map_err(fail)?;
				let (owned, strangers): (Vec<PrimaryKey>, Vec<PrimaryKey>) =
					pks.iter().cloned().partition(|pk| members.contains(pk));
				if !strangers.is_empty() {
					tracing::debug!(field, skipped = strangers.len(), "not deleting unrelated rows");
				}
				self.delete_members(edge, parent, &owned).map_err(fail)
			}
		}
	}

	fn delete_members(
		&self,
		edge: &Edge,
		parent: &PrimaryKey,
		pks: &[PrimaryKey],
	) -> Result<(), StoreError> {
		if pks.is_empty() {
			return Ok(());
		}
		if edge.kind == EdgeKind::ManyToMany {
			self.store.remove(edge, parent, pks)?;
		}
		let deleted = self.store.delete(&edge.child_model, pks)?;
		tracing::debug!(model = %edge.child_model, deleted, "deleted collection rows");
		Ok(())
	}

	pub(crate) fn store_failure(
		&self,
		resource: &ResourceDescriptor,
		field: Option<&str>,
		err: StoreError,
	) -> ValidationErrors {
		tracing::warn!(
			resource = %resource.name(),
			field = field.unwrap_or_default(),
			error = %err,
			"store rejected nested write"
		);
		FieldError::Persistence {
			field: field.map(str::to_string),
			message: err.to_string(),
		}
		.into()
	}
}

impl std::fmt::Debug for NestedWriter<'_> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("NestedWriter")
			.field("settings", &self.settings)
			.finish_non_exhaustive()
	}
}

pub(crate) fn nested_field<'r>(resource: &'r ResourceDescriptor, name: &str) -> Option<&'r NestedField> {
	resource.field(name).and_then(|spec| spec.kind.nested())
}

fn reference_value(pk: Option<PrimaryKey>) -> Value {
	pk.map_or(Value::Null, |pk| pk.to_value())
}

fn wrap_child(field: &str, errors: ValidationErrors) -> ValidationErrors {
	FieldError::Child {
		field: field.to_string(),
		errors,
	}
	.into()
}

/// Errors of one collection item, keyed `field.operation.item`
fn wrap_item(
	field: &str,
	operation: Option<Operation>,
	item: &str,
	errors: ValidationErrors,
) -> ValidationErrors {
	let errors = wrap_child(item, errors);
	let errors = match operation {
		Some(operation) => wrap_child(operation.as_str(), errors),
		None => errors,
	};
	wrap_child(field, errors)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::field::{FieldSpec, FieldType};
	use crate::store::InMemoryStore;
	use rstest::{fixture, rstest};
	use serde_json::json;
	use std::sync::Arc;

	fn phone() -> Arc<ResourceDescriptor> {
		Arc::new(
			ResourceDescriptor::builder("PhoneResource", "phone")
				.field("number", FieldSpec::plain(FieldType::string_max(15)))
				.field("type", FieldSpec::plain(FieldType::string()).optional())
				.build(),
		)
	}

	fn contact(spec: FieldSpec) -> ResourceDescriptor {
		ResourceDescriptor::builder("ContactResource", "contact")
			.field("name", FieldSpec::plain(FieldType::string()))
			.field("phones", spec)
			.build()
	}

	#[fixture]
	fn store() -> InMemoryStore {
		let store = InMemoryStore::new();
		store.insert("contact", 1, json!({"name": "Yezy"}));
		store.insert("phone", 1, json!({"number": "076711110", "contact": 1}));
		store.insert("phone", 2, json!({"number": "073008880", "contact": 1}));
		store
	}

	fn pks(ids: &[i64]) -> Vec<PrimaryKey> {
		ids.iter().copied().map(PrimaryKey::Int).collect()
	}

	fn phones_of(store: &InMemoryStore, resource: &ResourceDescriptor) -> Vec<PrimaryKey> {
		let edge = nested_field(resource, "phones")
			.unwrap()
			.edge(resource.model(), "phones");
		store.related(&edge, &PrimaryKey::Int(1)).unwrap()
	}

	#[rstest]
	fn test_remove_nulls_nullable_foreign_key(store: InMemoryStore) {
		// Arrange
		let resource = contact(FieldSpec::write_many(phone()).reverse_fk("contact", true));
		let writer = NestedWriter::new(&store);
		let instance = store.get("contact", &PrimaryKey::Int(1)).unwrap().unwrap();

		// Act
		writer
			.update(&resource, &instance, &json!({"phones": {"remove": [2]}}))
			.unwrap();

		// Assert
		assert_eq!(phones_of(&store, &resource), pks(&[1]));
		assert_eq!(store.count("phone"), 2);
	}

	#[rstest]
	fn test_remove_deletes_when_foreign_key_not_nullable(store: InMemoryStore) {
		let resource = contact(FieldSpec::write_many(phone()).reverse_fk("contact", false));
		let writer = NestedWriter::new(&store);
		let instance = store.get("contact", &PrimaryKey::Int(1)).unwrap().unwrap();

		writer
			.update(&resource, &instance, &json!({"phones": {"remove": [2]}}))
			.unwrap();

		assert_eq!(phones_of(&store, &resource), pks(&[1]));
		assert_eq!(store.count("phone"), 1);
	}

	#[rstest]
	fn test_deleting_phones_leaves_other_edges_alone(store: InMemoryStore) {
		// Arrange
		store.insert("book", 2, json!({"title": "Basic Data Structures"}));
		store.link("course_books", "book", 1, &pks(&[2]));
		let books = Edge {
			name: "course_books".to_string(),
			parent_model: "course".to_string(),
			child_model: "book".to_string(),
			kind: EdgeKind::ManyToMany,
		};
		let resource = contact(FieldSpec::write_many(phone()).reverse_fk("contact", false));
		let writer = NestedWriter::new(&store);
		let instance = store.get("contact", &PrimaryKey::Int(1)).unwrap().unwrap();

		// Act
		writer
			.update(&resource, &instance, &json!({"phones": {"remove": [2]}}))
			.unwrap();

		// Assert
		assert_eq!(store.count("phone"), 1);
		assert_eq!(store.related(&books, &PrimaryKey::Int(1)).unwrap(), pks(&[2]));
	}

	#[rstest]
	fn test_replace_with_deletes_dropped_rows(store: InMemoryStore) {
		// Arrange
		let resource = contact(FieldSpec::write_many(phone()).reverse_fk("contact", false));
		let writer = NestedWriter::new(&store);
		let instance = store.get("contact", &PrimaryKey::Int(1)).unwrap().unwrap();

		// Act
		writer
			.update(&resource, &instance, &json!({"phones": [{"number": "0700"}]}))
			.unwrap();

		// Assert
		let remaining = store.all("phone");
		assert_eq!(remaining.len(), 1);
		assert_eq!(remaining[0].get("number"), Some(&json!("0700")));
		assert_eq!(phones_of(&store, &resource), vec![remaining[0].pk.clone()]);
	}

	#[rstest]
	fn test_explicit_detach_on_non_nullable_fk_reports_persistence_error(store: InMemoryStore) {
		// Arrange
		let resource = contact(
			FieldSpec::write_many(phone())
				.reverse_fk("contact", false)
				.on_remove(RemovePolicy::Detach),
		);
		let writer = NestedWriter::new(&store);
		let instance = store.get("contact", &PrimaryKey::Int(1)).unwrap().unwrap();

		// Act
		let errors = writer
			.update(&resource, &instance, &json!({"phones": {"remove": [2]}}))
			.unwrap_err();

		// Assert
		let message = errors.first().unwrap().to_string();
		assert!(message.starts_with("Error on phones field: Integrity error"), "{}", message);
		assert_eq!(phones_of(&store, &resource), pks(&[1, 2]));
	}

	#[rstest]
	fn test_update_missing_instance_requires_row(store: InMemoryStore) {
		let resource = contact(FieldSpec::write_many(phone()).reverse_fk("contact", true));
		let writer = NestedWriter::new(&store);

		let errors = writer
			.write(&Method::PATCH, &resource, None, &json!({"name": "x"}))
			.unwrap_err();

		assert_eq!(
			errors.to_json(),
			json!({"non_field_errors": ["Method \"PATCH\" requires an existing instance."]})
		);
		assert_eq!(store.write_count(), 0);
	}

	#[rstest]
	fn test_write_rejects_unsupported_method(store: InMemoryStore) {
		let resource = contact(FieldSpec::write_many(phone()).reverse_fk("contact", true));
		let writer = NestedWriter::new(&store);

		let result = writer.write(&Method::DELETE, &resource, None, &json!({}));

		assert!(result.is_err());
		assert_eq!(store.write_count(), 0);
	}

	#[rstest]
	fn test_update_of_collection_child_keeps_other_attrs(store: InMemoryStore) {
		// Arrange
		let resource = contact(FieldSpec::write_many(phone()).reverse_fk("contact", true));
		let writer = NestedWriter::new(&store);
		let instance = store.get("contact", &PrimaryKey::Int(1)).unwrap().unwrap();

		// Act
		writer
			.update(
				&resource,
				&instance,
				&json!({"phones": {"update": {"1": {"type": "home"}}}}),
			)
			.unwrap();

		// Assert
		let phone = store.get("phone", &PrimaryKey::Int(1)).unwrap().unwrap();
		assert_eq!(phone.get("number"), Some(&json!("076711110")));
		assert_eq!(phone.get("type"), Some(&json!("home")));
		assert_eq!(phone.get("contact"), Some(&json!(1)));
	}
}
