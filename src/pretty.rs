//! Lenient relation updates
//!
//! [`NestedWriter::pretty_update`] applies relation fields straight from the
//! raw payload, without validating child payloads: single relations take a
//! primary key, collections take a list (full replace) or an `add`/`remove`
//! mapping. Plain attributes then go through the regular update path.

use serde_json::{Map, Value};

use crate::error::{FieldError, NestedWriteResult};
use crate::field::{Cardinality, FieldKind};
use crate::nested::NestedField;
use crate::operation::{Operation, WriteContext};
use crate::pk::PrimaryKey;
use crate::resource::{ResourceDescriptor, json_type};
use crate::store::{Row, StoreError};
use crate::writer::NestedWriter;

impl NestedWriter<'_> {
	/// Update `instance`, applying relation fields without nested validation
	///
	/// Relation values are applied in payload order and the first failure is
	/// returned; edges changed before it stay changed.
	///
	/// # Examples
	///
	/// ```
	/// use std::sync::Arc;
	/// use reinhardt_nested_writes::{
	///     FieldSpec, FieldType, InMemoryStore, ModelStore, NestedWriter, PrimaryKey,
	///     ResourceDescriptor,
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
	/// store.insert("book", 1, json!({"title": "Dune"}));
	/// let instance = store.insert("course", 1, json!({"name": "Fiction"}));
	///
	/// let writer = NestedWriter::new(&store);
	/// writer
	///     .pretty_update(&course, &instance, &json!({"books": {"add": [1]}, "name": "Sci-fi"}))
	///     .unwrap();
	///
	/// let row = store.get("course", &PrimaryKey::Int(1)).unwrap().unwrap();
	/// let rendered = course.to_representation(&store, &row).unwrap();
	/// assert_eq!(rendered, json!({"name": "Sci-fi", "books": [{"title": "Dune"}]}));
	/// ```
	pub fn pretty_update(
		&self,
		resource: &ResourceDescriptor,
		instance: &Row,
		payload: &Value,
	) -> NestedWriteResult<Row> {
		let Value::Object(map) = payload else {
			return Err(FieldError::Shape {
				field: None,
				message: format!(
					"Invalid data. Expected a dictionary, but got {}.",
					json_type(payload)
				),
			}
			.into());
		};

		let mut row = instance.clone();
		let mut plain = Map::new();
		for (name, value) in map {
			let Some(spec) = resource.field(name) else {
				plain.insert(name.clone(), value.clone());
				continue;
			};
			if spec.read_only {
				continue;
			}
			match (&spec.kind, spec.kind.cardinality()) {
				(FieldKind::Plain(_), _) => {
					plain.insert(name.clone(), value.clone());
				}
				(kind, Some(Cardinality::Single)) => {
					if let Some(nested) = kind.nested() {
						self.assign_single(resource, nested, name, value, &mut row)?;
					}
				}
				(kind, _) => {
					if let Some(nested) = kind.nested() {
						self.apply_many(resource, nested, name, value, &row.pk)?;
					}
				}
			}
		}

		let scope = self.scope(WriteContext::Update).with_instance(Some(&row));
		let data = resource.validate(&Value::Object(plain), &scope)?;
		self.update_validated(resource, &row, data)
	}

	fn assign_single(
		&self,
		resource: &ResourceDescriptor,
		nested: &NestedField,
		field: &str,
		value: &Value,
		row: &mut Row,
	) -> NestedWriteResult<()> {
		if value.is_null() {
			row.set(field, Value::Null);
			return Ok(());
		}
		let pk = pk_of(field, value)?;
		let model = nested.child().model();
		match self.store().get(model, &pk) {
			Ok(Some(_)) => {
				row.set(field, pk.to_value());
				Ok(())
			}
			Ok(None) => Err(self.store_failure(
				resource,
				Some(field),
				StoreError::NotFound {
					model: model.to_string(),
					pk,
				},
			)),
			Err(err) => Err(self.store_failure(resource, Some(field), err)),
		}
	}

	fn apply_many(
		&self,
		resource: &ResourceDescriptor,
		nested: &NestedField,
		field: &str,
		value: &Value,
		parent: &PrimaryKey,
	) -> NestedWriteResult<()> {
		let edge = nested.edge(resource.model(), field);
		match value {
			Value::Array(_) => {
				let pks = pks_of(field, value)?;
				self.replace(resource, nested, field, &edge, parent, &pks)
			}
			Value::Object(ops) => {
				for (operator, pks) in ops {
					match operator.parse::<Operation>() {
						Ok(Operation::Add) => {
							let pks = pks_of(field, pks)?;
							self.store()
								.add(&edge, parent, &pks)
								.map_err(|err| self.store_failure(resource, Some(field), err))?;
						}
						Ok(Operation::Remove) => {
							let pks = pks_of(field, pks)?;
							self.detach(resource, nested, field, &edge, parent, &pks)?;
						}
						_ => {
							return Err(FieldError::invalid(
								field,
								format!(
									"{} is an invalid operator, allowed operators are 'add' and 'remove'",
									operator
								),
							)
							.into());
						}
					}
				}
				Ok(())
			}
			other => Err(FieldError::shape(
				field,
				format!(
					"{} value must be of type list or dict and not {}",
					field,
					json_type(other)
				),
			)
			.into()),
		}
	}
}

fn pk_of(field: &str, value: &Value) -> Result<PrimaryKey, FieldError> {
	PrimaryKey::from_value(value).ok_or_else(|| {
		FieldError::invalid(
			field,
			format!("Incorrect type. Expected pk value, received {}.", json_type(value)),
		)
	})
}

fn pks_of(field: &str, value: &Value) -> Result<Vec<PrimaryKey>, FieldError> {
	match value {
		Value::Array(items) => items.iter().map(|item| pk_of(field, item)).collect(),
		other => Err(FieldError::shape(
			field,
			format!("Expected a list of items but got type \"{}\".", json_type(other)),
		)),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::field::{FieldSpec, FieldType};
	use crate::store::{InMemoryStore, ModelStore};
	use rstest::{fixture, rstest};
	use serde_json::json;
	use std::sync::Arc;

	fn book() -> Arc<ResourceDescriptor> {
		Arc::new(
			ResourceDescriptor::builder("BookResource", "book")
				.field("title", FieldSpec::plain(FieldType::string()))
				.build(),
		)
	}

	fn course() -> ResourceDescriptor {
		ResourceDescriptor::builder("CourseResource", "course")
			.field("name", FieldSpec::plain(FieldType::string()))
			.field("books", FieldSpec::write_many(book()).through("course_books"))
			.field("textbook", FieldSpec::write_single(book()).optional())
			.build()
	}

	#[fixture]
	fn store() -> InMemoryStore {
		let store = InMemoryStore::new();
		store.insert("book", 1, json!({"title": "Advanced Data Structures"}));
		store.insert("book", 2, json!({"title": "Basic Data Structures"}));
		store.insert("course", 1, json!({"name": "Data Structures"}));
		store.link("course_books", "book", 1, &[PrimaryKey::Int(1), PrimaryKey::Int(2)]);
		store
	}

	fn books_of(store: &InMemoryStore) -> Vec<PrimaryKey> {
		let edge = course()
			.field("books")
			.and_then(|spec| spec.kind.nested())
			.map(|nested| nested.edge("course", "books"))
			.unwrap();
		store.related(&edge, &PrimaryKey::Int(1)).unwrap()
	}

	#[rstest]
	fn test_list_replaces_collection(store: InMemoryStore) {
		// Arrange
		let writer = NestedWriter::new(&store);
		let instance = store.get("course", &PrimaryKey::Int(1)).unwrap().unwrap();

		// Act
		writer
			.pretty_update(&course(), &instance, &json!({"books": [2]}))
			.unwrap();

		// Assert
		assert_eq!(books_of(&store), vec![PrimaryKey::Int(2)]);
	}

	#[rstest]
	fn test_add_and_remove_operators(store: InMemoryStore) {
		let writer = NestedWriter::new(&store);
		let instance = store.get("course", &PrimaryKey::Int(1)).unwrap().unwrap();

		writer
			.pretty_update(&course(), &instance, &json!({"books": {"remove": [1], "add": [1]}}))
			.unwrap();

		assert_eq!(books_of(&store), vec![PrimaryKey::Int(1), PrimaryKey::Int(2)]);
	}

	#[rstest]
	fn test_unknown_operator_is_rejected(store: InMemoryStore) {
		let writer = NestedWriter::new(&store);
		let instance = store.get("course", &PrimaryKey::Int(1)).unwrap().unwrap();

		let errors = writer
			.pretty_update(&course(), &instance, &json!({"books": {"create": [{"title": "x"}]}}))
			.unwrap_err();

		assert_eq!(
			errors.to_json(),
			json!({"books": ["create is an invalid operator, allowed operators are 'add' and 'remove'"]})
		);
	}

	#[rstest]
	fn test_scalar_collection_value_is_rejected(store: InMemoryStore) {
		let writer = NestedWriter::new(&store);
		let instance = store.get("course", &PrimaryKey::Int(1)).unwrap().unwrap();

		let errors = writer
			.pretty_update(&course(), &instance, &json!({"books": 1}))
			.unwrap_err();

		assert_eq!(
			errors.to_json(),
			json!({"books": ["books value must be of type list or dict and not number"]})
		);
	}

	#[rstest]
	fn test_single_relation_takes_pk(store: InMemoryStore) {
		// Arrange
		let writer = NestedWriter::new(&store);
		let instance = store.get("course", &PrimaryKey::Int(1)).unwrap().unwrap();

		// Act
		let row = writer
			.pretty_update(&course(), &instance, &json!({"textbook": 2, "name": "DS"}))
			.unwrap();

		// Assert
		assert_eq!(row.get("textbook"), Some(&json!(2)));
		assert_eq!(row.get("name"), Some(&json!("DS")));
	}

	#[rstest]
	fn test_single_relation_unknown_pk_is_prefixed(store: InMemoryStore) {
		let writer = NestedWriter::new(&store);
		let instance = store.get("course", &PrimaryKey::Int(1)).unwrap().unwrap();

		let errors = writer
			.pretty_update(&course(), &instance, &json!({"textbook": 9}))
			.unwrap_err();

		assert_eq!(
			errors.first().map(ToString::to_string).as_deref(),
			Some("Error on textbook field: book matching query does not exist (pk=9)")
		);
	}
}
