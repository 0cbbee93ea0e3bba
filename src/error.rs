//! Field-scoped error types
//!
//! Every failure of a nested write is attributed to the field that caused it.
//! [`FieldError`] is one failure, [`ValidationErrors`] is what callers receive
//! and render as a per-field message map.

use std::fmt;

use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

use crate::operation::Operation;

/// Key used for errors that do not belong to any field
pub const NON_FIELD_ERRORS: &str = "non_field_errors";

/// A single field-attributed failure
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FieldError {
	/// The value is not the container type the field expects
	///
	/// `field` is `None` only when the top-level payload is not a mapping.
	#[error("{message}")]
	Shape {
		field: Option<String>,
		message: String,
	},

	/// An operation key outside the legal set for the current write context
	#[error("'{operation}' is an invalid operation, allowed operations are {}", quote_operations(.allowed))]
	InvalidOperation {
		field: String,
		operation: String,
		allowed: Vec<Operation>,
	},

	/// A referenced primary key does not resolve
	#[error("Invalid pk \"{pk}\" - object does not exist.")]
	NotFound { field: String, pk: String },

	/// A nested descriptor rejected its payload
	#[error("Invalid data on {field} field: {errors}")]
	Child {
		field: String,
		errors: ValidationErrors,
	},

	/// The store rejected a write
	///
	/// `field` is `None` when the parent row itself could not be written.
	#[error("{}{message}", field_prefix(.field))]
	Persistence {
		field: Option<String>,
		message: String,
	},

	/// A scalar value failed its type or presence check
	#[error("{message}")]
	Invalid { field: String, message: String },
}

fn field_prefix(field: &Option<String>) -> String {
	match field {
		Some(field) => format!("Error on {} field: ", field),
		None => String::new(),
	}
}

fn quote_operations(ops: &[Operation]) -> String {
	ops.iter()
		.map(|op| format!("'{}'", op))
		.collect::<Vec<_>>()
		.join(", ")
}

impl FieldError {
	/// Shape error for a named field
	pub fn shape(field: impl Into<String>, message: impl Into<String>) -> Self {
		FieldError::Shape {
			field: Some(field.into()),
			message: message.into(),
		}
	}

	/// Presence or type error for a named field
	pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
		FieldError::Invalid {
			field: field.into(),
			message: message.into(),
		}
	}

	/// Store failure while writing `field`
	pub fn persistence(field: impl Into<String>, cause: impl fmt::Display) -> Self {
		FieldError::Persistence {
			field: Some(field.into()),
			message: cause.to_string(),
		}
	}

	/// The field this error is attributed to
	pub fn field(&self) -> Option<&str> {
		match self {
			FieldError::Shape { field, .. } | FieldError::Persistence { field, .. } => {
				field.as_deref()
			}
			FieldError::InvalidOperation { field, .. }
			| FieldError::NotFound { field, .. }
			| FieldError::Child { field, .. }
			| FieldError::Invalid { field, .. } => Some(field),
		}
	}

	/// Rendered form: a message list, or a nested map for child errors
	fn detail(&self) -> Value {
		match self {
			FieldError::Child { errors, .. } => errors.to_json(),
			other => Value::Array(vec![Value::String(other.to_string())]),
		}
	}
}

/// Collection of field errors returned by validation and nested writes
///
/// # Examples
///
/// ```
/// use reinhardt_nested_writes::{FieldError, ValidationErrors};
/// use serde_json::json;
///
/// let errors = ValidationErrors::from(FieldError::invalid("title", "This field is required."));
/// assert_eq!(errors.to_json(), json!({"title": ["This field is required."]}));
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationErrors {
	errors: Vec<FieldError>,
}

impl ValidationErrors {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn push(&mut self, error: FieldError) {
		self.errors.push(error);
	}

	pub fn is_empty(&self) -> bool {
		self.errors.is_empty()
	}

	pub fn len(&self) -> usize {
		self.errors.len()
	}

	pub fn iter(&self) -> impl Iterator<Item = &FieldError> {
		self.errors.iter()
	}

	pub fn first(&self) -> Option<&FieldError> {
		self.errors.first()
	}

	/// Errors attributed to `field`
	pub fn for_field<'a>(&'a self, field: &'a str) -> impl Iterator<Item = &'a FieldError> + 'a {
		self.errors.iter().filter(move |e| e.field() == Some(field))
	}

	/// `Ok(value)` when no error was collected
	pub fn into_result<T>(self, value: T) -> Result<T, Self> {
		if self.errors.is_empty() {
			Ok(value)
		} else {
			Err(self)
		}
	}

	/// Render as a `{field: [message]}` map, nesting child errors
	///
	/// Errors without a field land under [`NON_FIELD_ERRORS`]. When a field has
	/// both messages and nested errors, its messages move under
	/// [`NON_FIELD_ERRORS`] inside the nested map.
	pub fn to_json(&self) -> Value {
		let mut map = Map::new();
		for error in &self.errors {
			let key = error.field().unwrap_or(NON_FIELD_ERRORS).to_string();
			merge_into(&mut map, key, error.detail());
		}
		Value::Object(map)
	}
}

fn merge_into(map: &mut Map<String, Value>, key: String, detail: Value) {
	match map.get_mut(&key) {
		Some(slot) => merge_detail(slot, detail),
		None => {
			map.insert(key, detail);
		}
	}
}

fn merge_detail(slot: &mut Value, detail: Value) {
	match (slot, detail) {
		(Value::Object(existing), Value::Object(more)) => {
			for (key, value) in more {
				merge_into(existing, key, value);
			}
		}
		(Value::Object(existing), messages) => {
			merge_into(existing, NON_FIELD_ERRORS.to_string(), messages);
		}
		(slot, Value::Object(mut nested)) => {
			let messages = std::mem::take(slot);
			merge_into(&mut nested, NON_FIELD_ERRORS.to_string(), messages);
			*slot = Value::Object(nested);
		}
		(Value::Array(existing), Value::Array(more)) => existing.extend(more),
		(Value::Array(existing), other) => existing.push(other),
		(slot, other) => {
			let first = std::mem::take(slot);
			*slot = Value::Array(vec![first, other]);
		}
	}
}

impl From<FieldError> for ValidationErrors {
	fn from(error: FieldError) -> Self {
		Self {
			errors: vec![error],
		}
	}
}

impl Extend<FieldError> for ValidationErrors {
	fn extend<I: IntoIterator<Item = FieldError>>(&mut self, iter: I) {
		self.errors.extend(iter);
	}
}

impl IntoIterator for ValidationErrors {
	type Item = FieldError;
	type IntoIter = std::vec::IntoIter<FieldError>;

	fn into_iter(self) -> Self::IntoIter {
		self.errors.into_iter()
	}
}

impl fmt::Display for ValidationErrors {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let parts: Vec<String> = self
			.errors
			.iter()
			.map(|e| match e.field() {
				Some(field) => format!("{}: {}", field, e),
				None => e.to_string(),
			})
			.collect();
		write!(f, "{}", parts.join("; "))
	}
}

impl std::error::Error for ValidationErrors {}

impl Serialize for ValidationErrors {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		self.to_json().serialize(serializer)
	}
}

/// Result type for validation and nested writes
pub type NestedWriteResult<T> = Result<T, ValidationErrors>;

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;
	use serde_json::json;

	#[rstest]
	fn test_invalid_operation_message_names_key_and_allowed_set() {
		let error = FieldError::InvalidOperation {
			field: "books".to_string(),
			operation: "remove".to_string(),
			allowed: vec![Operation::Add, Operation::Create],
		};
		assert_eq!(
			error.to_string(),
			"'remove' is an invalid operation, allowed operations are 'add', 'create'"
		);
		assert_eq!(error.field(), Some("books"));
	}

	#[rstest]
	fn test_persistence_error_is_prefixed_with_field() {
		let error = FieldError::persistence("books", "row is locked");
		assert_eq!(error.to_string(), "Error on books field: row is locked");

		let parent = FieldError::Persistence {
			field: None,
			message: "row is locked".to_string(),
		};
		assert_eq!(parent.to_string(), "row is locked");
		assert_eq!(parent.field(), None);
	}

	#[rstest]
	fn test_child_errors_render_nested() {
		// Arrange
		let child = ValidationErrors::from(FieldError::invalid("code", "This field is required."));
		let errors = ValidationErrors::from(FieldError::Child {
			field: "course".to_string(),
			errors: child,
		});

		// Act
		let rendered = errors.to_json();

		// Assert
		assert_eq!(
			rendered,
			json!({"course": {"code": ["This field is required."]}})
		);
	}

	#[rstest]
	fn test_top_level_shape_error_uses_non_field_key() {
		let errors = ValidationErrors::from(FieldError::Shape {
			field: None,
			message: "Expected a mapping of field values.".to_string(),
		});
		assert_eq!(
			errors.to_json(),
			json!({"non_field_errors": ["Expected a mapping of field values."]})
		);
	}

	#[rstest]
	fn test_messages_for_same_field_are_merged() {
		let mut errors = ValidationErrors::new();
		errors.push(FieldError::invalid("age", "first"));
		errors.push(FieldError::invalid("age", "second"));
		assert_eq!(errors.to_json(), json!({"age": ["first", "second"]}));
		assert_eq!(errors.for_field("age").count(), 2);
	}

	#[rstest]
	fn test_messages_and_nested_errors_for_one_field_are_both_kept() {
		// Arrange
		let mut errors = ValidationErrors::new();
		errors.push(FieldError::InvalidOperation {
			field: "books".to_string(),
			operation: "delete".to_string(),
			allowed: vec![Operation::Add, Operation::Create],
		});
		errors.push(FieldError::Child {
			field: "books".to_string(),
			errors: ValidationErrors::from(FieldError::invalid("title", "This field is required.")),
		});
		errors.push(FieldError::invalid("books", "Another message."));

		// Act
		let rendered = errors.to_json();

		// Assert
		assert_eq!(
			rendered,
			json!({"books": {
				"title": ["This field is required."],
				"non_field_errors": [
					"'delete' is an invalid operation, allowed operations are 'add', 'create'",
					"Another message."
				]
			}})
		);
	}

	#[rstest]
	fn test_nested_errors_under_the_same_key_are_merged() {
		let first = ValidationErrors::from(FieldError::Child {
			field: "1".to_string(),
			errors: ValidationErrors::from(FieldError::invalid("title", "first")),
		});
		let second = ValidationErrors::from(FieldError::Child {
			field: "1".to_string(),
			errors: ValidationErrors::from(FieldError::invalid("author", "second")),
		});
		let mut errors = ValidationErrors::new();
		errors.push(FieldError::Child {
			field: "books".to_string(),
			errors: first,
		});
		errors.push(FieldError::Child {
			field: "books".to_string(),
			errors: second,
		});

		assert_eq!(
			errors.to_json(),
			json!({"books": {"1": {"title": ["first"], "author": ["second"]}}})
		);
	}

	#[rstest]
	fn test_into_result() {
		assert_eq!(ValidationErrors::new().into_result(5).unwrap(), 5);
		let errors = ValidationErrors::from(FieldError::invalid("a", "b"));
		assert!(errors.into_result(()).is_err());
	}
}
