//! Nested write vocabulary
//!
//! The closed set of mutation verbs a collection relation accepts, and the
//! write context that decides which of them are legal for a request.

use std::fmt;
use std::str::FromStr;

use http::Method;

use crate::error::FieldError;

/// A mutation verb applied to a collection relation
///
/// # Examples
///
/// ```
/// use reinhardt_nested_writes::Operation;
///
/// let op: Operation = "remove".parse().unwrap();
/// assert_eq!(op, Operation::Remove);
/// assert_eq!(op.as_str(), "remove");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Operation {
	/// Attach existing rows by primary key
	Add,
	/// Build new child rows, then attach them
	Create,
	/// Detach rows by primary key
	Remove,
	/// Apply partial payloads to child rows, keyed by primary key
	Update,
}

impl Operation {
	/// Every operation, in declaration order
	pub const ALL: [Operation; 4] = [
		Operation::Add,
		Operation::Create,
		Operation::Remove,
		Operation::Update,
	];

	/// The wire name of the operation
	pub fn as_str(self) -> &'static str {
		match self {
			Operation::Add => "add",
			Operation::Create => "create",
			Operation::Remove => "remove",
			Operation::Update => "update",
		}
	}
}

impl fmt::Display for Operation {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Error returned when a string is not a known operation name
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown operation '{0}'")]
pub struct UnknownOperation(pub String);

impl FromStr for Operation {
	type Err = UnknownOperation;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"add" => Ok(Operation::Add),
			"create" => Ok(Operation::Create),
			"remove" => Ok(Operation::Remove),
			"update" => Ok(Operation::Update),
			other => Err(UnknownOperation(other.to_string())),
		}
	}
}

/// Whether the active request creates a new parent row or updates one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WriteContext {
	Create,
	Update,
}

impl WriteContext {
	/// Derive the context from the request method
	///
	/// `POST` creates, `PUT` and `PATCH` update. Any other method cannot carry
	/// a nested write.
	///
	/// # Examples
	///
	/// ```
	/// use http::Method;
	/// use reinhardt_nested_writes::WriteContext;
	///
	/// assert_eq!(WriteContext::from_method(&Method::POST).unwrap(), WriteContext::Create);
	/// assert_eq!(WriteContext::from_method(&Method::PATCH).unwrap(), WriteContext::Update);
	/// assert!(WriteContext::from_method(&Method::GET).is_err());
	/// ```
	pub fn from_method(method: &Method) -> Result<Self, FieldError> {
		match *method {
			Method::POST => Ok(WriteContext::Create),
			Method::PUT | Method::PATCH => Ok(WriteContext::Update),
			ref other => Err(FieldError::Shape {
				field: None,
				message: format!("Method \"{}\" cannot perform a nested write.", other),
			}),
		}
	}

	/// Operations accepted in this context, before any per-field restriction
	pub fn allowed_operations(self) -> &'static [Operation] {
		match self {
			WriteContext::Create => &[Operation::Add, Operation::Create],
			WriteContext::Update => &Operation::ALL,
		}
	}

	/// Whether `operation` is legal in this context
	pub fn allows(self, operation: Operation) -> bool {
		self.allowed_operations().contains(&operation)
	}

	/// Whether required fields may be omitted
	pub fn is_partial(self) -> bool {
		matches!(self, WriteContext::Update)
	}
}

impl fmt::Display for WriteContext {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			WriteContext::Create => f.write_str("create"),
			WriteContext::Update => f.write_str("update"),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	#[case("add", Operation::Add)]
	#[case("create", Operation::Create)]
	#[case("remove", Operation::Remove)]
	#[case("update", Operation::Update)]
	fn test_parse_operation(#[case] input: &str, #[case] expected: Operation) {
		assert_eq!(input.parse::<Operation>().unwrap(), expected);
		assert_eq!(expected.to_string(), input);
	}

	#[rstest]
	fn test_parse_unknown_operation() {
		let err = "delete".parse::<Operation>().unwrap_err();
		assert_eq!(err.to_string(), "unknown operation 'delete'");
	}

	#[rstest]
	#[case(Method::POST, WriteContext::Create)]
	#[case(Method::PUT, WriteContext::Update)]
	#[case(Method::PATCH, WriteContext::Update)]
	fn test_context_from_method(#[case] method: Method, #[case] expected: WriteContext) {
		assert_eq!(WriteContext::from_method(&method).unwrap(), expected);
	}

	#[rstest]
	#[case(Method::GET)]
	#[case(Method::DELETE)]
	fn test_context_rejects_read_methods(#[case] method: Method) {
		assert!(WriteContext::from_method(&method).is_err());
	}

	#[rstest]
	fn test_create_context_excludes_remove_and_update() {
		assert!(WriteContext::Create.allows(Operation::Add));
		assert!(WriteContext::Create.allows(Operation::Create));
		assert!(!WriteContext::Create.allows(Operation::Remove));
		assert!(!WriteContext::Create.allows(Operation::Update));
	}

	#[rstest]
	fn test_update_context_allows_everything() {
		for op in Operation::ALL {
			assert!(WriteContext::Update.allows(op));
		}
		assert!(WriteContext::Update.is_partial());
		assert!(!WriteContext::Create.is_partial());
	}
}
