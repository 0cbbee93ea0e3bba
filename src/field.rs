//! Field specifications
//!
//! Every field declared on a [`ResourceDescriptor`](crate::ResourceDescriptor)
//! carries a [`FieldKind`] tag fixed at construction time. The nested write
//! engine dispatches on that tag with a single `match`.

use std::sync::Arc;

use serde_json::Value;

use crate::error::FieldError;
use crate::nested::NestedField;
use crate::resource::ResourceDescriptor;
use crate::store::EdgeKind;

/// How a relation field treats incoming values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelationPolicy {
	/// Accepts primary keys of existing rows; only edges are mutated
	ByReference,
	/// Accepts child payloads; child rows may be created, mutated or deleted
	WriteThrough,
}

/// Number of rows on the child side of a relation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cardinality {
	Single,
	Many,
}

/// What `remove` does to a child row detached from a collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemovePolicy {
	/// Drop the edge only (unlink, or null the foreign key)
	Detach,
	/// Delete the child row
	Delete,
}

impl RemovePolicy {
	/// Policy used when a field does not configure one
	///
	/// Many-to-many and nullable reverse foreign keys detach; a non-nullable
	/// reverse foreign key cannot be detached, so its rows are deleted.
	pub fn default_for(kind: &EdgeKind) -> Self {
		match kind {
			EdgeKind::ManyToMany => RemovePolicy::Detach,
			EdgeKind::ReverseForeignKey { nullable: true, .. } => RemovePolicy::Detach,
			EdgeKind::ReverseForeignKey { nullable: false, .. } => RemovePolicy::Delete,
		}
	}
}

/// Scalar type of a plain field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldType {
	String { max_length: Option<usize> },
	Integer,
	Float,
	Boolean,
	/// Any JSON value, stored as given
	Json,
}

impl FieldType {
	pub fn string() -> Self {
		FieldType::String { max_length: None }
	}

	pub fn string_max(max_length: usize) -> Self {
		FieldType::String {
			max_length: Some(max_length),
		}
	}

	/// Coerce a non-null value to this type
	pub fn coerce(&self, field: &str, value: &Value) -> Result<Value, FieldError> {
		match self {
			FieldType::String { max_length } => {
				let text = match value {
					Value::String(s) => s.clone(),
					Value::Number(n) => n.to_string(),
					_ => return Err(FieldError::invalid(field, "Not a valid string.")),
				};
				if let Some(max) = max_length {
					if text.chars().count() > *max {
						return Err(FieldError::invalid(
							field,
							format!("Ensure this field has no more than {} characters.", max),
						));
					}
				}
				Ok(Value::String(text))
			}
			FieldType::Integer => {
				let parsed = match value {
					Value::Number(n) => n.as_i64().or_else(|| n.as_f64().and_then(whole_i64)),
					Value::String(s) => s.trim().parse::<i64>().ok(),
					_ => None,
				};
				parsed
					.map(Value::from)
					.ok_or_else(|| FieldError::invalid(field, "A valid integer is required."))
			}
			FieldType::Float => {
				let parsed = match value {
					Value::Number(n) => n.as_f64(),
					Value::String(s) => s.trim().parse::<f64>().ok(),
					_ => None,
				};
				parsed
					.and_then(serde_json::Number::from_f64)
					.map(Value::Number)
					.ok_or_else(|| FieldError::invalid(field, "A valid number is required."))
			}
			FieldType::Boolean => {
				let parsed = match value {
					Value::Bool(b) => Some(*b),
					Value::Number(n) => match n.as_i64() {
						Some(1) => Some(true),
						Some(0) => Some(false),
						_ => None,
					},
					Value::String(s) => match s.to_ascii_lowercase().as_str() {
						"true" | "1" | "yes" | "on" => Some(true),
						"false" | "0" | "no" | "off" => Some(false),
						_ => None,
					},
					_ => None,
				};
				parsed
					.map(Value::Bool)
					.ok_or_else(|| FieldError::invalid(field, "Must be a valid boolean."))
			}
			FieldType::Json => Ok(value.clone()),
		}
	}
}

/// `f` as an `i64` when it is a whole number inside the `i64` range
fn whole_i64(f: f64) -> Option<i64> {
	// i64::MAX is not representable as f64; 2^63 is the first value past it.
	const LIMIT: f64 = 9_223_372_036_854_775_808.0;
	(f.fract() == 0.0 && (-LIMIT..LIMIT).contains(&f)).then_some(f as i64)
}

/// The classification tag of a field
#[derive(Debug, Clone)]
pub enum FieldKind {
	Plain(FieldType),
	RefSingle(NestedField),
	RefMany(NestedField),
	WriteSingle(NestedField),
	WriteMany(NestedField),
}

impl FieldKind {
	/// `None` for plain fields
	pub fn policy(&self) -> Option<RelationPolicy> {
		match self {
			FieldKind::Plain(_) => None,
			FieldKind::RefSingle(_) | FieldKind::RefMany(_) => Some(RelationPolicy::ByReference),
			FieldKind::WriteSingle(_) | FieldKind::WriteMany(_) => Some(RelationPolicy::WriteThrough),
		}
	}

	/// `None` for plain fields
	pub fn cardinality(&self) -> Option<Cardinality> {
		match self {
			FieldKind::Plain(_) => None,
			FieldKind::RefSingle(_) | FieldKind::WriteSingle(_) => Some(Cardinality::Single),
			FieldKind::RefMany(_) | FieldKind::WriteMany(_) => Some(Cardinality::Many),
		}
	}

	pub fn nested(&self) -> Option<&NestedField> {
		match self {
			FieldKind::Plain(_) => None,
			FieldKind::RefSingle(n)
			| FieldKind::RefMany(n)
			| FieldKind::WriteSingle(n)
			| FieldKind::WriteMany(n) => Some(n),
		}
	}

	fn nested_mut(&mut self) -> Option<&mut NestedField> {
		match self {
			FieldKind::Plain(_) => None,
			FieldKind::RefSingle(n)
			| FieldKind::RefMany(n)
			| FieldKind::WriteSingle(n)
			| FieldKind::WriteMany(n) => Some(n),
		}
	}
}

/// Declaration of one field on a resource
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use reinhardt_nested_writes::{FieldSpec, FieldType, RelationPolicy, ResourceDescriptor};
///
/// let book = Arc::new(
///     ResourceDescriptor::builder("BookResource", "book")
///         .field("title", FieldSpec::plain(FieldType::string_max(100)))
///         .build(),
/// );
/// let books = FieldSpec::write_many(book).through("course_books");
/// assert_eq!(books.kind.policy(), Some(RelationPolicy::WriteThrough));
/// assert!(!books.required);
/// ```
#[derive(Debug, Clone)]
pub struct FieldSpec {
	pub kind: FieldKind,
	pub required: bool,
	pub read_only: bool,
	pub allow_null: bool,
}

impl FieldSpec {
	fn with_kind(kind: FieldKind, required: bool) -> Self {
		Self {
			kind,
			required,
			read_only: false,
			allow_null: false,
		}
	}

	/// Required scalar attribute
	pub fn plain(field_type: FieldType) -> Self {
		Self::with_kind(FieldKind::Plain(field_type), true)
	}

	/// Required single relation given by primary key
	pub fn ref_single(child: Arc<ResourceDescriptor>) -> Self {
		Self::with_kind(FieldKind::RefSingle(NestedField::new(child)), true)
	}

	/// Required single relation given by child payload
	pub fn write_single(child: Arc<ResourceDescriptor>) -> Self {
		Self::with_kind(FieldKind::WriteSingle(NestedField::new(child)), true)
	}

	/// Optional collection relation given by primary keys
	pub fn ref_many(child: Arc<ResourceDescriptor>) -> Self {
		Self::with_kind(FieldKind::RefMany(NestedField::new(child)), false)
	}

	/// Optional collection relation given by child payloads
	pub fn write_many(child: Arc<ResourceDescriptor>) -> Self {
		Self::with_kind(FieldKind::WriteMany(NestedField::new(child)), false)
	}

	pub fn optional(mut self) -> Self {
		self.required = false;
		self
	}

	pub fn required(mut self) -> Self {
		self.required = true;
		self
	}

	pub fn nullable(mut self) -> Self {
		self.allow_null = true;
		self
	}

	/// Rendered on output, ignored on input
	pub fn read_only(mut self) -> Self {
		self.read_only = true;
		self.required = false;
		self
	}

	/// Store a collection in the named many-to-many through table
	pub fn through(mut self, table: impl Into<String>) -> Self {
		if let Some(nested) = self.kind.nested_mut() {
			nested.set_edge(Some(table.into()), EdgeKind::ManyToMany);
		}
		self
	}

	/// Store a collection as a foreign key `column` on the child rows
	pub fn reverse_fk(mut self, column: impl Into<String>, nullable: bool) -> Self {
		if let Some(nested) = self.kind.nested_mut() {
			nested.set_edge(
				None,
				EdgeKind::ReverseForeignKey {
					column: column.into(),
					nullable,
				},
			);
		}
		self
	}

	/// Override what `remove` does to detached child rows
	pub fn on_remove(mut self, policy: RemovePolicy) -> Self {
		if let Some(nested) = self.kind.nested_mut() {
			nested.set_remove_policy(policy);
		}
		self
	}

	/// Whether a missing or null value counts as "no change"
	pub(crate) fn accepts_empty(&self) -> bool {
		!self.required || self.allow_null
	}
}
