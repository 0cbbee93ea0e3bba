//! Resource descriptors
//!
//! A [`ResourceDescriptor`] maps field names to [`FieldSpec`]s for one model.
//! It validates incoming payloads into [`ValidatedData`] and renders stored
//! rows back to JSON, following relations through child descriptors.

use indexmap::IndexMap;
use serde_json::{Map, Value};

use crate::error::{FieldError, NestedWriteResult, ValidationErrors};
use crate::field::{FieldKind, FieldSpec};
use crate::nested::NestedValue;
use crate::scope::WriteScope;
use crate::store::{ModelStore, Row, StoreResult};

/// A validated field value
#[derive(Debug, Clone, PartialEq)]
pub enum ValidatedValue {
	Plain(Value),
	Nested(NestedValue),
}

/// Validated payload, in payload key order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidatedData {
	values: IndexMap<String, ValidatedValue>,
}

impl ValidatedData {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn insert(&mut self, field: impl Into<String>, value: ValidatedValue) {
		self.values.insert(field.into(), value);
	}

	pub fn get(&self, field: &str) -> Option<&ValidatedValue> {
		self.values.get(field)
	}

	/// Remove and return a field's value
	pub fn take(&mut self, field: &str) -> Option<ValidatedValue> {
		self.values.shift_remove(field)
	}

	pub fn keys(&self) -> impl Iterator<Item = &str> {
		self.values.keys().map(String::as_str)
	}

	pub fn len(&self) -> usize {
		self.values.len()
	}

	pub fn is_empty(&self) -> bool {
		self.values.is_empty()
	}
}

/// Describes how one model is read from and written to
#[derive(Debug)]
pub struct ResourceDescriptor {
	name: String,
	model: String,
	fields: IndexMap<String, FieldSpec>,
	output_fields: Option<Vec<String>>,
	pk_field: Option<String>,
}

/// Builder for [`ResourceDescriptor`]
#[derive(Debug)]
pub struct ResourceBuilder {
	inner: ResourceDescriptor,
}

impl ResourceBuilder {
	/// Declare a field; declaring the same name twice replaces it
	pub fn field(mut self, name: impl Into<String>, spec: FieldSpec) -> Self {
		self.inner.fields.insert(name.into(), spec);
		self
	}

	/// Restrict and order the fields rendered on output
	pub fn output_fields<I, S>(mut self, fields: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.inner.output_fields = Some(fields.into_iter().map(Into::into).collect());
		self
	}

	/// Render the row's primary key under `name`, before other fields
	pub fn pk_field(mut self, name: impl Into<String>) -> Self {
		self.inner.pk_field = Some(name.into());
		self
	}

	pub fn build(self) -> ResourceDescriptor {
		self.inner
	}
}

impl ResourceDescriptor {
	/// Start declaring a resource named `name` backed by `model`
	///
	/// # Examples
	///
	/// ```
	/// use reinhardt_nested_writes::{FieldSpec, FieldType, ResourceDescriptor};
	///
	/// let phone = ResourceDescriptor::builder("PhoneResource", "phone")
	///     .field("number", FieldSpec::plain(FieldType::string_max(15)))
	///     .field("type", FieldSpec::plain(FieldType::string()).optional())
	///     .build();
	/// assert_eq!(phone.model(), "phone");
	/// assert!(phone.field("number").unwrap().required);
	/// ```
	pub fn builder(name: impl Into<String>, model: impl Into<String>) -> ResourceBuilder {
		ResourceBuilder {
			inner: ResourceDescriptor {
				name: name.into(),
				model: model.into(),
				fields: IndexMap::new(),
				output_fields: None,
				pk_field: None,
			},
		}
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn model(&self) -> &str {
		&self.model
	}

	pub fn field(&self, name: &str) -> Option<&FieldSpec> {
		self.fields.get(name)
	}

	/// Declared field name as owned by the descriptor
	pub(crate) fn field_entry(&self, name: &str) -> Option<(&str, &FieldSpec)> {
		self.fields
			.get_key_value(name)
			.map(|(k, spec)| (k.as_str(), spec))
	}

	pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldSpec)> {
		self.fields.iter().map(|(k, spec)| (k.as_str(), spec))
	}

	/// Fields rendered on output, in output order
	pub fn output_fields(&self) -> Vec<(&str, &FieldSpec)> {
		match &self.output_fields {
			Some(names) => names
				.iter()
				.filter_map(|name| self.field_entry(name))
				.collect(),
			None => self.fields().collect(),
		}
	}

	/// Validate a payload for the scope's write context
	///
	/// Every present, writable field is validated; errors from all fields are
	/// collected. Required fields are enforced only outside partial (update)
	/// contexts. Undeclared keys are ignored unless
	/// [`strict_fields`](crate::NestedWriteSettings::strict_fields) is set.
	pub fn validate(&self, payload: &Value, scope: &WriteScope<'_>) -> NestedWriteResult<ValidatedData> {
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

		let mut errors = ValidationErrors::new();
		let mut data = ValidatedData::new();

		for (name, value) in map {
			let Some(spec) = self.fields.get(name) else {
				if scope.settings.strict_fields {
					errors.push(FieldError::invalid(name, "Unknown field."));
				} else {
					tracing::trace!(resource = %self.name, field = %name, "ignoring undeclared field");
				}
				continue;
			};
			if spec.read_only {
				tracing::trace!(resource = %self.name, field = %name, "ignoring read-only field");
				continue;
			}
			match self.validate_field(name, spec, value, scope) {
				Ok(validated) => data.insert(name.clone(), validated),
				Err(field_errors) => errors.extend(field_errors),
			}
		}

		if !scope.context.is_partial() {
			for (name, spec) in &self.fields {
				if spec.required && !spec.read_only && !map.contains_key(name) {
					errors.push(FieldError::invalid(name, "This field is required."));
				}
			}
		}

		errors.into_result(data)
	}

	fn validate_field(
		&self,
		name: &str,
		spec: &FieldSpec,
		value: &Value,
		scope: &WriteScope<'_>,
	) -> NestedWriteResult<ValidatedValue> {
		match &spec.kind {
			FieldKind::Plain(field_type) => {
				if value.is_null() {
					return if spec.allow_null {
						Ok(ValidatedValue::Plain(Value::Null))
					} else {
						Err(FieldError::invalid(name, "This field may not be null.").into())
					};
				}
				Ok(ValidatedValue::Plain(field_type.coerce(name, value)?))
			}
			FieldKind::RefSingle(nested) => nested
				.validate_ref_single(name, spec, value, scope)
				.map(ValidatedValue::Nested),
			FieldKind::WriteSingle(nested) => nested
				.validate_write_single(name, spec, value, scope)
				.map(ValidatedValue::Nested),
			FieldKind::RefMany(nested) => nested
				.validate_ref_many(name, spec, value, scope)
				.map(ValidatedValue::Nested),
			FieldKind::WriteMany(nested) => nested
				.validate_write_many(name, spec, value, scope)
				.map(ValidatedValue::Nested),
		}
	}

	/// Render a stored row, following relations through child descriptors
	///
	/// Single relations render as the child object (or `null`), collections as
	/// an array of child objects in edge order.
	pub fn to_representation(&self, store: &dyn ModelStore, row: &Row) -> StoreResult<Value> {
		let mut out = Map::new();
		if let Some(pk_field) = &self.pk_field {
			out.insert(pk_field.clone(), row.pk.to_value());
		}
		for (name, spec) in self.output_fields() {
			let value = match &spec.kind {
				FieldKind::Plain(_) => row.get(name).cloned().unwrap_or(Value::Null),
				FieldKind::RefSingle(nested) | FieldKind::WriteSingle(nested) => {
					let child = nested.child();
					match row.related_pk(name) {
						Some(pk) => match store.get(child.model(), &pk)? {
							Some(child_row) => child.to_representation(store, &child_row)?,
							None => Value::Null,
						},
						None => Value::Null,
					}
				}
				FieldKind::RefMany(nested) | FieldKind::WriteMany(nested) => {
					let child = nested.child();
					let edge = nested.edge(&self.model, name);
					let pks = store.related(&edge, &row.pk)?;
					let rows = store.filter(child.model(), &pks)?;
					let items = rows
						.iter()
						.map(|child_row| child.to_representation(store, child_row))
						.collect::<StoreResult<Vec<_>>>()?;
					Value::Array(items)
				}
			};
			out.insert(name.to_string(), value);
		}
		Ok(Value::Object(out))
	}
}

/// JSON type name used in error messages
pub(crate) fn json_type(value: &Value) -> &'static str {
	match value {
		Value::Null => "null",
		Value::Bool(_) => "boolean",
		Value::Number(_) => "number",
		Value::String(_) => "string",
		Value::Array(_) => "array",
		Value::Object(_) => "object",
	}
}
