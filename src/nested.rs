//! Nested relation fields
//!
//! A [`NestedField`] wraps the child [`ResourceDescriptor`] of a relation and
//! validates what a payload asks to do with it. Validation never writes; it
//! resolves primary keys, checks operation keys against the legal set of the
//! current [`WriteContext`], and validates child payloads recursively.
//! The result is a [`NestedValue`] the writer executes later.

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::error::{FieldError, NestedWriteResult, ValidationErrors};
use crate::field::{FieldSpec, RelationPolicy, RemovePolicy};
use crate::operation::{Operation, WriteContext};
use crate::pk::PrimaryKey;
use crate::resource::{ResourceDescriptor, ValidatedData, json_type};
use crate::scope::WriteScope;
use crate::store::{Edge, EdgeKind, Row};

/// Operations a relation policy can express at all
const BY_REFERENCE_OPERATIONS: [Operation; 3] =
	[Operation::Add, Operation::Create, Operation::Remove];

/// Legal operation keys for a relation field in `context`
///
/// # Examples
///
/// ```
/// use reinhardt_nested_writes::{Operation, RelationPolicy, WriteContext, legal_operations};
///
/// assert_eq!(
///     legal_operations(RelationPolicy::ByReference, WriteContext::Update),
///     vec![Operation::Add, Operation::Create, Operation::Remove],
/// );
/// assert_eq!(
///     legal_operations(RelationPolicy::WriteThrough, WriteContext::Create),
///     vec![Operation::Add, Operation::Create],
/// );
/// ```
pub fn legal_operations(policy: RelationPolicy, context: WriteContext) -> Vec<Operation> {
	let supported: &[Operation] = match policy {
		RelationPolicy::ByReference => &BY_REFERENCE_OPERATIONS,
		RelationPolicy::WriteThrough => &Operation::ALL,
	};
	context
		.allowed_operations()
		.iter()
		.copied()
		.filter(|op| supported.contains(op))
		.collect()
}

/// One validated collection operation
#[derive(Debug, Clone, PartialEq)]
pub enum OperationValue {
	/// Attach existing rows
	Add(Vec<PrimaryKey>),
	/// Create rows from payloads and attach them
	Create(Vec<ValidatedData>),
	/// Detach (or delete) rows
	Remove(Vec<PrimaryKey>),
	/// Partially update existing rows
	Update(Vec<(PrimaryKey, ValidatedData)>),
}

impl OperationValue {
	pub fn operation(&self) -> Operation {
		match self {
			OperationValue::Add(_) => Operation::Add,
			OperationValue::Create(_) => Operation::Create,
			OperationValue::Remove(_) => Operation::Remove,
			OperationValue::Update(_) => Operation::Update,
		}
	}
}

/// Validated value of a relation field
#[derive(Debug, Clone, PartialEq)]
pub enum NestedValue {
	/// Single relation by primary key; `None` clears it
	Reference(Option<PrimaryKey>),
	/// Single relation given as a child payload
	Child(ValidatedData),
	/// Replace a collection with exactly these existing rows
	Replace(Vec<PrimaryKey>),
	/// Replace a collection with freshly created rows
	ReplaceWith(Vec<ValidatedData>),
	/// Collection operations in payload order
	Operations(Vec<OperationValue>),
}

/// The child side of a relation field
#[derive(Debug, Clone)]
pub struct NestedField {
	child: Arc<ResourceDescriptor>,
	through: Option<String>,
	edge_kind: EdgeKind,
	remove_policy: Option<RemovePolicy>,
}

impl NestedField {
	pub fn new(child: Arc<ResourceDescriptor>) -> Self {
		Self {
			child,
			through: None,
			edge_kind: EdgeKind::ManyToMany,
			remove_policy: None,
		}
	}

	pub fn child(&self) -> &ResourceDescriptor {
		&self.child
	}

	pub fn edge_kind(&self) -> &EdgeKind {
		&self.edge_kind
	}

	pub(crate) fn set_edge(&mut self, through: Option<String>, kind: EdgeKind) {
		self.through = through;
		self.edge_kind = kind;
	}

	pub(crate) fn set_remove_policy(&mut self, policy: RemovePolicy) {
		self.remove_policy = Some(policy);
	}

	/// What `remove` does to rows of this collection
	pub fn remove_policy(&self) -> RemovePolicy {
		self.remove_policy
			.unwrap_or_else(|| RemovePolicy::default_for(&self.edge_kind))
	}

	/// The collection edge from `parent_model` through `field`
	///
	/// Many-to-many edges without an explicit through table are named
	/// `{parent_model}_{field}`.
	pub fn edge(&self, parent_model: &str, field: &str) -> Edge {
		Edge {
			name: self
				.through
				.clone()
				.unwrap_or_else(|| format!("{}_{}", parent_model, field)),
			parent_model: parent_model.to_string(),
			child_model: self.child.model().to_string(),
			kind: self.edge_kind.clone(),
		}
	}

	pub fn validate_ref_single(
		&self,
		field: &str,
		spec: &FieldSpec,
		value: &Value,
		scope: &WriteScope<'_>,
	) -> NestedWriteResult<NestedValue> {
		if value.is_null() || value.as_str() == Some("") {
			return empty_single(field, spec);
		}
		let Some(pk) = PrimaryKey::from_value(value) else {
			return Err(FieldError::invalid(
				field,
				format!("Incorrect type. Expected pk value, received {}.", json_type(value)),
			)
			.into());
		};
		self.require_existing(field, std::slice::from_ref(&pk), scope)?;
		Ok(NestedValue::Reference(Some(pk)))
	}

	pub fn validate_write_single(
		&self,
		field: &str,
		spec: &FieldSpec,
		value: &Value,
		scope: &WriteScope<'_>,
	) -> NestedWriteResult<NestedValue> {
		if value.is_null() {
			return empty_single(field, spec);
		}
		// A child that does not exist yet will be created, so it gets the
		// full field rules even inside an update.
		let current = match scope.context {
			WriteContext::Create => None,
			WriteContext::Update => self.current_child(field, scope)?,
		};
		let context = match current {
			Some(_) => WriteContext::Update,
			None => WriteContext::Create,
		};
		let child_scope = scope.descend(field, context)?.with_instance(current.as_ref());
		self.child
			.validate(value, &child_scope)
			.map(NestedValue::Child)
			.map_err(|errors| child_error(field, errors))
	}

	pub fn validate_ref_many(
		&self,
		field: &str,
		spec: &FieldSpec,
		value: &Value,
		scope: &WriteScope<'_>,
	) -> NestedWriteResult<NestedValue> {
		match value {
			Value::Null => empty_many(field, spec),
			Value::Array(_) => self.resolve_pks(field, value, scope).map(NestedValue::Replace),
			Value::Object(ops) => {
				self.validate_operations(field, ops, RelationPolicy::ByReference, scope)
			}
			other => Err(FieldError::shape(
				field,
				format!(
					"Expected a list of primary keys or a dict of operations but got type \"{}\".",
					json_type(other)
				),
			)
			.into()),
		}
	}

	pub fn validate_write_many(
		&self,
		field: &str,
		spec: &FieldSpec,
		value: &Value,
		scope: &WriteScope<'_>,
	) -> NestedWriteResult<NestedValue> {
		match value {
			Value::Null => empty_many(field, spec),
			// Every row of a bare list is new, whatever the outer context.
			Value::Array(_) => self
				.validate_children(field, value, scope, None)
				.map(NestedValue::ReplaceWith),
			Value::Object(ops) => {
				self.validate_operations(field, ops, RelationPolicy::WriteThrough, scope)
			}
			other => Err(FieldError::shape(
				field,
				format!(
					"Expected a list of items or a dict of operations but got type \"{}\".",
					json_type(other)
				),
			)
			.into()),
		}
	}

	fn validate_operations(
		&self,
		field: &str,
		ops: &Map<String, Value>,
		policy: RelationPolicy,
		scope: &WriteScope<'_>,
	) -> NestedWriteResult<NestedValue> {
		let legal = legal_operations(policy, scope.context);
		let mut errors = ValidationErrors::new();
		let mut validated = Vec::with_capacity(ops.len());

		for (key, value) in ops {
			let Some(operation) = key.parse::<Operation>().ok().filter(|op| legal.contains(op))
			else {
				errors.push(FieldError::InvalidOperation {
					field: field.to_string(),
					operation: key.clone(),
					allowed: legal.clone(),
				});
				continue;
			};
			let result = match operation {
				Operation::Add => self.resolve_pks(field, value, scope).map(OperationValue::Add),
				Operation::Remove => self
					.resolve_pks(field, value, scope)
					.map(OperationValue::Remove),
				Operation::Create => self
					.validate_children(field, value, scope, Some(Operation::Create))
					.map(OperationValue::Create),
				Operation::Update => self
					.validate_updates(field, value, scope)
					.map(OperationValue::Update),
			};
			match result {
				Ok(op) => validated.push(op),
				Err(op_errors) => errors.extend(op_errors),
			}
		}

		errors.into_result(NestedValue::Operations(validated))
	}

	/// A list of primary keys, each resolving to a child row
	fn resolve_pks(
		&self,
		field: &str,
		value: &Value,
		scope: &WriteScope<'_>,
	) -> NestedWriteResult<Vec<PrimaryKey>> {
		let Value::Array(items) = value else {
			return Err(FieldError::shape(
				field,
				format!(
					"Expected a list of items but got type \"{}\".",
					json_type(value)
				),
			)
			.into());
		};

		let mut errors = ValidationErrors::new();
		let mut pks = Vec::with_capacity(items.len());
		for item in items {
			match PrimaryKey::from_value(item) {
				Some(pk) => pks.push(pk),
				None => errors.push(FieldError::invalid(
					field,
					format!("Incorrect type. Expected pk value, received {}.", json_type(item)),
				)),
			}
		}
		if !errors.is_empty() {
			return Err(errors);
		}

		self.require_existing(field, &pks, scope)?;
		Ok(pks)
	}

	/// A list of new child payloads
	///
	/// Item errors are keyed by list index, under the operation name when the
	/// list came from an operation mapping.
	fn validate_children(
		&self,
		field: &str,
		value: &Value,
		scope: &WriteScope<'_>,
		operation: Option<Operation>,
	) -> NestedWriteResult<Vec<ValidatedData>> {
		let Value::Array(items) = value else {
			return Err(FieldError::shape(
				field,
				format!(
					"Expected a list of items but got type \"{}\".",
					json_type(value)
				),
			)
			.into());
		};
		let child_scope = scope.descend(field, WriteContext::Create)?;

		let mut errors = ValidationErrors::new();
		let mut children = Vec::with_capacity(items.len());
		for (index, item) in items.iter().enumerate() {
			match self.child.validate(item, &child_scope) {
				Ok(data) => children.push(data),
				Err(item_errors) => errors.push(FieldError::Child {
					field: index.to_string(),
					errors: item_errors,
				}),
			}
		}

		if errors.is_empty() {
			return Ok(children);
		}
		let errors = match operation {
			Some(operation) => child_error(operation.as_str(), errors),
			None => errors,
		};
		Err(child_error(field, errors))
	}

	/// A mapping of primary key to partial child payload
	fn validate_updates(
		&self,
		field: &str,
		value: &Value,
		scope: &WriteScope<'_>,
	) -> NestedWriteResult<Vec<(PrimaryKey, ValidatedData)>> {
		let Value::Object(entries) = value else {
			return Err(FieldError::shape(
				field,
				format!(
					"Expected a dict of form {{pk: data}} for 'update' but got type \"{}\".",
					json_type(value)
				),
			)
			.into());
		};

		let pks: Vec<PrimaryKey> = entries.keys().map(|key| PrimaryKey::from_key(key)).collect();
		let mut errors = ValidationErrors::new();
		{
			let mut seen = HashSet::new();
			for pk in pks.iter().filter(|pk| !seen.insert(*pk)) {
				errors.push(FieldError::invalid(
					field,
					format!("Duplicate pk \"{}\" in 'update'.", pk),
				));
			}
		}
		if !errors.is_empty() {
			return Err(errors);
		}

		self.require_existing(field, &pks, scope)?;
		let rows = scope
			.store
			.filter(self.child.model(), &pks)
			.map_err(|err| FieldError::persistence(field, err))?;
		let child_scope = scope.descend(field, WriteContext::Update)?;

		let mut updates = Vec::with_capacity(entries.len());
		for (pk, (key, payload)) in pks.into_iter().zip(entries) {
			let instance = rows.iter().find(|row| row.pk == pk);
			match self.child.validate(payload, &child_scope.with_instance(instance)) {
				Ok(data) => updates.push((pk, data)),
				Err(item_errors) => errors.push(FieldError::Child {
					field: key.clone(),
					errors: item_errors,
				}),
			}
		}

		if errors.is_empty() {
			Ok(updates)
		} else {
			Err(child_error(field, child_error(Operation::Update.as_str(), errors)))
		}
	}

	/// The row a single relation on the scope's instance points at
	fn current_child(&self, field: &str, scope: &WriteScope<'_>) -> NestedWriteResult<Option<Row>> {
		let Some(pk) = scope.instance().and_then(|row| row.related_pk(field)) else {
			return Ok(None);
		};
		scope
			.store
			.get(self.child.model(), &pk)
			.map_err(|err| FieldError::persistence(field, err).into())
	}

	fn require_existing(
		&self,
		field: &str,
		pks: &[PrimaryKey],
		scope: &WriteScope<'_>,
	) -> NestedWriteResult<()> {
		if pks.is_empty() {
			return Ok(());
		}
		let missing = scope
			.store
			.missing(self.child.model(), pks)
			.map_err(|err| FieldError::persistence(field, err))?;

		let mut errors = ValidationErrors::new();
		errors.extend(missing.into_iter().map(|pk| FieldError::NotFound {
			field: field.to_string(),
			pk: pk.to_string(),
		}));
		errors.into_result(())
	}
}

fn child_error(field: &str, errors: ValidationErrors) -> ValidationErrors {
	FieldError::Child {
		field: field.to_string(),
		errors,
	}
	.into()
}

fn empty_single(field: &str, spec: &FieldSpec) -> NestedWriteResult<NestedValue> {
	if spec.accepts_empty() {
		Ok(NestedValue::Reference(None))
	} else {
		Err(FieldError::invalid(field, "This field may not be null.").into())
	}
}

fn empty_many(field: &str, spec: &FieldSpec) -> NestedWriteResult<NestedValue> {
	if spec.accepts_empty() {
		Ok(NestedValue::Operations(Vec::new()))
	} else {
		Err(FieldError::invalid(field, "This field may not be null.").into())
	}
}
