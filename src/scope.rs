//! Per-call write scope

use crate::error::FieldError;
use crate::operation::WriteContext;
use crate::settings::NestedWriteSettings;
use crate::store::{ModelStore, Row};

/// Everything validation needs besides the payload
///
/// The write context travels explicitly with every validation call; nested
/// payloads get a scope one level deeper through [`WriteScope::descend`].
/// Update scopes carry the row being updated so write-through single
/// relations can tell an existing child from one that will be created.
#[derive(Clone, Copy)]
pub struct WriteScope<'a> {
	pub store: &'a dyn ModelStore,
	pub context: WriteContext,
	pub settings: &'a NestedWriteSettings,
	depth: usize,
	instance: Option<&'a Row>,
}

impl<'a> WriteScope<'a> {
	pub fn new(
		store: &'a dyn ModelStore,
		context: WriteContext,
		settings: &'a NestedWriteSettings,
	) -> Self {
		Self {
			store,
			context,
			settings,
			depth: 0,
			instance: None,
		}
	}

	/// The same scope, validating changes to `instance`
	pub fn with_instance<'b>(self, instance: Option<&'b Row>) -> WriteScope<'b>
	where
		'a: 'b,
	{
		WriteScope {
			store: self.store,
			context: self.context,
			settings: self.settings,
			depth: self.depth,
			instance,
		}
	}

	/// The row being updated, if known
	pub fn instance(&self) -> Option<&'a Row> {
		self.instance
	}

	/// Nesting level, 0 for the top-level payload
	pub fn depth(&self) -> usize {
		self.depth
	}

	/// Scope for a child payload under `field`, in `context`
	///
	/// The child scope starts without an instance.
	pub fn descend(&self, field: &str, context: WriteContext) -> Result<Self, FieldError> {
		let depth = self.depth + 1;
		if depth > self.settings.max_depth {
			return Err(FieldError::invalid(
				field,
				format!("Maximum nesting depth {} exceeded", self.settings.max_depth),
			));
		}
		Ok(Self {
			context,
			depth,
			instance: None,
			..*self
		})
	}
}

impl std::fmt::Debug for WriteScope<'_> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("WriteScope")
			.field("context", &self.context)
			.field("depth", &self.depth)
			.field("instance", &self.instance.map(|row| &row.pk))
			.field("settings", self.settings)
			.finish_non_exhaustive()
	}
}
