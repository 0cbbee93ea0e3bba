//! Partitioning of payload fields by relation kind

use crate::field::FieldKind;
use crate::resource::ResourceDescriptor;

/// Single-valued relation fields, split by policy
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SimpleRelated<'a> {
	pub replaceable: Vec<&'a str>,
	pub writable: Vec<&'a str>,
}

/// Present fields bucketed by how they are written
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Classification<'a> {
	pub plain: Vec<&'a str>,
	pub simple_related: SimpleRelated<'a>,
	pub many_related: Vec<&'a str>,
}

impl Classification<'_> {
	pub fn is_empty(&self) -> bool {
		self.plain.is_empty()
			&& self.simple_related.replaceable.is_empty()
			&& self.simple_related.writable.is_empty()
			&& self.many_related.is_empty()
	}
}

/// Bucket the given keys of `resource`
///
/// Only keys present in `keys` are bucketed, in their order. Keys the
/// resource does not declare and read-only fields are skipped.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use reinhardt_nested_writes::{FieldSpec, FieldType, ResourceDescriptor, classify};
///
/// let book = Arc::new(ResourceDescriptor::builder("BookResource", "book").build());
/// let course = ResourceDescriptor::builder("CourseResource", "course")
///     .field("name", FieldSpec::plain(FieldType::string()))
///     .field("books", FieldSpec::ref_many(book))
///     .build();
///
/// let classified = classify(&course, ["books", "name", "slug"]);
/// assert_eq!(classified.plain, vec!["name"]);
/// assert_eq!(classified.many_related, vec!["books"]);
/// ```
pub fn classify<'a, I, S>(resource: &'a ResourceDescriptor, keys: I) -> Classification<'a>
where
	I: IntoIterator<Item = S>,
	S: AsRef<str>,
{
	let mut out = Classification::default();
	for key in keys {
		let Some((name, spec)) = resource.field_entry(key.as_ref()) else {
			continue;
		};
		if spec.read_only {
			continue;
		}
		match &spec.kind {
			FieldKind::Plain(_) => out.plain.push(name),
			FieldKind::RefSingle(_) => out.simple_related.replaceable.push(name),
			FieldKind::WriteSingle(_) => out.simple_related.writable.push(name),
			FieldKind::RefMany(_) | FieldKind::WriteMany(_) => out.many_related.push(name),
		}
	}
	out
}
