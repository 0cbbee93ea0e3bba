//! rstest fixtures
//!
//! The seeded library:
//! - books 1 and 2 by S.Mobit
//! - course 1 (CS210) holding both books, course 2 (CS150) holding none
//! - student 1 enrolled in course 1 with phones 1 and 2

use std::sync::Arc;

use reinhardt_nested_writes::{
	InMemoryStore, ModelStore, NestedWriter, PrimaryKey, ResourceDescriptor, Row,
};
use rstest::fixture;
use serde_json::json;

use crate::resources::{self, BOOK, COURSE, COURSE_BOOKS, PHONE, STUDENT};

/// Store seeded with the sample library
#[fixture]
pub fn library_store() -> InMemoryStore {
	let store = InMemoryStore::new();
	store.insert(
		BOOK,
		1,
		json!({"title": "Advanced Data Structures", "author": "S.Mobit"}),
	);
	store.insert(
		BOOK,
		2,
		json!({"title": "Basic Data Structures", "author": "S.Mobit"}),
	);
	store.insert(COURSE, 1, json!({"name": "Data Structures", "code": "CS210"}));
	store.insert(COURSE, 2, json!({"name": "Programming", "code": "CS150"}));
	store.link(COURSE_BOOKS, BOOK, 1, &[PrimaryKey::Int(1), PrimaryKey::Int(2)]);
	store.insert(STUDENT, 1, json!({"name": "Yezy", "age": 24, "course": 1}));
	store.insert(
		PHONE,
		1,
		json!({"number": "076711110", "type": "Office", "student": 1}),
	);
	store.insert(
		PHONE,
		2,
		json!({"number": "073008880", "type": "Home", "student": 1}),
	);
	store
}

/// Writer over a freshly seeded library
#[fixture]
pub fn library(library_store: InMemoryStore) -> Library {
	Library {
		store: library_store,
	}
}

/// A seeded store plus shortcuts used across integration tests
#[derive(Debug)]
pub struct Library {
	pub store: InMemoryStore,
}

impl Library {
	pub fn writer(&self) -> NestedWriter<'_> {
		NestedWriter::new(&self.store)
	}

	pub fn row(&self, model: &str, id: i64) -> Row {
		row(&self.store, model, id)
	}

	/// Render a stored row through `resource`
	pub fn render(&self, resource: &Arc<ResourceDescriptor>, row: &Row) -> serde_json::Value {
		resource
			.to_representation(&self.store, row)
			.expect("row should render")
	}

	/// Render the current state of `model` row `id`
	pub fn render_pk(&self, resource: &Arc<ResourceDescriptor>, id: i64) -> serde_json::Value {
		let row = self.row(resource.model(), id);
		self.render(resource, &row)
	}

	/// Primary keys of the books attached to course `id`
	pub fn course_books(&self, id: i64) -> Vec<PrimaryKey> {
		let course = resources::writable_course();
		let edge = course
			.field("books")
			.and_then(|spec| spec.kind.nested())
			.map(|nested| nested.edge(COURSE, "books"))
			.expect("course declares books");
		self.store
			.related(&edge, &PrimaryKey::Int(id))
			.expect("related books")
	}
}

/// Fetch a row that must exist
pub fn row(store: &InMemoryStore, model: &str, id: i64) -> Row {
	store
		.get(model, &PrimaryKey::Int(id))
		.expect("store lookup")
		.unwrap_or_else(|| panic!("{} {} should exist", model, id))
}
