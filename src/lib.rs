//! Nested writes for Reinhardt-style resources.
//!
//! This crate lets a single write request create or update an object graph:
//! a parent row together with its foreign-key and many-to-many relations.
//!
//! - **Resources**: [`ResourceDescriptor`] declares the fields of one model,
//!   each tagged with a [`FieldKind`]
//! - **Relations**: a relation field is either by-reference (primary keys of
//!   existing rows) or write-through (child payloads), single or collection
//! - **Operations**: collections accept a bare list (full replace) or a
//!   mapping of [`Operation`]s: `add`, `create`, `remove`, `update`
//! - **Errors**: every failure is attributed to a field and rendered as a
//!   per-field message map by [`ValidationErrors::to_json`]
//!
//! # Quick Start
//!
//! ```
//! use std::sync::Arc;
//! use reinhardt_nested_writes::prelude::*;
//! use serde_json::json;
//!
//! let book = Arc::new(
//!     ResourceDescriptor::builder("BookResource", "book")
//!         .field("title", FieldSpec::plain(FieldType::string_max(50)))
//!         .build(),
//! );
//! let course = ResourceDescriptor::builder("CourseResource", "course")
//!     .field("name", FieldSpec::plain(FieldType::string()))
//!     .field("books", FieldSpec::ref_many(book).through("course_books"))
//!     .build();
//!
//! let store = InMemoryStore::new();
//! store.insert("book", 1, json!({"title": "Basic Data Structures"}));
//! let writer = NestedWriter::new(&store);
//!
//! // `remove` is not legal while creating
//! let errors = writer
//!     .create(&course, &json!({"name": "DS", "books": {"remove": [1]}}))
//!     .unwrap_err();
//! assert_eq!(
//!     errors.to_json(),
//!     json!({"books": ["'remove' is an invalid operation, allowed operations are 'add', 'create'"]})
//! );
//! assert_eq!(store.write_count(), 0);
//!
//! let row = writer
//!     .create(&course, &json!({"name": "DS", "books": {"add": [1]}}))
//!     .unwrap();
//! let rendered = course.to_representation(&store, &row).unwrap();
//! assert_eq!(rendered, json!({"name": "DS", "books": [{"title": "Basic Data Structures"}]}));
//! ```
//!
//! # Architecture
//!
//! - [`classify`] buckets the fields present in a payload
//! - [`NestedField`] validates relation values for the active [`WriteContext`]
//! - [`NestedWriter`] executes validated data against a [`ModelStore`]
//! - [`InMemoryStore`] is a reference store for tests and prototypes

pub mod classifier;
pub mod error;
pub mod field;
pub mod nested;
pub mod operation;
pub mod pk;
mod pretty;
pub mod prelude;
pub mod resource;
pub mod scope;
pub mod settings;
pub mod store;
pub mod writer;

// Re-export commonly used types at crate root
pub use classifier::{Classification, SimpleRelated, classify};
pub use error::{FieldError, NON_FIELD_ERRORS, NestedWriteResult, ValidationErrors};
pub use field::{Cardinality, FieldKind, FieldSpec, FieldType, RelationPolicy, RemovePolicy};
pub use nested::{NestedField, NestedValue, OperationValue, legal_operations};
pub use operation::{Operation, UnknownOperation, WriteContext};
pub use pk::PrimaryKey;
pub use resource::{ResourceBuilder, ResourceDescriptor, ValidatedData, ValidatedValue};
pub use scope::WriteScope;
pub use settings::{DEFAULT_MAX_DEPTH, NestedWriteSettings, SettingsError};
pub use store::{Edge, EdgeKind, InMemoryStore, ModelStore, Row, StoreError, StoreResult};
pub use writer::NestedWriter;
