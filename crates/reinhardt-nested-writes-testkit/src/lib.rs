//! Testing support for `reinhardt-nested-writes`.
//!
//! - **Resources**: sample descriptors for a small library domain (books,
//!   courses, students, phones) in by-reference and write-through variants
//! - **Fixtures**: rstest fixtures that seed an
//!   [`InMemoryStore`](reinhardt_nested_writes::InMemoryStore) with that domain
//! - **Logging**: a `tracing` layer that records events for assertions
//!
//! # Example
//!
//! ```
//! use reinhardt_nested_writes::NestedWriter;
//! use reinhardt_nested_writes_testkit::{fixtures, resources};
//! use serde_json::json;
//!
//! let store = fixtures::library_store();
//! let course = resources::replaceable_course();
//! let row = NestedWriter::new(&store)
//!     .create(&course, &json!({"name": "Graphs", "code": "CS330", "books": [2]}))
//!     .unwrap();
//! assert_eq!(
//!     course.to_representation(&store, &row).unwrap(),
//!     json!({
//!         "name": "Graphs",
//!         "code": "CS330",
//!         "books": [{"title": "Basic Data Structures", "author": "S.Mobit"}]
//!     })
//! );
//! ```

pub mod fixtures;
pub mod logging;
pub mod resources;

pub use fixtures::{library_store, row};
pub use logging::{CapturedEvent, LogCapture};
