//! Commonly used items
//!
//! ```
//! use reinhardt_nested_writes::prelude::*;
//! ```

pub use crate::classifier::classify;
pub use crate::error::{FieldError, NestedWriteResult, ValidationErrors};
pub use crate::field::{FieldSpec, FieldType, RemovePolicy};
pub use crate::operation::{Operation, WriteContext};
pub use crate::pk::PrimaryKey;
pub use crate::resource::ResourceDescriptor;
pub use crate::settings::NestedWriteSettings;
pub use crate::store::{InMemoryStore, ModelStore, Row};
pub use crate::writer::NestedWriter;
