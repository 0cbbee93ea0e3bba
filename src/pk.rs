//! Primary key values

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Primary key of a persisted row
///
/// Payloads carry keys as JSON numbers or strings, and mapping-shaped payloads
/// (`{"update": {"1": {...}}}`) can only carry them as object keys, so both
/// forms parse to the same value.
///
/// # Examples
///
/// ```
/// use reinhardt_nested_writes::PrimaryKey;
/// use serde_json::json;
///
/// assert_eq!(PrimaryKey::from_value(&json!(7)), Some(PrimaryKey::Int(7)));
/// assert_eq!(PrimaryKey::from_key("7"), PrimaryKey::Int(7));
/// assert_eq!(PrimaryKey::from_key("isbn-42"), PrimaryKey::Str("isbn-42".into()));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PrimaryKey {
	Int(i64),
	Str(String),
}

impl PrimaryKey {
	/// Parse a key from a JSON value
	///
	/// Returns `None` for values that cannot identify a row (null, booleans,
	/// floats, containers, empty strings).
	pub fn from_value(value: &Value) -> Option<Self> {
		match value {
			Value::Number(n) => n.as_i64().map(PrimaryKey::Int),
			Value::String(s) if !s.is_empty() => Some(Self::from_key(s)),
			_ => None,
		}
	}

	/// Parse a key from a mapping key
	pub fn from_key(key: &str) -> Self {
		key.parse::<i64>()
			.map(PrimaryKey::Int)
			.unwrap_or_else(|_| PrimaryKey::Str(key.to_string()))
	}

	/// The JSON form stored in parent attributes and rendered in output
	pub fn to_value(&self) -> Value {
		match self {
			PrimaryKey::Int(i) => Value::from(*i),
			PrimaryKey::Str(s) => Value::from(s.as_str()),
		}
	}
}

impl fmt::Display for PrimaryKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			PrimaryKey::Int(i) => write!(f, "{}", i),
			PrimaryKey::Str(s) => f.write_str(s),
		}
	}
}

impl From<i64> for PrimaryKey {
	fn from(value: i64) -> Self {
		PrimaryKey::Int(value)
	}
}

impl From<&str> for PrimaryKey {
	fn from(value: &str) -> Self {
		PrimaryKey::Str(value.to_string())
	}
}
