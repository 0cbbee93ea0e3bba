//! Nested write settings

use serde::{Deserialize, Serialize};

/// Default limit on how deep child payloads may nest
pub const DEFAULT_MAX_DEPTH: usize = 10;

/// Tunables for [`NestedWriter`](crate::NestedWriter)
///
/// # Examples
///
/// ```
/// use reinhardt_nested_writes::NestedWriteSettings;
///
/// let settings = NestedWriteSettings::from_toml_str("max_depth = 3").unwrap();
/// assert_eq!(settings.max_depth, 3);
/// assert!(!settings.strict_fields);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NestedWriteSettings {
	/// Maximum nesting depth of child payloads
	pub max_depth: usize,
	/// Reject payload keys that are not declared on the resource
	pub strict_fields: bool,
}

impl Default for NestedWriteSettings {
	fn default() -> Self {
		Self {
			max_depth: DEFAULT_MAX_DEPTH,
			strict_fields: false,
		}
	}
}

/// Errors raised while loading settings
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
	#[error("Invalid nested write settings: {0}")]
	Toml(#[from] toml::de::Error),
}

impl NestedWriteSettings {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_max_depth(mut self, max_depth: usize) -> Self {
		self.max_depth = max_depth;
		self
	}

	pub fn with_strict_fields(mut self, strict: bool) -> Self {
		self.strict_fields = strict;
		self
	}

	/// Parse settings from TOML; missing keys keep their defaults
	pub fn from_toml_str(source: &str) -> Result<Self, SettingsError> {
		Ok(toml::from_str(source)?)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	fn test_defaults() {
		let settings = NestedWriteSettings::new();
		assert_eq!(settings.max_depth, DEFAULT_MAX_DEPTH);
		assert!(!settings.strict_fields);
	}

	#[rstest]
	fn test_from_toml_overrides() {
		let settings =
			NestedWriteSettings::from_toml_str("max_depth = 4\nstrict_fields = true").unwrap();
		assert_eq!(
			settings,
			NestedWriteSettings::new()
				.with_max_depth(4)
				.with_strict_fields(true)
		);
	}

	#[rstest]
	fn test_from_empty_toml_is_default() {
		assert_eq!(
			NestedWriteSettings::from_toml_str("").unwrap(),
			NestedWriteSettings::default()
		);
	}

	#[rstest]
	fn test_from_toml_rejects_wrong_types() {
		let err = NestedWriteSettings::from_toml_str("max_depth = \"deep\"").unwrap_err();
		assert!(err.to_string().starts_with("Invalid nested write settings"));
	}

	#[rstest]
	fn test_from_toml_rejects_unknown_keys() {
		assert!(NestedWriteSettings::from_toml_str("max_dept = 4").is_err());
	}
}
