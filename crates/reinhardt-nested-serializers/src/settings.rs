//! Runtime settings for nested writes
//!
//! Settings are plain serde structs so they can live in the project's TOML
//! settings file, either at the top level or under a `[nested]` table:
//!
//! ```toml
//! [nested]
//! max_depth = 5
//! strict_references = true
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while loading [`NestedSettings`]
#[derive(Debug, Error)]
pub enum SettingsError {
	#[error("Invalid nested serializer settings: {0}")]
	Parse(#[from] toml::de::Error),

	#[error("max_depth must be at least 1")]
	InvalidMaxDepth,
}

/// Tunables shared by every nested serializer of a project
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NestedSettings {
	/// Deepest nesting level a payload may reach
	pub max_depth: usize,
	/// Report nested primary keys that match no current record instead of
	/// silently creating a new record
	pub strict_references: bool,
}

impl Default for NestedSettings {
	fn default() -> Self {
		Self {
			max_depth: 10,
			strict_references: false,
		}
	}
}

impl NestedSettings {
	/// Parse settings from a TOML document
	pub fn from_toml_str(source: &str) -> Result<Self, SettingsError> {
		let mut table: toml::Table = toml::from_str(source)?;
		let settings: Self = match table.remove("nested") {
			Some(section) => section.try_into()?,
			None => toml::Value::Table(table).try_into()?,
		};
		settings.validate()?;
		Ok(settings)
	}

	pub fn validate(&self) -> Result<(), SettingsError> {
		if self.max_depth == 0 {
			return Err(SettingsError::InvalidMaxDepth);
		}
		Ok(())
	}
}
