//! Fields that may not be supplied when creating a record

use crate::error::{SerializerError, ValidationErrors};
use std::collections::BTreeSet;

/// Error key used for a rejected create
pub const NESTED_FIELD_ERROR_KEY: &str = "nested_field";

/// Message used for a rejected create
pub const NESTED_FIELD_ERROR_MESSAGE: &str = "Nested fields are not allowed on create.";

/// Per-serializer set of fields rejected on create
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ForbiddenFieldGuard {
	fields: BTreeSet<String>,
}

impl ForbiddenFieldGuard {
	pub fn new<I, S>(fields: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		Self {
			fields: fields.into_iter().map(Into::into).collect(),
		}
	}

	pub fn is_forbidden(&self, field_name: &str) -> bool {
		self.fields.contains(field_name)
	}

	pub fn is_empty(&self) -> bool {
		self.fields.is_empty()
	}

	/// Reject the whole create when any key is forbidden
	///
	/// A single grouped error is produced no matter how many keys match.
	pub fn check<'k>(&self, keys: impl IntoIterator<Item = &'k String>) -> Result<(), SerializerError> {
		let mut offending = keys.into_iter().filter(|key| self.is_forbidden(key)).peekable();
		if offending.peek().is_some() {
			tracing::debug!(fields = ?offending.collect::<Vec<_>>(), "forbidden fields supplied on create");
			return Err(
				ValidationErrors::single(NESTED_FIELD_ERROR_KEY, NESTED_FIELD_ERROR_MESSAGE).into(),
			);
		}
		Ok(())
	}
}
