//! Per-call context threaded through nested validation and saves

use crate::error::SerializerError;
use crate::settings::NestedSettings;

/// Depth tracking and behaviour switches for one top-level call
///
/// Every nested field descends through [`child_context`](Self::child_context),
/// which enforces the depth limit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NestedContext {
	depth: usize,
	max_depth: usize,
	strict_references: bool,
	partial: bool,
}

impl NestedContext {
	/// Create a top-level context with default settings
	///
	/// # Examples
	///
	/// ```
	/// use reinhardt_nested_serializers::NestedContext;
	///
	/// let context = NestedContext::new();
	/// assert_eq!(context.depth(), 0);
	/// assert_eq!(context.max_depth(), 10);
	/// ```
	pub fn new() -> Self {
		Self::from_settings(&NestedSettings::default())
	}

	pub fn from_settings(settings: &NestedSettings) -> Self {
		Self {
			depth: 0,
			max_depth: settings.max_depth,
			strict_references: settings.strict_references,
			partial: false,
		}
	}

	/// Set maximum nesting depth
	pub fn with_max_depth(mut self, max_depth: usize) -> Self {
		self.max_depth = max_depth;
		self
	}

	/// Reject nested primary keys that match no current record
	pub fn with_strict_references(mut self, strict: bool) -> Self {
		self.strict_references = strict;
		self
	}

	/// Allow required fields to be omitted (partial update)
	pub fn with_partial(mut self, partial: bool) -> Self {
		self.partial = partial;
		self
	}

	pub fn depth(&self) -> usize {
		self.depth
	}

	pub fn max_depth(&self) -> usize {
		self.max_depth
	}

	pub fn is_strict(&self) -> bool {
		self.strict_references
	}

	pub fn is_partial(&self) -> bool {
		self.partial
	}

	/// Create a child context with incremented depth
	pub fn child_context(&self) -> Result<Self, SerializerError> {
		let child = Self {
			depth: self.depth + 1,
			..self.clone()
		};
		if child.depth > child.max_depth {
			return Err(SerializerError::DepthExceeded {
				max_depth: self.max_depth,
			});
		}
		Ok(child)
	}
}

impl Default for NestedContext {
	fn default() -> Self {
		Self::new()
	}
}
