//! Validation errors and serializer failures
//!
//! [`ValidationErrors`] mirrors the nesting of the payload: nested objects are
//! keyed by field name and list items by their position, so a failure deep in
//! a nested write can be traced back to the exact item that caused it.

use reinhardt_nested_orm::DatabaseError;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Key under which errors that belong to no single field are reported
pub const NON_FIELD_ERRORS: &str = "non_field_errors";

/// Errors attached to one field
#[derive(Debug, Clone, PartialEq)]
pub enum ErrorDetail {
	/// Plain messages for a scalar field or for the field as a whole
	Messages(Vec<String>),
	/// Errors of a single nested object
	Nested(ValidationErrors),
	/// Errors of the items of a nested list; items without errors are absent
	List {
		len: usize,
		items: BTreeMap<usize, ValidationErrors>,
	},
}

impl ErrorDetail {
	fn to_json(&self) -> Value {
		match self {
			Self::Messages(messages) => {
				Value::Array(messages.iter().cloned().map(Value::String).collect())
			}
			Self::Nested(errors) => errors.to_json(),
			Self::List { len, items } => Value::Array(
				(0..*len)
					.map(|index| {
						items
							.get(&index)
							.map(ValidationErrors::to_json)
							.unwrap_or_else(|| Value::Object(Map::new()))
					})
					.collect(),
			),
		}
	}
}

/// Field-path keyed validation errors
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ValidationErrors {
	fields: BTreeMap<String, ErrorDetail>,
}

impl ValidationErrors {
	pub fn new() -> Self {
		Self::default()
	}

	/// Errors holding a single message for `field`
	pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
		let mut errors = Self::new();
		errors.add(field, message);
		errors
	}

	/// Errors holding a single non-field message
	pub fn non_field(message: impl Into<String>) -> Self {
		Self::single(NON_FIELD_ERRORS, message)
	}

	pub fn is_empty(&self) -> bool {
		self.fields.is_empty()
	}

	/// Number of fields carrying errors
	pub fn len(&self) -> usize {
		self.fields.len()
	}

	/// Append a message to `field`
	pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
		let detail = self
			.fields
			.entry(field.into())
			.or_insert_with(|| ErrorDetail::Messages(Vec::new()));
		match detail {
			ErrorDetail::Messages(messages) => messages.push(message.into()),
			other => *other = ErrorDetail::Messages(vec![message.into()]),
		}
	}

	/// Attach the errors of a nested object under `field`
	pub fn set_nested(&mut self, field: impl Into<String>, errors: ValidationErrors) {
		if !errors.is_empty() {
			self.fields.insert(field.into(), ErrorDetail::Nested(errors));
		}
	}

	/// Attach the errors of list item `index` (of `len` items) under `field`
	pub fn set_item(
		&mut self,
		field: impl Into<String>,
		index: usize,
		len: usize,
		errors: ValidationErrors,
	) {
		if errors.is_empty() {
			return;
		}
		let detail = self.fields.entry(field.into()).or_insert_with(|| ErrorDetail::List {
			len,
			items: BTreeMap::new(),
		});
		match detail {
			ErrorDetail::List { items, len: current } => {
				*current = (*current).max(len);
				items.insert(index, errors);
			}
			other => {
				let mut items = BTreeMap::new();
				items.insert(index, errors);
				*other = ErrorDetail::List { len, items };
			}
		}
	}

	/// Merge another set of errors into this one
	pub fn merge(&mut self, other: ValidationErrors) {
		for (field, detail) in other.fields {
			if let (Some(ErrorDetail::Messages(existing)), ErrorDetail::Messages(messages)) =
				(self.fields.get_mut(&field), &detail)
			{
				existing.extend(messages.iter().cloned());
				continue;
			}
			self.fields.insert(field, detail);
		}
	}

	pub fn get(&self, field: &str) -> Option<&ErrorDetail> {
		self.fields.get(field)
	}

	pub fn contains(&self, field: &str) -> bool {
		self.fields.contains_key(field)
	}

	/// Messages attached directly to `field`
	pub fn messages(&self, field: &str) -> Option<&[String]> {
		match self.fields.get(field) {
			Some(ErrorDetail::Messages(messages)) => Some(messages),
			_ => None,
		}
	}

	/// Errors of the nested object under `field`
	pub fn nested(&self, field: &str) -> Option<&ValidationErrors> {
		match self.fields.get(field) {
			Some(ErrorDetail::Nested(errors)) => Some(errors),
			_ => None,
		}
	}

	/// Errors of list item `index` under `field`
	pub fn item(&self, field: &str, index: usize) -> Option<&ValidationErrors> {
		match self.fields.get(field) {
			Some(ErrorDetail::List { items, .. }) => items.get(&index),
			_ => None,
		}
	}

	pub fn field_names(&self) -> impl Iterator<Item = &str> {
		self.fields.keys().map(String::as_str)
	}

	/// Render in the `{"field": ["message"], "nested": {...}, "items": [{}, {...}]}` shape
	pub fn to_json(&self) -> Value {
		Value::Object(
			self.fields
				.iter()
				.map(|(field, detail)| (field.clone(), detail.to_json()))
				.collect(),
		)
	}
}

impl fmt::Display for ValidationErrors {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.to_json())
	}
}

/// Failures of validation and nested persistence
#[derive(Debug, Error)]
pub enum SerializerError {
	#[error("Validation failed: {0}")]
	Validation(ValidationErrors),

	#[error(transparent)]
	Database(#[from] DatabaseError),

	#[error("Maximum nesting depth {max_depth} exceeded")]
	DepthExceeded { max_depth: usize },

	#[error("Improperly configured: {0}")]
	ImproperlyConfigured(String),

	#[error("`is_valid()` must succeed before `save()` is called")]
	NotValidated,
}

impl From<ValidationErrors> for SerializerError {
	fn from(errors: ValidationErrors) -> Self {
		Self::Validation(errors)
	}
}

impl SerializerError {
	/// Re-key validation errors under a nested object field
	pub fn nested_under(self, field: &str) -> Self {
		match self {
			Self::Validation(errors) => {
				let mut wrapped = ValidationErrors::new();
				wrapped.set_nested(field, errors);
				Self::Validation(wrapped)
			}
			other => other,
		}
	}

	/// Re-key validation errors under item `index` of a nested list field
	pub fn at_index(self, field: &str, index: usize, len: usize) -> Self {
		match self {
			Self::Validation(errors) => {
				let mut wrapped = ValidationErrors::new();
				wrapped.set_item(field, index, len, errors);
				Self::Validation(wrapped)
			}
			other => other,
		}
	}

	pub fn validation_errors(&self) -> Option<&ValidationErrors> {
		match self {
			Self::Validation(errors) => Some(errors),
			_ => None,
		}
	}
}
