//! Persisted records

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Column name to value mapping used for inserts, updates and record storage
pub type Attrs = Map<String, Value>;

/// A persisted row of some registered model
///
/// The primary key is kept apart from the scalar attributes so that it can
/// never be overwritten by an update payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
	model: String,
	pk: i64,
	attrs: Attrs,
}

impl Record {
	/// Create a record value. Backends call this after assigning a primary key.
	pub fn new(model: impl Into<String>, pk: i64, attrs: Attrs) -> Self {
		Self {
			model: model.into(),
			pk,
			attrs,
		}
	}

	/// Name of the model this record belongs to
	pub fn model(&self) -> &str {
		&self.model
	}

	/// Primary key value
	pub fn pk(&self) -> i64 {
		self.pk
	}

	/// Read a column value
	pub fn get(&self, column: &str) -> Option<&Value> {
		self.attrs.get(column)
	}

	/// Read an integer column, typically a foreign key
	pub fn get_i64(&self, column: &str) -> Option<i64> {
		self.attrs.get(column).and_then(Value::as_i64)
	}

	/// Read a string column
	pub fn get_str(&self, column: &str) -> Option<&str> {
		self.attrs.get(column).and_then(Value::as_str)
	}

	/// All non primary key columns
	pub fn attrs(&self) -> &Attrs {
		&self.attrs
	}

	pub(crate) fn attrs_mut(&mut self) -> &mut Attrs {
		&mut self.attrs
	}

	/// Render the record as a JSON object with the primary key stored under `pk_name`
	pub fn to_json(&self, pk_name: &str) -> Value {
		let mut object = self.attrs.clone();
		object.insert(pk_name.to_string(), Value::from(self.pk));
		Value::Object(object)
	}
}

/// Interpret a JSON value as a primary key
///
/// Integers and numeric strings are accepted, mirroring how form-encoded
/// payloads carry identifiers.
pub fn pk_from_value(value: &Value) -> Option<i64> {
	match value {
		Value::Number(n) => n.as_i64(),
		Value::String(s) => s.trim().parse().ok(),
		_ => None,
	}
}
