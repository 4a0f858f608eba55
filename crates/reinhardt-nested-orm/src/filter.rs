//! Column filters used by lookups

use crate::record::Record;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Comparison applied by a [`Filter`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterOperator {
	Eq,
	Ne,
}

/// One `column <op> value` condition. A lookup matches when every filter matches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
	pub field: String,
	pub operator: FilterOperator,
	pub value: Value,
}

impl Filter {
	pub fn new(field: impl Into<String>, operator: FilterOperator, value: impl Into<Value>) -> Self {
		Self {
			field: field.into(),
			operator,
			value: value.into(),
		}
	}

	pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
		Self::new(field, FilterOperator::Eq, value)
	}

	pub fn ne(field: impl Into<String>, value: impl Into<Value>) -> Self {
		Self::new(field, FilterOperator::Ne, value)
	}

	/// Evaluate against a record whose primary key attribute is named `pk_name`
	pub fn matches(&self, record: &Record, pk_name: &str) -> bool {
		let actual = if self.field == pk_name {
			Value::from(record.pk())
		} else {
			record.get(&self.field).cloned().unwrap_or(Value::Null)
		};
		match self.operator {
			FilterOperator::Eq => actual == self.value,
			FilterOperator::Ne => actual != self.value,
		}
	}
}
