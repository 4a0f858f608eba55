//! Current-value resolution for nested list items
//!
//! A nested list field is validated and saved with the whole related set as
//! its current value. Per-record validators need the one record a payload item
//! refers to, so for the duration of a single item the collection is swapped
//! for that record (or for nothing, when the item is new) and swapped back
//! afterwards, on every exit path.

use crate::error::ValidationErrors;
use reinhardt_nested_orm::{Record, pk_from_value};
use serde_json::{Map, Value};

/// What a serializer is currently bound to
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CurrentValue {
	#[default]
	None,
	Record(Record),
	Collection(Vec<Record>),
}

impl CurrentValue {
	/// The bound record, if bound to exactly one
	pub fn as_record(&self) -> Option<&Record> {
		match self {
			Self::Record(record) => Some(record),
			_ => None,
		}
	}

	pub fn as_collection(&self) -> Option<&[Record]> {
		match self {
			Self::Collection(records) => Some(records),
			_ => None,
		}
	}

	pub fn is_none(&self) -> bool {
		matches!(self, Self::None)
	}

	pub fn is_collection(&self) -> bool {
		matches!(self, Self::Collection(_))
	}
}

impl From<Option<Record>> for CurrentValue {
	fn from(record: Option<Record>) -> Self {
		record.map_or(Self::None, Self::Record)
	}
}

/// Outcome of resolving a payload against a current value
#[derive(Debug, Clone, PartialEq)]
pub enum Resolved {
	/// The current value is not a collection and stays as it is
	Unchanged,
	/// The payload's primary key matched a record of the collection
	Found(Record),
	/// No record matched; `pk` is the unmatched key, if the payload had one
	Missing { pk: Option<i64> },
}

/// Resolve `payload` against `current` using the primary key attribute `pk_name`
pub fn resolve_current(
	current: &CurrentValue,
	payload: &Map<String, Value>,
	pk_name: &str,
) -> Resolved {
	let CurrentValue::Collection(records) = current else {
		return Resolved::Unchanged;
	};
	let Some(pk) = payload.get(pk_name).and_then(pk_from_value) else {
		return Resolved::Missing { pk: None };
	};
	match records.iter().find(|record| record.pk() == pk) {
		Some(record) => Resolved::Found(record.clone()),
		None => Resolved::Missing { pk: Some(pk) },
	}
}

/// Scoped substitution of a collection current value
///
/// Construction swaps the slot for the resolved record; dropping the guard
/// puts the original collection back.
#[derive(Debug)]
pub struct CurrentValueGuard<'a> {
	slot: &'a mut CurrentValue,
	original: Option<CurrentValue>,
}

impl<'a> CurrentValueGuard<'a> {
	/// Resolve `payload` against `slot` and substitute the result
	///
	/// With `strict` set, a primary key that matches no record of the
	/// collection is reported against the primary key field instead of
	/// falling back to creation.
	pub fn acquire(
		slot: &'a mut CurrentValue,
		payload: &Map<String, Value>,
		pk_name: &str,
		strict: bool,
	) -> Result<Self, ValidationErrors> {
		let resolved = match resolve_current(slot, payload, pk_name) {
			Resolved::Unchanged => return Ok(Self { slot, original: None }),
			Resolved::Found(record) => CurrentValue::Record(record),
			Resolved::Missing { pk: Some(pk) } if strict => {
				return Err(ValidationErrors::single(
					pk_name,
					format!("Invalid pk \"{}\" - object does not exist.", pk),
				));
			}
			Resolved::Missing { pk } => {
				tracing::trace!(?pk, "no current record matched, resolving to none");
				CurrentValue::None
			}
		};
		let original = std::mem::replace(slot, resolved);
		Ok(Self {
			slot,
			original: Some(original),
		})
	}

	/// The record the guarded call operates on
	pub fn instance(&self) -> Option<&Record> {
		self.slot.as_record()
	}

	pub fn current(&self) -> &CurrentValue {
		&*self.slot
	}

	/// The value the slot held before substitution
	pub fn original(&self) -> &CurrentValue {
		self.original.as_ref().unwrap_or(&*self.slot)
	}

	pub fn is_substituted(&self) -> bool {
		self.original.is_some()
	}
}

impl Drop for CurrentValueGuard<'_> {
	fn drop(&mut self) {
		if let Some(original) = self.original.take() {
			*self.slot = original;
		}
	}
}
