//! Uniqueness checks deferred to save time
//!
//! While a nested list is validated, the generic pipeline only knows the
//! related collection, so its uniqueness validators cannot exclude the record
//! an item refers to. Serializers built with this capability take those
//! validators out of the pipeline and run them here, once per create or
//! update, against the record the item resolved to.

use crate::error::{SerializerError, ValidationErrors};
use crate::validators::{UniqueTogetherValidator, UniqueValidator, ValidatedData};
use reinhardt_nested_orm::{Attrs, Database, Record};

/// Validators extracted from the pipeline at build time
#[derive(Debug, Clone, Default)]
pub struct UniquenessRevalidator {
	unique_fields: Vec<UniqueValidator>,
	unique_together: Vec<UniqueTogetherValidator>,
}

impl UniquenessRevalidator {
	pub fn new(
		unique_fields: Vec<UniqueValidator>,
		unique_together: Vec<UniqueTogetherValidator>,
	) -> Self {
		Self {
			unique_fields,
			unique_together,
		}
	}

	pub fn unique_fields(&self) -> &[UniqueValidator] {
		&self.unique_fields
	}

	pub fn unique_together(&self) -> &[UniqueTogetherValidator] {
		&self.unique_together
	}

	/// Run every extracted validator against the record being written
	///
	/// `data` is the validated payload keyed by field name, `attrs` the
	/// column values about to be stored (including foreign keys pointing at a
	/// parent) and `instance` the resolved current record, absent on create.
	/// Field errors are collected before unique-together errors are added.
	pub async fn revalidate(
		&self,
		db: &dyn Database,
		data: &ValidatedData,
		attrs: &Attrs,
		instance: Option<&Record>,
	) -> Result<(), SerializerError> {
		let mut errors = ValidationErrors::new();
		let exclude_pk = instance.map(Record::pk);

		for validator in &self.unique_fields {
			let Some(value) = data.get(validator.field_name()) else {
				continue;
			};
			match validator.validate(db, value, exclude_pk).await {
				Ok(()) => {}
				Err(SerializerError::Validation(field_errors)) => errors.merge(field_errors),
				Err(other) => return Err(other),
			}
		}

		for validator in &self.unique_together {
			match validator.validate(db, attrs, instance).await {
				Ok(()) => {}
				Err(SerializerError::Validation(set_errors)) => errors.merge(set_errors),
				Err(other) => return Err(other),
			}
		}

		if errors.is_empty() {
			Ok(())
		} else {
			Err(errors.into())
		}
	}
}
