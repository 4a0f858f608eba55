//! Validators that run inside the validation pipeline
//!
//! Uniqueness validators query the database and take the primary key of the
//! record being edited so that the record never conflicts with itself.

use crate::error::{NON_FIELD_ERRORS, SerializerError, ValidationErrors};
use reinhardt_nested_orm::{Attrs, Database, Filter, ModelMeta, Record};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

/// Validated payload of one serializer, keyed by field name
pub type ValidatedData = Map<String, Value>;

/// Checks that a column value is not used by another record
#[derive(Debug, Clone, PartialEq)]
pub struct UniqueValidator {
	model: String,
	pk_name: String,
	field_name: String,
	column: String,
	message: Option<String>,
}

impl UniqueValidator {
	/// Validator for `field_name`, stored in `column` of `meta`'s model
	pub fn new(meta: &ModelMeta, field_name: impl Into<String>, column: impl Into<String>) -> Self {
		Self {
			model: meta.name().to_string(),
			pk_name: meta.pk_name().to_string(),
			field_name: field_name.into(),
			column: column.into(),
			message: None,
		}
	}

	/// Set a custom error message
	pub fn with_message(mut self, message: impl Into<String>) -> Self {
		self.message = Some(message.into());
		self
	}

	pub fn field_name(&self) -> &str {
		&self.field_name
	}

	pub fn column(&self) -> &str {
		&self.column
	}

	pub fn message(&self) -> &str {
		self.message.as_deref().unwrap_or("This field must be unique.")
	}

	/// Fail when another record (other than `exclude_pk`) holds `value`
	///
	/// NULL never conflicts.
	pub async fn validate(
		&self,
		db: &dyn Database,
		value: &Value,
		exclude_pk: Option<i64>,
	) -> Result<(), SerializerError> {
		if value.is_null() {
			return Ok(());
		}
		let mut filters = vec![Filter::eq(self.column.as_str(), value.clone())];
		if let Some(pk) = exclude_pk {
			filters.push(Filter::ne(self.pk_name.as_str(), pk));
		}
		if db.exists(&self.model, &filters).await? {
			tracing::debug!(model = %self.model, field = %self.field_name, "unique constraint violated");
			return Err(ValidationErrors::single(&self.field_name, self.message()).into());
		}
		Ok(())
	}
}

/// Checks that a combination of columns is not used by another record
#[derive(Debug, Clone, PartialEq)]
pub struct UniqueTogetherValidator {
	model: String,
	pk_name: String,
	field_names: Vec<String>,
	columns: Vec<String>,
	message: Option<String>,
}

impl UniqueTogetherValidator {
	/// `fields` pairs each field name with the column it is stored in
	pub fn new<I, F, C>(meta: &ModelMeta, fields: I) -> Self
	where
		I: IntoIterator<Item = (F, C)>,
		F: Into<String>,
		C: Into<String>,
	{
		let (field_names, columns) = fields
			.into_iter()
			.map(|(field, column)| (field.into(), column.into()))
			.unzip();
		Self {
			model: meta.name().to_string(),
			pk_name: meta.pk_name().to_string(),
			field_names,
			columns,
			message: None,
		}
	}

	pub fn with_message(mut self, message: impl Into<String>) -> Self {
		self.message = Some(message.into());
		self
	}

	pub fn field_names(&self) -> &[String] {
		&self.field_names
	}

	pub fn columns(&self) -> &[String] {
		&self.columns
	}

	pub fn message(&self) -> String {
		self.message.clone().unwrap_or_else(|| {
			format!(
				"The fields {} must make a unique set.",
				self.field_names.join(", ")
			)
		})
	}

	/// Fail when another record shares every column value
	///
	/// `attrs` is keyed by column. Columns missing from `attrs` are taken from
	/// `instance`; when any value is still missing or NULL the check is skipped.
	pub async fn validate(
		&self,
		db: &dyn Database,
		attrs: &Attrs,
		instance: Option<&Record>,
	) -> Result<(), SerializerError> {
		let mut filters = Vec::with_capacity(self.columns.len() + 1);
		for column in &self.columns {
			let value = attrs
				.get(column)
				.or_else(|| instance.and_then(|record| record.get(column)));
			match value {
				Some(value) if !value.is_null() => {
					filters.push(Filter::eq(column.as_str(), value.clone()))
				}
				_ => return Ok(()),
			}
		}
		if let Some(record) = instance {
			filters.push(Filter::ne(self.pk_name.as_str(), record.pk()));
		}
		if db.exists(&self.model, &filters).await? {
			tracing::debug!(model = %self.model, fields = ?self.field_names, "unique together constraint violated");
			return Err(ValidationErrors::single(NON_FIELD_ERRORS, self.message()).into());
		}
		Ok(())
	}
}

type FieldCheck = dyn Fn(&Value) -> Result<(), String> + Send + Sync;

/// Custom check on a single field value
#[derive(Clone)]
pub struct FieldValidator {
	check: Arc<FieldCheck>,
}

impl FieldValidator {
	pub fn new<F>(check: F) -> Self
	where
		F: Fn(&Value) -> Result<(), String> + Send + Sync + 'static,
	{
		Self {
			check: Arc::new(check),
		}
	}

	pub fn validate(&self, value: &Value) -> Result<(), String> {
		(self.check)(value)
	}
}

impl fmt::Debug for FieldValidator {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("FieldValidator").finish_non_exhaustive()
	}
}

type ObjectCheck = dyn Fn(&ValidatedData, Option<&Record>) -> Result<(), ValidationErrors> + Send + Sync;

/// Custom check on a whole validated payload
///
/// The second argument is the record being edited. Inside a nested list it
/// is the item's own record, never the related collection.
#[derive(Clone)]
pub struct ObjectValidator {
	check: Arc<ObjectCheck>,
}

impl ObjectValidator {
	pub fn new<F>(check: F) -> Self
	where
		F: Fn(&ValidatedData, Option<&Record>) -> Result<(), ValidationErrors>
			+ Send
			+ Sync
			+ 'static,
	{
		Self {
			check: Arc::new(check),
		}
	}

	pub fn validate(
		&self,
		data: &ValidatedData,
		instance: Option<&Record>,
	) -> Result<(), ValidationErrors> {
		(self.check)(data, instance)
	}
}

impl fmt::Debug for ObjectValidator {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ObjectValidator").finish_non_exhaustive()
	}
}

/// Database-backed validators of one serializer
///
/// Validators stay here while the generic pipeline owns them. The uniqueness
/// capability takes them out with the `take_*` methods when the serializer is
/// built.
#[derive(Debug, Clone, Default)]
pub struct ValidatorConfig {
	unique_validators: Vec<UniqueValidator>,
	unique_together_validators: Vec<UniqueTogetherValidator>,
}

impl ValidatorConfig {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn add_unique_validator(&mut self, validator: UniqueValidator) {
		self.unique_validators.push(validator);
	}

	pub fn add_unique_together_validator(&mut self, validator: UniqueTogetherValidator) {
		self.unique_together_validators.push(validator);
	}

	pub fn unique_validators(&self) -> &[UniqueValidator] {
		&self.unique_validators
	}

	pub fn unique_together_validators(&self) -> &[UniqueTogetherValidator] {
		&self.unique_together_validators
	}

	/// Remove and return every field-level unique validator
	pub fn take_unique_validators(&mut self) -> Vec<UniqueValidator> {
		std::mem::take(&mut self.unique_validators)
	}

	/// Remove and return every unique-together validator
	pub fn take_unique_together_validators(&mut self) -> Vec<UniqueTogetherValidator> {
		std::mem::take(&mut self.unique_together_validators)
	}

	pub fn has_validators(&self) -> bool {
		!self.unique_validators.is_empty() || !self.unique_together_validators.is_empty()
	}
}
