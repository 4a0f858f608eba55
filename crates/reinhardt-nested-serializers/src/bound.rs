//! Serializer bound to one payload and, optionally, an instance

use crate::context::NestedContext;
use crate::error::{SerializerError, ValidationErrors};
use crate::instance::CurrentValue;
use crate::serializer::ModelSerializer;
use crate::validators::ValidatedData;
use reinhardt_nested_orm::{Attrs, Database, Record};
use serde_json::Value;
use std::sync::Arc;

/// One validate-then-save cycle of a [`ModelSerializer`]
///
/// ```ignore
/// let mut bound = serializer.bind(json!({"status": "hired", "user": {"username": "ann"}}));
/// if bound.is_valid(&db).await? {
///     let employee = bound.save(&db).await?;
/// }
/// ```
#[derive(Debug)]
pub struct BoundSerializer {
	serializer: Arc<ModelSerializer>,
	instance: CurrentValue,
	initial_data: Value,
	context: NestedContext,
	validated: Option<ValidatedData>,
	errors: ValidationErrors,
	saved: Option<Record>,
}

impl ModelSerializer {
	/// Bind a payload for creation
	pub fn bind(self: &Arc<Self>, data: Value) -> BoundSerializer {
		BoundSerializer::new(Arc::clone(self), CurrentValue::None, data)
	}

	/// Bind a payload for updating `instance`
	pub fn bind_instance(self: &Arc<Self>, instance: Record, data: Value) -> BoundSerializer {
		BoundSerializer::new(Arc::clone(self), CurrentValue::Record(instance), data)
	}

	/// Bind a payload against a set of candidate records
	///
	/// The payload's primary key selects the record it updates; without a
	/// match a new record is created.
	pub fn bind_collection(self: &Arc<Self>, records: Vec<Record>, data: Value) -> BoundSerializer {
		BoundSerializer::new(Arc::clone(self), CurrentValue::Collection(records), data)
	}
}

impl BoundSerializer {
	fn new(serializer: Arc<ModelSerializer>, instance: CurrentValue, initial_data: Value) -> Self {
		Self {
			serializer,
			instance,
			initial_data,
			context: NestedContext::new(),
			validated: None,
			errors: ValidationErrors::new(),
			saved: None,
		}
	}

	pub fn with_context(mut self, context: NestedContext) -> Self {
		self.context = context;
		self
	}

	/// Allow required fields to be left out
	pub fn partial(mut self) -> Self {
		self.context = self.context.with_partial(true);
		self
	}

	/// Validate the bound payload
	///
	/// Validation failures are kept in [`errors`](Self::errors) and reported
	/// as `Ok(false)`. Database and configuration failures are returned.
	pub async fn is_valid(&mut self, db: &dyn Database) -> Result<bool, SerializerError> {
		self.validated = None;
		self.errors = ValidationErrors::new();
		let outcome = self
			.serializer
			.run_validation(db, &self.context, &mut self.instance, &self.initial_data)
			.await;
		match outcome {
			Ok(data) => {
				self.validated = Some(data);
				Ok(true)
			}
			Err(SerializerError::Validation(errors)) => {
				tracing::debug!(model = self.serializer.model_name(), %errors, "validation failed");
				self.errors = errors;
				Ok(false)
			}
			Err(other) => Err(other),
		}
	}

	pub fn errors(&self) -> &ValidationErrors {
		&self.errors
	}

	pub fn validated_data(&self) -> Option<&ValidatedData> {
		self.validated.as_ref()
	}

	/// Persist the validated payload
	///
	/// Creates a record when unbound, updates the bound record otherwise.
	/// Save-time validation failures are recorded in `errors` and returned.
	pub async fn save(&mut self, db: &dyn Database) -> Result<Record, SerializerError> {
		let data = self.validated.clone().ok_or(SerializerError::NotValidated)?;
		let outcome = self
			.serializer
			.save_nested(db, &self.context, &mut self.instance, data, Attrs::new())
			.await;
		match outcome {
			Ok(record) => {
				if !self.instance.is_collection() {
					self.instance = CurrentValue::Record(record.clone());
				}
				self.saved = Some(record.clone());
				Ok(record)
			}
			Err(SerializerError::Validation(errors)) => {
				self.errors = errors.clone();
				Err(SerializerError::Validation(errors))
			}
			Err(other) => Err(other),
		}
	}

	pub fn instance(&self) -> &CurrentValue {
		&self.instance
	}

	/// Record written by the last successful [`save`](Self::save)
	pub fn saved(&self) -> Option<&Record> {
		self.saved.as_ref()
	}

	/// Representation of the saved or bound record
	///
	/// Before anything is saved or bound this is the initial payload.
	pub async fn data(&self, db: &dyn Database) -> Result<Value, SerializerError> {
		let record = self.saved.as_ref().or_else(|| self.instance.as_record());
		match record {
			Some(record) => self.serializer.to_representation(db, record).await,
			None => Ok(self.initial_data.clone()),
		}
	}
}
