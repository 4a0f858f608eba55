//! Model serializers with writable nested fields
//!
//! A [`ModelSerializer`] is an immutable description of how one model is
//! validated, written and rendered. Nested fields hold further serializers,
//! which are driven recursively for validation, save and representation.
//!
//! ## Example
//!
//! ```ignore
//! let user = ModelSerializer::builder(registry.get("user")?)
//!     .field(Field::primary_key("id"))
//!     .field(Field::char("username").max_length(150))
//!     .build()?;
//! let employee = ModelSerializer::builder(registry.get("employee")?)
//!     .field(Field::primary_key("id"))
//!     .field(Field::nested("user", user).optional().allow_null())
//!     .field(Field::char("status"))
//!     .build()?;
//! ```

use crate::classifier::{ClassifiedRelation, NestedPayload, RelationClassifier};
use crate::context::NestedContext;
use crate::error::{SerializerError, ValidationErrors};
use crate::fields::{Field, NestedField, type_name};
use crate::guard::ForbiddenFieldGuard;
use crate::instance::{CurrentValue, CurrentValueGuard};
use crate::uniqueness::UniquenessRevalidator;
use crate::validators::{
	ObjectValidator, UniqueTogetherValidator, UniqueValidator, ValidatedData, ValidatorConfig,
};
use crate::writer::RecordWriter;
use futures::future::{BoxFuture, FutureExt};
use reinhardt_nested_orm::{
	Attrs, Database, ModelMeta, Record, RelatedManager, RelationDescriptor, RelationKind,
	pk_from_value,
};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::sync::Arc;

/// Serializer of one model
#[derive(Debug)]
pub struct ModelSerializer {
	meta: Arc<ModelMeta>,
	fields: Vec<Field>,
	validators: ValidatorConfig,
	object_validators: Vec<ObjectValidator>,
	writer: RecordWriter,
}

/// Builder assembling a [`ModelSerializer`] and its capabilities
pub struct ModelSerializerBuilder {
	meta: Arc<ModelMeta>,
	fields: Vec<Field>,
	unique_together: Vec<(Vec<String>, Option<String>)>,
	object_validators: Vec<ObjectValidator>,
	forbidden_on_create: Vec<String>,
	revalidate_unique_fields: bool,
	revalidate_unique_together: bool,
}

impl ModelSerializerBuilder {
	pub fn field(mut self, field: Field) -> Self {
		self.fields.push(field);
		self
	}

	pub fn fields(mut self, fields: impl IntoIterator<Item = Field>) -> Self {
		self.fields.extend(fields);
		self
	}

	/// Declare a set of fields (or columns) whose combined values must be unique
	pub fn unique_together<I, S>(mut self, fields: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.unique_together
			.push((fields.into_iter().map(Into::into).collect(), None));
		self
	}

	pub fn unique_together_with_message<I, S>(mut self, fields: I, message: impl Into<String>) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.unique_together.push((
			fields.into_iter().map(Into::into).collect(),
			Some(message.into()),
		));
		self
	}

	pub fn validator(mut self, validator: ObjectValidator) -> Self {
		self.object_validators.push(validator);
		self
	}

	/// Reject creates whose payload contains any of these keys
	pub fn forbidden_on_create<I, S>(mut self, fields: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.forbidden_on_create
			.extend(fields.into_iter().map(Into::into));
		self
	}

	/// Check field-level uniqueness against the resolved record instead of in the pipeline
	pub fn with_unique_field_revalidation(mut self) -> Self {
		self.revalidate_unique_fields = true;
		self
	}

	/// Check unique-together sets against the resolved record instead of in the pipeline
	pub fn with_unique_together_revalidation(mut self) -> Self {
		self.revalidate_unique_together = true;
		self
	}

	pub fn build(self) -> Result<Arc<ModelSerializer>, SerializerError> {
		let mut names = HashSet::new();
		for field in &self.fields {
			if !names.insert(field.name()) {
				return Err(SerializerError::ImproperlyConfigured(format!(
					"field '{}' is declared twice on the {} serializer",
					field.name(),
					self.meta.name()
				)));
			}
			if let Some(nested) = field.nested_field() {
				check_nested_target(&self.meta, field, nested)?;
			}
		}

		let mut validators = ValidatorConfig::new();
		for field in self.fields.iter().filter(|f| f.is_unique() && !f.is_nested()) {
			let mut validator = UniqueValidator::new(&self.meta, field.name(), field.read_name());
			if let Some(message) = field.unique_message() {
				validator = validator.with_message(message);
			}
			validators.add_unique_validator(validator);
		}
		for (names, message) in &self.unique_together {
			let mut pairs = Vec::with_capacity(names.len());
			for name in names {
				pairs.push((name.clone(), self.column_for(name)?));
			}
			let mut validator = UniqueTogetherValidator::new(&self.meta, pairs);
			if let Some(message) = message {
				validator = validator.with_message(message.clone());
			}
			validators.add_unique_together_validator(validator);
		}

		let mut writer = RecordWriter::new(RelationClassifier::from_meta(&self.meta));
		if self.revalidate_unique_fields || self.revalidate_unique_together {
			let unique_fields = if self.revalidate_unique_fields {
				validators.take_unique_validators()
			} else {
				Vec::new()
			};
			let unique_together = if self.revalidate_unique_together {
				validators.take_unique_together_validators()
			} else {
				Vec::new()
			};
			writer = writer.with_uniqueness(UniquenessRevalidator::new(unique_fields, unique_together));
		}
		if !self.forbidden_on_create.is_empty() {
			writer = writer.with_guard(ForbiddenFieldGuard::new(self.forbidden_on_create));
		}

		Ok(Arc::new(ModelSerializer {
			meta: self.meta,
			fields: self.fields,
			validators,
			object_validators: self.object_validators,
			writer,
		}))
	}

	fn column_for(&self, name: &str) -> Result<String, SerializerError> {
		if let Some(field) = self.fields.iter().find(|f| f.name() == name && !f.is_nested()) {
			return Ok(field.read_name().to_string());
		}
		if self.meta.has_column(name) {
			return Ok(name.to_string());
		}
		match self.meta.get_relation(name).map(|r| &r.kind) {
			Some(RelationKind::ForeignKey { column, .. }) => Ok(column.clone()),
			_ => Err(SerializerError::ImproperlyConfigured(format!(
				"unique together field '{}' is not a column of {}",
				name,
				self.meta.name()
			))),
		}
	}
}

/// Make sure a nested serializer handles the records its relation stores
fn check_nested_target(meta: &ModelMeta, field: &Field, nested: &NestedField) -> Result<(), SerializerError> {
	let Some(relation) = meta.get_relation(field.write_name()) else {
		return Ok(());
	};
	let misconfigured = |reason: String| {
		Err(SerializerError::ImproperlyConfigured(format!(
			"field '{}' of the {} serializer: {}",
			field.name(),
			meta.name(),
			reason
		)))
	};
	let expected = match &relation.kind {
		RelationKind::ForeignKey { target, .. } => {
			if nested.is_many() {
				return misconfigured("a forward foreign key cannot be list-shaped".into());
			}
			target
		}
		RelationKind::Reverse { related, .. } | RelationKind::Generic { related, .. } => related,
		RelationKind::ManyToMany {
			target,
			table,
			through,
			..
		} => {
			if !nested.is_many() {
				return misconfigured("a many-to-many relation must be list-shaped".into());
			}
			if *through && !nested.connects_to_model() {
				table
			} else {
				target
			}
		}
	};
	let child = nested.serializer().model_name();
	if child != expected.as_str() {
		return misconfigured(format!(
			"relation stores {} records but the nested serializer handles {}",
			expected, child
		));
	}
	Ok(())
}

/// Whether list items of `field` are the join records of a through relation
pub(crate) fn items_are_join_records(field: &Field, relation: &RelationDescriptor) -> bool {
	matches!(relation.kind, RelationKind::ManyToMany { through: true, .. })
		&& !field.nested_field().is_some_and(NestedField::connects_to_model)
}

impl ModelSerializer {
	pub fn builder(meta: Arc<ModelMeta>) -> ModelSerializerBuilder {
		ModelSerializerBuilder {
			meta,
			fields: Vec::new(),
			unique_together: Vec::new(),
			object_validators: Vec::new(),
			forbidden_on_create: Vec::new(),
			revalidate_unique_fields: false,
			revalidate_unique_together: false,
		}
	}

	pub fn meta(&self) -> &ModelMeta {
		&self.meta
	}

	pub fn model_name(&self) -> &str {
		self.meta.name()
	}

	pub fn pk_name(&self) -> &str {
		self.meta.pk_name()
	}

	pub fn fields(&self) -> &[Field] {
		&self.fields
	}

	pub fn field(&self, name: &str) -> Option<&Field> {
		self.fields.iter().find(|f| f.name() == name)
	}

	/// Validators still run by the generic pipeline
	pub fn validators(&self) -> &ValidatorConfig {
		&self.validators
	}

	pub fn writer(&self) -> &RecordWriter {
		&self.writer
	}

	pub(crate) fn field_or_err(&self, name: &str) -> Result<&Field, SerializerError> {
		self.field(name).ok_or_else(|| {
			SerializerError::ImproperlyConfigured(format!(
				"no field '{}' on the {} serializer",
				name,
				self.model_name()
			))
		})
	}

	/// Validate `data` against the current value
	///
	/// When `current` is a collection it is resolved to the record `data`
	/// refers to for the duration of the call and restored afterwards.
	pub fn run_validation<'a>(
		&'a self,
		db: &'a dyn Database,
		ctx: &'a NestedContext,
		current: &'a mut CurrentValue,
		data: &'a Value,
	) -> BoxFuture<'a, Result<ValidatedData, SerializerError>> {
		async move {
			let Some(payload) = data.as_object() else {
				return Err(ValidationErrors::non_field(format!(
					"Invalid data. Expected a dictionary, but got {}.",
					type_name(data)
				))
				.into());
			};
			let guard = CurrentValueGuard::acquire(current, payload, self.pk_name(), ctx.is_strict())?;
			let instance = guard.instance().cloned();
			// The generic pipeline only sees what the caller bound, collections included.
			let pipeline_instance = guard.original().as_record().cloned();

			if instance.is_none()
				&& let Some(forbidden) = self.writer.guard()
				&& self.has_nested_keys(payload)
			{
				forbidden.check(payload.keys())?;
			}

			let mut errors = ValidationErrors::new();
			let mut validated = ValidatedData::new();
			for field in self.fields.iter().filter(|f| !f.is_read_only()) {
				let name = field.name();
				let value = match payload.get(name) {
					None => {
						if ctx.is_partial() {
							continue;
						}
						if let Some(default) = field.default_value() {
							validated.insert(name.to_string(), default.clone());
						} else if field.is_required() {
							errors.add(name, "This field is required.");
						}
						continue;
					}
					Some(Value::Null) => {
						if field.allows_null() {
							validated.insert(name.to_string(), Value::Null);
						} else {
							errors.add(name, "This field may not be null.");
						}
						continue;
					}
					Some(value) => value,
				};
				let outcome = match field.nested_field() {
					Some(nested) => {
						self.validate_nested(db, ctx, instance.as_ref(), field, nested, value)
							.await
					}
					None => {
						self.validate_scalar(db, field, value, pipeline_instance.as_ref())
							.await
					}
				};
				match outcome {
					Ok(value) => {
						validated.insert(name.to_string(), value);
					}
					Err(SerializerError::Validation(field_errors)) => errors.merge(field_errors),
					Err(other) => return Err(other),
				}
			}
			if !errors.is_empty() {
				return Err(errors.into());
			}

			let attrs = self.scalar_attrs(&validated);
			for validator in self.validators.unique_together_validators() {
				match validator.validate(db, &attrs, pipeline_instance.as_ref()).await {
					Ok(()) => {}
					Err(SerializerError::Validation(set_errors)) => errors.merge(set_errors),
					Err(other) => return Err(other),
				}
			}
			if let Some(uniqueness) = self.writer.uniqueness() {
				match uniqueness
					.revalidate(db, &validated, &attrs, instance.as_ref())
					.await
				{
					Ok(()) => {}
					Err(SerializerError::Validation(unique_errors)) => errors.merge(unique_errors),
					Err(other) => return Err(other),
				}
			}
			for validator in &self.object_validators {
				if let Err(object_errors) = validator.validate(&validated, instance.as_ref()) {
					errors.merge(object_errors);
				}
			}

			if errors.is_empty() {
				Ok(validated)
			} else {
				Err(errors.into())
			}
		}
		.boxed()
	}

	async fn validate_scalar(
		&self,
		db: &dyn Database,
		field: &Field,
		value: &Value,
		pipeline_instance: Option<&Record>,
	) -> Result<Value, SerializerError> {
		let internal = field.to_internal_value(value).map_err(|messages| {
			let mut errors = ValidationErrors::new();
			for message in messages {
				errors.add(field.name(), message);
			}
			errors
		})?;
		for validator in self
			.validators
			.unique_validators()
			.iter()
			.filter(|v| v.field_name() == field.name())
		{
			validator
				.validate(db, &internal, pipeline_instance.map(Record::pk))
				.await?;
		}
		Ok(internal)
	}

	async fn validate_nested(
		&self,
		db: &dyn Database,
		ctx: &NestedContext,
		parent: Option<&Record>,
		field: &Field,
		nested: &NestedField,
		value: &Value,
	) -> Result<Value, SerializerError> {
		let child_ctx = ctx.child_context()?;
		let child = nested.serializer();

		if !nested.is_many() {
			let mut current = self.candidates(db, parent, field, value.as_object()).await?;
			return child
				.run_validation(db, &child_ctx, &mut current, value)
				.await
				.map(Value::Object)
				.map_err(|e| e.nested_under(field.name()));
		}

		let Some(items) = value.as_array() else {
			return Err(ValidationErrors::single(
				field.name(),
				format!(
					"Expected a list of items but got type \"{}\".",
					type_name(value)
				),
			)
			.into());
		};
		if items.is_empty() && !nested.allows_empty() {
			return Err(ValidationErrors::single(field.name(), "This list may not be empty.").into());
		}

		let mut current = self.candidates(db, parent, field, None).await?;
		let mut errors = ValidationErrors::new();
		let mut validated = Vec::with_capacity(items.len());
		for (index, item) in items.iter().enumerate() {
			match child.run_validation(db, &child_ctx, &mut current, item).await {
				Ok(data) => validated.push(Value::Object(data)),
				Err(SerializerError::Validation(item_errors)) => {
					errors.set_item(field.name(), index, items.len(), item_errors)
				}
				Err(other) => return Err(other),
			}
		}
		if errors.is_empty() {
			Ok(Value::Array(validated))
		} else {
			Err(errors.into())
		}
	}

	/// Records a nested payload of `field` may refer to
	///
	/// Forward foreign keys look the payload's primary key up in the whole
	/// target table; every other relation offers the records currently
	/// related to `parent`.
	pub(crate) async fn candidates(
		&self,
		db: &dyn Database,
		parent: Option<&Record>,
		field: &Field,
		payload: Option<&Map<String, Value>>,
	) -> Result<CurrentValue, SerializerError> {
		let Some(relation) = self.meta.get_relation(field.write_name()) else {
			return Ok(CurrentValue::None);
		};
		if let RelationKind::ForeignKey { target, .. } = &relation.kind {
			let pk_name = field
				.nested_field()
				.map(|nested| nested.serializer().pk_name())
				.unwrap_or("id");
			let pk = payload
				.and_then(|p| p.get(pk_name))
				.and_then(pk_from_value);
			return Ok(match pk {
				Some(pk) => CurrentValue::Collection(db.get(target, pk).await?.into_iter().collect()),
				None => CurrentValue::None,
			});
		}
		match parent {
			Some(owner) => Ok(CurrentValue::Collection(
				self.related_records(db, owner, field, relation).await?,
			)),
			None => Ok(CurrentValue::None),
		}
	}

	/// Records currently on the far side of `relation`, as the nested serializer sees them
	pub(crate) async fn related_records(
		&self,
		db: &dyn Database,
		owner: &Record,
		field: &Field,
		relation: &RelationDescriptor,
	) -> Result<Vec<Record>, SerializerError> {
		let manager = RelatedManager::new(db, owner, relation);
		let records = if items_are_join_records(field, relation) {
			manager.through_rows().await?
		} else {
			manager.all().await?
		};
		Ok(records)
	}

	/// Column values of the scalar fields in `data`, primary key excluded
	pub(crate) fn scalar_attrs(&self, data: &ValidatedData) -> Attrs {
		let mut attrs = Attrs::new();
		for field in self.fields.iter().filter(|f| !f.is_nested()) {
			let column = field.read_name();
			if column == self.pk_name() {
				continue;
			}
			if let Some(value) = data.get(field.name()) {
				attrs.insert(column.to_string(), value.clone());
			}
		}
		attrs
	}

	/// Nested values present in `data`, in declaration order
	pub(crate) fn nested_payloads(&self, data: &ValidatedData) -> Vec<NestedPayload> {
		self.fields
			.iter()
			.filter(|f| f.is_nested())
			.filter_map(|field| {
				data.get(field.name())
					.map(|value| NestedPayload::new(field.name(), field.write_name(), value.clone()))
			})
			.collect()
	}

	fn has_nested_keys(&self, payload: &Map<String, Value>) -> bool {
		self.fields
			.iter()
			.any(|f| f.is_nested() && payload.contains_key(f.name()))
	}

	/// Run the deferred uniqueness checks, if this serializer defers any
	pub(crate) async fn revalidate_uniqueness(
		&self,
		db: &dyn Database,
		data: &ValidatedData,
		attrs: &Attrs,
		instance: Option<&Record>,
	) -> Result<(), SerializerError> {
		match self.writer.uniqueness() {
			Some(uniqueness) => uniqueness.revalidate(db, data, attrs, instance).await,
			None => Ok(()),
		}
	}

	/// Persist `data` as the record it resolves to within `current`
	///
	/// A resolved record is updated, otherwise a new one is created. `link`
	/// carries foreign keys to a parent and overrides payload values.
	pub(crate) fn save_nested<'a>(
		&'a self,
		db: &'a dyn Database,
		ctx: &'a NestedContext,
		current: &'a mut CurrentValue,
		data: ValidatedData,
		link: Attrs,
	) -> BoxFuture<'a, Result<Record, SerializerError>> {
		async move {
			let guard = CurrentValueGuard::acquire(current, &data, self.pk_name(), ctx.is_strict())?;
			match guard.instance().cloned() {
				Some(instance) => self.update_with(db, ctx, instance, data, link).await,
				None => self.create_with(db, ctx, data, link).await,
			}
		}
		.boxed()
	}

	/// Render a record, following nested relations
	pub fn to_representation<'a>(
		&'a self,
		db: &'a dyn Database,
		record: &'a Record,
	) -> BoxFuture<'a, Result<Value, SerializerError>> {
		async move {
			let mut object = Map::new();
			for field in self.fields.iter().filter(|f| !f.is_write_only()) {
				let value = match field.nested_field() {
					None => self.scalar_value(record, field),
					Some(nested) => {
						let relation = self
							.meta
							.get_relation(field.read_name())
							.or_else(|| self.meta.get_relation(field.write_name()));
						let related = match relation {
							Some(relation) => self.related_records(db, record, field, relation).await?,
							None => Vec::new(),
						};
						let child = nested.serializer();
						if nested.is_many() {
							let mut items = Vec::with_capacity(related.len());
							for item in &related {
								items.push(child.to_representation(db, item).await?);
							}
							Value::Array(items)
						} else {
							match related.first() {
								Some(item) => child.to_representation(db, item).await?,
								None => Value::Null,
							}
						}
					}
				};
				object.insert(field.name().to_string(), value);
			}
			Ok(Value::Object(object))
		}
		.boxed()
	}

	fn scalar_value(&self, record: &Record, field: &Field) -> Value {
		if field.read_name() == self.pk_name() {
			Value::from(record.pk())
		} else {
			record.get(field.read_name()).cloned().unwrap_or(Value::Null)
		}
	}
}

/// Nested values without relation metadata, stored under their write target
pub(crate) fn passthrough_attrs(payloads: &[NestedPayload]) -> Attrs {
	payloads
		.iter()
		.map(|payload| (payload.write_target.clone(), payload.data.clone()))
		.collect()
}

/// Foreign key column a direct relation entry writes
pub(crate) fn direct_column(relation: &ClassifiedRelation) -> Option<&str> {
	match &relation.relation.kind {
		RelationKind::ForeignKey { column, .. } => Some(column),
		_ => None,
	}
}
