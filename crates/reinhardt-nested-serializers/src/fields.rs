//! Field declarations
//!
//! A [`Field`] describes one key of the payload: how its value is coerced,
//! which record attribute it reads from and writes to, and whether it holds
//! a nested serializer.

use crate::serializer::ModelSerializer;
use crate::validators::FieldValidator;
use serde_json::{Number, Value};
use std::sync::Arc;

/// Value type of a field
#[derive(Debug, Clone)]
pub enum FieldKind {
	Integer,
	Float,
	Boolean,
	Char { max_length: Option<usize> },
	/// Any JSON value, stored as is
	Json,
	Nested(NestedField),
}

/// A nested serializer attached to a field
#[derive(Debug, Clone)]
pub struct NestedField {
	serializer: Arc<ModelSerializer>,
	many: bool,
	write_source: Option<String>,
	preserve_provided: bool,
	connect_to_model: bool,
	allow_empty: bool,
}

impl NestedField {
	fn new(serializer: Arc<ModelSerializer>, many: bool) -> Self {
		Self {
			serializer,
			many,
			write_source: None,
			preserve_provided: false,
			connect_to_model: false,
			allow_empty: true,
		}
	}

	pub fn serializer(&self) -> &Arc<ModelSerializer> {
		&self.serializer
	}

	pub fn is_many(&self) -> bool {
		self.many
	}

	pub fn write_source(&self) -> Option<&str> {
		self.write_source.as_deref()
	}

	/// Existing related records missing from the payload are kept
	pub fn preserves_provided(&self) -> bool {
		self.preserve_provided
	}

	/// Items of a through relation describe target records, not join records
	pub fn connects_to_model(&self) -> bool {
		self.connect_to_model
	}

	pub fn allows_empty(&self) -> bool {
		self.allow_empty
	}
}

/// One declared payload key
#[derive(Debug, Clone)]
pub struct Field {
	name: String,
	kind: FieldKind,
	source: Option<String>,
	required: bool,
	allow_null: bool,
	allow_blank: bool,
	read_only: bool,
	write_only: bool,
	default: Option<Value>,
	unique: bool,
	unique_message: Option<String>,
	validators: Vec<FieldValidator>,
}

impl Field {
	fn new(name: impl Into<String>, kind: FieldKind) -> Self {
		Self {
			name: name.into(),
			kind,
			source: None,
			required: true,
			allow_null: false,
			allow_blank: false,
			read_only: false,
			write_only: false,
			default: None,
			unique: false,
			unique_message: None,
			validators: Vec::new(),
		}
	}

	pub fn integer(name: impl Into<String>) -> Self {
		Self::new(name, FieldKind::Integer)
	}

	pub fn float(name: impl Into<String>) -> Self {
		Self::new(name, FieldKind::Float)
	}

	pub fn boolean(name: impl Into<String>) -> Self {
		Self::new(name, FieldKind::Boolean)
	}

	pub fn char(name: impl Into<String>) -> Self {
		Self::new(name, FieldKind::Char { max_length: None })
	}

	pub fn json(name: impl Into<String>) -> Self {
		Self::new(name, FieldKind::Json)
	}

	/// Optional integer primary key, used to match nested items to records
	pub fn primary_key(name: impl Into<String>) -> Self {
		Self::integer(name).optional()
	}

	/// Single nested object
	pub fn nested(name: impl Into<String>, serializer: Arc<ModelSerializer>) -> Self {
		Self::new(name, FieldKind::Nested(NestedField::new(serializer, false)))
	}

	/// List of nested objects
	pub fn nested_many(name: impl Into<String>, serializer: Arc<ModelSerializer>) -> Self {
		Self::new(name, FieldKind::Nested(NestedField::new(serializer, true)))
	}

	pub fn optional(mut self) -> Self {
		self.required = false;
		self
	}

	pub fn required(mut self, required: bool) -> Self {
		self.required = required;
		self
	}

	pub fn allow_null(mut self) -> Self {
		self.allow_null = true;
		self
	}

	pub fn allow_blank(mut self) -> Self {
		self.allow_blank = true;
		self
	}

	pub fn read_only(mut self) -> Self {
		self.read_only = true;
		self.required = false;
		self
	}

	pub fn write_only(mut self) -> Self {
		self.write_only = true;
		self
	}

	/// Attribute the field reads from (and, unless `write_source` is set, writes to)
	pub fn source(mut self, source: impl Into<String>) -> Self {
		self.source = Some(source.into());
		self
	}

	/// Value used when the key is missing; makes the field optional
	pub fn default(mut self, value: Value) -> Self {
		self.default = Some(value);
		self.required = false;
		self
	}

	pub fn max_length(mut self, max: usize) -> Self {
		if let FieldKind::Char { max_length } = &mut self.kind {
			*max_length = Some(max);
		}
		self
	}

	/// Values must not be used by another record of the model
	pub fn unique(mut self) -> Self {
		self.unique = true;
		self
	}

	pub fn unique_with_message(mut self, message: impl Into<String>) -> Self {
		self.unique = true;
		self.unique_message = Some(message.into());
		self
	}

	pub fn validator(mut self, validator: FieldValidator) -> Self {
		self.validators.push(validator);
		self
	}

	/// Relation name nested writes go to, when it differs from the read source
	pub fn write_source(mut self, name: impl Into<String>) -> Self {
		if let FieldKind::Nested(nested) = &mut self.kind {
			nested.write_source = Some(name.into());
		}
		self
	}

	/// Keep existing related records that the payload leaves out
	pub fn preserve_provided(mut self) -> Self {
		if let FieldKind::Nested(nested) = &mut self.kind {
			nested.preserve_provided = true;
		}
		self
	}

	/// Treat items of a through relation as target records
	pub fn connect_to_model(mut self) -> Self {
		if let FieldKind::Nested(nested) = &mut self.kind {
			nested.connect_to_model = true;
		}
		self
	}

	pub fn allow_empty(mut self, allow: bool) -> Self {
		if let FieldKind::Nested(nested) = &mut self.kind {
			nested.allow_empty = allow;
		}
		self
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn kind(&self) -> &FieldKind {
		&self.kind
	}

	/// Attribute read for representation
	pub fn read_name(&self) -> &str {
		self.source.as_deref().unwrap_or(&self.name)
	}

	/// Attribute written on save
	pub fn write_name(&self) -> &str {
		self.nested_field()
			.and_then(NestedField::write_source)
			.unwrap_or_else(|| self.read_name())
	}

	pub fn is_required(&self) -> bool {
		self.required
	}

	pub fn allows_null(&self) -> bool {
		self.allow_null
	}

	pub fn is_read_only(&self) -> bool {
		self.read_only
	}

	pub fn is_write_only(&self) -> bool {
		self.write_only
	}

	pub fn default_value(&self) -> Option<&Value> {
		self.default.as_ref()
	}

	pub fn is_unique(&self) -> bool {
		self.unique
	}

	pub fn unique_message(&self) -> Option<&str> {
		self.unique_message.as_deref()
	}

	pub fn nested_field(&self) -> Option<&NestedField> {
		match &self.kind {
			FieldKind::Nested(nested) => Some(nested),
			_ => None,
		}
	}

	pub fn is_nested(&self) -> bool {
		self.nested_field().is_some()
	}

	/// Coerce a non-null scalar value and run custom validators
	///
	/// Returns every error message for the field.
	pub fn to_internal_value(&self, value: &Value) -> Result<Value, Vec<String>> {
		let coerced = match &self.kind {
			FieldKind::Integer => coerce_integer(value),
			FieldKind::Float => coerce_float(value),
			FieldKind::Boolean => coerce_boolean(value),
			FieldKind::Char { max_length } => self.coerce_char(value, *max_length),
			FieldKind::Json => Ok(value.clone()),
			FieldKind::Nested(_) => Ok(value.clone()),
		}
		.map_err(|message| vec![message])?;

		let errors: Vec<String> = self
			.validators
			.iter()
			.filter_map(|validator| validator.validate(&coerced).err())
			.collect();
		if errors.is_empty() {
			Ok(coerced)
		} else {
			Err(errors)
		}
	}

	fn coerce_char(&self, value: &Value, max_length: Option<usize>) -> Result<Value, String> {
		let text = match value {
			Value::String(s) => s.trim().to_string(),
			Value::Number(n) => n.to_string(),
			_ => return Err("Not a valid string.".to_string()),
		};
		if text.is_empty() && !self.allow_blank {
			return Err("This field may not be blank.".to_string());
		}
		if let Some(max) = max_length
			&& text.chars().count() > max
		{
			return Err(format!(
				"Ensure this field has no more than {} characters.",
				max
			));
		}
		Ok(Value::String(text))
	}
}

fn coerce_integer(value: &Value) -> Result<Value, String> {
	const MESSAGE: &str = "A valid integer is required.";
	match value {
		Value::Number(n) => {
			if let Some(i) = n.as_i64() {
				Ok(Value::from(i))
			} else {
				match n.as_f64() {
					Some(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => Ok(Value::from(f as i64)),
					_ => Err(MESSAGE.to_string()),
				}
			}
		}
		Value::String(s) => s
			.trim()
			.parse::<i64>()
			.map(Value::from)
			.map_err(|_| MESSAGE.to_string()),
		_ => Err(MESSAGE.to_string()),
	}
}

fn coerce_float(value: &Value) -> Result<Value, String> {
	const MESSAGE: &str = "A valid number is required.";
	let parsed = match value {
		Value::Number(n) => n.as_f64(),
		Value::String(s) => s.trim().parse::<f64>().ok(),
		_ => None,
	};
	parsed
		.and_then(Number::from_f64)
		.map(Value::Number)
		.ok_or_else(|| MESSAGE.to_string())
}

fn coerce_boolean(value: &Value) -> Result<Value, String> {
	match value {
		Value::Bool(b) => Ok(Value::Bool(*b)),
		Value::Number(n) if n.as_i64() == Some(1) => Ok(Value::Bool(true)),
		Value::Number(n) if n.as_i64() == Some(0) => Ok(Value::Bool(false)),
		Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
			"true" | "t" | "yes" | "y" | "on" | "1" => Ok(Value::Bool(true)),
			"false" | "f" | "no" | "n" | "off" | "0" => Ok(Value::Bool(false)),
			_ => Err("Must be a valid boolean.".to_string()),
		},
		_ => Err("Must be a valid boolean.".to_string()),
	}
}

/// Short type name used in error messages
pub(crate) fn type_name(value: &Value) -> &'static str {
	match value {
		Value::Null => "null",
		Value::Bool(_) => "bool",
		Value::Number(n) if n.is_f64() => "float",
		Value::Number(_) => "int",
		Value::String(_) => "str",
		Value::Array(_) => "list",
		Value::Object(_) => "dict",
	}
}
