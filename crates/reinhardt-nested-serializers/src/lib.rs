//! # Reinhardt Nested Serializers
//!
//! Writable nested model serializers. A single payload may describe a record
//! together with records related through forward foreign keys, reverse
//! foreign keys, many-to-many links (plain or through a join model) and
//! generic relations; validating and saving it writes the whole graph in one
//! transaction.
//!
//! ## Capabilities
//!
//! - **Instance resolution**: list items are validated against the related
//!   record their primary key names, not against the whole related set
//! - **Deferred uniqueness**: unique and unique-together checks run against
//!   the resolved record at save time
//! - **Forbidden on create**: selected fields may be rejected when a record
//!   is created with nested data
//!
//! ## Example
//!
//! ```ignore
//! use reinhardt_nested_serializers::prelude::*;
//!
//! let mut bound = employee_serializer.bind(json!({
//!     "status": "hired",
//!     "user": {"username": "ann"},
//! }));
//! assert!(bound.is_valid(&db).await?);
//! let employee = bound.save(&db).await?;
//! ```

pub mod bound;
pub mod classifier;
pub mod context;
mod create;
pub mod error;
pub mod fields;
pub mod guard;
pub mod instance;
mod relations;
pub mod serializer;
pub mod settings;
pub mod uniqueness;
mod update;
pub mod validators;
pub mod writer;

pub use bound::BoundSerializer;
pub use classifier::{
	ClassifiedRelation, ClassifiedRelations, NestedPayload, RelationBucket, RelationClassifier,
};
pub use context::NestedContext;
pub use error::{ErrorDetail, NON_FIELD_ERRORS, SerializerError, ValidationErrors};
pub use fields::{Field, FieldKind, NestedField};
pub use guard::{ForbiddenFieldGuard, NESTED_FIELD_ERROR_KEY, NESTED_FIELD_ERROR_MESSAGE};
pub use instance::{CurrentValue, CurrentValueGuard, Resolved, resolve_current};
pub use serializer::{ModelSerializer, ModelSerializerBuilder};
pub use settings::{NestedSettings, SettingsError};
pub use uniqueness::UniquenessRevalidator;
pub use validators::{
	FieldValidator, ObjectValidator, UniqueTogetherValidator, UniqueValidator, ValidatedData,
	ValidatorConfig,
};
pub use writer::RecordWriter;

/// Everything needed to declare and drive nested serializers
pub mod prelude {
	pub use crate::{
		BoundSerializer, CurrentValue, Field, ModelSerializer, NestedContext, NestedSettings,
		ObjectValidator, SerializerError, ValidationErrors,
	};
	pub use reinhardt_nested_orm::{
		Column, Database, MemoryDatabase, ModelMeta, ModelRegistry, Record, RelationDescriptor,
	};
}
