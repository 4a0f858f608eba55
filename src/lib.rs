//! # Reinhardt Nested
//!
//! Writable nested serializers in the style of Django REST Framework.
//!
//! One payload may describe a record and the records related to it. Validation
//! resolves every nested item to the record its primary key names, and saving
//! writes the whole graph inside one transaction: direct relations first, the
//! host record next, then reverse, generic and many-to-many relations.
//!
//! ## Crates
//!
//! - [`orm`]: records, relation metadata, the async `Database` trait and an
//!   in-memory backend
//! - [`serializers`]: model serializers, nested fields and the save pipeline
//!   (feature `serializers`, enabled by default)
//!
//! ## Example
//!
//! ```ignore
//! use reinhardt_nested::prelude::*;
//!
//! let db = MemoryDatabase::new(registry);
//! let user = ModelSerializer::builder(db.registry().get("user")?)
//!     .field(Field::primary_key("id"))
//!     .field(Field::char("username").unique())
//!     .with_unique_field_revalidation()
//!     .build()?;
//! let employee = ModelSerializer::builder(db.registry().get("employee")?)
//!     .field(Field::primary_key("id"))
//!     .field(Field::char("status"))
//!     .field(Field::nested("user", user).optional().allow_null())
//!     .build()?;
//!
//! let mut bound = employee.bind(json!({"status": "hired", "user": {"username": "ann"}}));
//! if bound.is_valid(&db).await? {
//!     bound.save(&db).await?;
//! }
//! ```

pub use reinhardt_nested_orm as orm;
#[cfg(feature = "serializers")]
pub use reinhardt_nested_serializers as serializers;

pub use reinhardt_nested_orm::{
	Database, DatabaseError, MemoryDatabase, ModelMeta, ModelRegistry, Record, TransactionScope,
};
#[cfg(feature = "serializers")]
pub use reinhardt_nested_serializers::{
	BoundSerializer, Field, ModelSerializer, NestedContext, NestedSettings, SerializerError,
	ValidationErrors,
};

/// Commonly used types
pub mod prelude {
	pub use reinhardt_nested_orm::{
		Column, Database, Filter, MemoryDatabase, ModelMeta, ModelRegistry, Record,
		RelationDescriptor,
	};
	#[cfg(feature = "serializers")]
	pub use reinhardt_nested_serializers::prelude::*;
}
