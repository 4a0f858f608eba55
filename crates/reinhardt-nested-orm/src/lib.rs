//! # Reinhardt Nested ORM
//!
//! Persistence layer consumed by nested serializers: records, model and
//! relation metadata, the async [`Database`] trait, transaction scopes and an
//! in-memory reference backend.
//!
//! ## Relation kinds
//!
//! - **ForeignKey**: the owner stores the target's primary key in a column
//! - **Reverse**: another model stores the owner's primary key
//! - **ManyToMany**: link rows, optionally stored as records of a through model
//! - **Generic**: another model stores the owner's model name and primary key

pub mod database;
pub mod error;
pub mod filter;
pub mod memory;
pub mod meta;
pub mod record;
pub mod related;
pub mod transaction;

pub use database::Database;
pub use error::{DatabaseError, Result};
pub use filter::{Filter, FilterOperator};
pub use memory::MemoryDatabase;
pub use meta::{Column, ModelMeta, ModelRegistry, RelationDescriptor, RelationKind};
pub use record::{Attrs, Record, pk_from_value};
pub use related::RelatedManager;
pub use transaction::TransactionScope;
