//! Model and relation metadata
//!
//! Every model registers its columns and the relations it can reach. The
//! relation table is what nested writers consult to decide how a field is
//! persisted, so it is built once per model and only read afterwards.

use crate::error::{DatabaseError, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// A scalar column of a model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
	pub name: String,
	pub nullable: bool,
	pub default: Option<Value>,
}

impl Column {
	/// A NOT NULL column without default
	pub fn new(name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			nullable: false,
			default: None,
		}
	}

	/// Allow NULL values
	pub fn nullable(mut self) -> Self {
		self.nullable = true;
		self
	}

	/// Value used when an insert omits the column
	pub fn default_value(mut self, value: Value) -> Self {
		self.default = Some(value);
		self
	}
}

/// How a relation is stored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RelationKind {
	/// The owner holds `column` pointing at `target` (foreign key or one-to-one)
	ForeignKey {
		target: String,
		column: String,
		nullable: bool,
	},
	/// `related` holds `column` pointing back at the owner
	Reverse {
		related: String,
		column: String,
		nullable: bool,
	},
	/// Association rows in `table` pair `source_column` (owner) with `target_column`
	///
	/// When `through` is set, `table` is itself a registered model and its rows
	/// are join records that can carry extra attributes.
	ManyToMany {
		target: String,
		table: String,
		source_column: String,
		target_column: String,
		through: bool,
	},
	/// `related` points back at the owner through a (content type, object id) pair
	Generic {
		related: String,
		content_type_column: String,
		object_id_column: String,
	},
}

/// A named relation reachable from a model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationDescriptor {
	pub name: String,
	pub kind: RelationKind,
}

impl RelationDescriptor {
	/// Forward foreign key stored in `{name}_id`
	pub fn foreign_key(name: impl Into<String>, target: impl Into<String>) -> Self {
		let name = name.into();
		let column = format!("{}_id", name);
		Self {
			name,
			kind: RelationKind::ForeignKey {
				target: target.into(),
				column,
				nullable: false,
			},
		}
	}

	/// Reverse side of a foreign key declared on `related`
	pub fn reverse(
		name: impl Into<String>,
		related: impl Into<String>,
		column: impl Into<String>,
	) -> Self {
		Self {
			name: name.into(),
			kind: RelationKind::Reverse {
				related: related.into(),
				column: column.into(),
				nullable: false,
			},
		}
	}

	/// Plain many-to-many association stored in an implicit link table
	pub fn many_to_many(
		name: impl Into<String>,
		target: impl Into<String>,
		table: impl Into<String>,
		source_column: impl Into<String>,
		target_column: impl Into<String>,
	) -> Self {
		Self {
			name: name.into(),
			kind: RelationKind::ManyToMany {
				target: target.into(),
				table: table.into(),
				source_column: source_column.into(),
				target_column: target_column.into(),
				through: false,
			},
		}
	}

	/// Many-to-many association stored as records of the `through` model
	pub fn many_to_many_through(
		name: impl Into<String>,
		target: impl Into<String>,
		through: impl Into<String>,
		source_column: impl Into<String>,
		target_column: impl Into<String>,
	) -> Self {
		Self {
			name: name.into(),
			kind: RelationKind::ManyToMany {
				target: target.into(),
				table: through.into(),
				source_column: source_column.into(),
				target_column: target_column.into(),
				through: true,
			},
		}
	}

	/// Generic relation from a (content type, object id) pair on `related`
	pub fn generic(
		name: impl Into<String>,
		related: impl Into<String>,
		content_type_column: impl Into<String>,
		object_id_column: impl Into<String>,
	) -> Self {
		Self {
			name: name.into(),
			kind: RelationKind::Generic {
				related: related.into(),
				content_type_column: content_type_column.into(),
				object_id_column: object_id_column.into(),
			},
		}
	}

	/// Mark the foreign key (forward or reverse) as nullable
	pub fn nullable(mut self) -> Self {
		match &mut self.kind {
			RelationKind::ForeignKey { nullable, .. } | RelationKind::Reverse { nullable, .. } => {
				*nullable = true
			}
			RelationKind::ManyToMany { .. } | RelationKind::Generic { .. } => {}
		}
		self
	}

	/// Override the column name of a forward foreign key
	pub fn db_column(mut self, name: impl Into<String>) -> Self {
		if let RelationKind::ForeignKey { column, .. } = &mut self.kind {
			*column = name.into();
		}
		self
	}

	/// Model on the other side of the relation
	pub fn related_model(&self) -> &str {
		match &self.kind {
			RelationKind::ForeignKey { target, .. } | RelationKind::ManyToMany { target, .. } => {
				target
			}
			RelationKind::Reverse { related, .. } | RelationKind::Generic { related, .. } => related,
		}
	}
}

/// Columns and relations of one model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMeta {
	name: String,
	pk_name: String,
	columns: IndexMap<String, Column>,
	relations: IndexMap<String, RelationDescriptor>,
}

impl ModelMeta {
	/// Start describing a model with an `id` primary key
	pub fn new(name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			pk_name: "id".to_string(),
			columns: IndexMap::new(),
			relations: IndexMap::new(),
		}
	}

	/// Rename the primary key attribute
	pub fn primary_key(mut self, name: impl Into<String>) -> Self {
		self.pk_name = name.into();
		self
	}

	/// Add a scalar column
	pub fn column(mut self, column: Column) -> Self {
		self.columns.insert(column.name.clone(), column);
		self
	}

	/// Add a relation. Forward foreign keys also register their column.
	pub fn relation(mut self, relation: RelationDescriptor) -> Self {
		if let RelationKind::ForeignKey {
			column, nullable, ..
		} = &relation.kind
		{
			let mut fk = Column::new(column.clone());
			if *nullable {
				fk = fk.nullable();
			}
			self.columns.insert(column.clone(), fk);
		}
		self.relations.insert(relation.name.clone(), relation);
		self
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn pk_name(&self) -> &str {
		&self.pk_name
	}

	pub fn columns(&self) -> impl Iterator<Item = &Column> {
		self.columns.values()
	}

	pub fn get_column(&self, name: &str) -> Option<&Column> {
		self.columns.get(name)
	}

	pub fn has_column(&self, name: &str) -> bool {
		name == self.pk_name || self.columns.contains_key(name)
	}

	pub fn relations(&self) -> impl Iterator<Item = &RelationDescriptor> {
		self.relations.values()
	}

	/// Look up a relation by attribute name
	pub fn get_relation(&self, name: &str) -> Option<&RelationDescriptor> {
		self.relations.get(name)
	}

	/// Like [`get_relation`](Self::get_relation) but failing with [`DatabaseError::UnknownRelation`]
	pub fn relation_or_err(&self, name: &str) -> Result<&RelationDescriptor> {
		self.relations
			.get(name)
			.ok_or_else(|| DatabaseError::UnknownRelation {
				model: self.name.clone(),
				relation: name.to_string(),
			})
	}
}

/// Registry of every model a backend knows about
#[derive(Debug, Clone, Default)]
pub struct ModelRegistry {
	models: HashMap<String, Arc<ModelMeta>>,
}

impl ModelRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	/// Register a model, replacing any previous entry with the same name
	pub fn register(&mut self, meta: ModelMeta) -> Arc<ModelMeta> {
		let meta = Arc::new(meta);
		self.models.insert(meta.name().to_string(), Arc::clone(&meta));
		meta
	}

	/// Builder-style variant of [`register`](Self::register)
	pub fn with_model(mut self, meta: ModelMeta) -> Self {
		self.register(meta);
		self
	}

	pub fn get(&self, name: &str) -> Result<Arc<ModelMeta>> {
		self.models
			.get(name)
			.cloned()
			.ok_or_else(|| DatabaseError::ModelNotRegistered(name.to_string()))
	}

	pub fn contains(&self, name: &str) -> bool {
		self.models.contains_key(name)
	}

	pub fn models(&self) -> impl Iterator<Item = &Arc<ModelMeta>> {
		self.models.values()
	}
}
