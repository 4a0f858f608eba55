//! Relation classification of nested payloads
//!
//! The write order of a nested save depends on where each relation's foreign
//! key lives, so every nested payload is sorted into a bucket before anything
//! is written. The descriptor table is taken from the model metadata once,
//! when the serializer is built.

use reinhardt_nested_orm::{ModelMeta, RelationDescriptor, RelationKind};
use serde_json::Value;
use std::collections::HashMap;

/// Bucket a relation is written in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationBucket {
	/// Forward foreign key on the host; written before the host
	Direct,
	/// Foreign key on the related model; written after the host
	Reverse,
	ManyToMany,
	/// Many-to-many stored as join records of an explicit model
	ManyToManyThrough,
	/// (content type, object id) pair on the related model
	Generic,
}

impl RelationBucket {
	pub fn of(relation: &RelationDescriptor) -> Self {
		match &relation.kind {
			RelationKind::ForeignKey { .. } => Self::Direct,
			RelationKind::Reverse { .. } => Self::Reverse,
			RelationKind::ManyToMany { through: false, .. } => Self::ManyToMany,
			RelationKind::ManyToMany { through: true, .. } => Self::ManyToManyThrough,
			RelationKind::Generic { .. } => Self::Generic,
		}
	}
}

/// A nested value still to be written
#[derive(Debug, Clone, PartialEq)]
pub struct NestedPayload {
	/// Payload key
	pub name: String,
	/// Attribute the value is written to
	pub write_target: String,
	pub data: Value,
}

impl NestedPayload {
	pub fn new(name: impl Into<String>, write_target: impl Into<String>, data: Value) -> Self {
		Self {
			name: name.into(),
			write_target: write_target.into(),
			data,
		}
	}
}

/// A nested value together with the relation it is written through
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedRelation {
	pub name: String,
	pub write_target: String,
	pub relation: RelationDescriptor,
	pub data: Value,
}

/// Nested values sorted by relation kind, each bucket in declaration order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClassifiedRelations {
	pub direct: Vec<ClassifiedRelation>,
	pub reverse: Vec<ClassifiedRelation>,
	pub many_to_many: Vec<ClassifiedRelation>,
	pub many_to_many_through: Vec<ClassifiedRelation>,
	pub generic: Vec<ClassifiedRelation>,
	/// Values whose write target is not a relation; stored as plain attributes
	pub passthrough: Vec<NestedPayload>,
}

impl ClassifiedRelations {
	pub fn is_empty(&self) -> bool {
		self.direct.is_empty()
			&& self.reverse.is_empty()
			&& self.many_to_many.is_empty()
			&& self.many_to_many_through.is_empty()
			&& self.generic.is_empty()
			&& self.passthrough.is_empty()
	}

	/// Relations written after the host record exists, in write order
	pub fn after_host(&self) -> impl Iterator<Item = &ClassifiedRelation> {
		self.reverse
			.iter()
			.chain(&self.generic)
			.chain(&self.many_to_many)
			.chain(&self.many_to_many_through)
	}
}

/// Descriptor table of one model
#[derive(Debug, Clone)]
pub struct RelationClassifier {
	model: String,
	relations: HashMap<String, RelationDescriptor>,
}

impl RelationClassifier {
	pub fn from_meta(meta: &ModelMeta) -> Self {
		Self {
			model: meta.name().to_string(),
			relations: meta
				.relations()
				.map(|relation| (relation.name.clone(), relation.clone()))
				.collect(),
		}
	}

	pub fn model(&self) -> &str {
		&self.model
	}

	pub fn relation(&self, write_target: &str) -> Option<&RelationDescriptor> {
		self.relations.get(write_target)
	}

	pub fn bucket(&self, write_target: &str) -> Option<RelationBucket> {
		self.relation(write_target).map(RelationBucket::of)
	}

	/// Sort nested payloads into relation buckets
	pub fn classify(&self, payloads: impl IntoIterator<Item = NestedPayload>) -> ClassifiedRelations {
		let mut classified = ClassifiedRelations::default();
		for payload in payloads {
			let Some(relation) = self.relation(&payload.write_target) else {
				classified.passthrough.push(payload);
				continue;
			};
			let bucket = RelationBucket::of(relation);
			let entry = ClassifiedRelation {
				name: payload.name,
				write_target: payload.write_target,
				relation: relation.clone(),
				data: payload.data,
			};
			match bucket {
				RelationBucket::Direct => classified.direct.push(entry),
				RelationBucket::Reverse => classified.reverse.push(entry),
				RelationBucket::ManyToMany => classified.many_to_many.push(entry),
				RelationBucket::ManyToManyThrough => classified.many_to_many_through.push(entry),
				RelationBucket::Generic => classified.generic.push(entry),
			}
		}
		classified
	}
}
