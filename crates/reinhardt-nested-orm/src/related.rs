//! Access to the records on the far side of one relation

use crate::database::Database;
use crate::error::Result;
use crate::filter::Filter;
use crate::meta::{RelationDescriptor, RelationKind};
use crate::record::{Attrs, Record, pk_from_value};
use serde_json::Value;

/// Manager for one relation of one owner record
///
/// Reads and association writes go through the owning [`Database`], so the
/// manager participates in whatever transaction is currently open.
pub struct RelatedManager<'a> {
	db: &'a dyn Database,
	owner: &'a Record,
	relation: &'a RelationDescriptor,
}

impl<'a> RelatedManager<'a> {
	pub fn new(db: &'a dyn Database, owner: &'a Record, relation: &'a RelationDescriptor) -> Self {
		Self {
			db,
			owner,
			relation,
		}
	}

	pub fn relation(&self) -> &RelationDescriptor {
		self.relation
	}

	/// Every related record
	///
	/// Forward keys yield zero or one record. Many-to-many relations yield the
	/// target records, also when the association is stored through a join model.
	pub async fn all(&self) -> Result<Vec<Record>> {
		match &self.relation.kind {
			RelationKind::ForeignKey { target, column, .. } => {
				let Some(pk) = self.owner.get(column).and_then(pk_from_value) else {
					return Ok(Vec::new());
				};
				Ok(self.db.get(target, pk).await?.into_iter().collect())
			}
			RelationKind::Reverse {
				related, column, ..
			} => {
				self.db
					.filter(related, &[Filter::eq(column.as_str(), self.owner.pk())])
					.await
			}
			RelationKind::Generic { related, .. } => self.db.filter(related, &self.generic_filters()).await,
			RelationKind::ManyToMany { target, .. } => {
				let mut records = Vec::new();
				for pk in self.target_ids().await? {
					if let Some(record) = self.db.get(target, pk).await? {
						records.push(record);
					}
				}
				Ok(records)
			}
		}
	}

	/// Join records of a through relation; empty for every other kind
	pub async fn through_rows(&self) -> Result<Vec<Record>> {
		match &self.relation.kind {
			RelationKind::ManyToMany {
				table,
				source_column,
				through: true,
				..
			} => {
				self.db
					.filter(table, &[Filter::eq(source_column.as_str(), self.owner.pk())])
					.await
			}
			_ => Ok(Vec::new()),
		}
	}

	/// Primary keys of the associated targets of a many-to-many relation
	pub async fn target_ids(&self) -> Result<Vec<i64>> {
		match &self.relation.kind {
			RelationKind::ManyToMany {
				table,
				source_column,
				target_column,
				through: false,
				..
			} => {
				self.db
					.linked_ids(table, source_column, self.owner.pk(), target_column)
					.await
			}
			RelationKind::ManyToMany { target_column, .. } => Ok(self
				.through_rows()
				.await?
				.iter()
				.filter_map(|row| row.get(target_column).and_then(pk_from_value))
				.collect()),
			_ => Ok(Vec::new()),
		}
	}

	/// Associate `target_pk`; creates a join record for through relations
	pub async fn add(&self, target_pk: i64) -> Result<()> {
		match &self.relation.kind {
			RelationKind::ManyToMany {
				table,
				source_column,
				target_column,
				through,
				..
			} => {
				if *through {
					if self.target_ids().await?.contains(&target_pk) {
						return Ok(());
					}
					let mut attrs = Attrs::new();
					attrs.insert(source_column.clone(), Value::from(self.owner.pk()));
					attrs.insert(target_column.clone(), Value::from(target_pk));
					self.db.insert(table, attrs).await.map(|_| ())
				} else {
					self.db
						.add_link(
							table,
							(source_column.as_str(), self.owner.pk()),
							(target_column.as_str(), target_pk),
						)
						.await
				}
			}
			_ => Ok(()),
		}
	}

	/// Dissociate `target_pk` without touching the target record
	pub async fn remove(&self, target_pk: i64) -> Result<()> {
		match &self.relation.kind {
			RelationKind::ManyToMany {
				table,
				source_column,
				target_column,
				through,
				..
			} => {
				if *through {
					let rows = self
						.db
						.filter(
							table,
							&[
								Filter::eq(source_column.as_str(), self.owner.pk()),
								Filter::eq(target_column.as_str(), target_pk),
							],
						)
						.await?;
					for row in rows {
						self.db.delete(table, row.pk()).await?;
					}
					Ok(())
				} else {
					self.db
						.remove_link(
							table,
							(source_column.as_str(), self.owner.pk()),
							(target_column.as_str(), target_pk),
						)
						.await
				}
			}
			_ => Ok(()),
		}
	}

	/// Attributes pointing a child record at the owner (reverse and generic kinds)
	pub fn owner_link(&self) -> Attrs {
		let mut attrs = Attrs::new();
		match &self.relation.kind {
			RelationKind::Reverse { column, .. } => {
				attrs.insert(column.clone(), Value::from(self.owner.pk()));
			}
			RelationKind::Generic {
				content_type_column,
				object_id_column,
				..
			} => {
				attrs.insert(
					content_type_column.clone(),
					Value::from(self.owner.model().to_string()),
				);
				attrs.insert(object_id_column.clone(), Value::from(self.owner.pk()));
			}
			RelationKind::ManyToMany {
				source_column,
				through: true,
				..
			} => {
				attrs.insert(source_column.clone(), Value::from(self.owner.pk()));
			}
			_ => {}
		}
		attrs
	}

	fn generic_filters(&self) -> Vec<Filter> {
		match &self.relation.kind {
			RelationKind::Generic {
				content_type_column,
				object_id_column,
				..
			} => vec![
				Filter::eq(content_type_column.as_str(), self.owner.model()),
				Filter::eq(object_id_column.as_str(), self.owner.pk()),
			],
			_ => Vec::new(),
		}
	}
}
