//! Writing classified relations around the host record
//!
//! Direct relations are saved first so the host can store their keys. List
//! relations are saved once the host exists: each item is updated or created,
//! and related records missing from the payload are dissociated.

use crate::classifier::{ClassifiedRelation, ClassifiedRelations};
use crate::context::NestedContext;
use crate::error::SerializerError;
use crate::instance::CurrentValue;
use crate::serializer::{ModelSerializer, direct_column, items_are_join_records};
use reinhardt_nested_orm::{Attrs, Database, Record, RelatedManager, RelationKind};
use serde_json::{Map, Value};
use std::collections::HashSet;

impl ModelSerializer {
	/// Save forward foreign key payloads and store their keys in `attrs`
	pub(crate) async fn write_direct_relations(
		&self,
		db: &dyn Database,
		ctx: &NestedContext,
		direct: &[ClassifiedRelation],
		attrs: &mut Attrs,
	) -> Result<(), SerializerError> {
		for entry in direct {
			let Some(column) = direct_column(entry) else {
				continue;
			};
			let payload = match &entry.data {
				Value::Null => {
					attrs.insert(column.to_string(), Value::Null);
					continue;
				}
				Value::Object(payload) => payload,
				_ => continue,
			};
			let field = self.field_or_err(&entry.name)?;
			let Some(nested) = field.nested_field() else {
				continue;
			};
			let child_ctx = ctx.child_context()?;
			let mut current = self.candidates(db, None, field, Some(payload)).await?;
			let record = nested
				.serializer()
				.save_nested(db, &child_ctx, &mut current, payload.clone(), Attrs::new())
				.await
				.map_err(|e| e.nested_under(&entry.name))?;
			tracing::trace!(field = %entry.name, pk = record.pk(), "direct relation saved");
			attrs.insert(column.to_string(), Value::from(record.pk()));
		}
		Ok(())
	}

	/// Save every relation stored outside the host, in write order
	pub(crate) async fn write_related_lists(
		&self,
		db: &dyn Database,
		ctx: &NestedContext,
		owner: &Record,
		relations: &ClassifiedRelations,
	) -> Result<(), SerializerError> {
		for entry in relations.after_host() {
			self.write_list(db, ctx, owner, entry).await?;
		}
		Ok(())
	}

	async fn write_list(
		&self,
		db: &dyn Database,
		ctx: &NestedContext,
		owner: &Record,
		entry: &ClassifiedRelation,
	) -> Result<(), SerializerError> {
		let field = self.field_or_err(&entry.name)?;
		let Some(nested) = field.nested_field() else {
			return Ok(());
		};
		let items: Vec<Map<String, Value>> = match &entry.data {
			Value::Array(items) => items.iter().filter_map(|i| i.as_object().cloned()).collect(),
			Value::Object(item) => vec![item.clone()],
			// Null on a single reverse field clears it; on a list it leaves the relation alone.
			Value::Null if !nested.is_many() => Vec::new(),
			_ => return Ok(()),
		};

		let relation = &entry.relation;
		let manager = RelatedManager::new(db, owner, relation);
		let linked = matches!(relation.kind, RelationKind::ManyToMany { .. })
			&& !items_are_join_records(field, relation);
		let existing = self.related_records(db, owner, field, relation).await?;
		let link = if linked { Attrs::new() } else { manager.owner_link() };

		let child_ctx = ctx.child_context()?;
		let child = nested.serializer();
		let mut current = CurrentValue::Collection(existing.clone());
		let mut kept = HashSet::new();
		let len = items.len();
		for (index, item) in items.into_iter().enumerate() {
			let record = child
				.save_nested(db, &child_ctx, &mut current, item, link.clone())
				.await
				.map_err(|e| {
					if nested.is_many() {
						e.at_index(&entry.name, index, len)
					} else {
						e.nested_under(&entry.name)
					}
				})?;
			if linked && !existing.iter().any(|r| r.pk() == record.pk()) {
				manager.add(record.pk()).await?;
			}
			kept.insert(record.pk());
		}

		if nested.preserves_provided() {
			return Ok(());
		}
		for stale in existing.iter().filter(|r| !kept.contains(&r.pk())) {
			tracing::debug!(
				field = %entry.name,
				model = stale.model(),
				pk = stale.pk(),
				"dissociating record missing from payload"
			);
			if linked {
				manager.remove(stale.pk()).await?;
				continue;
			}
			match &relation.kind {
				RelationKind::Reverse {
					column,
					nullable: true,
					..
				} => {
					let mut attrs = Attrs::new();
					attrs.insert(column.clone(), Value::Null);
					db.update(stale.model(), stale.pk(), attrs).await?;
				}
				_ => db.delete(stale.model(), stale.pk()).await?,
			}
		}
		Ok(())
	}
}
