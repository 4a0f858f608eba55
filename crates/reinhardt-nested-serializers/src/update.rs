//! Atomic nested update

use crate::context::NestedContext;
use crate::error::SerializerError;
use crate::serializer::{ModelSerializer, passthrough_attrs};
use crate::validators::ValidatedData;
use reinhardt_nested_orm::{Attrs, Database, Record, TransactionScope};

impl ModelSerializer {
	/// Update `instance` and reconcile everything nested in `data`
	///
	/// Related records listed in the payload are updated or created; the
	/// ones left out are dissociated unless the field preserves them.
	pub async fn update(
		&self,
		db: &dyn Database,
		ctx: &NestedContext,
		instance: Record,
		data: ValidatedData,
	) -> Result<Record, SerializerError> {
		self.update_with(db, ctx, instance, data, Attrs::new()).await
	}

	pub(crate) async fn update_with(
		&self,
		db: &dyn Database,
		ctx: &NestedContext,
		instance: Record,
		data: ValidatedData,
		link: Attrs,
	) -> Result<Record, SerializerError> {
		tracing::debug!(
			model = self.model_name(),
			pk = instance.pk(),
			depth = ctx.depth(),
			"nested update"
		);
		let scope = TransactionScope::begin(db).await?;
		let result = self.perform_update(db, ctx, instance, data, link).await;
		scope.finish(result).await
	}

	async fn perform_update(
		&self,
		db: &dyn Database,
		ctx: &NestedContext,
		instance: Record,
		data: ValidatedData,
		link: Attrs,
	) -> Result<Record, SerializerError> {
		let relations = self
			.writer()
			.classifier()
			.classify(self.nested_payloads(&data));
		let mut attrs = self.scalar_attrs(&data);
		attrs.extend(passthrough_attrs(&relations.passthrough));
		self.write_direct_relations(db, ctx, &relations.direct, &mut attrs)
			.await?;
		attrs.extend(link);

		self.revalidate_uniqueness(db, &data, &attrs, Some(&instance))
			.await?;
		let record = if attrs.is_empty() {
			instance
		} else {
			db.update(self.model_name(), instance.pk(), attrs).await?
		};

		self.write_related_lists(db, ctx, &record, &relations).await?;
		Ok(db.refresh(&record).await?)
	}
}
