//! Atomic nested create
//!
//! Write order: direct relations, the host record, then reverse, generic,
//! many-to-many and through relations. Everything runs inside one
//! transaction scope; a nested create joins the scope of its parent.

use crate::context::NestedContext;
use crate::error::SerializerError;
use crate::serializer::{ModelSerializer, passthrough_attrs};
use crate::validators::ValidatedData;
use reinhardt_nested_orm::{Attrs, Database, Record, TransactionScope};

impl ModelSerializer {
	/// Create a record and everything nested in `data`
	///
	/// `data` must come from [`ModelSerializer::run_validation`]. Either the
	/// whole graph is persisted or nothing is.
	pub async fn create(
		&self,
		db: &dyn Database,
		ctx: &NestedContext,
		data: ValidatedData,
	) -> Result<Record, SerializerError> {
		self.create_with(db, ctx, data, Attrs::new()).await
	}

	pub(crate) async fn create_with(
		&self,
		db: &dyn Database,
		ctx: &NestedContext,
		data: ValidatedData,
		link: Attrs,
	) -> Result<Record, SerializerError> {
		tracing::debug!(model = self.model_name(), depth = ctx.depth(), "nested create");
		let scope = TransactionScope::begin(db).await?;
		let result = self.perform_create(db, ctx, data, link).await;
		scope.finish(result).await
	}

	async fn perform_create(
		&self,
		db: &dyn Database,
		ctx: &NestedContext,
		data: ValidatedData,
		link: Attrs,
	) -> Result<Record, SerializerError> {
		let payloads = self.nested_payloads(&data);
		if payloads.is_empty() {
			let mut attrs = self.scalar_attrs(&data);
			attrs.extend(link);
			self.revalidate_uniqueness(db, &data, &attrs, None).await?;
			let record = db.insert(self.model_name(), attrs).await?;
			return Ok(db.refresh(&record).await?);
		}

		if let Some(guard) = self.writer().guard() {
			guard.check(data.keys())?;
		}

		let relations = self.writer().classifier().classify(payloads);
		let mut attrs = self.scalar_attrs(&data);
		attrs.extend(passthrough_attrs(&relations.passthrough));
		self.write_direct_relations(db, ctx, &relations.direct, &mut attrs)
			.await?;
		attrs.extend(link);

		self.revalidate_uniqueness(db, &data, &attrs, None).await?;
		let record = db.insert(self.model_name(), attrs).await?;
		tracing::trace!(model = self.model_name(), pk = record.pk(), "host record inserted");

		self.write_related_lists(db, ctx, &record, &relations).await?;
		Ok(db.refresh(&record).await?)
	}
}
