//! Persistence collaborator consumed by nested writers

use crate::error::{DatabaseError, Result};
use crate::filter::Filter;
use crate::meta::{ModelMeta, ModelRegistry};
use crate::record::{Attrs, Record};
use async_trait::async_trait;
use std::sync::Arc;

/// Storage operations required by nested serializers
///
/// Calls are awaited one at a time by a single request. Transactions nest:
/// each `begin` opens a savepoint inside the enclosing one and `rollback`
/// discards only the innermost level.
#[async_trait]
pub trait Database: Send + Sync {
	/// Metadata for every model this backend stores
	fn registry(&self) -> &ModelRegistry;

	/// Insert a record and return it with its assigned primary key
	async fn insert(&self, model: &str, attrs: Attrs) -> Result<Record>;

	/// Overwrite the given columns of an existing record
	async fn update(&self, model: &str, pk: i64, attrs: Attrs) -> Result<Record>;

	/// Delete a record together with its rows in implicit link tables
	async fn delete(&self, model: &str, pk: i64) -> Result<()>;

	/// Fetch a record by primary key
	async fn get(&self, model: &str, pk: i64) -> Result<Option<Record>>;

	/// Fetch every record matching all filters, in primary key order
	async fn filter(&self, model: &str, filters: &[Filter]) -> Result<Vec<Record>>;

	/// Add a row to an implicit many-to-many link table (no-op if present)
	async fn add_link(
		&self,
		table: &str,
		source: (&str, i64),
		target: (&str, i64),
	) -> Result<()>;

	/// Remove a row from an implicit many-to-many link table
	async fn remove_link(
		&self,
		table: &str,
		source: (&str, i64),
		target: (&str, i64),
	) -> Result<()>;

	/// Ids stored in `target_column` of every link row whose `source_column` is `source_pk`
	async fn linked_ids(
		&self,
		table: &str,
		source_column: &str,
		source_pk: i64,
		target_column: &str,
	) -> Result<Vec<i64>>;

	async fn begin(&self) -> Result<()>;

	async fn commit(&self) -> Result<()>;

	async fn rollback(&self) -> Result<()>;

	/// Number of records matching all filters
	async fn count(&self, model: &str, filters: &[Filter]) -> Result<usize> {
		Ok(self.filter(model, filters).await?.len())
	}

	/// Whether any record matches all filters
	async fn exists(&self, model: &str, filters: &[Filter]) -> Result<bool> {
		Ok(self.count(model, filters).await? > 0)
	}

	/// Fetch a record, failing with [`DatabaseError::RecordNotFound`] when absent
	async fn get_or_err(&self, model: &str, pk: i64) -> Result<Record> {
		self.get(model, pk)
			.await?
			.ok_or_else(|| DatabaseError::RecordNotFound {
				model: model.to_string(),
				pk,
			})
	}

	/// Re-read a record from storage
	async fn refresh(&self, record: &Record) -> Result<Record> {
		self.get_or_err(record.model(), record.pk()).await
	}

	/// Metadata of one model
	fn model_meta(&self, model: &str) -> Result<Arc<ModelMeta>> {
		self.registry().get(model)
	}
}
