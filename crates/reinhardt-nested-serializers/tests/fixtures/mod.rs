//! Shared models, serializers and databases for the integration tests

#![allow(dead_code)]

pub mod models;
pub mod serializers;

use async_trait::async_trait;
use reinhardt_nested_orm::{
	Attrs, Database, DatabaseError, Filter, MemoryDatabase, ModelRegistry, Record, Result,
};
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Convert a `json!` object into attributes or a validated payload
pub fn object(value: Value) -> Map<String, Value> {
	value.as_object().cloned().unwrap_or_default()
}

pub fn memory_db() -> MemoryDatabase {
	MemoryDatabase::new(models::registry())
}

/// Memory database whose `n`th insert (1-based) fails
pub struct FailingDatabase {
	inner: MemoryDatabase,
	fail_on: usize,
	inserts: AtomicUsize,
}

impl FailingDatabase {
	pub fn new(fail_on: usize) -> Self {
		Self {
			inner: memory_db(),
			fail_on,
			inserts: AtomicUsize::new(0),
		}
	}

	pub fn inner(&self) -> &MemoryDatabase {
		&self.inner
	}
}

#[async_trait]
impl Database for FailingDatabase {
	fn registry(&self) -> &ModelRegistry {
		self.inner.registry()
	}

	async fn insert(&self, model: &str, attrs: Attrs) -> Result<Record> {
		let n = self.inserts.fetch_add(1, Ordering::SeqCst) + 1;
		if n == self.fail_on {
			return Err(DatabaseError::Backend(format!("insert #{} into {} failed", n, model)));
		}
		self.inner.insert(model, attrs).await
	}

	async fn update(&self, model: &str, pk: i64, attrs: Attrs) -> Result<Record> {
		self.inner.update(model, pk, attrs).await
	}

	async fn delete(&self, model: &str, pk: i64) -> Result<()> {
		self.inner.delete(model, pk).await
	}

	async fn get(&self, model: &str, pk: i64) -> Result<Option<Record>> {
		self.inner.get(model, pk).await
	}

	async fn filter(&self, model: &str, filters: &[Filter]) -> Result<Vec<Record>> {
		self.inner.filter(model, filters).await
	}

	async fn add_link(&self, table: &str, source: (&str, i64), target: (&str, i64)) -> Result<()> {
		self.inner.add_link(table, source, target).await
	}

	async fn remove_link(
		&self,
		table: &str,
		source: (&str, i64),
		target: (&str, i64),
	) -> Result<()> {
		self.inner.remove_link(table, source, target).await
	}

	async fn linked_ids(
		&self,
		table: &str,
		source_column: &str,
		source_pk: i64,
		target_column: &str,
	) -> Result<Vec<i64>> {
		self.inner
			.linked_ids(table, source_column, source_pk, target_column)
			.await
	}

	async fn begin(&self) -> Result<()> {
		self.inner.begin().await
	}

	async fn commit(&self) -> Result<()> {
		self.inner.commit().await
	}

	async fn rollback(&self) -> Result<()> {
		self.inner.rollback().await
	}
}
