//! In-memory [`Database`] backend
//!
//! Tables are ordered maps keyed by primary key. Transactions are snapshots:
//! `begin` pushes a copy of the whole state and `rollback` restores it, which
//! gives savepoint semantics for nested scopes for free.

use crate::database::Database;
use crate::error::{DatabaseError, Result};
use crate::filter::Filter;
use crate::meta::{ModelMeta, ModelRegistry, RelationKind};
use crate::record::{Attrs, Record, pk_from_value};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

type LinkRow = BTreeMap<String, i64>;

#[derive(Debug, Clone, Default)]
struct State {
	tables: HashMap<String, BTreeMap<i64, Record>>,
	links: HashMap<String, Vec<LinkRow>>,
	sequences: HashMap<String, i64>,
}

#[derive(Debug, Default)]
struct Inner {
	state: State,
	savepoints: Vec<State>,
}

/// Reference backend holding every table in process memory
#[derive(Debug)]
pub struct MemoryDatabase {
	registry: ModelRegistry,
	inner: Mutex<Inner>,
}

impl MemoryDatabase {
	pub fn new(registry: ModelRegistry) -> Self {
		Self {
			registry,
			inner: Mutex::new(Inner::default()),
		}
	}

	/// Number of open transaction levels
	pub fn depth(&self) -> usize {
		self.inner.lock().savepoints.len()
	}

	fn check_columns(meta: &ModelMeta, attrs: &Attrs) -> Result<()> {
		for column in attrs.keys() {
			if !meta.has_column(column) {
				return Err(DatabaseError::UnknownColumn {
					model: meta.name().to_string(),
					column: column.clone(),
				});
			}
		}
		Ok(())
	}

	fn check_constraints(&self, state: &State, meta: &ModelMeta, attrs: &Attrs) -> Result<()> {
		for column in meta.columns() {
			let value = attrs.get(&column.name).unwrap_or(&Value::Null);
			if value.is_null() && !column.nullable {
				return Err(DatabaseError::Integrity(format!(
					"NOT NULL constraint failed: {}.{}",
					meta.name(),
					column.name
				)));
			}
		}
		for relation in meta.relations() {
			if let RelationKind::ForeignKey { target, column, .. } = &relation.kind {
				let Some(value) = attrs.get(column).filter(|v| !v.is_null()) else {
					continue;
				};
				let exists = pk_from_value(value)
					.and_then(|pk| state.tables.get(target).map(|t| t.contains_key(&pk)))
					.unwrap_or(false);
				if !exists {
					return Err(DatabaseError::Integrity(format!(
						"FOREIGN KEY constraint failed: {}.{}",
						meta.name(),
						column
					)));
				}
			}
		}
		Ok(())
	}

	fn link_matches(row: &LinkRow, source: (&str, i64), target: (&str, i64)) -> bool {
		row.get(source.0) == Some(&source.1) && row.get(target.0) == Some(&target.1)
	}
}

#[async_trait]
impl Database for MemoryDatabase {
	fn registry(&self) -> &ModelRegistry {
		&self.registry
	}

	async fn insert(&self, model: &str, mut attrs: Attrs) -> Result<Record> {
		let meta = self.registry.get(model)?;
		let explicit_pk = attrs.remove(meta.pk_name()).as_ref().and_then(pk_from_value);
		Self::check_columns(&meta, &attrs)?;
		for column in meta.columns() {
			if !attrs.contains_key(&column.name) {
				let value = column.default.clone().unwrap_or(Value::Null);
				attrs.insert(column.name.clone(), value);
			}
		}

		let mut inner = self.inner.lock();
		self.check_constraints(&inner.state, &meta, &attrs)?;
		let pk = match explicit_pk {
			Some(pk) => {
				let taken = inner
					.state
					.tables
					.get(model)
					.is_some_and(|t| t.contains_key(&pk));
				if taken {
					return Err(DatabaseError::Integrity(format!(
						"UNIQUE constraint failed: {}.{}",
						model,
						meta.pk_name()
					)));
				}
				let sequence = inner.state.sequences.entry(model.to_string()).or_insert(0);
				*sequence = (*sequence).max(pk);
				pk
			}
			None => {
				let sequence = inner.state.sequences.entry(model.to_string()).or_insert(0);
				*sequence += 1;
				*sequence
			}
		};
		let record = Record::new(model, pk, attrs);
		inner
			.state
			.tables
			.entry(model.to_string())
			.or_default()
			.insert(pk, record.clone());
		tracing::trace!(model, pk, "inserted record");
		Ok(record)
	}

	async fn update(&self, model: &str, pk: i64, mut attrs: Attrs) -> Result<Record> {
		let meta = self.registry.get(model)?;
		attrs.remove(meta.pk_name());
		Self::check_columns(&meta, &attrs)?;

		let mut inner = self.inner.lock();
		let mut record = inner
			.state
			.tables
			.get(model)
			.and_then(|t| t.get(&pk))
			.cloned()
			.ok_or_else(|| DatabaseError::RecordNotFound {
				model: model.to_string(),
				pk,
			})?;
		record.attrs_mut().extend(attrs);
		self.check_constraints(&inner.state, &meta, record.attrs())?;
		inner
			.state
			.tables
			.entry(model.to_string())
			.or_default()
			.insert(pk, record.clone());
		tracing::trace!(model, pk, "updated record");
		Ok(record)
	}

	async fn delete(&self, model: &str, pk: i64) -> Result<()> {
		self.registry.get(model)?;
		let mut inner = self.inner.lock();
		let removed = inner
			.state
			.tables
			.get_mut(model)
			.and_then(|t| t.remove(&pk));
		if removed.is_none() {
			return Err(DatabaseError::RecordNotFound {
				model: model.to_string(),
				pk,
			});
		}
		for owner in self.registry.models() {
			for relation in owner.relations() {
				if let RelationKind::ManyToMany {
					target,
					table,
					source_column,
					target_column,
					through: false,
				} = &relation.kind
				{
					let column = if owner.name() == model {
						source_column
					} else if target == model {
						target_column
					} else {
						continue;
					};
					if let Some(rows) = inner.state.links.get_mut(table) {
						rows.retain(|row| row.get(column) != Some(&pk));
					}
				}
			}
		}
		tracing::trace!(model, pk, "deleted record");
		Ok(())
	}

	async fn get(&self, model: &str, pk: i64) -> Result<Option<Record>> {
		self.registry.get(model)?;
		let inner = self.inner.lock();
		Ok(inner.state.tables.get(model).and_then(|t| t.get(&pk)).cloned())
	}

	async fn filter(&self, model: &str, filters: &[Filter]) -> Result<Vec<Record>> {
		let meta = self.registry.get(model)?;
		let inner = self.inner.lock();
		let Some(table) = inner.state.tables.get(model) else {
			return Ok(Vec::new());
		};
		Ok(table
			.values()
			.filter(|record| filters.iter().all(|f| f.matches(record, meta.pk_name())))
			.cloned()
			.collect())
	}

	async fn add_link(
		&self,
		table: &str,
		source: (&str, i64),
		target: (&str, i64),
	) -> Result<()> {
		let mut inner = self.inner.lock();
		let rows = inner.state.links.entry(table.to_string()).or_default();
		if !rows.iter().any(|row| Self::link_matches(row, source, target)) {
			let mut row = LinkRow::new();
			row.insert(source.0.to_string(), source.1);
			row.insert(target.0.to_string(), target.1);
			rows.push(row);
			tracing::trace!(table, source = source.1, target = target.1, "added link");
		}
		Ok(())
	}

	async fn remove_link(
		&self,
		table: &str,
		source: (&str, i64),
		target: (&str, i64),
	) -> Result<()> {
		let mut inner = self.inner.lock();
		if let Some(rows) = inner.state.links.get_mut(table) {
			rows.retain(|row| !Self::link_matches(row, source, target));
		}
		Ok(())
	}

	async fn linked_ids(
		&self,
		table: &str,
		source_column: &str,
		source_pk: i64,
		target_column: &str,
	) -> Result<Vec<i64>> {
		let inner = self.inner.lock();
		let mut ids: Vec<i64> = inner
			.state
			.links
			.get(table)
			.map(|rows| {
				rows.iter()
					.filter(|row| row.get(source_column) == Some(&source_pk))
					.filter_map(|row| row.get(target_column).copied())
					.collect()
			})
			.unwrap_or_default();
		ids.sort_unstable();
		Ok(ids)
	}

	async fn begin(&self) -> Result<()> {
		let mut inner = self.inner.lock();
		let snapshot = inner.state.clone();
		inner.savepoints.push(snapshot);
		Ok(())
	}

	async fn commit(&self) -> Result<()> {
		let mut inner = self.inner.lock();
		inner
			.savepoints
			.pop()
			.map(|_| ())
			.ok_or_else(|| DatabaseError::Transaction("commit without begin".into()))
	}

	async fn rollback(&self) -> Result<()> {
		let mut inner = self.inner.lock();
		let snapshot = inner
			.savepoints
			.pop()
			.ok_or_else(|| DatabaseError::Transaction("rollback without begin".into()))?;
		inner.state = snapshot;
		tracing::debug!(depth = inner.savepoints.len(), "rolled back transaction level");
		Ok(())
	}
}
