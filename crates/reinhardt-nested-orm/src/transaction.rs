//! Transaction scopes
//!
//! A [`TransactionScope`] wraps one `begin` on a [`Database`]. Nested scopes
//! become savepoints of the enclosing one, so a nested writer can open its own
//! scope without knowing whether it runs at the top level.
//!
//! ```ignore
//! let scope = TransactionScope::begin(db).await?;
//! let result = write_everything(db).await;
//! scope.finish(result).await
//! ```

use crate::database::Database;
use crate::error::{DatabaseError, Result};

/// RAII handle over one transaction level
pub struct TransactionScope<'a> {
	db: &'a dyn Database,
	finished: bool,
}

impl<'a> TransactionScope<'a> {
	/// Begin a transaction (or savepoint when one is already open)
	pub async fn begin(db: &'a dyn Database) -> Result<TransactionScope<'a>> {
		db.begin().await?;
		Ok(Self {
			db,
			finished: false,
		})
	}

	/// Commit this level
	pub async fn commit(mut self) -> Result<()> {
		self.finished = true;
		self.db.commit().await
	}

	/// Roll back this level
	pub async fn rollback(mut self) -> Result<()> {
		self.finished = true;
		self.db.rollback().await
	}

	/// Commit when `result` is `Ok`, roll back otherwise
	///
	/// The original error is returned even when the rollback itself fails; the
	/// rollback failure is logged.
	pub async fn finish<T, E>(self, result: std::result::Result<T, E>) -> std::result::Result<T, E>
	where
		E: From<DatabaseError>,
	{
		match result {
			Ok(value) => {
				self.commit().await?;
				Ok(value)
			}
			Err(err) => {
				if let Err(rollback_err) = self.rollback().await {
					tracing::error!(error = %rollback_err, "rollback failed");
				}
				Err(err)
			}
		}
	}
}

impl Drop for TransactionScope<'_> {
	fn drop(&mut self) {
		if !self.finished {
			// Async rollback cannot run here. The backend still holds the open
			// level until the enclosing scope ends.
			tracing::warn!("TransactionScope dropped without explicit commit/rollback");
		}
	}
}
