//! Error types for the persistence layer

use thiserror::Error;

/// Errors raised by [`Database`](crate::Database) implementations
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DatabaseError {
	/// The model name has no entry in the registry
	#[error("Model '{0}' is not registered")]
	ModelNotRegistered(String),

	/// No record exists for the given primary key
	#[error("{model} matching query does not exist (pk={pk})")]
	RecordNotFound { model: String, pk: i64 },

	/// An attribute was written that the model does not declare
	#[error("Unknown column '{column}' on model '{model}'")]
	UnknownColumn { model: String, column: String },

	/// A relation name was looked up that the model does not declare
	#[error("Unknown relation '{relation}' on model '{model}'")]
	UnknownRelation { model: String, relation: String },

	/// A NOT NULL or FOREIGN KEY constraint failed
	#[error("Integrity error: {0}")]
	Integrity(String),

	/// Begin/commit/rollback was called out of order
	#[error("Transaction error: {0}")]
	Transaction(String),

	/// Backend-specific failure
	#[error("Database error: {0}")]
	Backend(String),
}

/// Result type alias for persistence operations
pub type Result<T> = std::result::Result<T, DatabaseError>;
