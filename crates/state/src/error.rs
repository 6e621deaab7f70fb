//! Error types for the state store.

use thiserror::Error;

/// Errors surfaced by state-store operations.
#[derive(Debug, Error)]
pub enum StateError {
	#[error("state database error: {0}")]
	Database(#[from] rusqlite::Error),

	#[error("corrupt state value under {key}: {detail}")]
	Corrupt { key: String, detail: String },
}

pub type Result<T> = std::result::Result<T, StateError>;
