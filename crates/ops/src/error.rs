//! Error types for the operations engine.

use dyad_vpath::VfsError;
use thiserror::Error;

/// Errors surfaced by the task engine and executor.
#[derive(Debug, Error)]
pub enum OpsError {
	#[error(transparent)]
	Vfs(#[from] VfsError),

	#[error("another operation is already running")]
	Busy,

	#[error("event {event} is not valid in state {state}")]
	InvalidTransition { state: &'static str, event: &'static str },
}

impl OpsError {
	/// True when the underlying failure aborts the whole operation.
	pub fn aborts_operation(&self) -> bool {
		matches!(self, Self::Vfs(err) if err.aborts_operation())
	}

	pub fn is_cancelled(&self) -> bool {
		matches!(self, Self::Vfs(VfsError::Cancelled))
	}
}

pub type Result<T> = std::result::Result<T, OpsError>;
