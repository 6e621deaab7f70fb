//! The error taxonomy of the virtual filesystem.
//!
//! Every backend maps its native failures into [`VfsError`]; the
//! operations engine branches on the variant, never on backend-specific
//! error text. The classification matters: per-entry errors are counted
//! and skipped, while `DiskSpaceExhausted` aborts a whole operation and
//! `Cancelled` stops it cleanly.

use thiserror::Error;

/// Errors surfaced by path operations across every scheme.
#[derive(Debug, Error)]
pub enum VfsError {
	#[error("not found: {0}")]
	NotFound(String),

	#[error("already exists: {0}")]
	AlreadyExists(String),

	#[error("permission denied: {0}")]
	PermissionDenied(String),

	#[error("unsupported operation: {0}")]
	UnsupportedOperation(String),

	#[error("no space left on device: {0}")]
	DiskSpaceExhausted(String),

	#[error("invalid path: {0}")]
	InvalidPath(String),

	#[error("archive error: {0}")]
	ArchiveFormat(String),

	#[error("remote error: {0}")]
	Remote(String),

	#[error("operation cancelled")]
	Cancelled,

	#[error("{0}")]
	Other(String),
}

impl VfsError {
	/// Classifies a std I/O error for the path it occurred on.
	pub fn from_io(context: &str, err: std::io::Error) -> Self {
		use std::io::ErrorKind;
		match err.kind() {
			ErrorKind::NotFound => Self::NotFound(context.to_string()),
			ErrorKind::AlreadyExists => Self::AlreadyExists(context.to_string()),
			ErrorKind::PermissionDenied => Self::PermissionDenied(context.to_string()),
			ErrorKind::StorageFull | ErrorKind::QuotaExceeded => Self::DiskSpaceExhausted(context.to_string()),
			_ => Self::Other(format!("{context}: {err}")),
		}
	}

	/// True when the whole operation must abort rather than continue with
	/// the next entry.
	pub fn aborts_operation(&self) -> bool {
		matches!(self, Self::DiskSpaceExhausted(_) | Self::Cancelled)
	}
}

impl From<dyad_archive::ArchiveError> for VfsError {
	fn from(err: dyad_archive::ArchiveError) -> Self {
		use dyad_archive::ArchiveError;
		if err.is_disk_full() {
			return Self::DiskSpaceExhausted(err.to_string());
		}
		match err {
			ArchiveError::EntryNotFound { .. } => Self::NotFound(err.to_string()),
			ArchiveError::Io { ref source, .. } if source.kind() == std::io::ErrorKind::NotFound => Self::NotFound(err.to_string()),
			ArchiveError::UnknownFormat { .. } | ArchiveError::NotBrowsable { .. } | ArchiveError::Malformed { .. } => {
				Self::ArchiveFormat(err.to_string())
			}
			ArchiveError::Io { .. } => Self::Other(err.to_string()),
		}
	}
}

pub type Result<T> = std::result::Result<T, VfsError>;
