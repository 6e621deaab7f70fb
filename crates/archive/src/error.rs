//! Error types for archive handling.

use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced while indexing, reading, or writing archives.
#[derive(Debug, Error)]
pub enum ArchiveError {
	#[error("I/O error on {path}: {source}")]
	Io {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("{path} is not a recognized archive format")]
	UnknownFormat { path: PathBuf },

	#[error("{path} cannot be browsed as a directory")]
	NotBrowsable { path: PathBuf },

	#[error("malformed archive {path}: {detail}")]
	Malformed { path: PathBuf, detail: String },

	#[error("no entry {entry} in {path}")]
	EntryNotFound { path: PathBuf, entry: String },
}

impl ArchiveError {
	pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
		Self::Io {
			path: path.into(),
			source,
		}
	}

	pub fn malformed(path: impl Into<PathBuf>, detail: impl Into<String>) -> Self {
		Self::Malformed {
			path: path.into(),
			detail: detail.into(),
		}
	}

	/// True when the underlying condition is disk-space exhaustion, which
	/// aborts whole operations instead of counting as a per-entry error.
	pub fn is_disk_full(&self) -> bool {
		matches!(self, Self::Io { source, .. } if source.kind() == std::io::ErrorKind::StorageFull
			|| source.kind() == std::io::ErrorKind::QuotaExceeded)
	}
}

pub type Result<T> = std::result::Result<T, ArchiveError>;
