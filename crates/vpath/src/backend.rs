//! The storage backend trait.
//!
//! One implementor per scheme. The UI and the operations engine never
//! branch on a scheme: they consult the capability queries and display
//! metadata declared here, so adding a scheme means implementing this
//! trait and registering it, with no caller changes.

use std::io::{Read, Write};
use std::time::SystemTime;

use crate::error::{Result, VfsError};
use crate::path::{Scheme, VPath};

/// What kind of node a path points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
	File,
	Dir,
	Symlink,
}

/// Metadata for one directory entry.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryMetadata {
	pub size: u64,
	pub mtime: SystemTime,
	pub mode_bits: u32,
	pub kind: EntryKind,
}

impl EntryMetadata {
	pub fn is_dir(&self) -> bool {
		self.kind == EntryKind::Dir
	}
}

/// How the search subsystem should read files on this backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchStrategy {
	/// Stream the file and scan incrementally.
	Streaming,
	/// Extract to a temporary location first.
	Extracted,
	/// Fetch the whole file into memory.
	Buffered,
}

/// A labelled metadata row for the info dialog.
pub type MetadataRow = (String, String);

/// Extended per-path metadata consumed by the info dialog and viewer
/// title bars.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtendedMetadata {
	/// Short storage type label, e.g. "local", "zip archive".
	pub storage_type: String,
	pub details: Vec<MetadataRow>,
	/// Rendering hint for the viewer ("text", "binary", …).
	pub format_hint: String,
}

/// A storage backend for one scheme.
///
/// All methods take the full [`VPath`]; implementations reject paths of
/// a foreign scheme with [`VfsError::InvalidPath`]. Backends are shared
/// across threads and must be internally synchronized.
pub trait Storage: Send + Sync {
	fn scheme(&self) -> Scheme;

	// Reads.

	/// Enumerates the immediate children of a directory.
	fn iterdir(&self, path: &VPath) -> Result<Vec<VPath>>;

	fn stat(&self, path: &VPath) -> Result<EntryMetadata>;

	/// Existence check; `false` when the store reports not-found.
	fn exists(&self, path: &VPath) -> bool {
		self.stat(path).is_ok()
	}

	fn is_dir(&self, path: &VPath) -> bool {
		self.stat(path).is_ok_and(|m| m.kind == EntryKind::Dir)
	}

	fn is_file(&self, path: &VPath) -> bool {
		self.stat(path).is_ok_and(|m| m.kind == EntryKind::File)
	}

	fn is_symlink(&self, path: &VPath) -> bool {
		self.stat(path).is_ok_and(|m| m.kind == EntryKind::Symlink)
	}

	fn read_bytes(&self, path: &VPath) -> Result<Vec<u8>>;

	fn read_text(&self, path: &VPath) -> Result<String> {
		let bytes = self.read_bytes(path)?;
		String::from_utf8(bytes).map_err(|_| VfsError::Other(format!("{path}: not valid UTF-8")))
	}

	/// Opens a byte stream over a file.
	fn open_read(&self, path: &VPath) -> Result<Box<dyn Read + Send>>;

	// Writes. Implementations on read-only backends return
	// `UnsupportedOperation`; callers are expected to have consulted
	// `supports_write_operations` first.

	fn write_bytes(&self, path: &VPath, data: &[u8]) -> Result<()>;

	fn write_text(&self, path: &VPath, text: &str) -> Result<()> {
		self.write_bytes(path, text.as_bytes())
	}

	/// Opens a streaming writer; the destination appears (or is
	/// replaced) once the writer is dropped or flushed, per backend.
	fn open_write(&self, path: &VPath) -> Result<Box<dyn Write + Send>>;

	fn touch(&self, path: &VPath) -> Result<()>;

	fn mkdir(&self, path: &VPath) -> Result<()>;

	fn unlink(&self, path: &VPath) -> Result<()>;

	fn rmdir(&self, path: &VPath) -> Result<()>;

	fn rename(&self, from: &VPath, to: &VPath, overwrite: bool) -> Result<()>;

	/// Same-scheme native copy, used before falling back to streaming.
	/// The default declines so cross-scheme streaming takes over.
	fn copy_native(&self, _from: &VPath, _to: &VPath) -> Result<()> {
		Err(VfsError::UnsupportedOperation("native copy".to_string()))
	}

	/// Applies `mtime` and `mode_bits` where the store supports them.
	/// Best-effort; errors are for real I/O failures only.
	fn set_metadata(&self, _path: &VPath, _meta: &EntryMetadata) -> Result<()> {
		Ok(())
	}

	// Capability queries. Defaults describe a full-featured writable
	// store; restricted backends override.

	fn supports_write_operations(&self) -> bool {
		true
	}

	fn supports_directory_rename(&self) -> bool {
		true
	}

	fn supports_file_editing(&self) -> bool {
		true
	}

	fn requires_extraction_for_reading(&self) -> bool {
		false
	}

	fn supports_streaming_read(&self) -> bool {
		true
	}

	fn search_strategy(&self) -> SearchStrategy {
		SearchStrategy::Streaming
	}

	fn should_cache_for_search(&self) -> bool {
		false
	}

	fn is_remote(&self) -> bool {
		false
	}

	// Display metadata.

	/// Short prefix shown before paths of this scheme, e.g. "S3: ".
	fn display_prefix(&self) -> &'static str {
		""
	}

	/// Title-bar text for a path on this backend.
	fn display_title(&self, path: &VPath) -> String {
		format!("{}{path}", self.display_prefix())
	}

	fn extended_metadata(&self, path: &VPath) -> Result<ExtendedMetadata>;
}
