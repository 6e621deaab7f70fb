//! Archive backend: archives browsed as read-only directory trees.
//!
//! All reads go through the shared [`ArchiveCache`]; every mutating
//! operation answers `UnsupportedOperation`. Directory structure follows
//! the archive index, including directories only implied by deeper
//! entries.

use std::io::{Cursor, Read, Write};
use std::sync::Arc;
use std::time::UNIX_EPOCH;

use dyad_archive::{ArchiveCache, ArchiveEntry, ArchiveFormat};

use crate::backend::{EntryKind, EntryMetadata, ExtendedMetadata, SearchStrategy, Storage};
use crate::error::{Result, VfsError};
use crate::path::{Scheme, VPath};

/// Backend for `archive` scheme paths.
pub struct ArchiveStorage {
	cache: Arc<ArchiveCache>,
}

impl ArchiveStorage {
	pub fn new(cache: Arc<ArchiveCache>) -> Self {
		Self { cache }
	}

	fn read_only_error(&self, path: &VPath) -> VfsError {
		VfsError::UnsupportedOperation(format!("archives are read-only: {path}"))
	}

	fn entry_metadata(entry: &ArchiveEntry) -> EntryMetadata {
		EntryMetadata {
			size: entry.size,
			mtime: entry.mtime,
			mode_bits: if entry.is_dir() { 0o40555 } else { 0o100444 },
			kind: if entry.is_dir() { EntryKind::Dir } else { EntryKind::File },
		}
	}
}

impl Storage for ArchiveStorage {
	fn scheme(&self) -> Scheme {
		Scheme::Archive
	}

	fn iterdir(&self, path: &VPath) -> Result<Vec<VPath>> {
		let (host, inner) = path
			.as_archive()
			.ok_or_else(|| VfsError::InvalidPath(format!("{path} is not an archive path")))?;
		let index = self.cache.index(host)?;
		if !index.is_dir_key(inner) {
			return Err(VfsError::NotFound(path.to_string()));
		}
		Ok(index
			.immediate_children(inner)
			.iter()
			.map(|entry| VPath::archive_entry(host, entry.path.clone()))
			.collect())
	}

	fn stat(&self, path: &VPath) -> Result<EntryMetadata> {
		let (host, inner) = path
			.as_archive()
			.ok_or_else(|| VfsError::InvalidPath(format!("{path} is not an archive path")))?;
		let index = self.cache.index(host)?;

		if inner.is_empty() {
			// The archive root mirrors the host file's own mtime.
			let host_meta = std::fs::metadata(host).map_err(|e| VfsError::from_io(&host.display().to_string(), e))?;
			return Ok(EntryMetadata {
				size: 0,
				mtime: host_meta.modified().unwrap_or(UNIX_EPOCH),
				mode_bits: 0o40555,
				kind: EntryKind::Dir,
			});
		}

		if let Some(entry) = index.get(inner) {
			return Ok(Self::entry_metadata(entry));
		}
		if index.is_dir_key(inner) {
			// Virtual directory implied by deeper entries.
			return Ok(EntryMetadata {
				size: 0,
				mtime: UNIX_EPOCH,
				mode_bits: 0o40555,
				kind: EntryKind::Dir,
			});
		}
		Err(VfsError::NotFound(path.to_string()))
	}

	fn read_bytes(&self, path: &VPath) -> Result<Vec<u8>> {
		let (host, inner) = path
			.as_archive()
			.ok_or_else(|| VfsError::InvalidPath(format!("{path} is not an archive path")))?;
		let payload = self.cache.read_entry(host, inner)?;
		Ok(payload.as_ref().clone())
	}

	fn open_read(&self, path: &VPath) -> Result<Box<dyn Read + Send>> {
		// Extraction is whole-entry; the stream is a cursor over the
		// cached payload.
		let bytes = self.read_bytes(path)?;
		Ok(Box::new(Cursor::new(bytes)))
	}

	fn write_bytes(&self, path: &VPath, _data: &[u8]) -> Result<()> {
		Err(self.read_only_error(path))
	}

	fn open_write(&self, path: &VPath) -> Result<Box<dyn Write + Send>> {
		Err(self.read_only_error(path))
	}

	fn touch(&self, path: &VPath) -> Result<()> {
		Err(self.read_only_error(path))
	}

	fn mkdir(&self, path: &VPath) -> Result<()> {
		Err(self.read_only_error(path))
	}

	fn unlink(&self, path: &VPath) -> Result<()> {
		Err(self.read_only_error(path))
	}

	fn rmdir(&self, path: &VPath) -> Result<()> {
		Err(self.read_only_error(path))
	}

	fn rename(&self, from: &VPath, _to: &VPath, _overwrite: bool) -> Result<()> {
		Err(self.read_only_error(from))
	}

	fn supports_write_operations(&self) -> bool {
		false
	}

	fn supports_directory_rename(&self) -> bool {
		false
	}

	fn supports_file_editing(&self) -> bool {
		false
	}

	fn requires_extraction_for_reading(&self) -> bool {
		true
	}

	fn supports_streaming_read(&self) -> bool {
		false
	}

	fn search_strategy(&self) -> SearchStrategy {
		SearchStrategy::Buffered
	}

	fn should_cache_for_search(&self) -> bool {
		true
	}

	fn display_prefix(&self) -> &'static str {
		"Archive: "
	}

	fn extended_metadata(&self, path: &VPath) -> Result<ExtendedMetadata> {
		let (host, inner) = path
			.as_archive()
			.ok_or_else(|| VfsError::InvalidPath(format!("{path} is not an archive path")))?;
		let meta = self.stat(path)?;
		let format = ArchiveFormat::detect(host)
			.map(|f| f.name().to_string())
			.unwrap_or_else(|| "unknown".to_string());
		Ok(ExtendedMetadata {
			storage_type: format!("{format} archive"),
			details: vec![
				("Archive".to_string(), host.display().to_string()),
				("Entry".to_string(), if inner.is_empty() { "/".to_string() } else { inner.to_string() }),
				("Size".to_string(), meta.size.to_string()),
			],
			format_hint: "binary".to_string(),
		})
	}
}
