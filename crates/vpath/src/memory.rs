//! In-memory storage backend for tests.
//!
//! Registers under any scheme and emulates a flat key→bytes store with
//! implicit directories, the way an object store behaves. Tests use it
//! to stand in for S3/SFTP without touching a network, and to exercise
//! capability-driven code paths with arbitrary capability sets.

use std::collections::BTreeMap;
use std::io::{Cursor, Read, Write};
use std::time::SystemTime;

use parking_lot::Mutex;

use crate::backend::{EntryKind, EntryMetadata, ExtendedMetadata, SearchStrategy, Storage};
use crate::error::{Result, VfsError};
use crate::path::{Location, Scheme, VPath};

/// Capability switches for a [`MemoryStorage`] instance.
#[derive(Debug, Clone, Copy)]
pub struct MemoryCapabilities {
	pub write: bool,
	pub directory_rename: bool,
	pub file_editing: bool,
	pub streaming_read: bool,
	pub remote: bool,
}

impl Default for MemoryCapabilities {
	fn default() -> Self {
		Self {
			write: true,
			directory_rename: false,
			file_editing: false,
			streaming_read: true,
			remote: true,
		}
	}
}

#[derive(Debug, Clone)]
struct MemoryEntry {
	data: Vec<u8>,
	mtime: SystemTime,
	mode_bits: u32,
}

#[derive(Debug, Default)]
struct MemoryTree {
	files: BTreeMap<String, MemoryEntry>,
	dirs: BTreeMap<String, SystemTime>,
}

/// A test backend over an in-memory tree.
pub struct MemoryStorage {
	scheme: Scheme,
	capabilities: MemoryCapabilities,
	tree: Mutex<MemoryTree>,
}

impl MemoryStorage {
	pub fn new(scheme: Scheme) -> Self {
		Self::with_capabilities(scheme, MemoryCapabilities::default())
	}

	pub fn with_capabilities(scheme: Scheme, capabilities: MemoryCapabilities) -> Self {
		Self {
			scheme,
			capabilities,
			tree: Mutex::new(MemoryTree::default()),
		}
	}

	/// The flat key for a path of this backend's scheme.
	fn key(&self, path: &VPath) -> Result<String> {
		if path.scheme() != self.scheme {
			return Err(VfsError::InvalidPath(format!("{path}: wrong scheme for mock backend")));
		}
		Ok(match path.location() {
			Location::Local(p) => p.to_string_lossy().trim_matches('/').to_string(),
			Location::Archive { inner, .. } => inner.clone(),
			Location::S3 { key, .. } => key.trim_matches('/').to_string(),
			Location::Sftp { path, .. } => path.trim_matches('/').to_string(),
		})
	}

	/// Rebuilds a path of this scheme from a flat key, reusing the root
	/// components of `like`. Handy for tests that assert on stored keys.
	pub fn path_for_key(&self, like: &VPath, key: &str) -> VPath {
		let mut path = root_of(like);
		for segment in key.split('/').filter(|s| !s.is_empty()) {
			path = path.join(segment);
		}
		path
	}

	fn require_write(&self, path: &VPath) -> Result<()> {
		if self.capabilities.write {
			Ok(())
		} else {
			Err(VfsError::UnsupportedOperation(format!("read-only mock storage: {path}")))
		}
	}

	fn has_children(tree: &MemoryTree, key: &str) -> bool {
		let prefix = if key.is_empty() { String::new() } else { format!("{key}/") };
		tree.files.keys().chain(tree.dirs.keys()).any(|k| k.starts_with(&prefix) && k != key)
	}
}

fn root_of(path: &VPath) -> VPath {
	match path.location() {
		Location::Local(_) => VPath::local("/"),
		Location::Archive { host, .. } => VPath::archive_root(host.clone()),
		Location::S3 { bucket, .. } => VPath::s3(bucket.clone(), ""),
		Location::Sftp { host, .. } => VPath::sftp(host.clone(), "/"),
	}
}

impl Storage for MemoryStorage {
	fn scheme(&self) -> Scheme {
		self.scheme
	}

	fn iterdir(&self, path: &VPath) -> Result<Vec<VPath>> {
		let key = self.key(path)?;
		let tree = self.tree.lock();
		if !key.is_empty() && !tree.dirs.contains_key(&key) && !Self::has_children(&tree, &key) {
			return Err(VfsError::NotFound(path.to_string()));
		}

		let prefix = if key.is_empty() { String::new() } else { format!("{key}/") };
		let mut names = std::collections::BTreeSet::new();
		for k in tree.files.keys().chain(tree.dirs.keys()) {
			if let Some(rest) = k.strip_prefix(&prefix)
				&& !rest.is_empty()
			{
				let first = rest.split('/').next().unwrap_or(rest);
				names.insert(first.to_string());
			}
		}
		Ok(names.into_iter().map(|name| path.join(&name)).collect())
	}

	fn stat(&self, path: &VPath) -> Result<EntryMetadata> {
		let key = self.key(path)?;
		let tree = self.tree.lock();
		if let Some(entry) = tree.files.get(&key) {
			return Ok(EntryMetadata {
				size: entry.data.len() as u64,
				mtime: entry.mtime,
				mode_bits: entry.mode_bits,
				kind: EntryKind::File,
			});
		}
		if key.is_empty() || tree.dirs.contains_key(&key) || Self::has_children(&tree, &key) {
			return Ok(EntryMetadata {
				size: 0,
				mtime: tree.dirs.get(&key).copied().unwrap_or(SystemTime::UNIX_EPOCH),
				mode_bits: 0o40755,
				kind: EntryKind::Dir,
			});
		}
		Err(VfsError::NotFound(path.to_string()))
	}

	fn read_bytes(&self, path: &VPath) -> Result<Vec<u8>> {
		let key = self.key(path)?;
		self.tree
			.lock()
			.files
			.get(&key)
			.map(|entry| entry.data.clone())
			.ok_or_else(|| VfsError::NotFound(path.to_string()))
	}

	fn open_read(&self, path: &VPath) -> Result<Box<dyn Read + Send>> {
		Ok(Box::new(Cursor::new(self.read_bytes(path)?)))
	}

	fn write_bytes(&self, path: &VPath, data: &[u8]) -> Result<()> {
		self.require_write(path)?;
		let key = self.key(path)?;
		self.tree.lock().files.insert(
			key,
			MemoryEntry {
				data: data.to_vec(),
				mtime: SystemTime::now(),
				mode_bits: 0o100644,
			},
		);
		Ok(())
	}

	fn open_write(&self, path: &VPath) -> Result<Box<dyn Write + Send>> {
		// Mirrors the remote backends: no streaming writes, callers fall
		// back to write_bytes.
		Err(VfsError::UnsupportedOperation(format!("streaming write: {path}")))
	}

	fn touch(&self, path: &VPath) -> Result<()> {
		if self.exists(path) {
			return Ok(());
		}
		self.write_bytes(path, &[])
	}

	fn mkdir(&self, path: &VPath) -> Result<()> {
		self.require_write(path)?;
		let key = self.key(path)?;
		self.tree.lock().dirs.insert(key, SystemTime::now());
		Ok(())
	}

	fn unlink(&self, path: &VPath) -> Result<()> {
		self.require_write(path)?;
		let key = self.key(path)?;
		self.tree
			.lock()
			.files
			.remove(&key)
			.map(|_| ())
			.ok_or_else(|| VfsError::NotFound(path.to_string()))
	}

	fn rmdir(&self, path: &VPath) -> Result<()> {
		self.require_write(path)?;
		let key = self.key(path)?;
		let mut tree = self.tree.lock();
		if Self::has_children(&tree, &key) {
			return Err(VfsError::Other(format!("{path}: directory not empty")));
		}
		tree.dirs.remove(&key);
		Ok(())
	}

	fn rename(&self, from: &VPath, to: &VPath, overwrite: bool) -> Result<()> {
		self.require_write(from)?;
		let from_key = self.key(from)?;
		let to_key = self.key(to)?;
		let mut tree = self.tree.lock();
		if !overwrite && tree.files.contains_key(&to_key) {
			return Err(VfsError::AlreadyExists(to.to_string()));
		}
		if tree.dirs.contains_key(&from_key) && !self.capabilities.directory_rename {
			return Err(VfsError::UnsupportedOperation(format!("directory rename: {from}")));
		}
		match tree.files.remove(&from_key) {
			Some(entry) => {
				tree.files.insert(to_key, entry);
				Ok(())
			}
			None => Err(VfsError::NotFound(from.to_string())),
		}
	}

	fn supports_write_operations(&self) -> bool {
		self.capabilities.write
	}

	fn supports_directory_rename(&self) -> bool {
		self.capabilities.directory_rename
	}

	fn supports_file_editing(&self) -> bool {
		self.capabilities.file_editing
	}

	fn requires_extraction_for_reading(&self) -> bool {
		self.capabilities.remote
	}

	fn supports_streaming_read(&self) -> bool {
		self.capabilities.streaming_read
	}

	fn search_strategy(&self) -> SearchStrategy {
		SearchStrategy::Buffered
	}

	fn should_cache_for_search(&self) -> bool {
		true
	}

	fn is_remote(&self) -> bool {
		self.capabilities.remote
	}

	fn display_prefix(&self) -> &'static str {
		"Mock: "
	}

	fn extended_metadata(&self, path: &VPath) -> Result<ExtendedMetadata> {
		let meta = self.stat(path)?;
		Ok(ExtendedMetadata {
			storage_type: "mock".to_string(),
			details: vec![
				("Path".to_string(), path.to_string()),
				("Size".to_string(), meta.size.to_string()),
			],
			format_hint: "text".to_string(),
		})
	}
}
