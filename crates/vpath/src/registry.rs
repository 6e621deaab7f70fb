//! The scheme → backend registry and the high-level path operations
//! built on it.
//!
//! One [`Vfs`] is created at startup and passed to the components that
//! do I/O. It resolves each [`VPath`] to its backend and hosts the
//! operations that span backends: streamed copies, moves, globbing, and
//! recursive walks.

use std::collections::HashMap;
use std::sync::Arc;

use dyad_archive::ArchiveCache;
use globset::{Glob, GlobMatcher};

use crate::backend::{EntryKind, EntryMetadata, Storage};
use crate::error::{Result, VfsError};
use crate::path::{Scheme, VPath};

/// Streaming copy chunk size; also the cancellation and progress
/// granularity for large files.
pub const COPY_CHUNK_SIZE: usize = 64 * 1024;

/// The virtual filesystem: a registry of storage backends keyed by
/// scheme.
pub struct Vfs {
	backends: HashMap<Scheme, Arc<dyn Storage>>,
}

impl Vfs {
	/// An empty registry. Tests register mock backends into this.
	pub fn new() -> Self {
		Self {
			backends: HashMap::new(),
		}
	}

	/// The standard registry: local, archive, S3, and SFTP backends.
	pub fn with_defaults(archive_cache: Arc<ArchiveCache>) -> Result<Self> {
		let mut vfs = Self::new();
		vfs.register(Arc::new(crate::local::LocalStorage::new()));
		vfs.register(Arc::new(crate::archive::ArchiveStorage::new(archive_cache)));
		vfs.register(Arc::new(crate::s3::S3Storage::new()?));
		vfs.register(Arc::new(crate::sftp::SftpStorage::new()));
		Ok(vfs)
	}

	/// Registers a backend under its declared scheme, replacing any
	/// previous one.
	pub fn register(&mut self, backend: Arc<dyn Storage>) {
		self.backends.insert(backend.scheme(), backend);
	}

	/// Resolves the backend for a path.
	pub fn storage_for(&self, path: &VPath) -> Result<&Arc<dyn Storage>> {
		self.backends
			.get(&path.scheme())
			.ok_or_else(|| VfsError::InvalidPath(format!("no backend registered for scheme {}", path.scheme())))
	}

	// Thin passthroughs, so call sites read as path operations.

	pub fn iterdir(&self, path: &VPath) -> Result<Vec<VPath>> {
		self.storage_for(path)?.iterdir(path)
	}

	pub fn stat(&self, path: &VPath) -> Result<EntryMetadata> {
		self.storage_for(path)?.stat(path)
	}

	pub fn exists(&self, path: &VPath) -> bool {
		self.storage_for(path).map(|s| s.exists(path)).unwrap_or(false)
	}

	pub fn is_dir(&self, path: &VPath) -> bool {
		self.storage_for(path).map(|s| s.is_dir(path)).unwrap_or(false)
	}

	pub fn is_file(&self, path: &VPath) -> bool {
		self.storage_for(path).map(|s| s.is_file(path)).unwrap_or(false)
	}

	pub fn is_symlink(&self, path: &VPath) -> bool {
		self.storage_for(path).map(|s| s.is_symlink(path)).unwrap_or(false)
	}

	pub fn read_bytes(&self, path: &VPath) -> Result<Vec<u8>> {
		self.storage_for(path)?.read_bytes(path)
	}

	pub fn read_text(&self, path: &VPath) -> Result<String> {
		self.storage_for(path)?.read_text(path)
	}

	pub fn write_bytes(&self, path: &VPath, data: &[u8]) -> Result<()> {
		self.storage_for(path)?.write_bytes(path, data)
	}

	pub fn write_text(&self, path: &VPath, text: &str) -> Result<()> {
		self.storage_for(path)?.write_text(path, text)
	}

	pub fn touch(&self, path: &VPath) -> Result<()> {
		self.storage_for(path)?.touch(path)
	}

	pub fn mkdir(&self, path: &VPath) -> Result<()> {
		self.storage_for(path)?.mkdir(path)
	}

	pub fn unlink(&self, path: &VPath) -> Result<()> {
		self.storage_for(path)?.unlink(path)
	}

	pub fn rmdir(&self, path: &VPath) -> Result<()> {
		self.storage_for(path)?.rmdir(path)
	}

	pub fn rename(&self, from: &VPath, to: &VPath, overwrite: bool) -> Result<()> {
		if from.scheme() != to.scheme() {
			return Err(VfsError::UnsupportedOperation(format!("rename across schemes: {from} -> {to}")));
		}
		self.storage_for(from)?.rename(from, to, overwrite)
	}

	/// Copies one file, native when both ends share a scheme, streamed
	/// otherwise. `on_chunk` sees the cumulative byte count after each
	/// chunk and can abort the copy by returning an error (typically
	/// [`VfsError::Cancelled`]). Source metadata is re-applied to the
	/// destination where the target store supports it.
	pub fn copy_file(&self, src: &VPath, dst: &VPath, on_chunk: &mut dyn FnMut(u64) -> Result<()>) -> Result<()> {
		let src_storage = self.storage_for(src)?;
		let dst_storage = self.storage_for(dst)?;
		let meta = src_storage.stat(src)?;

		if src.scheme() == dst.scheme() {
			match src_storage.copy_native(src, dst) {
				Ok(()) => {
					on_chunk(meta.size)?;
					let _ = dst_storage.set_metadata(dst, &meta);
					return Ok(());
				}
				Err(VfsError::UnsupportedOperation(_)) => {}
				Err(other) => return Err(other),
			}
		}

		self.stream_copy(src_storage.as_ref(), dst_storage.as_ref(), src, dst, on_chunk)?;
		let _ = dst_storage.set_metadata(dst, &meta);
		Ok(())
	}

	fn stream_copy(
		&self,
		src_storage: &dyn Storage,
		dst_storage: &dyn Storage,
		src: &VPath,
		dst: &VPath,
		on_chunk: &mut dyn FnMut(u64) -> Result<()>,
	) -> Result<()> {
		let mut reader = src_storage.open_read(src)?;
		let mut copied: u64 = 0;
		let mut buffer = vec![0u8; COPY_CHUNK_SIZE];

		match dst_storage.open_write(dst) {
			Ok(mut writer) => loop {
				let n = reader
					.read(&mut buffer)
					.map_err(|e| VfsError::from_io(&src.to_string(), e))?;
				if n == 0 {
					break;
				}
				writer
					.write_all(&buffer[..n])
					.map_err(|e| VfsError::from_io(&dst.to_string(), e))?;
				copied += n as u64;
				on_chunk(copied)?;
			},
			// Stores without streaming writes get the whole payload in
			// one shot; chunk callbacks still fire for cancellation.
			Err(VfsError::UnsupportedOperation(_)) => {
				let mut payload = Vec::new();
				loop {
					let n = reader
						.read(&mut buffer)
						.map_err(|e| VfsError::from_io(&src.to_string(), e))?;
					if n == 0 {
						break;
					}
					payload.extend_from_slice(&buffer[..n]);
					copied += n as u64;
					on_chunk(copied)?;
				}
				dst_storage.write_bytes(dst, &payload)?;
			}
			Err(other) => return Err(other),
		}
		Ok(())
	}

	/// Moves one file: a native rename when the scheme allows it, else
	/// copy then delete.
	pub fn move_file(&self, src: &VPath, dst: &VPath, overwrite: bool) -> Result<()> {
		if !overwrite && self.exists(dst) {
			return Err(VfsError::AlreadyExists(dst.to_string()));
		}
		if src.scheme() == dst.scheme() {
			match self.storage_for(src)?.rename(src, dst, overwrite) {
				Ok(()) => return Ok(()),
				Err(VfsError::UnsupportedOperation(_)) => {}
				Err(other) => return Err(other),
			}
		}
		self.copy_file(src, dst, &mut |_| Ok(()))?;
		self.unlink(src)
	}

	/// Immediate children whose names match `pattern`.
	pub fn glob(&self, dir: &VPath, pattern: &str) -> Result<Vec<VPath>> {
		let matcher = compile_glob(pattern)?;
		Ok(self
			.iterdir(dir)?
			.into_iter()
			.filter(|child| matcher.is_match(child.name()))
			.collect())
	}

	/// All descendants whose names match `pattern`, depth-first.
	pub fn rglob(&self, dir: &VPath, pattern: &str) -> Result<Vec<VPath>> {
		let matcher = compile_glob(pattern)?;
		let mut matched = Vec::new();
		for (path, _) in self.walk(dir)? {
			if matcher.is_match(path.name()) {
				matched.push(path);
			}
		}
		Ok(matched)
	}

	/// Depth-first walk yielding every descendant with its metadata,
	/// parents before children. Directory symlinks are reported but not
	/// descended into, so cycles cannot occur.
	pub fn walk(&self, root: &VPath) -> Result<Vec<(VPath, EntryMetadata)>> {
		let mut out = Vec::new();
		let mut stack = vec![root.clone()];
		while let Some(dir) = stack.pop() {
			for child in self.iterdir(&dir)? {
				let meta = match self.stat(&child) {
					Ok(meta) => meta,
					Err(VfsError::NotFound(_)) => continue,
					Err(other) => return Err(other),
				};
				if meta.kind == EntryKind::Dir {
					stack.push(child.clone());
				}
				out.push((child, meta));
			}
		}
		Ok(out)
	}
}

impl Default for Vfs {
	fn default() -> Self {
		Self::new()
	}
}

fn compile_glob(pattern: &str) -> Result<GlobMatcher> {
	Ok(Glob::new(pattern)
		.map_err(|e| VfsError::InvalidPath(format!("bad glob {pattern}: {e}")))?
		.compile_matcher())
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;

	use super::*;
	use crate::local::LocalStorage;

	fn local_vfs() -> Vfs {
		let mut vfs = Vfs::new();
		vfs.register(Arc::new(LocalStorage::new()));
		vfs
	}

	#[test]
	fn copy_file_native_is_bit_exact() {
		let dir = tempfile::tempdir().unwrap();
		let vfs = local_vfs();
		let src = VPath::local(dir.path().join("src.bin"));
		let dst = VPath::local(dir.path().join("dst.bin"));
		let payload: Vec<u8> = (0..=255u8).cycle().take(200_000).collect();
		vfs.write_bytes(&src, &payload).unwrap();

		let mut reported = 0;
		vfs.copy_file(&src, &dst, &mut |n| {
			reported = n;
			Ok(())
		})
		.unwrap();

		assert_eq!(vfs.read_bytes(&dst).unwrap(), payload);
		assert_eq!(reported, payload.len() as u64);
	}

	#[test]
	fn chunk_callback_can_cancel() {
		let dir = tempfile::tempdir().unwrap();
		let mut vfs = local_vfs();
		// Hide native copy behind a backend that only streams, so the
		// chunk path is exercised.
		vfs.register(Arc::new(StreamOnlyLocal));
		let src = VPath::local(dir.path().join("src.bin"));
		let dst = VPath::local(dir.path().join("dst.bin"));
		vfs.write_bytes(&src, &vec![7u8; COPY_CHUNK_SIZE * 4]).unwrap();

		let result = vfs.copy_file(&src, &dst, &mut |n| {
			if n > COPY_CHUNK_SIZE as u64 {
				Err(VfsError::Cancelled)
			} else {
				Ok(())
			}
		});
		assert!(matches!(result, Err(VfsError::Cancelled)));
	}

	#[test]
	fn move_file_renames_within_scheme() {
		let dir = tempfile::tempdir().unwrap();
		let vfs = local_vfs();
		let src = VPath::local(dir.path().join("a"));
		let dst = VPath::local(dir.path().join("b"));
		vfs.write_bytes(&src, b"move me").unwrap();

		vfs.move_file(&src, &dst, false).unwrap();
		assert!(!vfs.exists(&src));
		assert_eq!(vfs.read_bytes(&dst).unwrap(), b"move me");
	}

	#[test]
	fn walk_yields_parents_before_children() {
		let dir = tempfile::tempdir().unwrap();
		let vfs = local_vfs();
		let root = VPath::local(dir.path());
		vfs.mkdir(&root.join("d")).unwrap();
		vfs.write_bytes(&root.join("d").join("f.txt"), b"x").unwrap();

		let walked = vfs.walk(&root).unwrap();
		let names: Vec<_> = walked.iter().map(|(p, _)| p.name()).collect();
		let d_pos = names.iter().position(|n| n == "d").unwrap();
		let f_pos = names.iter().position(|n| n == "f.txt").unwrap();
		assert!(d_pos < f_pos);
	}

	#[test]
	fn glob_filters_names() {
		let dir = tempfile::tempdir().unwrap();
		let vfs = local_vfs();
		let root = VPath::local(dir.path());
		for name in ["a.rs", "b.rs", "c.txt"] {
			vfs.write_bytes(&root.join(name), b"").unwrap();
		}
		let mut matched: Vec<_> = vfs.glob(&root, "*.rs").unwrap().iter().map(VPath::name).collect();
		matched.sort();
		assert_eq!(matched, vec!["a.rs", "b.rs"]);
	}

	/// A local backend that refuses native copy, forcing the streaming
	/// path in tests.
	struct StreamOnlyLocal;

	impl Storage for StreamOnlyLocal {
		fn scheme(&self) -> Scheme {
			Scheme::File
		}

		fn iterdir(&self, path: &VPath) -> Result<Vec<VPath>> {
			LocalStorage::new().iterdir(path)
		}

		fn stat(&self, path: &VPath) -> Result<EntryMetadata> {
			LocalStorage::new().stat(path)
		}

		fn read_bytes(&self, path: &VPath) -> Result<Vec<u8>> {
			LocalStorage::new().read_bytes(path)
		}

		fn open_read(&self, path: &VPath) -> Result<Box<dyn std::io::Read + Send>> {
			LocalStorage::new().open_read(path)
		}

		fn write_bytes(&self, path: &VPath, data: &[u8]) -> Result<()> {
			LocalStorage::new().write_bytes(path, data)
		}

		fn open_write(&self, path: &VPath) -> Result<Box<dyn std::io::Write + Send>> {
			LocalStorage::new().open_write(path)
		}

		fn touch(&self, path: &VPath) -> Result<()> {
			LocalStorage::new().touch(path)
		}

		fn mkdir(&self, path: &VPath) -> Result<()> {
			LocalStorage::new().mkdir(path)
		}

		fn unlink(&self, path: &VPath) -> Result<()> {
			LocalStorage::new().unlink(path)
		}

		fn rmdir(&self, path: &VPath) -> Result<()> {
			LocalStorage::new().rmdir(path)
		}

		fn rename(&self, from: &VPath, to: &VPath, overwrite: bool) -> Result<()> {
			LocalStorage::new().rename(from, to, overwrite)
		}

		fn extended_metadata(&self, path: &VPath) -> Result<crate::backend::ExtendedMetadata> {
			LocalStorage::new().extended_metadata(path)
		}
	}
}
