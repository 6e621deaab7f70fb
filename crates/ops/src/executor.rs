//! The I/O executor.
//!
//! The executor is the only layer that touches storage. It knows nothing
//! about dialogs or panes: the task hands it one work item at a time and
//! it reports bytes through a callback. Cancellation is observed between
//! chunks via the shared flag.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use dyad_archive::ArchiveWriter;
use dyad_vpath::{EntryKind, EntryMetadata, Scheme, VPath, Vfs, VfsError};

use crate::error::Result;

/// One unit of work: a source entry and its path relative to the
/// operation root.
#[derive(Debug, Clone)]
pub struct WorkItem {
	pub src: VPath,
	/// `/`-joined relative path under the destination directory.
	pub rel: String,
	pub meta: EntryMetadata,
}

impl WorkItem {
	pub fn is_dir(&self) -> bool {
		self.meta.kind == EntryKind::Dir
	}
}

/// Computes the destination for an item under `dest_dir`, optionally
/// substituting the leaf name (per-entry rename).
pub fn dest_for(dest_dir: &VPath, item: &WorkItem, rename_leaf: Option<&str>) -> VPath {
	let mut segments: Vec<&str> = item.rel.split('/').filter(|s| !s.is_empty()).collect();
	if let Some(leaf) = rename_leaf
		&& !segments.is_empty()
	{
		let last = segments.len() - 1;
		segments[last] = leaf;
	}
	let mut dest = dest_dir.clone();
	for segment in segments {
		dest = dest.join(segment);
	}
	dest
}

/// Performs storage operations on behalf of a task.
pub struct Executor {
	vfs: Arc<Vfs>,
}

impl Executor {
	pub fn new(vfs: Arc<Vfs>) -> Self {
		Self { vfs }
	}

	pub fn vfs(&self) -> &Vfs {
		&self.vfs
	}

	/// Expands sources into work items: each file is one item, each
	/// directory contributes itself plus every descendant, parents
	/// before children. Directory symlinks are listed, never descended.
	pub fn enumerate(&self, sources: &[VPath]) -> Result<Vec<WorkItem>> {
		let mut items = Vec::new();
		for source in sources {
			let meta = self.vfs.stat(source)?;
			let root_name = source.name();
			items.push(WorkItem {
				src: source.clone(),
				rel: root_name.clone(),
				meta: meta.clone(),
			});
			if meta.kind == EntryKind::Dir {
				let root_string = source.to_string();
				for (path, meta) in self.vfs.walk(source)? {
					let rel = relative_key(&root_string, &path.to_string())
						.map(|suffix| format!("{root_name}/{suffix}"))
						.unwrap_or_else(|| format!("{root_name}/{}", path.name()));
					items.push(WorkItem { src: path, rel, meta });
				}
			}
		}
		Ok(items)
	}

	/// Work items for every entry of an archive, relative to the archive
	/// root.
	pub fn enumerate_archive(&self, archive_root: &VPath) -> Result<Vec<WorkItem>> {
		let children = self.vfs.iterdir(archive_root)?;
		self.enumerate(&children)
	}

	/// Copies one item to `dest`. Directories are created (merging with
	/// an existing directory is not an error); files stream through the
	/// chunk callback; local symlinks are recreated, foreign ones
	/// rejected per entry.
	pub fn copy_item(&self, item: &WorkItem, dest: &VPath, on_bytes: &mut dyn FnMut(u64), cancel: &AtomicBool) -> Result<()> {
		if cancel.load(Ordering::Relaxed) {
			return Err(VfsError::Cancelled.into());
		}
		match item.meta.kind {
			EntryKind::Dir => {
				if !self.vfs.is_dir(dest) {
					self.vfs.mkdir(dest)?;
				}
				Ok(())
			}
			EntryKind::Symlink => self.copy_symlink(item, dest),
			EntryKind::File => {
				self.vfs.copy_file(&item.src, dest, &mut |bytes| {
					if cancel.load(Ordering::Relaxed) {
						return Err(VfsError::Cancelled);
					}
					on_bytes(bytes);
					Ok(())
				})?;
				Ok(())
			}
		}
	}

	#[cfg(unix)]
	fn copy_symlink(&self, item: &WorkItem, dest: &VPath) -> Result<()> {
		let (Some(src), Some(dst)) = (item.src.as_local(), dest.as_local()) else {
			return Err(VfsError::UnsupportedOperation(format!("symlink copy across stores: {}", item.src)).into());
		};
		let target = std::fs::read_link(src).map_err(|e| VfsError::from_io(&item.src.to_string(), e))?;
		if dst.exists() {
			std::fs::remove_file(dst).map_err(|e| VfsError::from_io(&dest.to_string(), e))?;
		}
		std::os::unix::fs::symlink(&target, dst).map_err(|e| VfsError::from_io(&dest.to_string(), e))?;
		Ok(())
	}

	#[cfg(not(unix))]
	fn copy_symlink(&self, item: &WorkItem, _dest: &VPath) -> Result<()> {
		Err(VfsError::UnsupportedOperation(format!("symlink copy: {}", item.src)).into())
	}

	/// Moves one item: a same-scheme rename when the backend offers one,
	/// otherwise copy then delete the source. Directory items only
	/// create the destination; their sources are removed bottom-up by
	/// [`Self::remove_source_dirs`] once their children are done.
	pub fn move_item(&self, item: &WorkItem, dest: &VPath, on_bytes: &mut dyn FnMut(u64), cancel: &AtomicBool) -> Result<()> {
		if item.is_dir() {
			return self.copy_item(item, dest, on_bytes, cancel);
		}
		if item.src.scheme() == dest.scheme() {
			match self.vfs.rename(&item.src, dest, true) {
				Ok(()) => {
					on_bytes(item.meta.size);
					return Ok(());
				}
				Err(VfsError::UnsupportedOperation(_)) => {}
				Err(other) => return Err(other.into()),
			}
		}
		self.copy_item(item, dest, on_bytes, cancel)?;
		self.vfs.unlink(&item.src)?;
		Ok(())
	}

	/// Removes moved source directories, deepest first. Failures (for
	/// instance a child that errored and stayed behind) are logged and
	/// left in place.
	pub fn remove_source_dirs(&self, dirs: &[VPath]) {
		let mut dirs: Vec<&VPath> = dirs.iter().collect();
		dirs.sort_by_key(|d| std::cmp::Reverse(d.to_string().len()));
		for dir in dirs {
			if let Err(err) = self.vfs.rmdir(dir) {
				tracing::warn!(path = %dir, error = %err, "source directory left behind after move");
			}
		}
	}

	/// Deletes one item. Directories must already be empty; the task
	/// feeds children before parents.
	pub fn delete_item(&self, item: &WorkItem) -> Result<()> {
		match item.meta.kind {
			EntryKind::Dir => self.vfs.rmdir(&item.src)?,
			EntryKind::File | EntryKind::Symlink => self.vfs.unlink(&item.src)?,
		}
		Ok(())
	}

	/// Writes a new archive at `dest` containing `items`. Per-file
	/// failures are counted and skipped; disk-space exhaustion aborts.
	/// Returns `(succeeded, errors)`.
	pub fn create_archive(
		&self,
		items: &[WorkItem],
		dest: &VPath,
		on_entry: &mut dyn FnMut(&WorkItem),
		cancel: &AtomicBool,
	) -> Result<(usize, usize)> {
		// The writer needs a seekable local file; a remote destination
		// gets the finished archive streamed up afterwards.
		let (local_dest, staging) = match dest.as_local() {
			Some(path) => (path.to_path_buf(), None),
			None => {
				let staging = tempfile::Builder::new()
					.prefix(".dyad-stage-")
					.suffix(&dest.name())
					.tempfile()
					.map_err(|e| VfsError::from_io(&dest.to_string(), e))?;
				(staging.path().to_path_buf(), Some(staging))
			}
		};

		let mut writer = ArchiveWriter::create(&local_dest).map_err(VfsError::from)?;
		let mut succeeded = 0usize;
		let mut errors = 0usize;

		for item in items {
			if cancel.load(Ordering::Relaxed) {
				return Err(VfsError::Cancelled.into());
			}
			on_entry(item);
			let result = if item.is_dir() {
				writer.add_dir(&item.rel, item.meta.mtime)
			} else {
				match self.vfs.storage_for(&item.src).and_then(|s| s.open_read(&item.src)) {
					Ok(mut reader) => writer.add_file(&item.rel, &mut reader, item.meta.size, item.meta.mtime, item.meta.mode_bits),
					Err(err) => {
						tracing::error!(path = %item.src, error = %err, "failed to read entry for archive");
						errors += 1;
						continue;
					}
				}
			};
			match result {
				Ok(()) => succeeded += 1,
				Err(err) if err.is_disk_full() => return Err(VfsError::from(err).into()),
				Err(err) => {
					tracing::error!(path = %item.src, error = %err, "failed to add entry to archive");
					errors += 1;
				}
			}
		}

		writer.finish().map_err(VfsError::from)?;

		if let Some(staging) = staging {
			let staged = VPath::local(staging.path());
			self.vfs.copy_file(&staged, dest, &mut |_| Ok(()))?;
		}
		Ok((succeeded, errors))
	}

	/// True when source and destination schemes differ, which turns a
	/// move into copy-then-delete.
	pub fn is_cross_storage(sources: &[VPath], dest: &VPath) -> bool {
		sources.iter().any(|s| s.scheme() != dest.scheme())
	}

	/// True when the destination can host an archive file directly.
	pub fn archive_dest_is_local(dest: &VPath) -> bool {
		dest.scheme() == Scheme::File
	}
}

/// The suffix of `full` below `root`, if `full` is inside `root`.
fn relative_key(root: &str, full: &str) -> Option<String> {
	let root = root.trim_end_matches('/');
	full.strip_prefix(root)
		.map(|suffix| suffix.trim_start_matches('/').to_string())
		.filter(|s| !s.is_empty())
}
