//! Local filesystem backend.

use std::fs;
use std::io::{Read, Write};
use std::path::Path;
use std::time::UNIX_EPOCH;

use crate::backend::{EntryKind, EntryMetadata, ExtendedMetadata, SearchStrategy, Storage};
use crate::error::{Result, VfsError};
use crate::path::{Scheme, VPath};

/// Backend for `file` scheme paths, directly over `std::fs`.
#[derive(Debug, Default)]
pub struct LocalStorage;

impl LocalStorage {
	pub fn new() -> Self {
		Self
	}

	fn native<'a>(&self, path: &'a VPath) -> Result<&'a Path> {
		path.as_local()
			.ok_or_else(|| VfsError::InvalidPath(format!("{path} is not a local path")))
	}
}

fn metadata_from_fs(meta: &fs::Metadata, symlink: bool) -> EntryMetadata {
	#[cfg(unix)]
	let mode_bits = {
		use std::os::unix::fs::MetadataExt;
		meta.mode()
	};
	#[cfg(not(unix))]
	let mode_bits = if meta.permissions().readonly() { 0o444 } else { 0o644 };

	EntryMetadata {
		size: meta.len(),
		mtime: meta.modified().unwrap_or(UNIX_EPOCH),
		mode_bits,
		kind: if symlink {
			EntryKind::Symlink
		} else if meta.is_dir() {
			EntryKind::Dir
		} else {
			EntryKind::File
		},
	}
}

impl Storage for LocalStorage {
	fn scheme(&self) -> Scheme {
		Scheme::File
	}

	fn iterdir(&self, path: &VPath) -> Result<Vec<VPath>> {
		let native = self.native(path)?;
		let context = native.display().to_string();
		let mut children = Vec::new();
		for entry in fs::read_dir(native).map_err(|e| VfsError::from_io(&context, e))? {
			let entry = entry.map_err(|e| VfsError::from_io(&context, e))?;
			children.push(VPath::local(entry.path()));
		}
		Ok(children)
	}

	fn stat(&self, path: &VPath) -> Result<EntryMetadata> {
		let native = self.native(path)?;
		let context = native.display().to_string();
		let symlink_meta = fs::symlink_metadata(native).map_err(|e| VfsError::from_io(&context, e))?;
		if symlink_meta.file_type().is_symlink() {
			return Ok(metadata_from_fs(&symlink_meta, true));
		}
		Ok(metadata_from_fs(&symlink_meta, false))
	}

	fn read_bytes(&self, path: &VPath) -> Result<Vec<u8>> {
		let native = self.native(path)?;
		fs::read(native).map_err(|e| VfsError::from_io(&native.display().to_string(), e))
	}

	fn open_read(&self, path: &VPath) -> Result<Box<dyn Read + Send>> {
		let native = self.native(path)?;
		let file = fs::File::open(native).map_err(|e| VfsError::from_io(&native.display().to_string(), e))?;
		Ok(Box::new(file))
	}

	fn write_bytes(&self, path: &VPath, data: &[u8]) -> Result<()> {
		let native = self.native(path)?;
		fs::write(native, data).map_err(|e| VfsError::from_io(&native.display().to_string(), e))
	}

	fn open_write(&self, path: &VPath) -> Result<Box<dyn Write + Send>> {
		let native = self.native(path)?;
		let file = fs::File::create(native).map_err(|e| VfsError::from_io(&native.display().to_string(), e))?;
		Ok(Box::new(file))
	}

	fn touch(&self, path: &VPath) -> Result<()> {
		let native = self.native(path)?;
		let context = native.display().to_string();
		if native.exists() {
			let now = std::time::SystemTime::now();
			let file = fs::OpenOptions::new()
				.append(true)
				.open(native)
				.map_err(|e| VfsError::from_io(&context, e))?;
			file.set_modified(now).map_err(|e| VfsError::from_io(&context, e))?;
			Ok(())
		} else {
			fs::File::create(native).map(|_| ()).map_err(|e| VfsError::from_io(&context, e))
		}
	}

	fn mkdir(&self, path: &VPath) -> Result<()> {
		let native = self.native(path)?;
		fs::create_dir_all(native).map_err(|e| VfsError::from_io(&native.display().to_string(), e))
	}

	fn unlink(&self, path: &VPath) -> Result<()> {
		let native = self.native(path)?;
		fs::remove_file(native).map_err(|e| VfsError::from_io(&native.display().to_string(), e))
	}

	fn rmdir(&self, path: &VPath) -> Result<()> {
		let native = self.native(path)?;
		fs::remove_dir(native).map_err(|e| VfsError::from_io(&native.display().to_string(), e))
	}

	fn rename(&self, from: &VPath, to: &VPath, overwrite: bool) -> Result<()> {
		let src = self.native(from)?;
		let dst = self.native(to)?;
		let context = dst.display().to_string();
		if !overwrite && dst.exists() {
			return Err(VfsError::AlreadyExists(context));
		}
		fs::rename(src, dst).map_err(|e| VfsError::from_io(&context, e))
	}

	fn copy_native(&self, from: &VPath, to: &VPath) -> Result<()> {
		let src = self.native(from)?;
		let dst = self.native(to)?;
		// fs::copy preserves permissions; mtime is re-applied by the
		// executor through set_metadata.
		fs::copy(src, dst).map(|_| ()).map_err(|e| VfsError::from_io(&dst.display().to_string(), e))
	}

	fn set_metadata(&self, path: &VPath, meta: &EntryMetadata) -> Result<()> {
		let native = self.native(path)?;
		let context = native.display().to_string();
		let file = match fs::OpenOptions::new().write(true).open(native) {
			Ok(file) => file,
			// Directories cannot be opened for write on every platform;
			// skip quietly.
			Err(_) => return Ok(()),
		};
		file.set_modified(meta.mtime).map_err(|e| VfsError::from_io(&context, e))?;
		#[cfg(unix)]
		{
			use std::os::unix::fs::PermissionsExt;
			let _ = fs::set_permissions(native, fs::Permissions::from_mode(meta.mode_bits & 0o7777));
		}
		Ok(())
	}

	fn extended_metadata(&self, path: &VPath) -> Result<ExtendedMetadata> {
		let meta = self.stat(path)?;
		Ok(ExtendedMetadata {
			storage_type: "local".to_string(),
			details: vec![
				("Path".to_string(), path.to_string()),
				("Size".to_string(), meta.size.to_string()),
				("Mode".to_string(), format!("{:o}", meta.mode_bits & 0o7777)),
			],
			format_hint: "text".to_string(),
		})
	}
}
