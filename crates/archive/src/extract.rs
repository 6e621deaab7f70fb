//! Entry extraction.
//!
//! Zip entries are read by name through the central directory (random
//! access); tar families scan sequentially to the wanted header; a
//! single-compressed file decompresses its whole stream.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::error::{ArchiveError, Result};
use crate::format::ArchiveFormat;
use crate::index::{ArchiveIndex, open_decompressor, open_tar_reader};

/// Reads the full contents of one archive entry.
pub fn extract_entry(host_path: &Path, index: &ArchiveIndex, entry_path: &str) -> Result<Vec<u8>> {
	let format = ArchiveFormat::detect(host_path).ok_or_else(|| ArchiveError::UnknownFormat {
		path: host_path.to_path_buf(),
	})?;

	let entry = index.get(entry_path).ok_or_else(|| ArchiveError::EntryNotFound {
		path: host_path.to_path_buf(),
		entry: entry_path.to_string(),
	})?;
	if entry.is_dir() {
		return Err(ArchiveError::malformed(host_path, format!("{entry_path} is a directory")));
	}

	match format {
		ArchiveFormat::Zip => extract_zip(host_path, &entry.path),
		ArchiveFormat::Tar | ArchiveFormat::TarGz | ArchiveFormat::TarBz2 | ArchiveFormat::TarXz => {
			extract_tar(host_path, format, &entry.path)
		}
		ArchiveFormat::Gz | ArchiveFormat::Bz2 | ArchiveFormat::Xz => {
			let mut reader = open_decompressor(host_path, format)?;
			let mut payload = Vec::new();
			reader
				.read_to_end(&mut payload)
				.map_err(|e| ArchiveError::malformed(host_path, e.to_string()))?;
			Ok(payload)
		}
	}
}

fn extract_zip(host_path: &Path, entry_path: &str) -> Result<Vec<u8>> {
	let file = File::open(host_path).map_err(|e| ArchiveError::io(host_path, e))?;
	let mut zip = zip::ZipArchive::new(file).map_err(|e| ArchiveError::malformed(host_path, e.to_string()))?;

	// Zip names may carry a trailing slash on directories; ours never do,
	// so exact name lookup works for files.
	let mut entry = zip.by_name(entry_path).map_err(|e| match e {
		zip::result::ZipError::FileNotFound => ArchiveError::EntryNotFound {
			path: host_path.to_path_buf(),
			entry: entry_path.to_string(),
		},
		other => ArchiveError::malformed(host_path, other.to_string()),
	})?;

	let mut payload = Vec::with_capacity(entry.size() as usize);
	entry
		.read_to_end(&mut payload)
		.map_err(|e| ArchiveError::malformed(host_path, e.to_string()))?;
	Ok(payload)
}

fn extract_tar(host_path: &Path, format: ArchiveFormat, entry_path: &str) -> Result<Vec<u8>> {
	let reader = open_tar_reader(host_path, format)?;
	let mut tar = tar::Archive::new(reader);
	let entries = tar.entries().map_err(|e| ArchiveError::malformed(host_path, e.to_string()))?;

	for entry in entries {
		let mut entry = entry.map_err(|e| ArchiveError::malformed(host_path, e.to_string()))?;
		let path = entry.path().map_err(|e| ArchiveError::malformed(host_path, e.to_string()))?;
		let key = path.to_string_lossy().replace('\\', "/").trim_matches('/').to_string();
		if key == entry_path {
			let mut payload = Vec::with_capacity(entry.size() as usize);
			entry
				.read_to_end(&mut payload)
				.map_err(|e| ArchiveError::malformed(host_path, e.to_string()))?;
			return Ok(payload);
		}
	}

	Err(ArchiveError::EntryNotFound {
		path: host_path.to_path_buf(),
		entry: entry_path.to_string(),
	})
}
