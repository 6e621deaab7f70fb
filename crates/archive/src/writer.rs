//! Archive creation.
//!
//! An [`ArchiveWriter`] streams entries into a temporary file next to the
//! destination and renames it into place on [`finish`](ArchiveWriter::finish),
//! so a failed or cancelled create never leaves a half-written archive
//! under the requested name.

use std::fs::File;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use tempfile::TempPath;

use crate::error::{ArchiveError, Result};
use crate::format::ArchiveFormat;
use crate::index::civil_from_days;

/// A compressed stream that must be finalized explicitly before the
/// underlying file is persisted.
trait FinishStream: Write {
	fn finish_stream(self: Box<Self>) -> io::Result<()>;
}

impl FinishStream for File {
	fn finish_stream(mut self: Box<Self>) -> io::Result<()> {
		self.flush()?;
		self.sync_all()
	}
}

impl FinishStream for flate2::write::GzEncoder<File> {
	fn finish_stream(self: Box<Self>) -> io::Result<()> {
		(*self).finish()?.sync_all()
	}
}

impl FinishStream for bzip2::write::BzEncoder<File> {
	fn finish_stream(self: Box<Self>) -> io::Result<()> {
		(*self).finish()?.sync_all()
	}
}

impl FinishStream for xz2::write::XzEncoder<File> {
	fn finish_stream(self: Box<Self>) -> io::Result<()> {
		(*self).finish()?.sync_all()
	}
}

enum Inner {
	Zip(zip::ZipWriter<File>),
	Tar(tar::Builder<Box<dyn FinishStream>>),
}

/// Streams files and directories into a new archive.
pub struct ArchiveWriter {
	inner: Option<Inner>,
	tmp: Option<TempPath>,
	dest: PathBuf,
}

impl ArchiveWriter {
	/// Opens a writer for `dest`, with the format detected from its name.
	/// Only browsable (multi-entry) formats can be created.
	pub fn create(dest: &Path) -> Result<Self> {
		let format = ArchiveFormat::detect(dest).ok_or_else(|| ArchiveError::UnknownFormat { path: dest.to_path_buf() })?;
		if !format.is_browsable() {
			return Err(ArchiveError::NotBrowsable { path: dest.to_path_buf() });
		}

		let parent = dest.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
		let tmp = tempfile::Builder::new()
			.prefix(".dyad-archive-")
			.tempfile_in(parent)
			.map_err(|e| ArchiveError::io(dest, e))?;
		let (file, tmp_path) = tmp.into_parts();

		let inner = match format {
			ArchiveFormat::Zip => Inner::Zip(zip::ZipWriter::new(file)),
			ArchiveFormat::Tar => Inner::Tar(tar::Builder::new(Box::new(file) as Box<dyn FinishStream>)),
			ArchiveFormat::TarGz => Inner::Tar(tar::Builder::new(
				Box::new(flate2::write::GzEncoder::new(file, flate2::Compression::default())) as Box<dyn FinishStream>,
			)),
			ArchiveFormat::TarBz2 => Inner::Tar(tar::Builder::new(
				Box::new(bzip2::write::BzEncoder::new(file, bzip2::Compression::default())) as Box<dyn FinishStream>,
			)),
			ArchiveFormat::TarXz => Inner::Tar(tar::Builder::new(Box::new(xz2::write::XzEncoder::new(file, 6)) as Box<dyn FinishStream>)),
			ArchiveFormat::Gz | ArchiveFormat::Bz2 | ArchiveFormat::Xz => unreachable!("rejected above"),
		};

		Ok(Self {
			inner: Some(inner),
			tmp: Some(tmp_path),
			dest: dest.to_path_buf(),
		})
	}

	/// Appends one file entry. `name` is the `/`-separated path inside
	/// the archive; `size` must match what `reader` yields.
	pub fn add_file(&mut self, name: &str, reader: &mut dyn Read, size: u64, mtime: SystemTime, mode: u32) -> Result<()> {
		let dest = self.dest.clone();
		match self.inner.as_mut().expect("writer already finished") {
			Inner::Zip(zip) => {
				let options = zip::write::SimpleFileOptions::default()
					.compression_method(zip::CompressionMethod::Deflated)
					.unix_permissions(mode)
					.last_modified_time(zip_datetime(mtime));
				zip.start_file(name, options).map_err(|e| ArchiveError::malformed(&dest, e.to_string()))?;
				io::copy(reader, zip).map_err(|e| ArchiveError::io(&dest, e))?;
			}
			Inner::Tar(tar) => {
				let mut header = tar::Header::new_gnu();
				header.set_size(size);
				header.set_mode(mode);
				header.set_mtime(unix_seconds(mtime));
				header.set_entry_type(tar::EntryType::Regular);
				header.set_cksum();
				tar.append_data(&mut header, name, reader).map_err(|e| ArchiveError::io(&dest, e))?;
			}
		}
		Ok(())
	}

	/// Appends one directory entry.
	pub fn add_dir(&mut self, name: &str, mtime: SystemTime) -> Result<()> {
		let dest = self.dest.clone();
		match self.inner.as_mut().expect("writer already finished") {
			Inner::Zip(zip) => {
				let options = zip::write::SimpleFileOptions::default()
					.unix_permissions(0o755)
					.last_modified_time(zip_datetime(mtime));
				zip.add_directory(name, options).map_err(|e| ArchiveError::malformed(&dest, e.to_string()))?;
			}
			Inner::Tar(tar) => {
				let mut header = tar::Header::new_gnu();
				header.set_size(0);
				header.set_mode(0o755);
				header.set_mtime(unix_seconds(mtime));
				header.set_entry_type(tar::EntryType::Directory);
				header.set_cksum();
				let dir_name = if name.ends_with('/') { name.to_string() } else { format!("{name}/") };
				tar.append_data(&mut header, dir_name, io::empty()).map_err(|e| ArchiveError::io(&dest, e))?;
			}
		}
		Ok(())
	}

	/// Finalizes the archive and atomically renames it into place.
	pub fn finish(mut self) -> Result<()> {
		let dest = self.dest.clone();
		match self.inner.take().expect("writer already finished") {
			Inner::Zip(zip) => {
				let file = zip.finish().map_err(|e| ArchiveError::malformed(&dest, e.to_string()))?;
				file.sync_all().map_err(|e| ArchiveError::io(&dest, e))?;
			}
			Inner::Tar(tar) => {
				let stream = tar.into_inner().map_err(|e| ArchiveError::io(&dest, e))?;
				stream.finish_stream().map_err(|e| ArchiveError::io(&dest, e))?;
			}
		}

		let tmp = self.tmp.take().expect("tmp path taken twice");
		tmp.persist(&dest).map_err(|e| ArchiveError::io(&dest, e.error))?;
		tracing::debug!(path = %dest.display(), "archive finalized");
		Ok(())
	}
}

fn unix_seconds(mtime: SystemTime) -> u64 {
	mtime.duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0)
}

/// Best-effort conversion to the zip timestamp space (1980..=2107);
/// out-of-range times clamp to the epoch default.
fn zip_datetime(mtime: SystemTime) -> zip::DateTime {
	let secs = unix_seconds(mtime);
	let days = (secs / 86_400) as i64;
	let (year, month, day) = civil_from_days(days);
	let rem = secs % 86_400;
	let (hour, minute, second) = ((rem / 3_600) as u8, ((rem / 60) % 60) as u8, (rem % 60) as u8);
	u16::try_from(year)
		.ok()
		.and_then(|y| zip::DateTime::from_date_and_time(y, month as u8, day as u8, hour, minute, second).ok())
		.unwrap_or_default()
}
