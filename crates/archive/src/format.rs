//! Archive format detection by filename suffix.

use std::path::Path;

/// The archive and compression formats dyad understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArchiveFormat {
	Zip,
	Tar,
	TarGz,
	TarBz2,
	TarXz,
	/// Single gzip-compressed file.
	Gz,
	/// Single bzip2-compressed file.
	Bz2,
	/// Single xz-compressed file.
	Xz,
}

impl ArchiveFormat {
	/// Detects the format from the filename. Longer suffixes win, so
	/// `a.tar.gz` is a tarball and not a bare gzip stream.
	pub fn detect(path: &Path) -> Option<Self> {
		let name = path.file_name()?.to_str()?.to_ascii_lowercase();
		const TABLE: &[(&str, ArchiveFormat)] = &[
			(".tar.gz", ArchiveFormat::TarGz),
			(".tgz", ArchiveFormat::TarGz),
			(".tar.bz2", ArchiveFormat::TarBz2),
			(".tbz2", ArchiveFormat::TarBz2),
			(".tar.xz", ArchiveFormat::TarXz),
			(".txz", ArchiveFormat::TarXz),
			(".tar", ArchiveFormat::Tar),
			(".zip", ArchiveFormat::Zip),
			(".gz", ArchiveFormat::Gz),
			(".bz2", ArchiveFormat::Bz2),
			(".xz", ArchiveFormat::Xz),
		];
		TABLE
			.iter()
			.find(|(suffix, _)| name.ends_with(suffix) && name.len() > suffix.len())
			.map(|(_, format)| *format)
	}

	/// Whether the format holds multiple entries and can be browsed as a
	/// directory tree. Single-compressed files expose one virtual entry.
	pub fn is_browsable(self) -> bool {
		!matches!(self, Self::Gz | Self::Bz2 | Self::Xz)
	}

	/// Whether entries support random access (zip) as opposed to a
	/// sequential scan (tar family).
	pub fn supports_random_access(self) -> bool {
		matches!(self, Self::Zip)
	}

	pub fn name(self) -> &'static str {
		match self {
			Self::Zip => "zip",
			Self::Tar => "tar",
			Self::TarGz => "tar.gz",
			Self::TarBz2 => "tar.bz2",
			Self::TarXz => "tar.xz",
			Self::Gz => "gzip",
			Self::Bz2 => "bzip2",
			Self::Xz => "xz",
		}
	}

	/// The virtual entry name for a single-compressed file: the filename
	/// with the compression suffix removed.
	pub fn decompressed_name(self, path: &Path) -> Option<String> {
		let name = path.file_name()?.to_str()?;
		let stripped = match self {
			Self::Gz => name.strip_suffix(".gz").or_else(|| name.strip_suffix(".GZ")),
			Self::Bz2 => name.strip_suffix(".bz2").or_else(|| name.strip_suffix(".BZ2")),
			Self::Xz => name.strip_suffix(".xz").or_else(|| name.strip_suffix(".XZ")),
			_ => None,
		};
		stripped.map(str::to_string)
	}
}
