//! Archive indexes: one scan per archive, then pure lookups.
//!
//! An [`ArchiveIndex`] holds every entry record of an archive in archive
//! order, with a path map for lookups and immediate-children queries.
//! Directories that an archive implies but never records (common in zip
//! files written without directory entries) are synthesized as *virtual
//! directories* during child enumeration.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::error::{ArchiveError, Result};
use crate::format::ArchiveFormat;

/// What an archive entry is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveEntryKind {
	File,
	Dir,
}

/// One record in an archive index.
#[derive(Debug, Clone, PartialEq)]
pub struct ArchiveEntry {
	/// Entry path inside the archive, `/`-separated, no leading or
	/// trailing slash.
	pub path: String,
	pub size: u64,
	pub mtime: SystemTime,
	pub kind: ArchiveEntryKind,
	/// Byte offset of the entry's data for random-access formats.
	pub storage_offset: Option<u64>,
}

impl ArchiveEntry {
	/// The last path segment.
	pub fn name(&self) -> &str {
		self.path.rsplit('/').next().unwrap_or(&self.path)
	}

	pub fn is_dir(&self) -> bool {
		self.kind == ArchiveEntryKind::Dir
	}
}

/// An immutable, fully-scanned index of one archive.
#[derive(Debug, Clone, Default)]
pub struct ArchiveIndex {
	entries: Vec<ArchiveEntry>,
}

impl ArchiveIndex {
	pub fn entries(&self) -> &[ArchiveEntry] {
		&self.entries
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	/// Looks up an explicit entry by its exact inner path.
	pub fn get(&self, inner_key: &str) -> Option<&ArchiveEntry> {
		let key = normalize_key(inner_key);
		self.entries.iter().find(|e| e.path == key)
	}

	/// True when `inner_key` names a directory: the archive root, an
	/// explicit directory record, or a prefix implied by deeper entries.
	pub fn is_dir_key(&self, inner_key: &str) -> bool {
		let key = normalize_key(inner_key);
		if key.is_empty() {
			return true;
		}
		if self.get(&key).is_some_and(|e| e.is_dir()) {
			return true;
		}
		self.has_children(&key)
	}

	/// True when any entry lives strictly below `inner_key`.
	pub fn has_children(&self, inner_key: &str) -> bool {
		let prefix = child_prefix(inner_key);
		self.entries.iter().any(|e| e.path.starts_with(&prefix))
	}

	/// True when `inner_key` names anything known: an explicit entry or
	/// an implied directory.
	pub fn contains(&self, inner_key: &str) -> bool {
		let key = normalize_key(inner_key);
		key.is_empty() || self.get(&key).is_some() || self.has_children(&key)
	}

	/// Enumerates the immediate children of `inner_key`, sorted by name.
	///
	/// Children explicitly recorded in the archive keep their records;
	/// directories only implied by deeper entries are synthesized with
	/// the parent archive's mtime semantics (zero size, directory kind).
	pub fn immediate_children(&self, inner_key: &str) -> Vec<ArchiveEntry> {
		let prefix = child_prefix(inner_key);
		let mut children: BTreeMap<String, ArchiveEntry> = BTreeMap::new();

		for entry in &self.entries {
			let Some(rest) = entry.path.strip_prefix(&prefix) else {
				continue;
			};
			if rest.is_empty() {
				continue;
			}
			match rest.split_once('/') {
				None => {
					// Direct child; explicit records always win over a
					// previously synthesized directory.
					children.insert(rest.to_string(), entry.clone());
				}
				Some((first, _)) => {
					let implied = format!("{prefix}{first}");
					children.entry(first.to_string()).or_insert_with(|| ArchiveEntry {
						path: implied,
						size: 0,
						mtime: entry.mtime,
						kind: ArchiveEntryKind::Dir,
						storage_offset: None,
					});
				}
			}
		}

		children.into_values().collect()
	}
}

fn normalize_key(inner_key: &str) -> String {
	inner_key.trim_matches('/').to_string()
}

fn child_prefix(inner_key: &str) -> String {
	let key = normalize_key(inner_key);
	if key.is_empty() { key } else { format!("{key}/") }
}

/// Fully scans an archive into an index.
///
/// Zip archives read the central directory; tar families stream every
/// header; single-compressed files synthesize one virtual entry sized by
/// decompressing the stream.
pub fn index_archive(host_path: &Path) -> Result<ArchiveIndex> {
	let format = ArchiveFormat::detect(host_path).ok_or_else(|| ArchiveError::UnknownFormat {
		path: host_path.to_path_buf(),
	})?;
	let started = std::time::Instant::now();
	let index = match format {
		ArchiveFormat::Zip => index_zip(host_path),
		ArchiveFormat::Tar | ArchiveFormat::TarGz | ArchiveFormat::TarBz2 | ArchiveFormat::TarXz => index_tar(host_path, format),
		ArchiveFormat::Gz | ArchiveFormat::Bz2 | ArchiveFormat::Xz => index_single(host_path, format),
	}?;
	tracing::debug!(
		path = %host_path.display(),
		entries = index.len(),
		elapsed_ms = started.elapsed().as_millis() as u64,
		"indexed archive"
	);
	Ok(index)
}

fn index_zip(host_path: &Path) -> Result<ArchiveIndex> {
	let file = File::open(host_path).map_err(|e| ArchiveError::io(host_path, e))?;
	let mut zip = zip::ZipArchive::new(file).map_err(|e| ArchiveError::malformed(host_path, e.to_string()))?;

	let mut entries = Vec::with_capacity(zip.len());
	for i in 0..zip.len() {
		let entry = zip
			.by_index_raw(i)
			.map_err(|e| ArchiveError::malformed(host_path, e.to_string()))?;
		let Some(enclosed) = entry.enclosed_name() else {
			tracing::warn!(path = %host_path.display(), index = i, "skipping zip entry with unsafe name");
			continue;
		};
		let raw = enclosed.to_string_lossy().replace('\\', "/");
		let key = raw.trim_matches('/').to_string();
		if key.is_empty() {
			continue;
		}
		entries.push(ArchiveEntry {
			path: key,
			size: entry.size(),
			mtime: entry.last_modified().map_or(UNIX_EPOCH, zip_datetime_to_system_time),
			kind: if entry.is_dir() {
				ArchiveEntryKind::Dir
			} else {
				ArchiveEntryKind::File
			},
			storage_offset: Some(entry.data_start()),
		});
	}
	Ok(ArchiveIndex { entries })
}

fn index_tar(host_path: &Path, format: ArchiveFormat) -> Result<ArchiveIndex> {
	let reader = open_tar_reader(host_path, format)?;
	let mut tar = tar::Archive::new(reader);

	let mut entries = Vec::new();
	let iter = tar.entries().map_err(|e| ArchiveError::malformed(host_path, e.to_string()))?;
	for entry in iter {
		let entry = entry.map_err(|e| ArchiveError::malformed(host_path, e.to_string()))?;
		let path = entry.path().map_err(|e| ArchiveError::malformed(host_path, e.to_string()))?;
		let key = path.to_string_lossy().replace('\\', "/").trim_matches('/').to_string();
		if key.is_empty() || key.starts_with("..") {
			continue;
		}
		let header = entry.header();
		let kind = match header.entry_type() {
			tar::EntryType::Directory => ArchiveEntryKind::Dir,
			tar::EntryType::Regular | tar::EntryType::GNUSparse | tar::EntryType::Continuous => ArchiveEntryKind::File,
			// Links and specials are not browsable content.
			_ => continue,
		};
		let mtime = header
			.mtime()
			.map(|secs| UNIX_EPOCH + Duration::from_secs(secs))
			.unwrap_or(UNIX_EPOCH);
		entries.push(ArchiveEntry {
			path: key,
			size: entry.size(),
			mtime,
			kind,
			storage_offset: Some(entry.raw_file_position()),
		});
	}
	Ok(ArchiveIndex { entries })
}

fn index_single(host_path: &Path, format: ArchiveFormat) -> Result<ArchiveIndex> {
	let name = format
		.decompressed_name(host_path)
		.ok_or_else(|| ArchiveError::UnknownFormat {
			path: host_path.to_path_buf(),
		})?;
	let mtime = std::fs::metadata(host_path)
		.and_then(|m| m.modified())
		.unwrap_or(UNIX_EPOCH);

	// The decompressed size is not in any header we can trust, so scan
	// the stream once and count.
	let mut reader = open_decompressor(host_path, format)?;
	let size = std::io::copy(&mut reader, &mut std::io::sink()).map_err(|e| ArchiveError::malformed(host_path, e.to_string()))?;

	Ok(ArchiveIndex {
		entries: vec![ArchiveEntry {
			path: name,
			size,
			mtime,
			kind: ArchiveEntryKind::File,
			storage_offset: None,
		}],
	})
}

/// Opens the (possibly compressed) byte stream of a tar family archive.
pub(crate) fn open_tar_reader(host_path: &Path, format: ArchiveFormat) -> Result<Box<dyn Read>> {
	let file = File::open(host_path).map_err(|e| ArchiveError::io(host_path, e))?;
	let buffered = BufReader::new(file);
	Ok(match format {
		ArchiveFormat::Tar => Box::new(buffered),
		ArchiveFormat::TarGz => Box::new(flate2::read::GzDecoder::new(buffered)),
		ArchiveFormat::TarBz2 => Box::new(bzip2::read::BzDecoder::new(buffered)),
		ArchiveFormat::TarXz => Box::new(xz2::read::XzDecoder::new(buffered)),
		_ => {
			return Err(ArchiveError::malformed(host_path, format!("{} is not a tar family format", format.name())));
		}
	})
}

/// Opens the decompressed stream of a single-compressed file.
pub(crate) fn open_decompressor(host_path: &Path, format: ArchiveFormat) -> Result<Box<dyn Read>> {
	let file = File::open(host_path).map_err(|e| ArchiveError::io(host_path, e))?;
	let buffered = BufReader::new(file);
	Ok(match format {
		ArchiveFormat::Gz => Box::new(flate2::read::GzDecoder::new(buffered)),
		ArchiveFormat::Bz2 => Box::new(bzip2::read::BzDecoder::new(buffered)),
		ArchiveFormat::Xz => Box::new(xz2::read::XzDecoder::new(buffered)),
		_ => {
			return Err(ArchiveError::malformed(
				host_path,
				format!("{} is not a single-file compression format", format.name()),
			));
		}
	})
}

/// Converts a zip DOS timestamp to wall-clock time.
fn zip_datetime_to_system_time(dt: zip::DateTime) -> SystemTime {
	let days = days_from_civil(i64::from(dt.year()), u32::from(dt.month()), u32::from(dt.day()));
	let secs = days * 86_400 + i64::from(dt.hour()) * 3_600 + i64::from(dt.minute()) * 60 + i64::from(dt.second());
	if secs >= 0 {
		UNIX_EPOCH + Duration::from_secs(secs as u64)
	} else {
		UNIX_EPOCH
	}
}

/// Inverse of [`days_from_civil`]: `(year, month, day)` for a day count
/// since 1970-01-01.
pub(crate) fn civil_from_days(days: i64) -> (i64, u32, u32) {
	let z = days + 719_468;
	let era = z.div_euclid(146_097);
	let doe = z - era * 146_097;
	let yoe = (doe - doe / 1_460 + doe / 36_524 - doe / 146_096) / 365;
	let y = yoe + era * 400;
	let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
	let mp = (5 * doy + 2) / 153;
	let d = (doy - (153 * mp + 2) / 5 + 1) as u32;
	let m = if mp < 10 { mp + 3 } else { mp - 9 } as u32;
	(if m <= 2 { y + 1 } else { y }, m, d)
}

/// Days since 1970-01-01 for a proleptic Gregorian civil date.
fn days_from_civil(year: i64, month: u32, day: u32) -> i64 {
	let y = if month <= 2 { year - 1 } else { year };
	let era = y.div_euclid(400);
	let yoe = y - era * 400;
	let mp = i64::from((month + 9) % 12);
	let doy = (153 * mp + 2) / 5 + i64::from(day) - 1;
	let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
	era * 146_097 + doe - 719_468
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;

	use super::*;

	fn entry(path: &str, kind: ArchiveEntryKind) -> ArchiveEntry {
		ArchiveEntry {
			path: path.to_string(),
			size: 1,
			mtime: UNIX_EPOCH,
			kind,
			storage_offset: None,
		}
	}

	fn sample_index() -> ArchiveIndex {
		ArchiveIndex {
			entries: vec![
				entry("readme.txt", ArchiveEntryKind::File),
				entry("sub/inner.txt", ArchiveEntryKind::File),
				entry("sub/deep/leaf.txt", ArchiveEntryKind::File),
				entry("explicit", ArchiveEntryKind::Dir),
			],
		}
	}

	#[test]
	fn root_children_synthesize_virtual_dirs() {
		let index = sample_index();
		let children = index.immediate_children("");
		let names: Vec<_> = children.iter().map(|e| e.name().to_string()).collect();
		assert_eq!(names, vec!["explicit", "readme.txt", "sub"]);

		let sub = children.iter().find(|e| e.name() == "sub").unwrap();
		assert!(sub.is_dir());
		assert_eq!(sub.path, "sub");
	}

	#[test]
	fn nested_children_are_immediate_only() {
		let index = sample_index();
		let children = index.immediate_children("sub");
		let names: Vec<_> = children.iter().map(|e| e.name().to_string()).collect();
		assert_eq!(names, vec!["deep", "inner.txt"]);
	}

	#[test]
	fn dir_key_detection() {
		let index = sample_index();
		assert!(index.is_dir_key(""));
		assert!(index.is_dir_key("sub"));
		assert!(index.is_dir_key("sub/"));
		assert!(index.is_dir_key("explicit"));
		assert!(index.is_dir_key("sub/deep"));
		assert!(!index.is_dir_key("readme.txt"));
		assert!(!index.is_dir_key("missing"));
	}

	#[test]
	fn contains_covers_implied_dirs() {
		let index = sample_index();
		assert!(index.contains("sub/deep"));
		assert!(index.contains("sub/deep/leaf.txt"));
		assert!(!index.contains("sub/deep/missing.txt"));
	}

	#[test]
	fn civil_day_conversion_matches_known_dates() {
		assert_eq!(days_from_civil(1970, 1, 1), 0);
		assert_eq!(days_from_civil(2000, 3, 1), 11017);
		assert_eq!(days_from_civil(2024, 2, 29), 19782);
	}

	#[test]
	fn civil_day_conversion_round_trips() {
		for days in [0, 11017, 19782, 719, 40_000] {
			let (y, m, d) = civil_from_days(days);
			assert_eq!(days_from_civil(y, m, d), days);
		}
	}

	#[test]
	fn explicit_entries_win_over_synthesized() {
		let index = ArchiveIndex {
			entries: vec![
				entry("d/child.txt", ArchiveEntryKind::File),
				ArchiveEntry {
					path: "d".to_string(),
					size: 0,
					mtime: UNIX_EPOCH + Duration::from_secs(99),
					kind: ArchiveEntryKind::Dir,
					storage_offset: None,
				},
			],
		};
		let children = index.immediate_children("");
		assert_eq!(children.len(), 1);
		assert_eq!(children[0].mtime, UNIX_EPOCH + Duration::from_secs(99));
	}
}
