//! The scheme-tagged path value type.
//!
//! A [`VPath`] identifies a location in any backing store. It is a pure
//! value: cheap to clone, comparable, hashable, and round-trippable
//! through its canonical string form. All I/O happens through the
//! [`Vfs`](crate::Vfs) registry; nothing here touches a disk or a
//! network.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{Result, VfsError};

/// The URI scheme tag identifying a path's backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scheme {
	File,
	Archive,
	S3,
	Scp,
}

impl Scheme {
	pub fn name(self) -> &'static str {
		match self {
			Self::File => "file",
			Self::Archive => "archive",
			Self::S3 => "s3",
			Self::Scp => "scp",
		}
	}
}

impl fmt::Display for Scheme {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.name())
	}
}

/// Where a path points.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Location {
	/// A native filesystem path.
	Local(PathBuf),
	/// An entry at `inner` inside the archive file at `host`. The empty
	/// string is the archive root.
	Archive { host: PathBuf, inner: String },
	/// An S3 object or prefix.
	S3 { bucket: String, key: String },
	/// A path on a remote host reached over SFTP.
	Sftp { host: String, path: String },
}

/// A scheme-tagged, cheaply cloneable path handle.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VPath {
	location: Location,
}

impl VPath {
	pub fn local(path: impl Into<PathBuf>) -> Self {
		Self {
			location: Location::Local(path.into()),
		}
	}

	/// The root of an archive file on the local filesystem.
	pub fn archive_root(host: impl Into<PathBuf>) -> Self {
		Self::archive_entry(host, "")
	}

	pub fn archive_entry(host: impl Into<PathBuf>, inner: impl Into<String>) -> Self {
		let inner: String = inner.into();
		Self {
			location: Location::Archive {
				host: host.into(),
				inner: inner.trim_matches('/').to_string(),
			},
		}
	}

	pub fn s3(bucket: impl Into<String>, key: impl Into<String>) -> Self {
		let key: String = key.into();
		Self {
			location: Location::S3 {
				bucket: bucket.into(),
				key: key.trim_start_matches('/').to_string(),
			},
		}
	}

	pub fn sftp(host: impl Into<String>, path: impl Into<String>) -> Self {
		Self {
			location: Location::Sftp {
				host: host.into(),
				path: path.into(),
			},
		}
	}

	/// Parses a canonical path string. Strings without a recognized
	/// scheme prefix are native filesystem paths.
	pub fn parse(s: &str) -> Result<Self> {
		if let Some(rest) = s.strip_prefix("archive://") {
			let (host, inner) = rest
				.split_once('#')
				.ok_or_else(|| VfsError::InvalidPath(format!("archive URI missing '#': {s}")))?;
			if host.is_empty() {
				return Err(VfsError::InvalidPath(format!("archive URI missing host path: {s}")));
			}
			return Ok(Self::archive_entry(PathBuf::from(host), inner));
		}
		if let Some(rest) = s.strip_prefix("s3://") {
			let (bucket, key) = rest.split_once('/').unwrap_or((rest, ""));
			if bucket.is_empty() {
				return Err(VfsError::InvalidPath(format!("s3 URI missing bucket: {s}")));
			}
			return Ok(Self::s3(bucket, key));
		}
		for prefix in ["scp://", "sftp://"] {
			if let Some(rest) = s.strip_prefix(prefix) {
				let (host, path) = rest.split_once('/').unwrap_or((rest, ""));
				if host.is_empty() {
					return Err(VfsError::InvalidPath(format!("scp URI missing host: {s}")));
				}
				return Ok(Self::sftp(host, format!("/{path}")));
			}
		}
		if s.contains("://") {
			return Err(VfsError::InvalidPath(format!("unknown scheme: {s}")));
		}
		Ok(Self::local(PathBuf::from(s)))
	}

	pub fn scheme(&self) -> Scheme {
		match &self.location {
			Location::Local(_) => Scheme::File,
			Location::Archive { .. } => Scheme::Archive,
			Location::S3 { .. } => Scheme::S3,
			Location::Sftp { .. } => Scheme::Scp,
		}
	}

	pub fn location(&self) -> &Location {
		&self.location
	}

	/// The native path for `file` scheme paths.
	pub fn as_local(&self) -> Option<&Path> {
		match &self.location {
			Location::Local(p) => Some(p),
			_ => None,
		}
	}

	/// Host archive file and inner key for `archive` scheme paths.
	pub fn as_archive(&self) -> Option<(&Path, &str)> {
		match &self.location {
			Location::Archive { host, inner } => Some((host, inner)),
			_ => None,
		}
	}

	pub fn is_archive_root(&self) -> bool {
		matches!(&self.location, Location::Archive { inner, .. } if inner.is_empty())
	}

	/// Appends one segment, staying inside the scheme.
	pub fn join(&self, segment: &str) -> Self {
		let segment = segment.trim_matches('/');
		match &self.location {
			Location::Local(p) => Self::local(p.join(segment)),
			Location::Archive { host, inner } => {
				let inner = if inner.is_empty() {
					segment.to_string()
				} else {
					format!("{inner}/{segment}")
				};
				Self::archive_entry(host.clone(), inner)
			}
			Location::S3 { bucket, key } => {
				let key = if key.is_empty() {
					segment.to_string()
				} else {
					format!("{}/{segment}", key.trim_end_matches('/'))
				};
				Self::s3(bucket.clone(), key)
			}
			Location::Sftp { host, path } => {
				let path = if path.is_empty() || path == "/" {
					format!("/{segment}")
				} else {
					format!("{}/{segment}", path.trim_end_matches('/'))
				};
				Self::sftp(host.clone(), path)
			}
		}
	}

	/// The containing location.
	///
	/// The parent of an archive root is the local directory holding the
	/// archive file; within an archive, one `/`-segment of the inner key
	/// pops. Roots of the other schemes have no parent.
	pub fn parent(&self) -> Option<Self> {
		match &self.location {
			Location::Local(p) => p.parent().map(Self::local),
			Location::Archive { host, inner } => {
				if inner.is_empty() {
					host.parent().map(Self::local)
				} else {
					match inner.rsplit_once('/') {
						Some((rest, _)) => Some(Self::archive_entry(host.clone(), rest)),
						None => Some(Self::archive_root(host.clone())),
					}
				}
			}
			Location::S3 { bucket, key } => {
				let key = key.trim_end_matches('/');
				if key.is_empty() {
					None
				} else {
					match key.rsplit_once('/') {
						Some((rest, _)) => Some(Self::s3(bucket.clone(), rest)),
						None => Some(Self::s3(bucket.clone(), "")),
					}
				}
			}
			Location::Sftp { host, path } => {
				let trimmed = path.trim_end_matches('/');
				if trimmed.is_empty() {
					None
				} else {
					match trimmed.rsplit_once('/') {
						Some(("", _)) => Some(Self::sftp(host.clone(), "/")),
						Some((rest, _)) => Some(Self::sftp(host.clone(), rest)),
						None => None,
					}
				}
			}
		}
	}

	/// The final segment. The name of an archive root is the archive
	/// file's own name.
	pub fn name(&self) -> String {
		match &self.location {
			Location::Local(p) => p.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default(),
			Location::Archive { host, inner } => {
				if inner.is_empty() {
					host.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default()
				} else {
					inner.rsplit('/').next().unwrap_or(inner).to_string()
				}
			}
			Location::S3 { bucket, key } => {
				let key = key.trim_end_matches('/');
				if key.is_empty() {
					bucket.clone()
				} else {
					key.rsplit('/').next().unwrap_or(key).to_string()
				}
			}
			Location::Sftp { host, path } => {
				let trimmed = path.trim_end_matches('/');
				if trimmed.is_empty() {
					host.clone()
				} else {
					trimmed.rsplit('/').next().unwrap_or(trimmed).to_string()
				}
			}
		}
	}

	/// The name without its final extension.
	pub fn stem(&self) -> String {
		let name = self.name();
		match name.rsplit_once('.') {
			Some((stem, _)) if !stem.is_empty() => stem.to_string(),
			_ => name,
		}
	}

	/// The final extension including the dot, or empty.
	pub fn suffix(&self) -> String {
		let name = self.name();
		match name.rsplit_once('.') {
			Some((stem, ext)) if !stem.is_empty() => format!(".{ext}"),
			_ => String::new(),
		}
	}
}

impl fmt::Display for VPath {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match &self.location {
			Location::Local(p) => write!(f, "{}", p.display()),
			Location::Archive { host, inner } => write!(f, "archive://{}#{inner}", host.display()),
			Location::S3 { bucket, key } => write!(f, "s3://{bucket}/{key}"),
			Location::Sftp { host, path } => write!(f, "scp://{host}{path}"),
		}
	}
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;
	use rstest::rstest;

	use super::*;

	#[rstest]
	#[case("/tmp/src/a.txt")]
	#[case("archive:///tmp/a.zip#")]
	#[case("archive:///tmp/a.zip#sub/inner.txt")]
	#[case("s3://bucket/dir/key.txt")]
	#[case("s3://bucket/")]
	#[case("scp://host/remote/path.txt")]
	fn canonical_strings_round_trip(#[case] s: &str) {
		let path = VPath::parse(s).unwrap();
		assert_eq!(path.to_string(), s);
		assert_eq!(VPath::parse(&path.to_string()).unwrap(), path);
	}

	#[test]
	fn join_preserves_scheme() {
		let archive = VPath::parse("archive:///tmp/a.zip#sub").unwrap();
		let joined = archive.join("inner.txt");
		assert_eq!(joined.to_string(), "archive:///tmp/a.zip#sub/inner.txt");
		assert_eq!(joined.scheme(), Scheme::Archive);

		let s3 = VPath::parse("s3://bucket/dir").unwrap().join("k.txt");
		assert_eq!(s3.to_string(), "s3://bucket/dir/k.txt");

		let local = VPath::local("/tmp").join("x");
		assert_eq!(local.as_local().unwrap(), Path::new("/tmp/x"));
	}

	#[test]
	fn archive_root_parent_escapes_to_host_dir() {
		let root = VPath::parse("archive:///tmp/nested/a.zip#").unwrap();
		assert_eq!(root.parent().unwrap(), VPath::local("/tmp/nested"));
	}

	#[test]
	fn archive_inner_parent_pops_one_segment() {
		let entry = VPath::parse("archive:///tmp/a.zip#sub/deep/leaf.txt").unwrap();
		let parent = entry.parent().unwrap();
		assert_eq!(parent.to_string(), "archive:///tmp/a.zip#sub/deep");

		let shallow = VPath::parse("archive:///tmp/a.zip#top.txt").unwrap();
		assert!(shallow.parent().unwrap().is_archive_root());
	}

	#[test]
	fn names_stems_suffixes() {
		let p = VPath::parse("s3://bucket/dir/report.tar.gz").unwrap();
		assert_eq!(p.name(), "report.tar.gz");
		assert_eq!(p.stem(), "report.tar");
		assert_eq!(p.suffix(), ".gz");

		let root = VPath::parse("archive:///tmp/a.zip#").unwrap();
		assert_eq!(root.name(), "a.zip");

		let dotfile = VPath::local("/home/u/.bashrc");
		assert_eq!(dotfile.stem(), ".bashrc");
		assert_eq!(dotfile.suffix(), "");
	}

	#[test]
	fn malformed_uris_are_rejected() {
		assert!(matches!(VPath::parse("archive:///tmp/a.zip"), Err(VfsError::InvalidPath(_))));
		assert!(matches!(VPath::parse("s3://"), Err(VfsError::InvalidPath(_))));
		assert!(matches!(VPath::parse("gopher://x/y"), Err(VfsError::InvalidPath(_))));
	}

	#[test]
	fn scheme_tags() {
		assert_eq!(VPath::local("/x").scheme(), Scheme::File);
		assert_eq!(VPath::archive_root("/x.zip").scheme(), Scheme::Archive);
		assert_eq!(VPath::s3("b", "k").scheme(), Scheme::S3);
		assert_eq!(VPath::sftp("h", "/p").scheme(), Scheme::Scp);
	}

	#[test]
	fn sftp_parse_keeps_absolute_remote_path() {
		let p = VPath::parse("scp://host/var/log").unwrap();
		assert_eq!(p, VPath::sftp("host", "/var/log"));
		assert_eq!(p.parent().unwrap(), VPath::sftp("host", "/var"));
		assert_eq!(p.parent().unwrap().parent().unwrap(), VPath::sftp("host", "/"));
	}
}
