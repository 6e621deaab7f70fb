//! SFTP backend over ssh2.
//!
//! Sessions are pooled per host and authenticated through the SSH agent
//! with the current user. Remote paths are absolute; the `scp://host/p`
//! URI form maps to `/p` on the remote side.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::TcpStream;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, UNIX_EPOCH};

use parking_lot::Mutex;
use ssh2::{OpenFlags, OpenType, Session, Sftp};

use crate::backend::{EntryKind, EntryMetadata, ExtendedMetadata, SearchStrategy, Storage};
use crate::error::{Result, VfsError};
use crate::path::{Location, Scheme, VPath};

const SSH_PORT: u16 = 22;

struct HostConnection {
	_session: Session,
	sftp: Sftp,
}

/// Backend for `scp` scheme paths.
pub struct SftpStorage {
	connections: Mutex<HashMap<String, Arc<Mutex<HostConnection>>>>,
}

impl SftpStorage {
	pub fn new() -> Self {
		Self {
			connections: Mutex::new(HashMap::new()),
		}
	}

	fn parts<'a>(&self, path: &'a VPath) -> Result<(&'a str, &'a str)> {
		match path.location() {
			Location::Sftp { host, path } => Ok((host, path)),
			_ => Err(VfsError::InvalidPath(format!("{path} is not an scp path"))),
		}
	}

	fn connection(&self, host: &str) -> Result<Arc<Mutex<HostConnection>>> {
		if let Some(connection) = self.connections.lock().get(host) {
			return Ok(Arc::clone(connection));
		}

		tracing::debug!(host, "opening sftp session");
		let stream = TcpStream::connect((host, SSH_PORT)).map_err(|e| VfsError::Remote(format!("connect {host}: {e}")))?;
		let mut session = Session::new().map_err(|e| VfsError::Remote(format!("ssh session: {e}")))?;
		session.set_tcp_stream(stream);
		session.handshake().map_err(|e| VfsError::Remote(format!("ssh handshake {host}: {e}")))?;

		let user = std::env::var("USER").unwrap_or_else(|_| "root".to_string());
		session
			.userauth_agent(&user)
			.map_err(|e| VfsError::Remote(format!("ssh auth {user}@{host}: {e}")))?;

		let sftp = session.sftp().map_err(|e| VfsError::Remote(format!("sftp subsystem {host}: {e}")))?;
		let connection = Arc::new(Mutex::new(HostConnection { _session: session, sftp }));
		self.connections.lock().insert(host.to_string(), Arc::clone(&connection));
		Ok(connection)
	}

	fn map_err(host: &str, remote: &str, err: ssh2::Error) -> VfsError {
		match err.code() {
			ssh2::ErrorCode::SFTP(2) => VfsError::NotFound(format!("scp://{host}{remote}")),
			ssh2::ErrorCode::SFTP(3) => VfsError::PermissionDenied(format!("scp://{host}{remote}")),
			_ => VfsError::Remote(format!("scp://{host}{remote}: {err}")),
		}
	}

	fn stat_to_metadata(stat: &ssh2::FileStat) -> EntryMetadata {
		let kind = if stat.is_dir() {
			EntryKind::Dir
		} else if stat.file_type().is_symlink() {
			EntryKind::Symlink
		} else {
			EntryKind::File
		};
		EntryMetadata {
			size: stat.size.unwrap_or(0),
			mtime: UNIX_EPOCH + Duration::from_secs(stat.mtime.unwrap_or(0)),
			mode_bits: stat.perm.unwrap_or(0),
			kind,
		}
	}
}

impl Default for SftpStorage {
	fn default() -> Self {
		Self::new()
	}
}

impl Storage for SftpStorage {
	fn scheme(&self) -> Scheme {
		Scheme::Scp
	}

	fn iterdir(&self, path: &VPath) -> Result<Vec<VPath>> {
		let (host, remote) = self.parts(path)?;
		let connection = self.connection(host)?;
		let guard = connection.lock();
		let entries = guard
			.sftp
			.readdir(Path::new(remote))
			.map_err(|e| Self::map_err(host, remote, e))?;
		Ok(entries
			.into_iter()
			.filter_map(|(child, _)| child.to_str().map(|p| VPath::sftp(host, p)))
			.collect())
	}

	fn stat(&self, path: &VPath) -> Result<EntryMetadata> {
		let (host, remote) = self.parts(path)?;
		let connection = self.connection(host)?;
		let guard = connection.lock();
		let stat = guard.sftp.lstat(Path::new(remote)).map_err(|e| Self::map_err(host, remote, e))?;
		Ok(Self::stat_to_metadata(&stat))
	}

	fn read_bytes(&self, path: &VPath) -> Result<Vec<u8>> {
		let (host, remote) = self.parts(path)?;
		let connection = self.connection(host)?;
		let guard = connection.lock();
		let mut file = guard.sftp.open(Path::new(remote)).map_err(|e| Self::map_err(host, remote, e))?;
		let mut buffer = Vec::new();
		file.read_to_end(&mut buffer)
			.map_err(|e| VfsError::Remote(format!("scp://{host}{remote}: {e}")))?;
		Ok(buffer)
	}

	fn open_read(&self, path: &VPath) -> Result<Box<dyn Read + Send>> {
		// ssh2 file handles borrow the session; buffer the transfer so
		// the returned stream is self-contained.
		Ok(Box::new(std::io::Cursor::new(self.read_bytes(path)?)))
	}

	fn write_bytes(&self, path: &VPath, data: &[u8]) -> Result<()> {
		let (host, remote) = self.parts(path)?;
		let connection = self.connection(host)?;
		let guard = connection.lock();
		let mut file = guard
			.sftp
			.open_mode(
				Path::new(remote),
				OpenFlags::WRITE | OpenFlags::CREATE | OpenFlags::TRUNCATE,
				0o644,
				OpenType::File,
			)
			.map_err(|e| Self::map_err(host, remote, e))?;
		file.write_all(data)
			.map_err(|e| VfsError::Remote(format!("scp://{host}{remote}: {e}")))?;
		Ok(())
	}

	fn open_write(&self, path: &VPath) -> Result<Box<dyn Write + Send>> {
		let (host, remote) = self.parts(path)?;
		Err(VfsError::UnsupportedOperation(format!(
			"scp streaming write to {host}:{remote}; use write_bytes"
		)))
	}

	fn touch(&self, path: &VPath) -> Result<()> {
		if self.exists(path) {
			return Ok(());
		}
		self.write_bytes(path, &[])
	}

	fn mkdir(&self, path: &VPath) -> Result<()> {
		let (host, remote) = self.parts(path)?;
		let connection = self.connection(host)?;
		let guard = connection.lock();
		match guard.sftp.mkdir(Path::new(remote), 0o755) {
			Ok(()) => Ok(()),
			// Racing an existing directory is fine for mkdir-p callers.
			Err(e) if matches!(e.code(), ssh2::ErrorCode::SFTP(4)) => Ok(()),
			Err(e) => Err(Self::map_err(host, remote, e)),
		}
	}

	fn unlink(&self, path: &VPath) -> Result<()> {
		let (host, remote) = self.parts(path)?;
		let connection = self.connection(host)?;
		let guard = connection.lock();
		guard.sftp.unlink(Path::new(remote)).map_err(|e| Self::map_err(host, remote, e))
	}

	fn rmdir(&self, path: &VPath) -> Result<()> {
		let (host, remote) = self.parts(path)?;
		let connection = self.connection(host)?;
		let guard = connection.lock();
		guard.sftp.rmdir(Path::new(remote)).map_err(|e| Self::map_err(host, remote, e))
	}

	fn rename(&self, from: &VPath, to: &VPath, overwrite: bool) -> Result<()> {
		let (host, src) = self.parts(from)?;
		let (to_host, dst) = self.parts(to)?;
		if host != to_host {
			return Err(VfsError::UnsupportedOperation(format!("rename across hosts: {from} -> {to}")));
		}
		if !overwrite && self.exists(to) {
			return Err(VfsError::AlreadyExists(to.to_string()));
		}
		let connection = self.connection(host)?;
		let guard = connection.lock();
		guard
			.sftp
			.rename(Path::new(src), Path::new(dst), Some(ssh2::RenameFlags::OVERWRITE))
			.map_err(|e| Self::map_err(host, src, e))
	}

	fn set_metadata(&self, path: &VPath, meta: &EntryMetadata) -> Result<()> {
		let (host, remote) = self.parts(path)?;
		let connection = self.connection(host)?;
		let guard = connection.lock();
		let mtime = meta.mtime.duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0);
		let stat = ssh2::FileStat {
			size: None,
			uid: None,
			gid: None,
			perm: Some(meta.mode_bits & 0o7777),
			atime: Some(mtime),
			mtime: Some(mtime),
		};
		guard
			.sftp
			.setstat(Path::new(remote), stat)
			.map_err(|e| Self::map_err(host, remote, e))
	}

	fn requires_extraction_for_reading(&self) -> bool {
		true
	}

	fn search_strategy(&self) -> SearchStrategy {
		SearchStrategy::Buffered
	}

	fn should_cache_for_search(&self) -> bool {
		true
	}

	fn is_remote(&self) -> bool {
		true
	}

	fn display_prefix(&self) -> &'static str {
		"SCP: "
	}

	fn extended_metadata(&self, path: &VPath) -> Result<ExtendedMetadata> {
		let (host, remote) = self.parts(path)?;
		let meta = self.stat(path)?;
		Ok(ExtendedMetadata {
			storage_type: "sftp".to_string(),
			details: vec![
				("Host".to_string(), host.to_string()),
				("Path".to_string(), remote.to_string()),
				("Size".to_string(), meta.size.to_string()),
			],
			format_hint: "binary".to_string(),
		})
	}
}
