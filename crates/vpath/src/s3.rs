//! S3 backend.
//!
//! The AWS SDK is async; this backend owns a small current-thread tokio
//! runtime and exposes the blocking surface the rest of dyad expects.
//! Listings are memoized per prefix with a short TTL because pane
//! refreshes hammer the same prefix; any write through this backend
//! invalidates the affected prefixes.

use std::collections::HashMap;
use std::io::{Cursor, Read, Write};
use std::time::{Duration, Instant, UNIX_EPOCH};

use aws_sdk_s3::Client;
use aws_sdk_s3::primitives::ByteStream;
use parking_lot::Mutex;

use crate::backend::{EntryKind, EntryMetadata, ExtendedMetadata, SearchStrategy, Storage};
use crate::error::{Result, VfsError};
use crate::path::{Location, Scheme, VPath};

/// How long a memoized prefix listing stays fresh.
const LISTING_TTL: Duration = Duration::from_secs(10);

struct CachedListing {
	at: Instant,
	children: Vec<VPath>,
}

/// Backend for `s3` scheme paths.
pub struct S3Storage {
	runtime: tokio::runtime::Runtime,
	client: Mutex<Option<Client>>,
	listings: Mutex<HashMap<(String, String), CachedListing>>,
}

impl S3Storage {
	pub fn new() -> Result<Self> {
		let runtime = tokio::runtime::Builder::new_current_thread()
			.enable_all()
			.build()
			.map_err(|e| VfsError::Remote(format!("tokio runtime: {e}")))?;
		Ok(Self {
			runtime,
			client: Mutex::new(None),
			listings: Mutex::new(HashMap::new()),
		})
	}

	/// The client is built lazily so startup never blocks on credential
	/// resolution when no S3 path is visited.
	fn client(&self) -> Result<Client> {
		let mut guard = self.client.lock();
		if let Some(client) = guard.as_ref() {
			return Ok(client.clone());
		}
		let config = self.runtime.block_on(aws_config::load_defaults(aws_config::BehaviorVersion::latest()));
		let client = Client::new(&config);
		*guard = Some(client.clone());
		tracing::debug!("s3 client initialized");
		Ok(client)
	}

	fn parts<'a>(&self, path: &'a VPath) -> Result<(&'a str, &'a str)> {
		match path.location() {
			Location::S3 { bucket, key } => Ok((bucket, key)),
			_ => Err(VfsError::InvalidPath(format!("{path} is not an s3 path"))),
		}
	}

	fn invalidate_listing(&self, bucket: &str, key: &str) {
		let parent_prefix = match key.trim_end_matches('/').rsplit_once('/') {
			Some((parent, _)) => format!("{parent}/"),
			None => String::new(),
		};
		let mut listings = self.listings.lock();
		listings.remove(&(bucket.to_string(), parent_prefix));
		listings.remove(&(bucket.to_string(), format!("{}/", key.trim_end_matches('/'))));
	}

	fn list_prefix(&self, bucket: &str, prefix: &str) -> Result<Vec<VPath>> {
		let cache_key = (bucket.to_string(), prefix.to_string());
		if let Some(cached) = self.listings.lock().get(&cache_key)
			&& cached.at.elapsed() < LISTING_TTL
		{
			tracing::trace!(bucket, prefix, "s3 listing cache hit");
			return Ok(cached.children.clone());
		}

		let client = self.client()?;
		let mut children = Vec::new();
		let mut continuation: Option<String> = None;

		loop {
			let output = self
				.runtime
				.block_on(
					client
						.list_objects_v2()
						.bucket(bucket)
						.prefix(prefix)
						.delimiter("/")
						.set_continuation_token(continuation.take())
						.send(),
				)
				.map_err(|e| VfsError::Remote(format!("s3 list {bucket}/{prefix}: {e}")))?;

			for common in output.common_prefixes() {
				if let Some(dir_prefix) = common.prefix() {
					children.push(VPath::s3(bucket, dir_prefix.trim_end_matches('/')));
				}
			}
			for object in output.contents() {
				if let Some(key) = object.key() {
					// The prefix marker object is the directory itself,
					// not a child.
					if key == prefix {
						continue;
					}
					children.push(VPath::s3(bucket, key));
				}
			}

			match output.next_continuation_token() {
				Some(token) => continuation = Some(token.to_string()),
				None => break,
			}
		}

		self.listings.lock().insert(
			cache_key,
			CachedListing {
				at: Instant::now(),
				children: children.clone(),
			},
		);
		Ok(children)
	}

	fn dir_prefix(key: &str) -> String {
		let trimmed = key.trim_end_matches('/');
		if trimmed.is_empty() {
			String::new()
		} else {
			format!("{trimmed}/")
		}
	}

	fn head(&self, bucket: &str, key: &str) -> Result<Option<EntryMetadata>> {
		let client = self.client()?;
		let result = self.runtime.block_on(client.head_object().bucket(bucket).key(key).send());
		match result {
			Ok(output) => {
				let size = output.content_length().unwrap_or(0).max(0) as u64;
				let mtime = output
					.last_modified()
					.map(|dt| UNIX_EPOCH + Duration::from_secs(dt.secs().max(0) as u64))
					.unwrap_or(UNIX_EPOCH);
				Ok(Some(EntryMetadata {
					size,
					mtime,
					mode_bits: 0o100644,
					kind: EntryKind::File,
				}))
			}
			Err(err) => {
				if err.as_service_error().is_some_and(|e| e.is_not_found()) {
					Ok(None)
				} else {
					Err(VfsError::Remote(format!("s3 head {bucket}/{key}: {err}")))
				}
			}
		}
	}

	fn put(&self, bucket: &str, key: &str, data: Vec<u8>) -> Result<()> {
		let client = self.client()?;
		self.runtime
			.block_on(client.put_object().bucket(bucket).key(key).body(ByteStream::from(data)).send())
			.map_err(|e| VfsError::Remote(format!("s3 put {bucket}/{key}: {e}")))?;
		self.invalidate_listing(bucket, key);
		Ok(())
	}
}

impl Storage for S3Storage {
	fn scheme(&self) -> Scheme {
		Scheme::S3
	}

	fn iterdir(&self, path: &VPath) -> Result<Vec<VPath>> {
		let (bucket, key) = self.parts(path)?;
		self.list_prefix(bucket, &Self::dir_prefix(key))
	}

	fn stat(&self, path: &VPath) -> Result<EntryMetadata> {
		let (bucket, key) = self.parts(path)?;
		let trimmed = key.trim_end_matches('/');

		if trimmed.is_empty() {
			return Ok(dir_metadata());
		}
		if let Some(meta) = self.head(bucket, trimmed)? {
			return Ok(meta);
		}
		// No object under the exact key: a non-empty prefix is a
		// directory.
		if !self.list_prefix(bucket, &Self::dir_prefix(trimmed))?.is_empty() {
			return Ok(dir_metadata());
		}
		if self.head(bucket, &format!("{trimmed}/"))?.is_some() {
			return Ok(dir_metadata());
		}
		Err(VfsError::NotFound(path.to_string()))
	}

	fn read_bytes(&self, path: &VPath) -> Result<Vec<u8>> {
		let (bucket, key) = self.parts(path)?;
		let client = self.client()?;
		let output = self
			.runtime
			.block_on(client.get_object().bucket(bucket).key(key).send())
			.map_err(|err| {
				if err.as_service_error().is_some_and(|e| e.is_no_such_key()) {
					VfsError::NotFound(path.to_string())
				} else {
					VfsError::Remote(format!("s3 get {bucket}/{key}: {err}"))
				}
			})?;
		let bytes = self
			.runtime
			.block_on(output.body.collect())
			.map_err(|e| VfsError::Remote(format!("s3 get {bucket}/{key}: {e}")))?;
		Ok(bytes.into_bytes().to_vec())
	}

	fn open_read(&self, path: &VPath) -> Result<Box<dyn Read + Send>> {
		Ok(Box::new(Cursor::new(self.read_bytes(path)?)))
	}

	fn write_bytes(&self, path: &VPath, data: &[u8]) -> Result<()> {
		let (bucket, key) = self.parts(path)?;
		self.put(bucket, key, data.to_vec())
	}

	fn open_write(&self, path: &VPath) -> Result<Box<dyn Write + Send>> {
		let (bucket, key) = self.parts(path)?;
		Err(VfsError::UnsupportedOperation(format!(
			"s3 streaming write to {bucket}/{key}; use write_bytes"
		)))
	}

	fn touch(&self, path: &VPath) -> Result<()> {
		let (bucket, key) = self.parts(path)?;
		if self.head(bucket, key)?.is_some() {
			return Ok(());
		}
		self.put(bucket, key, Vec::new())
	}

	fn mkdir(&self, path: &VPath) -> Result<()> {
		let (bucket, key) = self.parts(path)?;
		if key.is_empty() {
			return Ok(());
		}
		// Directory marker object.
		self.put(bucket, &Self::dir_prefix(key), Vec::new())
	}

	fn unlink(&self, path: &VPath) -> Result<()> {
		let (bucket, key) = self.parts(path)?;
		let client = self.client()?;
		self.runtime
			.block_on(client.delete_object().bucket(bucket).key(key).send())
			.map_err(|e| VfsError::Remote(format!("s3 delete {bucket}/{key}: {e}")))?;
		self.invalidate_listing(bucket, key);
		Ok(())
	}

	fn rmdir(&self, path: &VPath) -> Result<()> {
		let (bucket, key) = self.parts(path)?;
		let prefix = Self::dir_prefix(key);
		let children = self.list_prefix(bucket, &prefix)?;
		if !children.is_empty() {
			return Err(VfsError::Other(format!("{path}: directory not empty")));
		}
		let client = self.client()?;
		self.runtime
			.block_on(client.delete_object().bucket(bucket).key(&prefix).send())
			.map_err(|e| VfsError::Remote(format!("s3 delete {bucket}/{prefix}: {e}")))?;
		self.invalidate_listing(bucket, &prefix);
		Ok(())
	}

	fn rename(&self, from: &VPath, to: &VPath, overwrite: bool) -> Result<()> {
		let (src_bucket, src_key) = self.parts(from)?;
		let (dst_bucket, dst_key) = self.parts(to)?;
		if self.is_dir(from) {
			return Err(VfsError::UnsupportedOperation(format!("s3 directory rename: {from}")));
		}
		if !overwrite && self.head(dst_bucket, dst_key)?.is_some() {
			return Err(VfsError::AlreadyExists(to.to_string()));
		}

		let client = self.client()?;
		let source = format!("{src_bucket}/{src_key}");
		self.runtime
			.block_on(
				client
					.copy_object()
					.bucket(dst_bucket)
					.key(dst_key)
					.copy_source(&source)
					.send(),
			)
			.map_err(|e| VfsError::Remote(format!("s3 copy {source}: {e}")))?;
		self.unlink(from)?;
		self.invalidate_listing(dst_bucket, dst_key);
		Ok(())
	}

	fn supports_directory_rename(&self) -> bool {
		false
	}

	fn supports_file_editing(&self) -> bool {
		false
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
		"S3: "
	}

	fn extended_metadata(&self, path: &VPath) -> Result<ExtendedMetadata> {
		let (bucket, key) = self.parts(path)?;
		let meta = self.stat(path)?;
		Ok(ExtendedMetadata {
			storage_type: "s3".to_string(),
			details: vec![
				("Bucket".to_string(), bucket.to_string()),
				("Key".to_string(), key.to_string()),
				("Size".to_string(), meta.size.to_string()),
			],
			format_hint: "binary".to_string(),
		})
	}
}

fn dir_metadata() -> EntryMetadata {
	EntryMetadata {
		size: 0,
		mtime: UNIX_EPOCH,
		mode_bits: 0o40755,
		kind: EntryKind::Dir,
	}
}
