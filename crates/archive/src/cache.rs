//! Bounded archive caches.
//!
//! Two caches, both keyed by the host archive's path *and* mtime so a
//! rewritten archive never serves stale data:
//!
//! - the index cache holds fully-scanned [`ArchiveIndex`]es,
//! - the content cache holds extracted entry bytes, bounded by entry
//!   count and total bytes with LRU eviction.
//!
//! Both sit behind mutexes and are safe to hit from worker threads.

use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use lru::LruCache;
use parking_lot::Mutex;

use crate::error::{ArchiveError, Result};
use crate::extract;
use crate::index::{ArchiveIndex, index_archive};

/// Cache sizing knobs.
#[derive(Debug, Clone, Copy)]
pub struct CacheConfig {
	/// Maximum archive indexes held at once.
	pub max_indexes: usize,
	/// Maximum extracted-entry payloads held at once.
	pub max_content_entries: usize,
	/// Maximum total bytes across held payloads.
	pub max_content_bytes: u64,
}

impl Default for CacheConfig {
	fn default() -> Self {
		Self {
			max_indexes: 64,
			max_content_entries: 256,
			max_content_bytes: 64 * 1024 * 1024,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct IndexKey {
	host_path: PathBuf,
	host_mtime: SystemTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ContentKey {
	host_path: PathBuf,
	host_mtime: SystemTime,
	entry_path: String,
}

struct ContentCache {
	entries: LruCache<ContentKey, Arc<Vec<u8>>>,
	total_bytes: u64,
	max_bytes: u64,
}

impl ContentCache {
	fn new(config: &CacheConfig) -> Self {
		Self {
			entries: LruCache::new(nonzero(config.max_content_entries)),
			total_bytes: 0,
			max_bytes: config.max_content_bytes,
		}
	}

	fn get(&mut self, key: &ContentKey) -> Option<Arc<Vec<u8>>> {
		self.entries.get(key).cloned()
	}

	fn insert(&mut self, key: ContentKey, payload: Arc<Vec<u8>>) {
		let size = payload.len() as u64;
		// Oversized payloads pass through uncached rather than evicting
		// the whole cache for one reader.
		if size > self.max_bytes {
			return;
		}
		if let Some(old) = self.entries.push(key, payload) {
			self.total_bytes = self.total_bytes.saturating_sub(old.1.len() as u64);
		}
		self.total_bytes += size;
		while self.total_bytes > self.max_bytes {
			match self.entries.pop_lru() {
				Some((_, evicted)) => self.total_bytes = self.total_bytes.saturating_sub(evicted.len() as u64),
				None => break,
			}
		}
	}
}

/// The process-wide archive cache. Create one at startup and pass it to
/// the components that need it.
pub struct ArchiveCache {
	indexes: Mutex<LruCache<IndexKey, Arc<ArchiveIndex>>>,
	contents: Mutex<ContentCache>,
}

impl ArchiveCache {
	pub fn new(config: CacheConfig) -> Self {
		Self {
			indexes: Mutex::new(LruCache::new(nonzero(config.max_indexes))),
			contents: Mutex::new(ContentCache::new(&config)),
		}
	}

	/// Returns the index for `host_path`, scanning the archive on a cache
	/// miss. An mtime change on the host file is a miss by construction;
	/// superseded snapshots age out by LRU.
	pub fn index(&self, host_path: &Path) -> Result<Arc<ArchiveIndex>> {
		let key = IndexKey {
			host_path: host_path.to_path_buf(),
			host_mtime: host_mtime(host_path)?,
		};

		if let Some(index) = self.indexes.lock().get(&key).cloned() {
			tracing::trace!(path = %host_path.display(), "archive index cache hit");
			return Ok(index);
		}

		let index = Arc::new(index_archive(host_path)?);
		self.indexes.lock().put(key, Arc::clone(&index));
		Ok(index)
	}

	/// Reads one entry's bytes, extracting on a content-cache miss.
	pub fn read_entry(&self, host_path: &Path, entry_path: &str) -> Result<Arc<Vec<u8>>> {
		let key = ContentKey {
			host_path: host_path.to_path_buf(),
			host_mtime: host_mtime(host_path)?,
			entry_path: entry_path.trim_matches('/').to_string(),
		};

		if let Some(payload) = self.contents.lock().get(&key) {
			tracing::trace!(path = %host_path.display(), entry = entry_path, "archive content cache hit");
			return Ok(payload);
		}

		let index = self.index(host_path)?;
		let payload = Arc::new(extract::extract_entry(host_path, &index, &key.entry_path)?);
		self.contents.lock().insert(key, Arc::clone(&payload));
		Ok(payload)
	}

	/// Drops every cached index and payload for `host_path`, regardless
	/// of snapshot mtime. Called after writes that target the archive.
	pub fn invalidate(&self, host_path: &Path) {
		let mut indexes = self.indexes.lock();
		let stale: Vec<IndexKey> = indexes
			.iter()
			.map(|(k, _)| k.clone())
			.filter(|k| k.host_path == host_path)
			.collect();
		for key in stale {
			indexes.pop(&key);
		}
		drop(indexes);

		let mut contents = self.contents.lock();
		let stale: Vec<ContentKey> = contents
			.entries
			.iter()
			.map(|(k, _)| k.clone())
			.filter(|k| k.host_path == host_path)
			.collect();
		for key in stale {
			if let Some(evicted) = contents.entries.pop(&key) {
				contents.total_bytes = contents.total_bytes.saturating_sub(evicted.len() as u64);
			}
		}
	}
}

impl Default for ArchiveCache {
	fn default() -> Self {
		Self::new(CacheConfig::default())
	}
}

fn host_mtime(host_path: &Path) -> Result<SystemTime> {
	std::fs::metadata(host_path)
		.and_then(|m| m.modified())
		.map_err(|e| ArchiveError::io(host_path, e))
}

fn nonzero(n: usize) -> NonZeroUsize {
	NonZeroUsize::new(n.max(1)).unwrap_or(NonZeroUsize::MIN)
}
