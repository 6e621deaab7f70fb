//! dyad-archive: archives as data.
//!
//! This crate owns everything below the virtual-path layer for archive
//! files: format detection, one-pass indexing, bounded index and content
//! caches, entry extraction, and archive creation. The path layer treats
//! an indexed archive as a read-only directory tree; the operations
//! layer uses [`ArchiveWriter`] for archive-create tasks.

pub mod cache;
pub mod error;
pub mod extract;
pub mod format;
pub mod index;
pub mod writer;

pub use cache::{ArchiveCache, CacheConfig};
pub use error::ArchiveError;
pub use extract::extract_entry;
pub use format::ArchiveFormat;
pub use index::{ArchiveEntry, ArchiveEntryKind, ArchiveIndex, index_archive};
pub use writer::ArchiveWriter;
