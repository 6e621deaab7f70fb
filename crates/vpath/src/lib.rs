//! dyad-vpath: one path type over every store.
//!
//! A [`VPath`] names a location on the local filesystem, inside an
//! archive, in an S3 bucket, or on an SFTP host. The [`Vfs`] registry
//! resolves paths to [`Storage`] backends; callers consult capability
//! queries instead of branching on schemes, so new backends slot in
//! without touching the UI or the operations engine.

pub mod archive;
pub mod backend;
pub mod error;
pub mod local;
pub mod memory;
pub mod path;
pub mod registry;
pub mod s3;
pub mod sftp;

pub use archive::ArchiveStorage;
pub use backend::{EntryKind, EntryMetadata, ExtendedMetadata, MetadataRow, SearchStrategy, Storage};
pub use error::{Result, VfsError};
pub use local::LocalStorage;
pub use memory::{MemoryCapabilities, MemoryStorage};
pub use path::{Location, Scheme, VPath};
pub use registry::{COPY_CHUNK_SIZE, Vfs};
pub use s3::S3Storage;
pub use sftp::SftpStorage;
