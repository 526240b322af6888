//! Archive reader interface and backends.
//!
//! An archive is a self-contained package of indexed documents (for example
//! an encyclopedic snapshot). This crate defines what the rest of the
//! workspace needs from an archive, without caring how the archive is laid
//! out on disk:
//!
//! - [`ArchiveReader`]: enumerate entries, describe an entry (item or
//!   redirect), fetch payloads and mime types, report the main page, draw a
//!   pseudo-random path, and expose internal metadata entries.
//! - [`ArchiveOpener`]: turn a file location into a boxed reader.
//! - [`ContentPath`]: the validated, normalised form of every lookup key.
//!
//! [`PackageReader`] is the bundled backend over ZIP-packaged archives, and
//! [`PackageBuilder`] writes them. With the `mock` feature,
//! [`MemoryArchive`] provides an in-memory reader for tests.

pub mod error;
#[cfg(feature = "mock")]
mod memory;
pub mod mime;
mod package;
mod path;
pub mod random;

#[cfg(feature = "mock")]
pub use crate::memory::{MemoryArchive, MemoryOpener};
pub use crate::package::{PackageBuilder, PackageOpener, PackageReader};
pub use crate::path::ContentPath;
use crate::error::Result;
use std::fmt::Debug;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Owned handle to an open archive.
pub type ReaderHandle = Box<dyn ArchiveReader>;
/// Shared handle to an archive opener.
pub type OpenerHandle = Arc<dyn ArchiveOpener>;

/// Description of a single archive entry, without its payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry {
    /// An entry with content of its own.
    Item(ItemInfo),
    /// An entry that points at another content path.
    Redirect(ContentPath),
}

/// Attributes of an item entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemInfo {
    pub mime: String,
    /// Uncompressed payload size in bytes
    pub size: u64,
    /// Article pages are what "random page" picks from; assets, scripts and
    /// stylesheets are not articles.
    pub is_article: bool,
}

/// The payload of an item entry, or a slice of it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    pub mime: String,
    pub data: Vec<u8>,
    /// Total uncompressed size of the entry, which exceeds `data.len()` for
    /// partial reads.
    pub size: u64,
}

/// Where an item's bytes can be read verbatim from the archive file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectAccess {
    pub location: PathBuf,
    pub offset: u64,
}

/// Read access to one open archive.
///
/// Implementations must be safe to share between threads: the registry hands
/// the same reader to concurrent content requests. Lookups take an already
/// normalised [`ContentPath`]; unknown paths are `Ok(None)`, never errors.
/// Errors are reserved for I/O failures and corrupt archive structure.
pub trait ArchiveReader: Debug + Send + Sync {
    /// Identifier text the archive declares for itself, if any. Validation is
    /// the caller's business.
    fn declared_id(&self) -> Result<Option<String>>;

    /// Every content path (items and redirects) in the archive.
    fn paths(&self) -> Result<Vec<ContentPath>>;

    /// Describe a single entry without following redirects.
    fn entry(&self, path: &ContentPath) -> Result<Option<Entry>>;

    /// Load an item's full payload. Redirect entries yield `None`.
    fn content(&self, path: &ContentPath) -> Result<Option<Item>>;

    /// Load `len` bytes of an item's payload starting at `offset`.
    ///
    /// The returned slice is clamped to the end of the payload. The default
    /// implementation loads the full payload and slices it.
    fn content_range(&self, path: &ContentPath, offset: u64, len: u64) -> Result<Option<Item>> {
        Ok(self.content(path)?.map(|item| {
            let start = usize::try_from(offset).unwrap_or(usize::MAX).min(item.data.len());
            let end = usize::try_from(offset.saturating_add(len)).unwrap_or(usize::MAX).min(item.data.len());
            Item { mime: item.mime, data: item.data[start..end].to_vec(), size: item.size }
        }))
    }

    /// The landing page the archive declares, if any.
    fn main_page(&self) -> Result<Option<ContentPath>>;

    /// Some existing content path, chosen pseudo-randomly. May be a redirect
    /// or a non-article entry; filtering is up to the caller.
    fn random_path(&self) -> Result<Option<ContentPath>>;

    /// Names of the archive's internal metadata entries.
    fn metadata_keys(&self) -> Result<Vec<String>>;

    /// Raw value of an internal metadata entry.
    fn metadata(&self, name: &str) -> Result<Option<Vec<u8>>>;

    /// Location of an item's uncompressed bytes within the archive file, when
    /// the backend stores it that way.
    fn direct_access(&self, _path: &ContentPath) -> Result<Option<DirectAccess>> {
        Ok(None)
    }
}

/// Opens archives from file locations.
pub trait ArchiveOpener: Send + Sync {
    /// Construct a reader over the archive at `location`.
    ///
    /// Fails if the location is unreadable or is not a valid archive.
    fn open(&self, location: &Path) -> Result<ReaderHandle>;
}
