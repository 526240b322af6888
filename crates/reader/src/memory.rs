//! In-memory archive backend for testing.

use crate::error::{ErrorKind, Result};
use crate::{ArchiveOpener, ArchiveReader, ContentPath, Entry, Item, ItemInfo, ReaderHandle, mime};
use parking_lot::Mutex;
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug, Clone)]
enum MemoryEntry {
    Item { mime: String, data: Vec<u8> },
    Redirect(ContentPath),
}

fn parse(path: &str, caller: &str) -> ContentPath {
    let Ok(path) = ContentPath::parse(path) else {
        // The panic here is DELIBERATE. MemoryArchive is intended to be used
        // in tests; if test setup is wrong, the test should not pass.
        panic!("MemoryArchive::{caller}: invalid path {path:?}");
    };
    path
}

/// In-memory archive for testing.
///
/// Built by chaining; every setter panics on an invalid content path.
///
/// # Examples
///
/// ```
/// use stacks_reader::{ArchiveReader, ContentPath, Entry, MemoryArchive};
///
/// let archive = MemoryArchive::new()
///     .with_content("home", "<h1>Home</h1>")
///     .with_redirect("old", "home")
///     .with_metadata("Title", "Example")
///     .with_main_page("home");
/// let old = ContentPath::parse("/old").unwrap();
/// assert_eq!(archive.entry(&old).unwrap(), Some(Entry::Redirect(ContentPath::parse("home").unwrap())));
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryArchive {
    entries: BTreeMap<ContentPath, MemoryEntry>,
    metadata: BTreeMap<String, Vec<u8>>,
    main_page: Option<ContentPath>,
    declared_id: Option<String>,
    fixed_random: Option<ContentPath>,
    // Held by every reader handed out by a `MemoryOpener`.
    token: Option<Arc<()>>,
}

impl MemoryArchive {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an item with a mime type derived from its path.
    pub fn with_content(self, path: &str, data: impl AsRef<[u8]>) -> Self {
        let mime = mime::from_path(&parse(path, "with_content"));
        self.with_item(path, mime, data)
    }

    /// Add an item with an explicit mime type.
    pub fn with_item(mut self, path: &str, mime: &str, data: impl AsRef<[u8]>) -> Self {
        let entry = MemoryEntry::Item { mime: mime.to_string(), data: data.as_ref().to_vec() };
        self.entries.insert(parse(path, "with_item"), entry);
        self
    }

    pub fn with_redirect(mut self, path: &str, target: &str) -> Self {
        let entry = MemoryEntry::Redirect(parse(target, "with_redirect"));
        self.entries.insert(parse(path, "with_redirect"), entry);
        self
    }

    pub fn with_metadata(mut self, name: &str, value: impl AsRef<[u8]>) -> Self {
        self.metadata.insert(name.to_string(), value.as_ref().to_vec());
        self
    }

    /// Declare a main page. The path does not need to exist.
    pub fn with_main_page(mut self, path: &str) -> Self {
        self.main_page = Some(parse(path, "with_main_page"));
        self
    }

    /// Declare an identifier without adding a `UUID` metadata entry.
    pub fn with_declared_id(mut self, id: &str) -> Self {
        self.declared_id = Some(id.to_string());
        self
    }

    /// Make [`ArchiveReader::random_path`] always return `path`.
    pub fn with_fixed_random(mut self, path: &str) -> Self {
        self.fixed_random = Some(parse(path, "with_fixed_random"));
        self
    }
}

impl ArchiveReader for MemoryArchive {
    fn declared_id(&self) -> Result<Option<String>> {
        Ok(self
            .declared_id
            .clone()
            .or_else(|| self.metadata.get("UUID").map(|raw| String::from_utf8_lossy(raw).trim().to_string())))
    }

    fn paths(&self) -> Result<Vec<ContentPath>> {
        Ok(self.entries.keys().cloned().collect())
    }

    fn entry(&self, path: &ContentPath) -> Result<Option<Entry>> {
        Ok(self.entries.get(path).map(|entry| match entry {
            MemoryEntry::Item { mime, data } => Entry::Item(ItemInfo {
                mime: mime.clone(),
                size: data.len() as u64,
                is_article: mime::is_article(mime),
            }),
            MemoryEntry::Redirect(target) => Entry::Redirect(target.clone()),
        }))
    }

    fn content(&self, path: &ContentPath) -> Result<Option<Item>> {
        Ok(match self.entries.get(path) {
            Some(MemoryEntry::Item { mime, data }) => {
                Some(Item { mime: mime.clone(), data: data.clone(), size: data.len() as u64 })
            },
            _ => None,
        })
    }

    fn main_page(&self) -> Result<Option<ContentPath>> {
        Ok(self.main_page.clone())
    }

    fn random_path(&self) -> Result<Option<ContentPath>> {
        if let Some(path) = &self.fixed_random {
            return Ok(Some(path.clone()));
        }
        Ok(crate::random::index(self.entries.len()).and_then(|idx| self.entries.keys().nth(idx).cloned()))
    }

    fn metadata_keys(&self) -> Result<Vec<String>> {
        Ok(self.metadata.keys().cloned().collect())
    }

    fn metadata(&self, name: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.metadata.get(name).cloned())
    }
}

/// Opens [`MemoryArchive`]s registered under file locations.
///
/// Counts opens and tracks how many of the readers it handed out are still
/// alive, so tests can assert that readers are not duplicated or leaked.
#[derive(Debug, Default)]
pub struct MemoryOpener {
    archives: Mutex<FxHashMap<PathBuf, MemoryArchive>>,
    corrupt: Mutex<FxHashSet<PathBuf>>,
    opens: AtomicUsize,
    live: Arc<()>,
}

impl MemoryOpener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_archive(self, location: impl Into<PathBuf>, archive: MemoryArchive) -> Self {
        self.archives.lock().insert(location.into(), archive);
        self
    }

    /// Register a location that exists but does not hold a valid archive.
    pub fn with_corrupt(self, location: impl Into<PathBuf>) -> Self {
        self.corrupt.lock().insert(location.into());
        self
    }

    /// Number of successful opens so far.
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    /// Number of readers handed out that have not been dropped yet.
    pub fn live_readers(&self) -> usize {
        Arc::strong_count(&self.live) - 1
    }
}

impl ArchiveOpener for MemoryOpener {
    fn open(&self, location: &Path) -> Result<ReaderHandle> {
        if self.corrupt.lock().contains(location) {
            exn::bail!(ErrorKind::InvalidArchive(format!("{} is not an archive", location.display())));
        }
        let Some(archive) = self.archives.lock().get(location).cloned() else {
            exn::bail!(ErrorKind::NotFound(location.to_path_buf()));
        };
        self.opens.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemoryArchive { token: Some(Arc::clone(&self.live)), ..archive }))
    }
}
