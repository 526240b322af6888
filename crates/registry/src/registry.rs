//! The authoritative map from identifier to open archive.

use exn::ResultExt;
use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use stacks_extract::models::MetaData;
use stacks_reader::{ArchiveOpener, ArchiveReader, OpenerHandle, ReaderHandle};
use std::collections::BTreeSet;
use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use tracing::instrument;

use crate::error::{ErrorKind, Result};
use crate::shared::SharedReaders;
use crate::{ArchiveIdentifier, IdentifierPolicy};

/// One open archive.
///
/// The reader stays valid for as long as anyone holds the entry: closing an
/// archive removes it from the registry, and the reader is released when the
/// last in-flight call that looked it up finishes.
pub struct ArchiveEntry {
    id: ArchiveIdentifier,
    location: PathBuf,
    reader: ReaderHandle,
    metadata: OnceLock<Arc<MetaData>>,
}

impl ArchiveEntry {
    pub fn id(&self) -> ArchiveIdentifier {
        self.id
    }

    /// Canonical location the archive was opened from.
    pub fn location(&self) -> &Path {
        &self.location
    }

    pub fn reader(&self) -> &dyn ArchiveReader {
        self.reader.as_ref()
    }

    /// Metadata, if it has been extracted already.
    pub fn cached_metadata(&self) -> Option<Arc<MetaData>> {
        self.metadata.get().cloned()
    }
}

impl Debug for ArchiveEntry {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("ArchiveEntry")
            .field("id", &self.id)
            .field("location", &self.location)
            .field("metadata_cached", &self.metadata.get().is_some())
            .finish_non_exhaustive()
    }
}

/// Opens, shares and closes archive readers.
///
/// Structural changes (`open`, `close`) and metadata cache fills are
/// serialised by one lifecycle lock. Lookups only take a brief read lock on
/// the map to clone an entry handle, so they run concurrently with each other
/// and never observe a half-finished open or close.
pub struct ReaderRegistry {
    opener: OpenerHandle,
    policy: IdentifierPolicy,
    entries: RwLock<FxHashMap<ArchiveIdentifier, Arc<ArchiveEntry>>>,
    lifecycle: Mutex<()>,
}

impl ReaderRegistry {
    pub fn new(opener: OpenerHandle) -> Self {
        Self {
            opener,
            policy: IdentifierPolicy::default(),
            entries: RwLock::new(FxHashMap::default()),
            lifecycle: Mutex::new(()),
        }
    }

    pub fn with_policy(mut self, policy: IdentifierPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn opener(&self) -> &dyn ArchiveOpener {
        self.opener.as_ref()
    }

    /// Open the archive at `location` and return its identifier.
    ///
    /// Idempotent: if the archive is already open (same location, or same
    /// identifier from another location) the existing entry is kept and its
    /// identifier returned.
    #[instrument(skip_all, fields(location = %location.as_ref().display(), id = tracing::field::Empty))]
    pub fn open(&self, location: impl AsRef<Path>) -> Result<ArchiveIdentifier> {
        let location = canonical(location.as_ref());
        let _lifecycle = self.lifecycle.lock();

        if let Some(id) = self.find_location(&location) {
            tracing::Span::current().record("id", tracing::field::display(id));
            tracing::debug!("archive already open, reusing entry");
            return Ok(id);
        }

        let reader = self.opener.open(&location).or_raise(|| ErrorKind::Open(location.clone()))?;
        let id = self.derive_id(reader.as_ref(), &location);
        tracing::Span::current().record("id", tracing::field::display(id));

        let mut entries = self.entries.write();
        if let Some(existing) = entries.get(&id) {
            tracing::info!(existing = %existing.location.display(), "archive already open under this identifier, reusing entry");
            drop(entries);
            drop(reader);
            return Ok(id);
        }
        let entry = ArchiveEntry { id, location, reader, metadata: OnceLock::new() };
        entries.insert(id, Arc::new(entry));
        tracing::info!(open = entries.len(), "opened archive");
        Ok(id)
    }

    /// Close an archive. Unknown identifiers are ignored.
    #[instrument(skip_all, fields(id = %id))]
    pub fn close(&self, id: ArchiveIdentifier) {
        let removed = {
            let _lifecycle = self.lifecycle.lock();
            self.entries.write().remove(&id)
        };
        match removed {
            Some(entry) => {
                tracing::info!(location = %entry.location.display(), "closed archive");
                // Released here unless an in-flight call still holds the entry.
                drop(entry);
            },
            None => tracing::debug!("archive not open, nothing to close"),
        }
    }

    /// Identifiers of the archives open right now.
    pub fn list_identifiers(&self) -> BTreeSet<ArchiveIdentifier> {
        self.entries.read().keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Look up an open archive.
    pub fn get(&self, id: ArchiveIdentifier) -> Result<Arc<ArchiveEntry>> {
        match self.entries.read().get(&id) {
            Some(entry) => Ok(Arc::clone(entry)),
            None => exn::bail!(ErrorKind::NotFound),
        }
    }

    pub fn file_location(&self, id: ArchiveIdentifier) -> Result<PathBuf> {
        Ok(self.get(id)?.location.clone())
    }

    /// Descriptive metadata of an open archive, extracted on first request.
    #[instrument(skip_all, fields(id = %id))]
    pub fn metadata(&self, id: ArchiveIdentifier) -> Result<Arc<MetaData>> {
        let entry = self.get(id)?;
        if let Some(metadata) = entry.metadata.get() {
            return Ok(Arc::clone(metadata));
        }

        let _lifecycle = self.lifecycle.lock();
        if let Some(metadata) = entry.metadata.get() {
            return Ok(Arc::clone(metadata));
        }
        // Closed while this call waited for the lock.
        if !self.entries.read().contains_key(&id) {
            exn::bail!(ErrorKind::NotFound);
        }
        let metadata = stacks_extract::extract_at(entry.reader(), &entry.location).or_raise(|| ErrorKind::Metadata)?;
        let metadata = Arc::new(metadata);
        let _ = entry.metadata.set(Arc::clone(&metadata));
        tracing::debug!(title = %metadata.title, "cached archive metadata");
        Ok(metadata)
    }

    /// Preview the metadata of an archive without registering it.
    pub fn metadata_for_location(&self, location: impl AsRef<Path>) -> Result<MetaData> {
        let location = canonical(location.as_ref());
        stacks_extract::extract_from_location(self.opener.as_ref(), &location).map_err(|err| {
            let kind = match &*err {
                stacks_extract::error::ErrorKind::Open(_) => ErrorKind::Open(location.clone()),
                stacks_extract::error::ErrorKind::Malformed => ErrorKind::Metadata,
            };
            err.raise(kind)
        })
    }

    /// Borrow the readers of every requested archive that is currently open.
    ///
    /// Unknown identifiers are skipped. The borrow cannot outlive the
    /// registry; see [`SharedReaders`].
    pub fn shared_readers(&self, ids: impl IntoIterator<Item = ArchiveIdentifier>) -> SharedReaders<'_> {
        let entries = self.entries.read();
        let mut wanted: Vec<ArchiveIdentifier> = ids.into_iter().collect();
        wanted.sort();
        wanted.dedup();
        SharedReaders::new(wanted.iter().filter_map(|id| entries.get(id).cloned()).collect())
    }

    /// Run `scope` with borrowed readers, releasing them when it returns.
    pub fn with_shared_readers<R>(
        &self,
        ids: impl IntoIterator<Item = ArchiveIdentifier>,
        scope: impl FnOnce(&SharedReaders<'_>) -> R,
    ) -> R {
        let readers = self.shared_readers(ids);
        scope(&readers)
    }

    fn find_location(&self, location: &Path) -> Option<ArchiveIdentifier> {
        self.entries.read().values().find(|entry| entry.location == location).map(|entry| entry.id)
    }

    fn derive_id(&self, reader: &dyn ArchiveReader, location: &Path) -> ArchiveIdentifier {
        if self.policy == IdentifierPolicy::Declared {
            match reader.declared_id() {
                Ok(Some(text)) => match ArchiveIdentifier::parse(&text) {
                    Some(id) => return id,
                    None => tracing::warn!(declared = %text, "malformed declared identifier, deriving from location"),
                },
                Ok(None) => tracing::debug!("no declared identifier, deriving from location"),
                Err(err) => tracing::warn!(error = %err, "unreadable declared identifier, deriving from location"),
            }
        }
        ArchiveIdentifier::from_location(location)
    }
}

impl Debug for ReaderRegistry {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("ReaderRegistry").field("policy", &self.policy).field("open", &self.len()).finish_non_exhaustive()
    }
}

/// Resolve symlinks and relative components so that one file has one key.
///
/// Falls back to the lexically absolute form for locations that don't exist
/// on the local filesystem.
fn canonical(location: &Path) -> PathBuf {
    std::fs::canonicalize(location)
        .or_else(|_| std::path::absolute(location))
        .unwrap_or_else(|_| location.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use stacks_reader::{MemoryArchive, MemoryOpener, PackageBuilder, PackageOpener};

    const DECLARED: &str = "0123456789abcdef0123456789abcdef";

    fn archive() -> MemoryArchive {
        MemoryArchive::new()
            .with_content("home", "<h1>Home</h1>")
            .with_redirect("old", "home")
            .with_main_page("home")
            .with_metadata("Title", "Archive A")
    }

    fn setup() -> (Arc<MemoryOpener>, ReaderRegistry) {
        let opener = Arc::new(
            MemoryOpener::new()
                .with_archive("/lib/a.zim", archive().with_metadata("UUID", DECLARED))
                .with_archive("/lib/b.zim", archive().with_metadata("UUID", "not-a-uuid"))
                .with_archive("/lib/copy-of-a.zim", archive().with_metadata("UUID", DECLARED))
                .with_corrupt("/lib/corrupt.zim"),
        );
        let registry = ReaderRegistry::new(opener.clone());
        (opener, registry)
    }

    #[test]
    fn open_then_close_restores_identifiers() {
        let (opener, registry) = setup();
        let before = registry.list_identifiers();
        let id = registry.open("/lib/a.zim").unwrap();
        assert!(registry.list_identifiers().contains(&id));
        registry.close(id);
        assert_eq!(registry.list_identifiers(), before);
        assert_eq!(opener.live_readers(), 0);
    }

    #[test]
    fn prefers_well_formed_declared_identifier() {
        let (_, registry) = setup();
        let id = registry.open("/lib/a.zim").unwrap();
        assert_eq!(id, ArchiveIdentifier::parse(DECLARED).unwrap());
        let id = registry.open("/lib/b.zim").unwrap();
        assert_eq!(id, ArchiveIdentifier::from_location(Path::new("/lib/b.zim")));
    }

    #[test]
    fn location_policy_ignores_declared_identifier() {
        let (opener, _) = setup();
        let registry = ReaderRegistry::new(opener).with_policy(IdentifierPolicy::Location);
        let id = registry.open("/lib/a.zim").unwrap();
        assert_eq!(id, ArchiveIdentifier::from_location(Path::new("/lib/a.zim")));
    }

    #[test]
    fn open_is_idempotent() {
        let (opener, registry) = setup();
        let first = registry.open("/lib/a.zim").unwrap();
        let second = registry.open("/lib/a.zim").unwrap();
        assert_eq!(first, second);
        assert_eq!(registry.len(), 1);
        // The second open never reached the opener.
        assert_eq!(opener.opens(), 1);
        assert_eq!(opener.live_readers(), 1);
    }

    #[test]
    fn same_identity_from_another_location_is_not_duplicated() {
        let (opener, registry) = setup();
        let first = registry.open("/lib/a.zim").unwrap();
        let second = registry.open("/lib/copy-of-a.zim").unwrap();
        assert_eq!(first, second);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.file_location(first).unwrap(), PathBuf::from("/lib/a.zim"));
        // The duplicate reader was released straight away.
        assert_eq!(opener.live_readers(), 1);
    }

    #[test]
    fn concurrent_opens_of_one_location_share_an_entry() {
        let (opener, registry) = setup();
        let ids: BTreeSet<ArchiveIdentifier> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8).map(|_| scope.spawn(|| registry.open("/lib/a.zim").unwrap())).collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert_eq!(ids.len(), 1);
        assert_eq!(registry.len(), 1);
        assert_eq!(opener.opens(), 1);
        assert_eq!(opener.live_readers(), 1);
    }

    #[test]
    fn concurrent_opens_of_one_identity_share_an_entry() {
        let (opener, registry) = setup();
        let ids: BTreeSet<ArchiveIdentifier> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|n| {
                    let location = if n % 2 == 0 { "/lib/a.zim" } else { "/lib/copy-of-a.zim" };
                    let registry = &registry;
                    scope.spawn(move || registry.open(location).unwrap())
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert_eq!(ids.into_iter().collect::<Vec<_>>(), vec![ArchiveIdentifier::parse(DECLARED).unwrap()]);
        assert_eq!(registry.len(), 1);
        assert_eq!(opener.live_readers(), 1);
    }

    #[test]
    fn failed_open_leaves_registry_unchanged() {
        let (opener, registry) = setup();
        registry.open("/lib/a.zim").unwrap();
        let err = registry.open("/lib/corrupt.zim").unwrap_err();
        assert_eq!(*err, ErrorKind::Open(PathBuf::from("/lib/corrupt.zim")));
        let err = registry.open("/lib/missing.zim").unwrap_err();
        assert!(matches!(&*err, ErrorKind::Open(_)));
        assert_eq!(registry.len(), 1);
        assert_eq!(opener.live_readers(), 1);
    }

    #[test]
    fn close_is_idempotent() {
        let (_, registry) = setup();
        let id = registry.open("/lib/a.zim").unwrap();
        registry.close(id);
        registry.close(id);
        registry.close(ArchiveIdentifier::from_u128(42));
        assert!(registry.is_empty());
    }

    #[test]
    fn lookups_after_close_are_not_found() {
        let (_, registry) = setup();
        let id = registry.open("/lib/a.zim").unwrap();
        registry.close(id);
        assert_eq!(*registry.get(id).unwrap_err(), ErrorKind::NotFound);
        assert_eq!(*registry.file_location(id).unwrap_err(), ErrorKind::NotFound);
        assert_eq!(*registry.metadata(id).unwrap_err(), ErrorKind::NotFound);
    }

    #[test]
    fn in_flight_entry_outlives_close() {
        let (opener, registry) = setup();
        let id = registry.open("/lib/a.zim").unwrap();
        let entry = registry.get(id).unwrap();
        registry.close(id);
        assert!(entry.reader().main_page().unwrap().is_some());
        assert_eq!(opener.live_readers(), 1);
        drop(entry);
        assert_eq!(opener.live_readers(), 0);
    }

    #[test]
    fn reopen_after_close_creates_new_entry() {
        let (opener, registry) = setup();
        let id = registry.open("/lib/a.zim").unwrap();
        registry.close(id);
        assert_eq!(registry.open("/lib/a.zim").unwrap(), id);
        assert_eq!(opener.opens(), 2);
    }

    #[test]
    fn metadata_is_extracted_once_and_cached() {
        let (_, registry) = setup();
        let id = registry.open("/lib/a.zim").unwrap();
        assert!(registry.get(id).unwrap().cached_metadata().is_none());
        let first = registry.metadata(id).unwrap();
        let second = registry.metadata(id).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.title, "Archive A");
    }

    #[test]
    fn concurrent_metadata_requests_share_one_extraction() {
        let (_, registry) = setup();
        let id = registry.open("/lib/a.zim").unwrap();
        let results: Vec<Arc<MetaData>> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8).map(|_| scope.spawn(|| registry.metadata(id).unwrap())).collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert!(results.windows(2).all(|pair| Arc::ptr_eq(&pair[0], &pair[1])));
    }

    #[test]
    fn metadata_preview_does_not_register() {
        let (opener, registry) = setup();
        let metadata = registry.metadata_for_location("/lib/a.zim").unwrap();
        assert_eq!(metadata.title, "Archive A");
        assert!(registry.is_empty());
        assert_eq!(opener.live_readers(), 0);
        let err = registry.metadata_for_location("/lib/corrupt.zim").unwrap_err();
        assert!(matches!(&*err, ErrorKind::Open(_)));
    }

    #[test]
    fn opens_packaged_archives_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let location = dir.path().join("a.zip");
        PackageBuilder::new().content("home", "hi").metadata("UUID", DECLARED).write_to(&location).unwrap();
        std::fs::write(dir.path().join("not-an-archive.zip"), "plain text").unwrap();

        let registry = ReaderRegistry::new(Arc::new(PackageOpener));
        let id = registry.open(&location).unwrap();
        assert_eq!(id, ArchiveIdentifier::parse(DECLARED).unwrap());
        // Relative components resolve to the same canonical location.
        let again = registry.open(dir.path().join(".").join("a.zip")).unwrap();
        assert_eq!(again, id);
        let err = registry.open(dir.path().join("not-an-archive.zip")).unwrap_err();
        assert!(matches!(&*err, ErrorKind::Open(_)));
        assert_eq!(registry.len(), 1);
    }
}
