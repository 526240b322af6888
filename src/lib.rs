//! Archive reader registry and content resolution.
//!
//! [`Service`] is the single entry point an application composes at its top
//! level: it owns the [`ReaderRegistry`] and a [`ContentResolver`] over it,
//! and exposes every identifier-keyed operation. Construct one explicitly and
//! pass it (or an `Arc` of it) to whatever needs content.
//!
//! ```no_run
//! use stacks::{Config, Service};
//!
//! let service = Service::from_config(&Config::default());
//! let id = service.open("wikipedia_en_all.zip").unwrap();
//! let main_page = service.main_page(id).unwrap();
//! let page = service.content(id, &main_page).unwrap();
//! println!("{} ({}, {} bytes)", page.path, page.mime, page.data.len());
//! ```

pub mod error;

use stacks_config::IdentifierSource;
use std::collections::BTreeSet;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub use stacks_config::Config;
pub use stacks_reader::{ArchiveOpener, DirectAccess, OpenerHandle, PackageOpener};
pub use stacks_registry::error::{Error as ServiceError, ErrorKind as ServiceErrorKind, Result as ServiceResult};
pub use stacks_registry::{
    ArchiveIdentifier, ContentInfo, ContentRange, ContentResolver, ContentResult, IdentifierPolicy, MetaData,
    ReaderRegistry, ResolverOptions, SharedReaders,
};

/// Process-wide access to open archives.
#[derive(Debug, Clone)]
pub struct Service {
    registry: Arc<ReaderRegistry>,
    resolver: ContentResolver,
}

impl Service {
    pub fn new(opener: OpenerHandle, policy: IdentifierPolicy, options: ResolverOptions) -> Self {
        let registry = Arc::new(ReaderRegistry::new(opener).with_policy(policy));
        let resolver = ContentResolver::new(Arc::clone(&registry)).with_options(options);
        Self { registry, resolver }
    }

    /// A service over packaged archives, tuned by `config`.
    pub fn from_config(config: &Config) -> Self {
        Self::with_opener(Arc::new(PackageOpener), config)
    }

    /// A service over archives from `opener`, tuned by `config`.
    pub fn with_opener(opener: OpenerHandle, config: &Config) -> Self {
        let policy = match config.registry.identifier {
            IdentifierSource::Declared => IdentifierPolicy::Declared,
            IdentifierSource::Location => IdentifierPolicy::Location,
        };
        let options = ResolverOptions {
            redirect_limit: config.registry.redirect_limit,
            random_attempts: config.registry.random_attempts,
        };
        Self::new(opener, policy, options)
    }

    pub fn registry(&self) -> &ReaderRegistry {
        &self.registry
    }

    pub fn resolver(&self) -> &ContentResolver {
        &self.resolver
    }

    pub fn open(&self, location: impl AsRef<Path>) -> ServiceResult<ArchiveIdentifier> {
        self.registry.open(location)
    }

    pub fn close(&self, id: ArchiveIdentifier) {
        self.registry.close(id);
    }

    pub fn list_identifiers(&self) -> BTreeSet<ArchiveIdentifier> {
        self.registry.list_identifiers()
    }

    pub fn shared_readers(&self, ids: impl IntoIterator<Item = ArchiveIdentifier>) -> SharedReaders<'_> {
        self.registry.shared_readers(ids)
    }

    pub fn with_shared_readers<R>(
        &self,
        ids: impl IntoIterator<Item = ArchiveIdentifier>,
        scope: impl FnOnce(&SharedReaders<'_>) -> R,
    ) -> R {
        self.registry.with_shared_readers(ids, scope)
    }

    pub fn metadata(&self, id: ArchiveIdentifier) -> ServiceResult<Arc<MetaData>> {
        self.registry.metadata(id)
    }

    pub fn metadata_for_location(&self, location: impl AsRef<Path>) -> ServiceResult<MetaData> {
        self.registry.metadata_for_location(location)
    }

    pub fn file_location(&self, id: ArchiveIdentifier) -> ServiceResult<PathBuf> {
        self.registry.file_location(id)
    }

    pub fn redirected_path(&self, id: ArchiveIdentifier, path: &str) -> ServiceResult<String> {
        self.resolver.redirected_path(id, path)
    }

    pub fn main_page(&self, id: ArchiveIdentifier) -> ServiceResult<String> {
        self.resolver.main_page(id)
    }

    pub fn random_page(&self, id: ArchiveIdentifier) -> ServiceResult<String> {
        self.resolver.random_page(id)
    }

    pub fn main_page_any(&self) -> ServiceResult<(ArchiveIdentifier, String)> {
        self.resolver.main_page_any()
    }

    pub fn random_page_any(&self) -> ServiceResult<(ArchiveIdentifier, String)> {
        self.resolver.random_page_any()
    }

    pub fn content(&self, id: ArchiveIdentifier, path: &str) -> ServiceResult<ContentResult> {
        self.resolver.content(id, path)
    }

    pub fn content_range(&self, id: ArchiveIdentifier, path: &str, start: u64, end: u64) -> ServiceResult<ContentRange> {
        self.resolver.content_range(id, path, start, end)
    }

    pub fn content_span(
        &self,
        id: ArchiveIdentifier,
        path: &str,
        span: Option<RangeInclusive<u64>>,
    ) -> ServiceResult<ContentRange> {
        self.resolver.content_span(id, path, span)
    }

    pub fn content_size(&self, id: ArchiveIdentifier, path: &str) -> ServiceResult<u64> {
        self.resolver.content_size(id, path)
    }

    pub fn content_info(&self, id: ArchiveIdentifier, path: &str) -> ServiceResult<ContentInfo> {
        self.resolver.content_info(id, path)
    }

    pub fn direct_access(&self, id: ArchiveIdentifier, path: &str) -> ServiceResult<DirectAccess> {
        self.resolver.direct_access(id, path)
    }

    pub fn list_paths(&self, id: ArchiveIdentifier) -> ServiceResult<Vec<String>> {
        self.resolver.list_paths(id)
    }
}
