//! Archive reader lifecycle and content resolution.
//!
//! [`ReaderRegistry`] owns every open archive reader, keyed by an
//! [`ArchiveIdentifier`]: it opens, shares and closes readers, and caches each
//! archive's metadata. [`ContentResolver`] answers content requests against
//! the registry, following redirects.
//!
//! ```
//! use std::sync::Arc;
//! use stacks_reader::{MemoryArchive, MemoryOpener};
//! use stacks_registry::{ContentResolver, ReaderRegistry};
//!
//! let opener = MemoryOpener::new().with_archive(
//!     "/library/a.zim",
//!     MemoryArchive::new().with_content("home", "<h1>Home</h1>").with_redirect("old", "home"),
//! );
//! let registry = Arc::new(ReaderRegistry::new(Arc::new(opener)));
//! let id = registry.open("/library/a.zim").unwrap();
//!
//! let resolver = ContentResolver::new(registry.clone());
//! assert_eq!(resolver.redirected_path(id, "/old").unwrap(), "/home");
//!
//! registry.close(id);
//! assert!(resolver.content(id, "/home").is_err());
//! ```

pub mod error;
mod identifier;
mod options;
mod registry;
mod resolve;
mod shared;

pub use crate::identifier::ArchiveIdentifier;
pub use crate::options::{IdentifierPolicy, ResolverOptions};
pub use crate::registry::{ArchiveEntry, ReaderRegistry};
pub use crate::resolve::{ContentInfo, ContentRange, ContentResolver, ContentResult};
pub use crate::shared::SharedReaders;
pub use stacks_extract::models::MetaData;
