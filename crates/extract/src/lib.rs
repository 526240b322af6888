//! Descriptive metadata for archives.
//!
//! Archives describe themselves through internal metadata entries (`Title`,
//! `Language`, `Tags`, `Counter`, ...). This crate turns those entries into
//! a [`MetaData`](models::MetaData) record, tolerating missing and malformed
//! fields.

mod consts;
pub mod error;
mod extract;
pub mod models;

use exn::ResultExt;
use stacks_reader::{ArchiveOpener, ArchiveReader};
use std::path::Path;
use tracing::instrument;

use crate::error::{ErrorKind, Result};
pub use crate::extract::Extractor;
use crate::models::MetaData;

/// Extract metadata from an open archive.
pub fn extract(reader: &dyn ArchiveReader) -> Result<MetaData> {
    Extractor::new(reader).metadata()
}

/// Extract metadata from an open archive, knowing where it was opened from.
pub fn extract_at(reader: &dyn ArchiveReader, location: &Path) -> Result<MetaData> {
    Extractor::new(reader).at(location).metadata()
}

/// Preview an archive's metadata without keeping it open.
///
/// The reader is opened just for this call and dropped before returning,
/// whether or not extraction succeeded.
#[instrument(skip_all, fields(location = %location.display()))]
pub fn extract_from_location(opener: &dyn ArchiveOpener, location: &Path) -> Result<MetaData> {
    let reader = opener.open(location).or_raise(|| ErrorKind::Open(location.to_path_buf()))?;
    extract_at(reader.as_ref(), location)
}
