//! Scoped borrows of open readers.

use stacks_reader::ArchiveReader;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::ArchiveIdentifier;
use crate::registry::{ArchiveEntry, ReaderRegistry};

/// Readers borrowed from a [`ReaderRegistry`] for the length of a scope.
///
/// The set is fixed when it is created. Closing one of its archives in the
/// meantime does not invalidate the readers borrowed here; the closed reader
/// is released once this value is dropped.
///
/// References handed out cannot outlive this value, which in turn cannot
/// outlive the registry.
#[derive(Debug)]
pub struct SharedReaders<'a> {
    entries: Vec<Arc<ArchiveEntry>>,
    _registry: PhantomData<&'a ReaderRegistry>,
}

impl<'a> SharedReaders<'a> {
    pub(crate) fn new(entries: Vec<Arc<ArchiveEntry>>) -> Self {
        Self { entries, _registry: PhantomData }
    }

    pub fn get(&self, id: ArchiveIdentifier) -> Option<&dyn ArchiveReader> {
        self.entries.iter().find(|entry| entry.id() == id).map(|entry| entry.reader())
    }

    pub fn contains(&self, id: ArchiveIdentifier) -> bool {
        self.entries.iter().any(|entry| entry.id() == id)
    }

    /// Identifiers in ascending order.
    pub fn identifiers(&self) -> impl Iterator<Item = ArchiveIdentifier> + '_ {
        self.entries.iter().map(|entry| entry.id())
    }

    pub fn iter(&self) -> impl Iterator<Item = (ArchiveIdentifier, &dyn ArchiveReader)> + '_ {
        self.entries.iter().map(|entry| (entry.id(), entry.reader()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
