//! Packaged archives: a ZIP container with namespaced members.
//!
//! | Member             | Meaning                                           |
//! |--------------------|---------------------------------------------------|
//! | `C/<path>`         | Item content at `<path>`                          |
//! | `R/<path>`         | Redirect; the member text is the target path      |
//! | `M/<name>`         | Internal metadata entry `<name>`                  |
//! | `W/mainPage`       | Content path of the landing page                  |
//!
//! Directory members and members outside these namespaces are ignored. An
//! archive must contain at least one content or metadata member.

mod builder;
mod directory;
mod structures;

pub use self::builder::PackageBuilder;
use self::structures::Member;
use crate::error::{ErrorKind, Result};
use crate::{ArchiveOpener, ArchiveReader, ContentPath, DirectAccess, Entry, Item, ItemInfo, ReaderHandle, mime};
use exn::ResultExt;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use stacks_compress::Compression;
use stacks_compress::error::ErrorKind as CompressionErrorKind;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{Cursor, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use tracing::instrument;

pub(crate) const CONTENT_NAMESPACE: &str = "C/";
pub(crate) const REDIRECT_NAMESPACE: &str = "R/";
pub(crate) const METADATA_NAMESPACE: &str = "M/";
pub(crate) const MAIN_PAGE_MEMBER: &str = "W/mainPage";
pub(crate) const UUID_METADATA: &str = "UUID";

#[derive(Debug)]
enum Slot {
    Item(Member),
    Redirect(Member),
}

/// Reader over a packaged archive on the local filesystem.
///
/// The central directory is parsed once at open time; payloads are read on
/// demand. Reads share one file handle behind a mutex, held only while raw
/// bytes are copied out, so decompression runs concurrently.
#[derive(Debug)]
pub struct PackageReader {
    location: PathBuf,
    file: Mutex<File>,
    entries: FxHashMap<ContentPath, Slot>,
    paths: Vec<ContentPath>,
    metadata: BTreeMap<String, Member>,
    main_page: Option<Member>,
}

impl PackageReader {
    #[instrument(skip_all, fields(location = %location.as_ref().display()))]
    pub fn open(location: impl AsRef<Path>) -> Result<Self> {
        let location = location.as_ref();
        let mut file = File::open(location).map_err(|err| ErrorKind::from_io(err, location))?;
        let members = directory::read_members(&mut file)?;

        let mut entries = FxHashMap::default();
        let mut metadata = BTreeMap::new();
        let mut main_page = None;
        for member in members {
            if member.name.ends_with('/') {
                continue;
            }
            if member.name == MAIN_PAGE_MEMBER {
                main_page = Some(member);
                continue;
            }
            if let Some(name) = member.name.strip_prefix(METADATA_NAMESPACE) {
                metadata.insert(name.to_string(), member);
                continue;
            }
            let (raw, is_redirect) = match (
                member.name.strip_prefix(CONTENT_NAMESPACE),
                member.name.strip_prefix(REDIRECT_NAMESPACE),
            ) {
                (Some(raw), _) => (raw, false),
                (None, Some(raw)) => (raw, true),
                (None, None) => {
                    tracing::debug!(member = %member.name, "skipping member outside known namespaces");
                    continue;
                },
            };
            let Ok(path) = ContentPath::parse(raw) else {
                tracing::warn!(member = %member.name, "skipping member with invalid content path");
                continue;
            };
            let slot = match is_redirect {
                true => Slot::Redirect(member),
                false => Slot::Item(member),
            };
            // Items win over redirects registered at the same path.
            let replace = match entries.get(&path) {
                None => true,
                Some(Slot::Item(_)) => false,
                Some(Slot::Redirect(_)) => !is_redirect,
            };
            match replace {
                true => {
                    entries.insert(path, slot);
                },
                false => tracing::warn!(path = %path, "ignoring duplicate entry"),
            }
        }

        if entries.values().all(|slot| matches!(slot, Slot::Redirect(_))) && metadata.is_empty() {
            exn::bail!(ErrorKind::InvalidArchive("no content or metadata entries".to_string()));
        }

        let mut paths: Vec<ContentPath> = entries.keys().cloned().collect();
        paths.sort();
        tracing::debug!(entries = paths.len(), metadata = metadata.len(), "opened package");
        Ok(Self { location: location.to_path_buf(), file: Mutex::new(file), entries, paths, metadata, main_page })
    }

    pub fn location(&self) -> &Path {
        &self.location
    }

    fn compression(member: &Member) -> Result<Compression> {
        Compression::from_method(member.method).map_err(ErrorKind::compression)
    }

    /// Copy a member's raw (possibly compressed) bytes out of the file.
    fn read_raw(&self, member: &Member, skip: u64, len: u64) -> Result<Vec<u8>> {
        let mut file = self.file.lock();
        let offset = directory::data_offset(&mut *file, member)?;
        file.seek(SeekFrom::Start(offset + skip)).map_err(ErrorKind::from)?;
        let mut raw = Vec::with_capacity(usize::try_from(len).unwrap_or(0).min(1 << 20));
        (&mut *file).take(len).read_to_end(&mut raw).map_err(ErrorKind::from)?;
        if (raw.len() as u64) < len {
            exn::bail!(ErrorKind::InvalidArchive(format!("member {} is truncated", member.name)));
        }
        Ok(raw)
    }

    fn read_member(&self, member: &Member) -> Result<Vec<u8>> {
        let compression = Self::compression(member)?;
        let raw = self.read_raw(member, 0, member.compressed_size)?;
        let data = match compression.is_stored() {
            true => raw,
            false => {
                let mut data = Vec::with_capacity(usize::try_from(member.size).unwrap_or(0).min(1 << 24));
                compression.decompress_into(&raw, &mut data).map_err(ErrorKind::compression)?;
                data
            },
        };
        if data.len() as u64 != member.size || crc32fast::hash(&data) != member.crc32 {
            exn::bail!(ErrorKind::Integrity(member.name.clone()));
        }
        Ok(data)
    }

    fn read_member_range(&self, member: &Member, offset: u64, len: u64) -> Result<Vec<u8>> {
        let start = offset.min(member.size);
        let len = len.min(member.size - start);
        let compression = Self::compression(member)?;
        if compression.is_stored() {
            return self.read_raw(member, start, len);
        }
        let raw = self.read_raw(member, 0, member.compressed_size)?;
        let mut decoder = compression.wrap_reader(Cursor::new(raw)).map_err(ErrorKind::compression)?;
        std::io::copy(&mut (&mut decoder).take(start), &mut std::io::sink())
            .or_raise(|| ErrorKind::Compression(CompressionErrorKind::InvalidData))?;
        let mut data = Vec::with_capacity(usize::try_from(len).unwrap_or(0).min(1 << 24));
        decoder
            .take(len)
            .read_to_end(&mut data)
            .or_raise(|| ErrorKind::Compression(CompressionErrorKind::InvalidData))?;
        Ok(data)
    }

    fn item(&self, path: &ContentPath) -> Option<&Member> {
        match self.entries.get(path) {
            Some(Slot::Item(member)) => Some(member),
            _ => None,
        }
    }
}

impl ArchiveReader for PackageReader {
    fn declared_id(&self) -> Result<Option<String>> {
        Ok(self.metadata(UUID_METADATA)?.map(|raw| String::from_utf8_lossy(&raw).trim().to_string()))
    }

    fn paths(&self) -> Result<Vec<ContentPath>> {
        Ok(self.paths.clone())
    }

    fn entry(&self, path: &ContentPath) -> Result<Option<Entry>> {
        Ok(match self.entries.get(path) {
            None => None,
            Some(Slot::Item(member)) => {
                let mime = mime::from_path(path);
                Some(Entry::Item(ItemInfo {
                    mime: mime.to_string(),
                    size: member.size,
                    is_article: mime::is_article(mime),
                }))
            },
            Some(Slot::Redirect(member)) => {
                let raw = self.read_member(member)?;
                match ContentPath::parse(String::from_utf8_lossy(&raw).trim()) {
                    Ok(target) => Some(Entry::Redirect(target)),
                    Err(_) => {
                        tracing::warn!(location = %self.location.display(), %path, "redirect target is not a valid path");
                        None
                    },
                }
            },
        })
    }

    #[instrument(skip_all, fields(path = %path))]
    fn content(&self, path: &ContentPath) -> Result<Option<Item>> {
        let Some(member) = self.item(path) else {
            return Ok(None);
        };
        let data = self.read_member(member)?;
        Ok(Some(Item { mime: mime::from_path(path).to_string(), data, size: member.size }))
    }

    #[instrument(skip_all, fields(path = %path, offset = offset, len = len))]
    fn content_range(&self, path: &ContentPath, offset: u64, len: u64) -> Result<Option<Item>> {
        let Some(member) = self.item(path) else {
            return Ok(None);
        };
        let data = self.read_member_range(member, offset, len)?;
        Ok(Some(Item { mime: mime::from_path(path).to_string(), data, size: member.size }))
    }

    fn main_page(&self) -> Result<Option<ContentPath>> {
        let Some(member) = &self.main_page else {
            return Ok(None);
        };
        let raw = self.read_member(member)?;
        match ContentPath::parse(String::from_utf8_lossy(&raw).trim()) {
            Ok(path) => Ok(Some(path)),
            Err(_) => {
                tracing::warn!(location = %self.location.display(), "main page declaration is not a valid path");
                Ok(None)
            },
        }
    }

    fn random_path(&self) -> Result<Option<ContentPath>> {
        Ok(crate::random::index(self.paths.len()).map(|idx| self.paths[idx].clone()))
    }

    fn metadata_keys(&self) -> Result<Vec<String>> {
        Ok(self.metadata.keys().cloned().collect())
    }

    fn metadata(&self, name: &str) -> Result<Option<Vec<u8>>> {
        match self.metadata.get(name) {
            Some(member) => Ok(Some(self.read_member(member)?)),
            None => Ok(None),
        }
    }

    fn direct_access(&self, path: &ContentPath) -> Result<Option<DirectAccess>> {
        let Some(member) = self.item(path) else {
            return Ok(None);
        };
        if !Self::compression(member)?.is_stored() {
            return Ok(None);
        }
        let offset = directory::data_offset(&mut *self.file.lock(), member)?;
        Ok(Some(DirectAccess { location: self.location.clone(), offset }))
    }
}

/// Opens packaged archives from the local filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct PackageOpener;

impl ArchiveOpener for PackageOpener {
    fn open(&self, location: &Path) -> Result<ReaderHandle> {
        Ok(Box::new(PackageReader::open(location)?))
    }
}
