use super::structures::{EndOfCentralDirectory, Member, Zip64EndOfCentralDirectory, Zip64Locator};
use super::{CONTENT_NAMESPACE, MAIN_PAGE_MEMBER, METADATA_NAMESPACE, REDIRECT_NAMESPACE};
use crate::ContentPath;
use crate::error::{ErrorKind, Result};
use stacks_compress::Compression;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::instrument;

#[derive(Debug, Clone)]
enum Pending {
    Content { path: String, data: Vec<u8>, compression: Option<Compression> },
    Redirect { path: String, target: String },
    Metadata { name: String, value: Vec<u8> },
    MainPage(String),
}

/// Writes packaged archives.
///
/// Content paths are validated when the package is written, so a builder can
/// be assembled by chaining without intermediate error handling.
///
/// ```
/// use stacks_reader::{ArchiveReader, ContentPath, PackageBuilder, PackageReader};
///
/// let dir = tempfile::tempdir().unwrap();
/// let location = dir.path().join("wiki.zip");
/// PackageBuilder::new()
///     .content("A/Welcome", "<h1>Welcome</h1>")
///     .redirect("home", "A/Welcome")
///     .metadata("Title", "My Wiki")
///     .main_page("home")
///     .write_to(&location)
///     .unwrap();
///
/// let reader = PackageReader::open(&location).unwrap();
/// assert_eq!(reader.main_page().unwrap(), Some(ContentPath::parse("home").unwrap()));
/// ```
#[derive(Debug, Clone)]
pub struct PackageBuilder {
    compression: Compression,
    pending: Vec<Pending>,
}

impl Default for PackageBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PackageBuilder {
    /// A builder that deflates content by default.
    pub fn new() -> Self {
        Self { compression: Compression::Deflate, pending: Vec::new() }
    }

    /// Compression applied to content entries without an explicit one.
    pub fn compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    pub fn content(mut self, path: impl Into<String>, data: impl AsRef<[u8]>) -> Self {
        self.pending.push(Pending::Content { path: path.into(), data: data.as_ref().to_vec(), compression: None });
        self
    }

    /// Add a content entry stored without compression, which makes it
    /// eligible for direct access.
    pub fn stored_content(mut self, path: impl Into<String>, data: impl AsRef<[u8]>) -> Self {
        self.pending.push(Pending::Content {
            path: path.into(),
            data: data.as_ref().to_vec(),
            compression: Some(Compression::Stored),
        });
        self
    }

    pub fn redirect(mut self, path: impl Into<String>, target: impl Into<String>) -> Self {
        self.pending.push(Pending::Redirect { path: path.into(), target: target.into() });
        self
    }

    pub fn metadata(mut self, name: impl Into<String>, value: impl AsRef<[u8]>) -> Self {
        self.pending.push(Pending::Metadata { name: name.into(), value: value.as_ref().to_vec() });
        self
    }

    pub fn main_page(mut self, path: impl Into<String>) -> Self {
        self.pending.push(Pending::MainPage(path.into()));
        self
    }

    /// Resolve pending entries into (member name, payload, compression).
    fn members(&self) -> Result<Vec<(String, Vec<u8>, Compression)>> {
        let mut members = Vec::with_capacity(self.pending.len());
        for pending in &self.pending {
            members.push(match pending {
                Pending::Content { path, data, compression } => {
                    let path = ContentPath::parse(path)?;
                    let compression = compression.unwrap_or(self.compression);
                    (format!("{CONTENT_NAMESPACE}{}", path.as_str()), data.clone(), compression)
                },
                Pending::Redirect { path, target } => {
                    let path = ContentPath::parse(path)?;
                    let target = ContentPath::parse(target)?;
                    let name = format!("{REDIRECT_NAMESPACE}{}", path.as_str());
                    (name, target.as_str().as_bytes().to_vec(), Compression::Stored)
                },
                Pending::Metadata { name, value } => {
                    if name.is_empty() || name.contains('/') {
                        exn::bail!(ErrorKind::InvalidPath(name.clone()));
                    }
                    (format!("{METADATA_NAMESPACE}{name}"), value.clone(), Compression::Stored)
                },
                Pending::MainPage(path) => {
                    let path = ContentPath::parse(path)?;
                    (MAIN_PAGE_MEMBER.to_string(), path.as_str().as_bytes().to_vec(), Compression::Stored)
                },
            });
        }
        Ok(members)
    }

    /// Write the package to any byte sink.
    pub fn write(&self, out: impl Write) -> Result<()> {
        let members = self.members()?;
        let mut out = BufWriter::new(out);
        let mut offset = 0u64;
        let mut written = Vec::with_capacity(members.len());
        for (name, data, compression) in members {
            let compressed = compression.compress(&data).map_err(ErrorKind::compression)?;
            let member = Member {
                name,
                method: compression.method(),
                crc32: crc32fast::hash(&data),
                compressed_size: compressed.len() as u64,
                size: data.len() as u64,
                header_offset: offset,
            };
            let mut header = Vec::new();
            member.write_local(&mut header).map_err(ErrorKind::from)?;
            out.write_all(&header).map_err(ErrorKind::from)?;
            out.write_all(&compressed).map_err(ErrorKind::from)?;
            offset += (header.len() + compressed.len()) as u64;
            written.push(member);
        }

        let directory_offset = offset;
        let mut directory = Vec::new();
        for member in &written {
            member.write_central(&mut directory).map_err(ErrorKind::from)?;
        }
        out.write_all(&directory).map_err(ErrorKind::from)?;
        let directory_size = directory.len() as u64;

        let mut tail = Vec::new();
        let entries = written.len() as u64;
        let small = |value: u64| u32::try_from(value).ok().filter(|v| *v != u32::MAX);
        let record = match (u16::try_from(entries).ok().filter(|v| *v != u16::MAX), small(directory_size), small(directory_offset)) {
            (Some(total), Some(size), Some(offset)) => EndOfCentralDirectory {
                disk_entries: total,
                total_entries: total,
                directory_size: size,
                directory_offset: offset,
                comment_len: 0,
            },
            _ => {
                let record_offset = directory_offset + directory_size;
                Zip64EndOfCentralDirectory { total_entries: entries, directory_size, directory_offset }
                    .write(&mut tail)
                    .map_err(ErrorKind::from)?;
                Zip64Locator { record_offset }.write(&mut tail).map_err(ErrorKind::from)?;
                EndOfCentralDirectory {
                    disk_entries: u16::MAX,
                    total_entries: u16::MAX,
                    directory_size: u32::MAX,
                    directory_offset: u32::MAX,
                    comment_len: 0,
                }
            },
        };
        record.write(&mut tail).map_err(ErrorKind::from)?;
        out.write_all(&tail).map_err(ErrorKind::from)?;
        out.flush().map_err(ErrorKind::from)?;
        tracing::debug!(members = written.len(), bytes = offset + directory_size + tail.len() as u64, "wrote package");
        Ok(())
    }

    #[instrument(skip_all, fields(location = %location.as_ref().display()))]
    pub fn write_to(&self, location: impl AsRef<Path>) -> Result<()> {
        let location = location.as_ref();
        let file = File::create(location).map_err(|err| ErrorKind::from_io(err, location))?;
        self.write(file)
    }
}
