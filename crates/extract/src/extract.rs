//! Reading descriptive fields out of an archive's internal metadata entries.

use exn::ResultExt;
use stacks_reader::{ArchiveReader, ContentPath, Entry};
use std::path::Path;
use time::{Date, Month};
use tracing::instrument;

use crate::consts;
use crate::error::{ErrorKind, Result};
use crate::models::{Counts, Favicon, MetaData, Tags};

/// Builds a [`MetaData`] record from one open archive.
///
/// Every field is read independently. A field that is missing, unreadable or
/// malformed takes its default and extraction carries on; only an archive
/// whose entries cannot be enumerated at all fails.
pub struct Extractor<'a> {
    reader: &'a dyn ArchiveReader,
    location: Option<&'a Path>,
}

impl<'a> Extractor<'a> {
    pub fn new(reader: &'a dyn ArchiveReader) -> Self {
        Self { reader, location: None }
    }

    /// Where the archive was opened from, used for the fallback title.
    pub fn at(mut self, location: &'a Path) -> Self {
        self.location = Some(location);
        self
    }

    #[instrument(skip_all, fields(location = ?self.location))]
    pub fn metadata(&self) -> Result<MetaData> {
        let keys = self.reader.metadata_keys().or_raise(|| ErrorKind::Malformed)?;
        let paths = self.reader.paths().or_raise(|| ErrorKind::Malformed)?;
        tracing::debug!(metadata = keys.len(), entries = paths.len(), "extracting metadata");

        let tags = self.text(consts::TAGS).map(|raw| Tags::parse(&raw)).unwrap_or_default();
        let name = self.text(consts::NAME).unwrap_or_default();
        Ok(MetaData {
            title: self.title(),
            description: self.text(consts::DESCRIPTION).unwrap_or_default(),
            long_description: self.text(consts::LONG_DESCRIPTION),
            languages: self.languages(),
            creator: self.text(consts::CREATOR).unwrap_or_default(),
            publisher: self.text(consts::PUBLISHER).unwrap_or_default(),
            flavor: self.text(consts::FLAVOR),
            category: category(&tags, &name),
            counts: self.counts(&paths),
            created: self.created(),
            uuid: self.uuid(),
            favicon: self.favicon(),
            name,
            tags,
        })
    }

    fn raw(&self, name: &str) -> Option<Vec<u8>> {
        match self.reader.metadata(name) {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!(field = name, error = %err, "unreadable metadata entry, using default");
                None
            },
        }
    }

    /// Trimmed text of a metadata entry; blank values count as absent.
    fn text(&self, name: &str) -> Option<String> {
        let raw = self.raw(name)?;
        let text = String::from_utf8_lossy(&raw).trim().to_string();
        (!text.is_empty()).then_some(text)
    }

    fn title(&self) -> String {
        self.text(consts::TITLE)
            .or_else(|| {
                let stem = self.location?.file_stem()?;
                Some(stem.to_string_lossy().into_owned())
            })
            .unwrap_or_default()
    }

    fn languages(&self) -> Vec<String> {
        let Some(raw) = self.text(consts::LANGUAGE) else {
            return Vec::new();
        };
        let mut languages: Vec<String> = Vec::new();
        for code in raw.split(',').map(str::trim).filter(|code| !code.is_empty()) {
            if !consts::LANGUAGE_CODE_REGEX.is_match(code) {
                tracing::debug!(code, "ignoring malformed language code");
                continue;
            }
            let code = code.to_ascii_lowercase();
            if !languages.contains(&code) {
                languages.push(code);
            }
        }
        languages
    }

    fn counts(&self, paths: &[ContentPath]) -> Counts {
        if let Some(counts) = self.text(consts::COUNTER).and_then(|raw| Counts::parse_counter(&raw)) {
            return counts;
        }
        tracing::debug!(entries = paths.len(), "no usable counter, counting entries");
        let mut counts = Counts::default();
        for path in paths {
            match self.reader.entry(path) {
                Ok(Some(Entry::Item(info))) if info.is_article => counts.articles += 1,
                Ok(Some(Entry::Item(info))) => counts.add(&info.mime, 1),
                Ok(_) => {},
                Err(err) => tracing::debug!(path = %path, error = %err, "skipping unreadable entry"),
            }
        }
        counts
    }

    fn created(&self) -> Option<Date> {
        let raw = self.text(consts::DATE)?;
        let parsed = parse_date(&raw);
        if parsed.is_none() {
            tracing::warn!(value = %raw, "malformed creation date, ignoring");
        }
        parsed
    }

    fn uuid(&self) -> Option<String> {
        self.text(consts::UUID).or_else(|| match self.reader.declared_id() {
            Ok(id) => id.map(|id| id.trim().to_string()).filter(|id| !id.is_empty()),
            Err(err) => {
                tracing::debug!(error = %err, "no declared identifier");
                None
            },
        })
    }

    fn favicon(&self) -> Option<Favicon> {
        if let Some(data) = self.raw(consts::ILLUSTRATION).filter(|data| !data.is_empty()) {
            return Some(Favicon { mime: consts::FAVICON_MIME.to_string(), data });
        }
        let path = ContentPath::parse(consts::LEGACY_FAVICON_PATH).ok()?;
        match self.reader.content(&path) {
            Ok(item) => item.filter(|item| !item.data.is_empty()).map(|item| Favicon { mime: item.mime, data: item.data }),
            Err(err) => {
                tracing::debug!(error = %err, "unreadable legacy favicon");
                None
            },
        }
    }
}

/// The `_category:` tag, else the first segment of the publication name.
fn category(tags: &Tags, name: &str) -> String {
    tags.category()
        .or_else(|| name.split('_').next())
        .map(str::to_string)
        .unwrap_or_default()
}

fn parse_date(raw: &str) -> Option<Date> {
    let captures = consts::DATE_REGEX.captures(raw)?;
    let year = captures.get(1)?.as_str().parse::<i32>().ok()?;
    let month = Month::try_from(captures.get(2)?.as_str().parse::<u8>().ok()?).ok()?;
    let day = captures.get(3)?.as_str().parse::<u8>().ok()?;
    Date::from_calendar_date(year, month, day).ok()
}
