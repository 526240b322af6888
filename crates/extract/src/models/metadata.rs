use super::{Counts, Tags};
use time::Date;

/// Small icon shipped inside an archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Favicon {
    pub mime: String,
    pub data: Vec<u8>,
}

/// Descriptive snapshot of one archive.
///
/// Produced once per open archive and never mutated afterwards. Text fields
/// that the archive doesn't declare are empty rather than absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetaData {
    /// Human readable title (falls back to the file name)
    pub title: String,
    pub description: String,
    pub long_description: Option<String>,
    /// ISO-639 language codes, most significant first
    pub languages: Vec<String>,
    pub creator: String,
    pub publisher: String,
    /// Identifies the same publication across versions (e.g. `wikipedia_en_all`)
    pub name: String,
    /// Variant of the publication (e.g. `maxi`, `nopic`)
    pub flavor: Option<String>,
    pub category: String,
    pub tags: Tags,
    pub counts: Counts,
    /// Creation date of the archive
    pub created: Option<Date>,
    /// Content-derived unique identifier text, as declared
    pub uuid: Option<String>,
    pub favicon: Option<Favicon>,
}

impl MetaData {
    pub fn article_count(&self) -> u64 {
        self.counts.articles
    }

    pub fn media_count(&self) -> u64 {
        self.counts.media
    }

    pub fn has_details(&self) -> bool {
        self.tags.has_details()
    }

    pub fn has_pictures(&self) -> bool {
        self.tags.has_pictures()
    }

    pub fn has_videos(&self) -> bool {
        self.tags.has_videos()
    }

    pub fn requires_service_workers(&self) -> bool {
        self.tags.requires_service_workers()
    }

    pub fn is_picture_only(&self) -> bool {
        self.tags.is_picture_only()
    }
}
