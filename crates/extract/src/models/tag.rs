use std::fmt::{Display, Formatter, Result as FmtResult};

const CATEGORY_PREFIX: &str = "_category:";

/// The `;`-separated tag set an archive declares.
///
/// Plain tags are free text (`wikipedia`, `nopic`). Tags with a leading
/// underscore carry structured values: `_category:<name>` and boolean
/// switches such as `_pictures:no` or `_sw:yes`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tags(Vec<String>);

impl Tags {
    /// Parse a raw tag list, dropping blanks and surrounding whitespace.
    ///
    /// # Examples
    ///
    /// ```
    /// use stacks_extract::models::Tags;
    /// let tags = Tags::parse("wikipedia; _category:wikipedia;;_pictures:no");
    /// assert_eq!(tags.iter().count(), 3);
    /// assert_eq!(tags.category(), Some("wikipedia"));
    /// assert!(!tags.has_pictures());
    /// ```
    pub fn parse(raw: &str) -> Self {
        Self(raw.split(';').map(str::trim).filter(|tag| !tag.is_empty()).map(str::to_string).collect())
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.0.iter().any(|t| t == tag)
    }

    /// Value of the `_category:` tag, if present.
    pub fn category(&self) -> Option<&str> {
        self.iter().find_map(|tag| tag.strip_prefix(CATEGORY_PREFIX)).map(str::trim).filter(|c| !c.is_empty())
    }

    /// Value of a `_<name>:yes|no` switch. Unrecognised values count as unset.
    fn switch(&self, name: &str) -> Option<bool> {
        self.0.iter().rev().find_map(|tag| {
            let (key, value) = tag.strip_prefix('_')?.split_once(':')?;
            match (key == name, value.trim().to_ascii_lowercase().as_str()) {
                (true, "yes") => Some(true),
                (true, "no") => Some(false),
                _ => None,
            }
        })
    }

    /// Articles carry full text, not just an abstract. Defaults to `true`.
    pub fn has_details(&self) -> bool {
        self.switch("details").unwrap_or(true)
    }

    /// Defaults to `true`; the legacy `nopic` tag also clears it.
    pub fn has_pictures(&self) -> bool {
        self.switch("pictures").unwrap_or(!self.contains("nopic"))
    }

    /// Defaults to `true`; the legacy `novid` tag also clears it.
    pub fn has_videos(&self) -> bool {
        self.switch("videos").unwrap_or(!self.contains("novid"))
    }

    /// Content only renders through a service worker. Defaults to `false`.
    pub fn requires_service_workers(&self) -> bool {
        self.switch("sw").unwrap_or(false)
    }

    /// Picture galleries: an explicit `_pictures:yes` without article text.
    pub fn is_picture_only(&self) -> bool {
        self.switch("pictures") == Some(true) && !self.has_details()
    }
}

impl Display for Tags {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.0.join(";"))
    }
}
