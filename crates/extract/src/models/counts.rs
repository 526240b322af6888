/// Article and media totals for an archive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counts {
    pub articles: u64,
    pub media: u64,
}

impl Counts {
    /// Tally one entry (or `count` entries) of a mime type.
    pub fn add(&mut self, mime: &str, count: u64) {
        let essence = mime.split(';').next().unwrap_or_default().trim().to_ascii_lowercase();
        if essence == "text/html" {
            self.articles = self.articles.saturating_add(count);
        } else if ["image/", "video/", "audio/"].iter().any(|kind| essence.starts_with(kind)) {
            self.media = self.media.saturating_add(count);
        }
    }

    /// Parse a `mime=count;mime=count` counter listing.
    ///
    /// Returns `None` if no pair in the listing is well-formed, so callers
    /// can fall back to counting entries themselves.
    ///
    /// # Examples
    ///
    /// ```
    /// use stacks_extract::models::Counts;
    /// let counts = Counts::parse_counter("text/html=120;image/png=30;image/jpeg=5;text/css=2").unwrap();
    /// assert_eq!(counts.articles, 120);
    /// assert_eq!(counts.media, 35);
    /// ```
    pub fn parse_counter(raw: &str) -> Option<Self> {
        let mut counts = Self::default();
        let mut parsed_any = false;
        for pair in raw.split(';').map(str::trim).filter(|pair| !pair.is_empty()) {
            let Some((mime, count)) = pair.rsplit_once('=') else {
                tracing::debug!(pair, "skipping malformed counter pair");
                continue;
            };
            let Ok(count) = count.trim().parse::<u64>() else {
                tracing::debug!(pair, "skipping malformed counter pair");
                continue;
            };
            counts.add(mime, count);
            parsed_any = true;
        }
        parsed_any.then_some(counts)
    }
}
