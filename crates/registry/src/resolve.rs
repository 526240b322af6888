//! Content resolution.
//!
//! Turns an (identifier, content path) pair into content, following the
//! archive's redirect graph. Every path handed back is in the rooted form
//! (`/home`), whatever form the caller asked with.

use exn::{OptionExt, ResultExt};
use stacks_reader::{ArchiveReader, ContentPath, DirectAccess, Entry, ItemInfo, random};
use std::ops::RangeInclusive;
use std::sync::Arc;
use time::Date;
use tracing::instrument;

use crate::error::{ErrorKind, Result};
use crate::{ArchiveIdentifier, ReaderRegistry, ResolverOptions};

/// A resolved path with its full payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentResult {
    pub path: String,
    pub mime: String,
    pub data: Vec<u8>,
}

/// A resolved path with an inclusive byte range of its payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentRange {
    pub path: String,
    pub mime: String,
    pub data: Vec<u8>,
    /// First byte of `data` within the payload
    pub start: u64,
    /// Last byte of `data` within the payload (inclusive)
    pub end: u64,
    /// Total payload size
    pub total: u64,
}

/// What a client needs to serve an entry without loading it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentInfo {
    pub mime: String,
    pub size: u64,
    /// Title of the archive the entry belongs to
    pub title: String,
    /// Creation date of the archive the entry belongs to
    pub created: Option<Date>,
}

/// Resolves content paths against the archives open in a registry.
#[derive(Debug, Clone)]
pub struct ContentResolver {
    registry: Arc<ReaderRegistry>,
    options: ResolverOptions,
}

impl ContentResolver {
    pub fn new(registry: Arc<ReaderRegistry>) -> Self {
        Self { registry, options: ResolverOptions::default() }
    }

    pub fn with_options(mut self, options: ResolverOptions) -> Self {
        self.options = options;
        self
    }

    pub fn registry(&self) -> &ReaderRegistry {
        &self.registry
    }

    pub fn options(&self) -> &ResolverOptions {
        &self.options
    }

    /// Path the redirect chain starting at `path` ends at.
    #[instrument(level = "debug", skip_all, fields(id = %id, path = path))]
    pub fn redirected_path(&self, id: ArchiveIdentifier, path: &str) -> Result<String> {
        let entry = self.registry.get(id)?;
        let (resolved, _) = self.follow(entry.reader(), path)?;
        Ok(resolved.to_string())
    }

    /// Full payload of the entry `path` resolves to.
    #[instrument(level = "debug", skip_all, fields(id = %id, path = path, size = tracing::field::Empty))]
    pub fn content(&self, id: ArchiveIdentifier, path: &str) -> Result<ContentResult> {
        let entry = self.registry.get(id)?;
        let reader = entry.reader();
        let (resolved, _) = self.follow(reader, path)?;
        let item = reader.content(&resolved).or_raise(|| ErrorKind::Read)?.ok_or_raise(|| ErrorKind::NotFound)?;
        tracing::Span::current().record("size", item.data.len());
        Ok(ContentResult { path: resolved.to_string(), mime: item.mime, data: item.data })
    }

    /// Inclusive byte range `start..=end` of the entry `path` resolves to.
    ///
    /// `(0, 0)` asks for the whole payload. `end` is clamped to the last
    /// byte; a `start` past the end of the payload is `NotFound`.
    pub fn content_range(&self, id: ArchiveIdentifier, path: &str, start: u64, end: u64) -> Result<ContentRange> {
        let span = (start != 0 || end != 0).then_some(start..=end);
        self.content_span(id, path, span)
    }

    /// Like [`content_range`](Self::content_range), but `None` is the whole
    /// payload and every `Some` span is taken literally, so `0..=0` is the
    /// first byte.
    #[instrument(level = "debug", skip_all, fields(id = %id, path = path, range = ?span))]
    pub fn content_span(&self, id: ArchiveIdentifier, path: &str, span: Option<RangeInclusive<u64>>) -> Result<ContentRange> {
        let entry = self.registry.get(id)?;
        let reader = entry.reader();
        let (resolved, info) = self.follow(reader, path)?;
        let total = info.size;

        let (start, end) = match span {
            None => (0, total.saturating_sub(1)),
            Some(span) => {
                let (start, end) = span.into_inner();
                if start >= total || end < start {
                    exn::bail!(ErrorKind::NotFound);
                }
                (start, end.min(total - 1))
            },
        };
        let len = if total == 0 { 0 } else { end - start + 1 };
        let item =
            reader.content_range(&resolved, start, len).or_raise(|| ErrorKind::Read)?.ok_or_raise(|| ErrorKind::NotFound)?;
        Ok(ContentRange { path: resolved.to_string(), mime: item.mime, data: item.data, start, end, total })
    }

    /// Total payload size of the entry `path` resolves to.
    pub fn content_size(&self, id: ArchiveIdentifier, path: &str) -> Result<u64> {
        let entry = self.registry.get(id)?;
        let (_, info) = self.follow(entry.reader(), path)?;
        Ok(info.size)
    }

    /// Mime type and size of the entry `path` resolves to, with the title and
    /// creation date of its archive.
    pub fn content_info(&self, id: ArchiveIdentifier, path: &str) -> Result<ContentInfo> {
        let entry = self.registry.get(id)?;
        let (_, info) = self.follow(entry.reader(), path)?;
        let metadata = self.registry.metadata(id)?;
        Ok(ContentInfo { mime: info.mime, size: info.size, title: metadata.title.clone(), created: metadata.created })
    }

    /// Where the entry `path` resolves to can be read straight from the
    /// archive file. `NotFound` when its bytes are compressed.
    pub fn direct_access(&self, id: ArchiveIdentifier, path: &str) -> Result<DirectAccess> {
        let entry = self.registry.get(id)?;
        let reader = entry.reader();
        let (resolved, _) = self.follow(reader, path)?;
        reader.direct_access(&resolved).or_raise(|| ErrorKind::Read)?.ok_or_raise(|| ErrorKind::NotFound)
    }

    /// Every content path in the archive, items and redirects alike.
    pub fn list_paths(&self, id: ArchiveIdentifier) -> Result<Vec<String>> {
        let entry = self.registry.get(id)?;
        let paths = entry.reader().paths().or_raise(|| ErrorKind::Read)?;
        Ok(paths.iter().map(ToString::to_string).collect())
    }

    /// The landing page the archive declares. Not resolved through redirects.
    pub fn main_page(&self, id: ArchiveIdentifier) -> Result<String> {
        let entry = self.registry.get(id)?;
        let main_page = entry.reader().main_page().or_raise(|| ErrorKind::Read)?;
        Ok(main_page.ok_or_raise(|| ErrorKind::NotFound)?.to_string())
    }

    /// A pseudo-randomly chosen article.
    ///
    /// Samples the reader a bounded number of times first; if no sample is an
    /// article, picks among every article in the archive instead. `NotFound`
    /// only when the archive has no articles at all.
    #[instrument(level = "debug", skip_all, fields(id = %id))]
    pub fn random_page(&self, id: ArchiveIdentifier) -> Result<String> {
        let entry = self.registry.get(id)?;
        let reader = entry.reader();

        for _ in 0..self.options.random_attempts {
            let Some(path) = reader.random_path().or_raise(|| ErrorKind::Read)? else {
                break;
            };
            if is_article(reader, &path)? {
                return Ok(path.to_string());
            }
        }

        tracing::debug!("no article sampled, enumerating entries");
        let mut articles = Vec::new();
        for path in reader.paths().or_raise(|| ErrorKind::Read)? {
            if is_article(reader, &path)? {
                articles.push(path);
            }
        }
        match random::index(articles.len()) {
            Some(idx) => Ok(articles[idx].to_string()),
            None => exn::bail!(ErrorKind::NotFound),
        }
    }

    /// Main page of some open archive.
    ///
    /// Archives are tried in a random rotation; ones without a main page are
    /// skipped.
    pub fn main_page_any(&self) -> Result<(ArchiveIdentifier, String)> {
        self.any_archive(|id| self.main_page(id))
    }

    /// Random article of some open archive.
    pub fn random_page_any(&self) -> Result<(ArchiveIdentifier, String)> {
        self.any_archive(|id| self.random_page(id))
    }

    fn any_archive(&self, pick: impl Fn(ArchiveIdentifier) -> Result<String>) -> Result<(ArchiveIdentifier, String)> {
        let ids: Vec<ArchiveIdentifier> = self.registry.list_identifiers().into_iter().collect();
        let Some(first) = random::index(ids.len()) else {
            exn::bail!(ErrorKind::NotFound);
        };
        for offset in 0..ids.len() {
            let id = ids[(first + offset) % ids.len()];
            match pick(id) {
                Ok(path) => return Ok((id, path)),
                Err(err) if *err == ErrorKind::NotFound => continue,
                Err(err) => return Err(err),
            }
        }
        exn::bail!(ErrorKind::NotFound)
    }

    /// Follow redirects from `path` to an item.
    ///
    /// A chain of `redirect_limit` redirects or more fails, which also ends
    /// cycles.
    fn follow(&self, reader: &dyn ArchiveReader, path: &str) -> Result<(ContentPath, ItemInfo)> {
        let Ok(mut current) = ContentPath::parse(path) else {
            tracing::debug!(path, "invalid content path");
            exn::bail!(ErrorKind::NotFound);
        };
        let mut hops = 0;
        loop {
            match reader.entry(&current).or_raise(|| ErrorKind::Read)? {
                None => exn::bail!(ErrorKind::NotFound),
                Some(Entry::Item(info)) => return Ok((current, info)),
                Some(Entry::Redirect(target)) => {
                    hops += 1;
                    if hops >= self.options.redirect_limit {
                        exn::bail!(ErrorKind::RedirectLoop { path: path.to_string(), limit: self.options.redirect_limit });
                    }
                    tracing::trace!(from = %current, to = %target, hops, "following redirect");
                    current = target;
                },
            }
        }
    }
}

fn is_article(reader: &dyn ArchiveReader, path: &ContentPath) -> Result<bool> {
    let entry = reader.entry(path).or_raise(|| ErrorKind::Read)?;
    Ok(matches!(entry, Some(Entry::Item(ItemInfo { is_article: true, .. }))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use stacks_reader::{MemoryArchive, MemoryOpener, PackageBuilder, PackageOpener};
    use std::path::Path;

    fn resolver(archives: Vec<(&str, MemoryArchive)>) -> (ContentResolver, Vec<ArchiveIdentifier>) {
        let opener = archives.into_iter().fold(MemoryOpener::new(), |opener, (location, archive)| {
            opener.with_archive(location, archive)
        });
        let registry = Arc::new(ReaderRegistry::new(Arc::new(opener)));
        let resolver = ContentResolver::new(registry.clone());
        let mut ids: Vec<_> = Vec::new();
        for location in ["/lib/a.zim", "/lib/b.zim", "/lib/c.zim"] {
            if let Ok(id) = registry.open(location) {
                ids.push(id);
            }
        }
        (resolver, ids)
    }

    fn archive_a() -> MemoryArchive {
        MemoryArchive::new()
            .with_content("home", "<h1>Home</h1>")
            .with_content("style.css", "body {}")
            .with_redirect("old", "home")
            .with_main_page("home")
            .with_metadata("Title", "Archive A")
            .with_metadata("Date", "2024-03-01")
    }

    /// Archive whose path `r0` takes `hops` redirects to reach `target`.
    fn chain(hops: usize) -> MemoryArchive {
        let mut archive = MemoryArchive::new().with_content("target", "end");
        for n in 0..hops {
            let next = if n + 1 == hops { "target".to_string() } else { format!("r{}", n + 1) };
            archive = archive.with_redirect(&format!("r{n}"), &next);
        }
        archive
    }

    #[test]
    fn main_page_and_redirect_scenario() {
        let (resolver, ids) = resolver(vec![("/lib/a.zim", archive_a())]);
        let id = ids[0];
        assert_eq!(resolver.main_page(id).unwrap(), "/home");
        assert_eq!(resolver.redirected_path(id, "/old").unwrap(), "/home");
        let old = resolver.content(id, "/old").unwrap();
        let home = resolver.content(id, "/home").unwrap();
        assert_eq!(old, home);
        assert_eq!(home.path, "/home");
        assert_eq!(home.mime, "text/html");
    }

    #[test]
    fn direct_content_matches_reader() {
        let (resolver, ids) = resolver(vec![("/lib/a.zim", archive_a())]);
        let result = resolver.content(ids[0], "style.css").unwrap();
        let entry = resolver.registry().get(ids[0]).unwrap();
        let direct = entry.reader().content(&ContentPath::parse("style.css").unwrap()).unwrap().unwrap();
        assert_eq!(result.data, direct.data);
        assert_eq!(result.mime, direct.mime);
        assert_eq!(result.path, "/style.css");
    }

    #[rstest]
    #[case("missing")]
    #[case("../escape")]
    #[case("")]
    fn unresolvable_paths_are_not_found(#[case] path: &str) {
        let (resolver, ids) = resolver(vec![("/lib/a.zim", archive_a().with_redirect("dangling", "nowhere"))]);
        assert_eq!(*resolver.content(ids[0], path).unwrap_err(), ErrorKind::NotFound);
        assert_eq!(*resolver.redirected_path(ids[0], "dangling").unwrap_err(), ErrorKind::NotFound);
    }

    #[rstest]
    #[case(1, true)]
    #[case(15, true)]
    #[case(16, false)]
    #[case(40, false)]
    fn redirect_chains_are_bounded(#[case] redirects: usize, #[case] resolves: bool) {
        let (resolver, ids) = resolver(vec![("/lib/a.zim", chain(redirects))]);
        let result = resolver.redirected_path(ids[0], "r0");
        if resolves {
            assert_eq!(result.unwrap(), "/target");
        } else {
            let err = result.unwrap_err();
            assert_eq!(*err, ErrorKind::RedirectLoop { path: "r0".to_string(), limit: 16 });
        }
    }

    #[test]
    fn redirect_cycles_fail() {
        let archive = MemoryArchive::new().with_redirect("a", "b").with_redirect("b", "a");
        let (resolver, ids) = resolver(vec![("/lib/a.zim", archive)]);
        let err = resolver.content(ids[0], "a").unwrap_err();
        assert!(matches!(&*err, ErrorKind::RedirectLoop { .. }));
    }

    #[test]
    fn redirect_limit_is_configurable() {
        let (resolver, ids) = resolver(vec![("/lib/a.zim", chain(3))]);
        let resolver = resolver.with_options(ResolverOptions { redirect_limit: 3, ..ResolverOptions::default() });
        assert!(resolver.redirected_path(ids[0], "r1").is_ok());
        assert!(resolver.redirected_path(ids[0], "r0").is_err());
    }

    #[test]
    fn closed_archive_is_not_found() {
        let (resolver, ids) = resolver(vec![("/lib/a.zim", archive_a())]);
        let id = ids[0];
        resolver.registry().close(id);
        assert_eq!(*resolver.content(id, "/home").unwrap_err(), ErrorKind::NotFound);
        assert_eq!(*resolver.redirected_path(id, "/old").unwrap_err(), ErrorKind::NotFound);
        assert_eq!(*resolver.main_page(id).unwrap_err(), ErrorKind::NotFound);
        assert_eq!(*resolver.random_page(id).unwrap_err(), ErrorKind::NotFound);
    }

    #[test]
    fn missing_main_page_is_not_found() {
        let (resolver, ids) = resolver(vec![("/lib/a.zim", MemoryArchive::new().with_content("x.html", "x"))]);
        assert_eq!(*resolver.main_page(ids[0]).unwrap_err(), ErrorKind::NotFound);
    }

    #[test]
    fn random_page_never_returns_non_articles() {
        let archive = MemoryArchive::new()
            .with_content("only.html", "article")
            .with_content("style.css", "body {}")
            .with_content("logo.png", [0x89, b'P'])
            .with_redirect("alias", "only.html");
        let (resolver, ids) = resolver(vec![("/lib/a.zim", archive)]);
        for _ in 0..32 {
            assert_eq!(resolver.random_page(ids[0]).unwrap(), "/only.html");
        }
    }

    #[test]
    fn random_page_falls_back_to_enumeration() {
        let archive = MemoryArchive::new()
            .with_content("style.css", "body {}")
            .with_content("page.html", "article")
            .with_fixed_random("style.css");
        let (resolver, ids) = resolver(vec![("/lib/a.zim", archive)]);
        assert_eq!(resolver.random_page(ids[0]).unwrap(), "/page.html");
    }

    #[test]
    fn random_page_without_articles_is_not_found() {
        let archive = MemoryArchive::new()
            .with_content("style.css", "body {}")
            .with_item("data", "application/json", "{}")
            .with_redirect("alias", "style.css");
        let (resolver, ids) = resolver(vec![("/lib/a.zim", archive)]);
        assert_eq!(*resolver.random_page(ids[0]).unwrap_err(), ErrorKind::NotFound);
    }

    #[rstest]
    #[case(0, 0, b"0123456789".as_slice(), 0, 9)]
    #[case(2, 4, b"234".as_slice(), 2, 4)]
    #[case(7, 100, b"789".as_slice(), 7, 9)]
    #[case(9, 9, b"9".as_slice(), 9, 9)]
    fn content_ranges(#[case] start: u64, #[case] end: u64, #[case] data: &[u8], #[case] from: u64, #[case] to: u64) {
        let archive = MemoryArchive::new().with_content("digits.txt", "0123456789").with_redirect("d", "digits.txt");
        let (resolver, ids) = resolver(vec![("/lib/a.zim", archive)]);
        let range = resolver.content_range(ids[0], "d", start, end).unwrap();
        assert_eq!(range.path, "/digits.txt");
        assert_eq!(range.data, data);
        assert_eq!((range.start, range.end, range.total), (from, to, 10));
    }

    #[rstest]
    #[case(10, 12)]
    #[case(5, 3)]
    fn content_range_outside_payload_is_not_found(#[case] start: u64, #[case] end: u64) {
        let archive = MemoryArchive::new().with_content("digits.txt", "0123456789");
        let (resolver, ids) = resolver(vec![("/lib/a.zim", archive)]);
        assert_eq!(*resolver.content_range(ids[0], "digits.txt", start, end).unwrap_err(), ErrorKind::NotFound);
    }

    #[test]
    fn explicit_span_of_first_byte() {
        let archive = MemoryArchive::new().with_content("digits.txt", "0123456789").with_content("empty.txt", "");
        let (resolver, ids) = resolver(vec![("/lib/a.zim", archive)]);
        let range = resolver.content_span(ids[0], "digits.txt", Some(0..=0)).unwrap();
        assert_eq!(range.data, b"0");
        assert_eq!((range.start, range.end, range.total), (0, 0, 10));
        assert_eq!(resolver.content_span(ids[0], "digits.txt", None).unwrap().data, b"0123456789");
        let range = resolver.content_span(ids[0], "empty.txt", None).unwrap();
        assert!(range.data.is_empty());
        assert_eq!(*resolver.content_span(ids[0], "empty.txt", Some(0..=0)).unwrap_err(), ErrorKind::NotFound);
    }

    #[test]
    fn content_size_and_info() {
        let (resolver, ids) = resolver(vec![("/lib/a.zim", archive_a())]);
        assert_eq!(resolver.content_size(ids[0], "/old").unwrap(), 13);
        let info = resolver.content_info(ids[0], "/old").unwrap();
        assert_eq!(info.mime, "text/html");
        assert_eq!(info.size, 13);
        assert_eq!(info.title, "Archive A");
        assert_eq!(info.created, Date::from_calendar_date(2024, time::Month::March, 1).ok());
    }

    #[test]
    fn lists_paths_in_rooted_form() {
        let (resolver, ids) = resolver(vec![("/lib/a.zim", archive_a())]);
        assert_eq!(resolver.list_paths(ids[0]).unwrap(), vec!["/home", "/old", "/style.css"]);
    }

    #[test]
    fn any_archive_skips_archives_without_main_page() {
        let (resolver, ids) = resolver(vec![
            ("/lib/a.zim", MemoryArchive::new().with_content("x.css", "x")),
            ("/lib/b.zim", archive_a()),
            ("/lib/c.zim", MemoryArchive::new().with_content("y.css", "y")),
        ]);
        assert_eq!(ids.len(), 3);
        let b = resolver.registry().list_identifiers().into_iter().find(|id| resolver.main_page(*id).is_ok()).unwrap();
        for _ in 0..8 {
            assert_eq!(resolver.main_page_any().unwrap(), (b, "/home".to_string()));
            assert_eq!(resolver.random_page_any().unwrap(), (b, "/home".to_string()));
        }
    }

    #[test]
    fn any_archive_with_nothing_open_is_not_found() {
        let (resolver, _) = resolver(Vec::new());
        assert_eq!(*resolver.main_page_any().unwrap_err(), ErrorKind::NotFound);
        assert_eq!(*resolver.random_page_any().unwrap_err(), ErrorKind::NotFound);
    }

    #[test]
    fn direct_access_only_for_stored_items() {
        let dir = tempfile::tempdir().unwrap();
        let location = dir.path().join("a.zip");
        PackageBuilder::new()
            .content("packed.html", "<p>compressed</p>")
            .stored_content("raw.txt", "verbatim")
            .write_to(&location)
            .unwrap();
        let registry = Arc::new(ReaderRegistry::new(Arc::new(PackageOpener)));
        let id = registry.open(&location).unwrap();
        let resolver = ContentResolver::new(registry);

        let access = resolver.direct_access(id, "/raw.txt").unwrap();
        let bytes = std::fs::read(&access.location).unwrap();
        let offset = access.offset as usize;
        assert_eq!(&bytes[offset..offset + 8], b"verbatim");
        assert!(Path::new(&access.location).ends_with("a.zip"));
        assert_eq!(*resolver.direct_access(id, "/packed.html").unwrap_err(), ErrorKind::NotFound);
    }

    #[test]
    fn close_during_concurrent_reads() {
        let (resolver, ids) = resolver(vec![("/lib/a.zim", archive_a())]);
        let id = ids[0];
        std::thread::scope(|scope| {
            for _ in 0..6 {
                scope.spawn(|| {
                    for _ in 0..50 {
                        match resolver.content(id, "/old") {
                            Ok(content) => assert_eq!(content.data, b"<h1>Home</h1>"),
                            Err(err) => assert_eq!(*err, ErrorKind::NotFound),
                        }
                    }
                });
            }
            scope.spawn(|| resolver.registry().close(id));
        });
        assert!(resolver.registry().is_empty());
        assert_eq!(*resolver.content(id, "/home").unwrap_err(), ErrorKind::NotFound);
    }
}
