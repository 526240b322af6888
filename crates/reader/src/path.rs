//! Content path normalisation.
//!
//! Applications address entries with URL-like paths (`/A/Main_Page`,
//! `-/style.css`). Archives key their entries without a leading separator.
//! [`ContentPath`] is the normalised, validated form every reader lookup
//! takes, so that `/home`, `home` and `./home/` all name the same entry.

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use crate::error::{Error, ErrorKind, Result};

/// A validated content path inside an archive.
///
/// Stored without a leading `/`; [`Display`] renders the rooted form
/// (`/home`) handed back to applications.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ContentPath(String);

impl ContentPath {
    /// Validates and normalises a content path.
    ///
    /// Ensures that paths don't escape the archive root (no `..` traversal
    /// past the first component).
    ///
    /// > **Note:** Segments are only split on `/`. Percent-encoding is left
    /// >           untouched; decoding URLs is the application's job.
    ///
    /// # Examples
    ///
    /// ```
    /// use stacks_reader::ContentPath;
    /// // Valid paths
    /// assert!(ContentPath::parse("/A/Main_Page").is_ok());
    /// assert!(ContentPath::parse("-/style.css").is_ok());
    /// assert!(ContentPath::parse("a/../home").is_ok()); // (never leaves archive root)
    /// // Invalid paths
    /// assert!(ContentPath::parse("../etc/passwd").is_err());
    /// assert!(ContentPath::parse("a\0b").is_err());
    /// assert!(ContentPath::parse("/").is_err());
    /// // Paths get resolved
    /// assert_eq!(ContentPath::parse("/wrong/..//./home/").unwrap().as_str(), "home");
    /// ```
    pub fn parse(path: impl AsRef<str>) -> Result<Self> {
        let raw = path.as_ref();
        if raw.contains('\0') {
            exn::bail!(ErrorKind::InvalidPath(raw.to_string()));
        }
        let mut segments: Vec<&str> = Vec::new();
        for segment in raw.split('/') {
            match segment {
                "" | "." => {},
                ".." => {
                    if segments.pop().is_none() {
                        exn::bail!(ErrorKind::InvalidPath(raw.to_string()));
                    }
                },
                other => segments.push(other),
            }
        }
        match segments.is_empty() {
            true => exn::bail!(ErrorKind::InvalidPath(raw.to_string())),
            false => Ok(Self(segments.join("/"))),
        }
    }

    /// The archive-internal key, without a leading separator.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The final path segment (`Main_Page` for `A/Main_Page`).
    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    /// The lowercased extension of the final segment, if there is one.
    pub fn extension(&self) -> Option<String> {
        let name = self.file_name();
        match name.rfind('.') {
            // A leading dot is a hidden name, not an extension.
            Some(0) | None => None,
            Some(idx) => Some(name[idx + 1..].to_ascii_lowercase()),
        }
    }
}

impl Display for ContentPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "/{}", self.0)
    }
}

impl FromStr for ContentPath {
    type Err = Error;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for ContentPath {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("home", "home")]
    #[case("/home", "home")]
    #[case("A/Main_Page", "A/Main_Page")]
    #[case("/A//Main_Page/", "A/Main_Page")]
    #[case("./a/./b", "a/b")]
    #[case("a/b/..", "a")]
    #[case("wiki/Ünïcödé page", "wiki/Ünïcödé page")]
    fn test_valid_paths(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(ContentPath::parse(input).unwrap().as_str(), expected);
    }

    #[rstest]
    #[case("")]
    #[case("/")]
    #[case("//")]
    #[case("./.")]
    #[case("..")]
    #[case("../etc/passwd")]
    #[case("a/../../b")]
    #[case("a\0b")]
    fn test_invalid_paths(#[case] input: &str) {
        let err = ContentPath::parse(input).unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidPath(p) if p == input));
    }

    #[test]
    fn test_display_is_rooted() {
        assert_eq!(ContentPath::parse("home").unwrap().to_string(), "/home");
        assert_eq!("/A/b".parse::<ContentPath>().unwrap().to_string(), "/A/b");
    }

    #[rstest]
    #[case("index.html", Some("html"))]
    #[case("I/logo.PNG", Some("png"))]
    #[case("A/Main_Page", None)]
    #[case("-/.hidden", None)]
    #[case("dir.d/file", None)]
    fn test_extension(#[case] input: &str, #[case] expected: Option<&str>) {
        assert_eq!(ContentPath::parse(input).unwrap().extension().as_deref(), expected);
    }
}
