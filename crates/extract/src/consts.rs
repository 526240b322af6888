use regex::Regex;
use std::sync::LazyLock;

macro_rules! regex {
    ($name:ident, $regex:expr) => {
        pub(crate) static $name: LazyLock<Regex> = LazyLock::new(|| Regex::new($regex).unwrap());
    };
}

// Metadata entry names.
pub(crate) const TITLE: &str = "Title";
pub(crate) const DESCRIPTION: &str = "Description";
pub(crate) const LONG_DESCRIPTION: &str = "LongDescription";
pub(crate) const LANGUAGE: &str = "Language";
pub(crate) const CREATOR: &str = "Creator";
pub(crate) const PUBLISHER: &str = "Publisher";
pub(crate) const NAME: &str = "Name";
pub(crate) const FLAVOR: &str = "Flavor";
pub(crate) const TAGS: &str = "Tags";
pub(crate) const COUNTER: &str = "Counter";
pub(crate) const DATE: &str = "Date";
pub(crate) const UUID: &str = "UUID";
pub(crate) const ILLUSTRATION: &str = "Illustration_48x48@1";

/// Content path older archives keep their favicon under.
pub(crate) const LEGACY_FAVICON_PATH: &str = "-/favicon";
pub(crate) const FAVICON_MIME: &str = "image/png";

regex!(DATE_REGEX, r"^\s*(\d{4})-(\d{1,2})-(\d{1,2})\s*$");
regex!(LANGUAGE_CODE_REGEX, r"^[A-Za-z]{2,3}$");
