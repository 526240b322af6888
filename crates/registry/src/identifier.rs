//! Archive identifiers.
//!
//! Applications address open archives by a 128-bit identifier instead of a
//! file location. Archives usually declare one themselves; when they don't,
//! or the declaration is malformed, one is derived from the location.

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::path::Path;
use std::str::FromStr;

use crate::error::{Error, ErrorKind};

/// Stable identifier of one open archive.
///
/// Displays in the hyphenated 8-4-4-4-12 hexadecimal form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ArchiveIdentifier(u128);

impl ArchiveIdentifier {
    pub const fn from_u128(value: u128) -> Self {
        Self(value)
    }

    pub const fn as_u128(&self) -> u128 {
        self.0
    }

    /// Parse identifier text as archives declare it.
    ///
    /// Accepts 32 hexadecimal digits, either bare or hyphenated in the
    /// 8-4-4-4-12 layout, optionally wrapped in braces. The all-zero value is
    /// rejected: archives use it as a placeholder, not an identity.
    ///
    /// # Examples
    ///
    /// ```
    /// use stacks_registry::ArchiveIdentifier;
    /// assert!(ArchiveIdentifier::parse("0123456789abcdef0123456789ABCDEF").is_some());
    /// assert!(ArchiveIdentifier::parse("{01234567-89ab-cdef-0123-456789abcdef}").is_some());
    /// assert!(ArchiveIdentifier::parse("00000000-0000-0000-0000-000000000000").is_none());
    /// assert!(ArchiveIdentifier::parse("0123-4567").is_none());
    /// ```
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        let text = text.strip_prefix('{').and_then(|t| t.strip_suffix('}')).unwrap_or(text);
        let hex = match text.len() {
            32 => text.to_string(),
            36 => {
                let groups: Vec<&str> = text.split('-').collect();
                let lengths: Vec<usize> = groups.iter().map(|g| g.len()).collect();
                if lengths != [8, 4, 4, 4, 12] {
                    return None;
                }
                groups.concat()
            },
            _ => return None,
        };
        if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        let value = u128::from_str_radix(&hex, 16).ok()?;
        (value != 0).then_some(Self(value))
    }

    /// Derive an identifier from an archive's canonical location.
    ///
    /// Deterministic: the same location always maps to the same identifier.
    pub fn from_location(location: &Path) -> Self {
        let digest = blake3::hash(location.as_os_str().as_encoded_bytes());
        let mut bytes = [0u8; 16];
        bytes.copy_from_slice(&digest.as_bytes()[..16]);
        Self(u128::from_be_bytes(bytes))
    }
}

impl Display for ArchiveIdentifier {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let hex = format!("{:032x}", self.0);
        write!(f, "{}-{}-{}-{}-{}", &hex[0..8], &hex[8..12], &hex[12..16], &hex[16..20], &hex[20..32])
    }
}

impl FromStr for ArchiveIdentifier {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| Error::from(ErrorKind::NotFound))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("0123456789abcdef0123456789abcdef", 0x0123456789abcdef0123456789abcdef)]
    #[case("01234567-89AB-CDEF-0123-456789ABCDEF", 0x0123456789abcdef0123456789abcdef)]
    #[case("  {00000000-0000-0000-0000-000000000001}\n", 1)]
    fn test_parse_valid(#[case] text: &str, #[case] expected: u128) {
        assert_eq!(ArchiveIdentifier::parse(text), Some(ArchiveIdentifier::from_u128(expected)));
    }

    #[rstest]
    #[case("")]
    #[case("not an identifier")]
    #[case("0123456789abcdef0123456789abcde")]
    #[case("0123456789abcdef0123456789abcdefa")]
    #[case("0123456789abcdef0123456789abcdeg")]
    #[case("0123456-789ab-cdef-0123-456789abcdef")]
    #[case("+123456789abcdef0123456789abcdef")]
    #[case("00000000000000000000000000000000")]
    fn test_parse_invalid(#[case] text: &str) {
        assert_eq!(ArchiveIdentifier::parse(text), None);
    }

    #[test]
    fn test_display_round_trips() {
        let id = ArchiveIdentifier::from_u128(0x0123456789abcdef0123456789abcdef);
        assert_eq!(id.to_string(), "01234567-89ab-cdef-0123-456789abcdef");
        assert_eq!(id.to_string().parse::<ArchiveIdentifier>().unwrap(), id);
    }

    #[test]
    fn test_from_location_is_deterministic() {
        let a = ArchiveIdentifier::from_location(Path::new("/library/a.zim"));
        assert_eq!(a, ArchiveIdentifier::from_location(Path::new("/library/a.zim")));
        assert_ne!(a, ArchiveIdentifier::from_location(Path::new("/library/b.zim")));
    }
}
