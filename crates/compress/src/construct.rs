use crate::Compression;
use crate::error::{Error, ErrorKind, Result};

const METHOD_STORED: u16 = 0;
const METHOD_DEFLATE: u16 = 8;
const METHOD_BZIP2: u16 = 12;
const METHOD_ZSTD: u16 = 93;
const METHOD_XZ: u16 = 95;

impl TryFrom<u16> for Compression {
    type Error = Error;
    fn try_from(method: u16) -> std::result::Result<Self, Self::Error> {
        Compression::from_method(method)
    }
}

impl Compression {
    /// Map a container method code onto a compression format.
    ///
    /// Returns [`DisabledMethod`](ErrorKind::DisabledMethod) for methods this
    /// crate knows about but was built without, and
    /// [`UnsupportedMethod`](ErrorKind::UnsupportedMethod) for everything else.
    ///
    /// # Examples
    ///
    /// ```
    /// use stacks_compress::Compression;
    /// assert_eq!(Compression::from_method(8).unwrap(), Compression::Deflate);
    /// assert!(Compression::from_method(14).is_err());
    /// ```
    pub fn from_method(method: u16) -> Result<Self> {
        match method {
            METHOD_STORED => Ok(Compression::Stored),
            METHOD_DEFLATE => Ok(Compression::Deflate),
            METHOD_BZIP2 => Ok(Compression::Bzip2),
            #[cfg(feature = "zstd")]
            METHOD_ZSTD => Ok(Compression::Zstd),
            #[cfg(not(feature = "zstd"))]
            METHOD_ZSTD => exn::bail!(ErrorKind::DisabledMethod("zstd")),
            #[cfg(feature = "xz")]
            METHOD_XZ => Ok(Compression::Xz),
            #[cfg(not(feature = "xz"))]
            METHOD_XZ => exn::bail!(ErrorKind::DisabledMethod("xz")),
            other => exn::bail!(ErrorKind::UnsupportedMethod(other)),
        }
    }

    /// The container method code for this format.
    #[must_use]
    pub fn method(&self) -> u16 {
        match self {
            Compression::Stored => METHOD_STORED,
            Compression::Deflate => METHOD_DEFLATE,
            Compression::Bzip2 => METHOD_BZIP2,
            #[cfg(feature = "xz")]
            Compression::Xz => METHOD_XZ,
            #[cfg(feature = "zstd")]
            Compression::Zstd => METHOD_ZSTD,
        }
    }

    /// Whether member bytes are kept verbatim inside the container, so that
    /// callers can read them directly from the archive file.
    #[inline]
    #[must_use]
    pub fn is_stored(&self) -> bool {
        matches!(self, Compression::Stored)
    }
}

#[cfg(test)]
mod tests {
    use crate::Compression;
    use crate::error::ErrorKind;
    use rstest::rstest;

    #[rstest]
    #[case(0, Compression::Stored)]
    #[case(8, Compression::Deflate)]
    #[case(12, Compression::Bzip2)]
    #[cfg_attr(feature = "xz", case(95, Compression::Xz))]
    #[cfg_attr(feature = "zstd", case(93, Compression::Zstd))]
    fn test_from_method(#[case] method: u16, #[case] expected: Compression) {
        assert_eq!(Compression::from_method(method).unwrap(), expected);
        assert_eq!(expected.method(), method);
    }

    #[rstest]
    #[case(1)]
    #[case(14)]
    #[case(99)]
    fn test_from_method_unsupported(#[case] method: u16) {
        let err = Compression::from_method(method).unwrap_err();
        assert_eq!(*err, ErrorKind::UnsupportedMethod(method));
    }

    #[cfg(not(feature = "zstd"))]
    #[test]
    fn test_from_method_disabled() {
        let err = Compression::try_from(93).unwrap_err();
        assert_eq!(*err, ErrorKind::DisabledMethod("zstd"));
    }

    #[test]
    fn test_is_stored() {
        assert!(Compression::Stored.is_stored());
        assert!(!Compression::Deflate.is_stored());
    }
}
