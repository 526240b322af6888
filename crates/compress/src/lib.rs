//! Decompression of individual members inside packaged archives.
//!
//! Packaged archives store each member with its own compression method,
//! identified by the numeric method code written into the container's
//! directory. This crate maps those codes onto a unified [`Compression`] enum,
//! providing:
//!
//! - **Method detection** from the container's method code
//!   ([`Compression::from_method`]) and back ([`Compression::method`])
//! - **In-memory** compression/decompression ([`Compression::compress`],
//!   [`Compression::decompress`])
//! - **Streaming** decompression via wrapped readers
//!   ([`Compression::wrap_reader`]), used for partial (ranged) reads
//!
//! Stored, Deflate and Bzip2 members are always readable. Optional formats
//! (XZ, Zstd) are behind feature flags.

mod construct;
pub mod error;
mod ops;
mod util;

/// A supported member compression method.
///
/// Variants gated behind feature flags (`xz`, `zstd`) are only available when
/// the corresponding feature is enabled. Defaults to [`Stored`](Self::Stored)
/// (uncompressed).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Compression {
    /// Uncompressed (method 0)
    #[default]
    Stored,
    /// Raw DEFLATE stream (method 8)
    Deflate,
    /// Bzip2 compression (method 12)
    Bzip2,
    /// XZ/LZMA2 compression (method 95)
    #[cfg(feature = "xz")]
    Xz,
    /// Zstd compression (method 93)
    #[cfg(feature = "zstd")]
    Zstd,
}

#[cfg(test)]
mod tests {
    use crate::Compression;

    #[test]
    fn compression_default() {
        assert_eq!(Compression::default(), Compression::Stored);
    }
}
