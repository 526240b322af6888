//! Compression Operations

use crate::Compression;
use crate::error::{ErrorKind, Result};
use bzip2::{Compression as BzCompression, read::BzDecoder, write::BzEncoder};
use exn::ResultExt;
use flate2::{Compression as DeflateLevel, read::DeflateDecoder, write::DeflateEncoder};
use std::io::{Read, Write};
use tracing::instrument;
#[cfg(feature = "xz")]
use xz2::{read::XzDecoder, write::XzEncoder};
#[cfg(feature = "zstd")]
use zstd::stream::{read::Decoder as ZstdDecoder, write::Encoder as ZstdEncoder};

// Packages are written once and read many times; favour size.
const BZIP2_LEVEL: BzCompression = BzCompression::best();
const DEFLATE_LEVEL: DeflateLevel = DeflateLevel::best();
#[cfg(feature = "xz")]
const XZ_LEVEL: u32 = 9;
#[cfg(feature = "zstd")]
const ZSTD_LEVEL: i32 = 19;

impl Compression {
    /// Compress a byte slice in memory.
    ///
    /// # Examples
    ///
    /// ```
    /// use stacks_compress::Compression;
    ///
    /// let data = b"Hello, world! Hello, world! Hello, world!";
    /// let compressed = Compression::Deflate.compress(data).unwrap();
    /// assert!(compressed.len() < data.len());
    /// ```
    pub fn compress(&self, input: &[u8]) -> Result<Vec<u8>> {
        let mut output = Vec::new();
        self.compress_into(input, &mut output)?;
        Ok(output)
    }

    /// Decompress a byte slice in memory.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use stacks_compress::Compression;
    ///
    /// let original = b"Hello, world!";
    /// let compressed = Compression::Bzip2.compress(original).unwrap();
    /// assert_ne!(compressed, original);
    /// let decompressed = Compression::Bzip2.decompress(&compressed).unwrap();
    /// assert_eq!(decompressed, original);
    /// ```
    pub fn decompress(&self, input: &[u8]) -> Result<Vec<u8>> {
        let mut output = Vec::new();
        self.decompress_into(input, &mut output)?;
        Ok(output)
    }

    #[instrument(skip(input, output), fields(
        format = %self,
        input_size = input.len(),
        output_size
    ))]
    pub fn compress_into(&self, input: &[u8], output: &mut Vec<u8>) -> Result<usize> {
        let size = match self {
            Compression::Stored => {
                output.extend_from_slice(input);
                input.len()
            },
            Compression::Deflate => {
                let mut encoder = DeflateEncoder::new(&mut *output, DEFLATE_LEVEL);
                encoder.write_all(input).or_raise(|| ErrorKind::Io)?;
                encoder.finish().or_raise(|| ErrorKind::Io)?;
                output.len()
            },
            Compression::Bzip2 => {
                let mut encoder = BzEncoder::new(&mut *output, BZIP2_LEVEL);
                encoder.write_all(input).or_raise(|| ErrorKind::Io)?;
                encoder.finish().or_raise(|| ErrorKind::Io)?;
                output.len()
            },
            #[cfg(feature = "xz")]
            Compression::Xz => {
                let mut encoder = XzEncoder::new(&mut *output, XZ_LEVEL);
                encoder.write_all(input).or_raise(|| ErrorKind::Io)?;
                encoder.finish().or_raise(|| ErrorKind::Io)?;
                output.len()
            },
            #[cfg(feature = "zstd")]
            Compression::Zstd => {
                let mut encoder = ZstdEncoder::new(&mut *output, ZSTD_LEVEL).or_raise(|| ErrorKind::Encoder)?;
                encoder.write_all(input).or_raise(|| ErrorKind::Io)?;
                encoder.finish().or_raise(|| ErrorKind::Io)?;
                output.len()
            },
        };
        tracing::Span::current().record("output_size", size);
        Ok(size)
    }

    #[instrument(skip(input, output), fields(
        format = %self,
        input_size = input.len(),
        output_size
    ))]
    pub fn decompress_into(&self, input: &[u8], output: &mut Vec<u8>) -> Result<usize> {
        let size = match self {
            Compression::Stored => {
                output.extend_from_slice(input);
                input.len()
            },
            Compression::Deflate => {
                let mut decoder = DeflateDecoder::new(input);
                decoder.read_to_end(output).or_raise(|| ErrorKind::InvalidData)?
            },
            Compression::Bzip2 => {
                let mut decoder = BzDecoder::new(input);
                decoder.read_to_end(output).or_raise(|| ErrorKind::InvalidData)?
            },
            #[cfg(feature = "xz")]
            Compression::Xz => {
                let mut decoder = XzDecoder::new(input);
                decoder.read_to_end(output).or_raise(|| ErrorKind::InvalidData)?
            },
            #[cfg(feature = "zstd")]
            Compression::Zstd => {
                let mut decoder = ZstdDecoder::new(input).or_raise(|| ErrorKind::Encoder)?;
                decoder.read_to_end(output).or_raise(|| ErrorKind::InvalidData)?
            },
        };
        tracing::Span::current().record("output_size", size);
        Ok(size)
    }

    /// Wrap a reader with the appropriate decompression layer.
    ///
    /// Returns a boxed reader that automatically decompresses data. Combined
    /// with [`Read::take`] this allows decoding only a prefix of a member.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::io::{Cursor, Read};
    /// use stacks_compress::Compression;
    ///
    /// let original = b"Hello, world!";
    /// let compressed = Compression::Deflate.compress(original).unwrap();
    /// let mut reader = Compression::Deflate.wrap_reader(Cursor::new(compressed)).unwrap();
    /// let mut head = Vec::new();
    /// reader.take(5).read_to_end(&mut head).unwrap();
    /// assert_eq!(head, b"Hello");
    /// ```
    pub fn wrap_reader<'a, R: Read + 'a>(&self, reader: R) -> Result<Box<dyn Read + 'a>> {
        Ok(match self {
            Compression::Stored => Box::new(reader),
            Compression::Deflate => Box::new(DeflateDecoder::new(reader)),
            Compression::Bzip2 => Box::new(BzDecoder::new(reader)),
            #[cfg(feature = "xz")]
            Compression::Xz => Box::new(XzDecoder::new(reader)),
            #[cfg(feature = "zstd")]
            Compression::Zstd => Box::new(ZstdDecoder::new(reader).or_raise(|| ErrorKind::Encoder)?),
        })
    }
}
