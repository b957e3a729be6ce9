// src/compression/mod.rs
//! Codecs for conda package archives
//!
//! Legacy `.tar.bz2` packages are one bzip2 stream; `.conda` packages hold two
//! zstd-compressed tarballs.

use std::io::{self, Read, Write};
use thiserror::Error;

/// zstd level for `.conda` inner tarballs
pub const ZSTD_LEVEL: i32 = 19;

#[derive(Error, Debug)]
pub enum CompressionError {
    #[error("Failed to decompress {format} data: {source}")]
    Decompression {
        format: CompressionFormat,
        source: io::Error,
    },

    #[error("Failed to compress {format} data: {source}")]
    Compression {
        format: CompressionFormat,
        source: io::Error,
    },
}

/// Codecs used by the two archive formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionFormat {
    /// `.tar.bz2` packages
    Bzip2,
    /// `.conda` inner tarballs
    Zstd,
}

impl CompressionFormat {
    /// Recognize a stream by its magic bytes (`BZh` or `28 b5 2f fd`)
    pub fn from_magic_bytes(data: &[u8]) -> Option<Self> {
        if data.starts_with(b"BZh") {
            Some(Self::Bzip2)
        } else if data.starts_with(&[0x28, 0xb5, 0x2f, 0xfd]) {
            Some(Self::Zstd)
        } else {
            None
        }
    }
}

impl std::fmt::Display for CompressionFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bzip2 => write!(f, "bzip2"),
            Self::Zstd => write!(f, "zstd"),
        }
    }
}

/// Compress a whole buffer
pub fn compress(data: &[u8], format: CompressionFormat) -> Result<Vec<u8>, CompressionError> {
    let wrap = |source| CompressionError::Compression { format, source };
    match format {
        CompressionFormat::Bzip2 => {
            let mut encoder = bzip2_writer(Vec::new());
            encoder.write_all(data).map_err(wrap)?;
            encoder.finish().map_err(wrap)
        }
        CompressionFormat::Zstd => zstd::encode_all(data, ZSTD_LEVEL).map_err(wrap),
    }
}

/// Decompress a whole buffer
pub fn decompress(data: &[u8], format: CompressionFormat) -> Result<Vec<u8>, CompressionError> {
    let wrap = |source| CompressionError::Decompression { format, source };
    match format {
        CompressionFormat::Bzip2 => {
            let mut output = Vec::new();
            bzip2::read::BzDecoder::new(data)
                .read_to_end(&mut output)
                .map_err(wrap)?;
            Ok(output)
        }
        CompressionFormat::Zstd => zstd::decode_all(data).map_err(wrap),
    }
}

/// Streaming bzip2 encoder at best compression
pub fn bzip2_writer<W: Write>(writer: W) -> bzip2::write::BzEncoder<W> {
    bzip2::write::BzEncoder::new(writer, bzip2::Compression::best())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compressed_output_is_detected() {
        let data = b"conda package payload".repeat(20);

        let bz = compress(&data, CompressionFormat::Bzip2).unwrap();
        assert_eq!(CompressionFormat::from_magic_bytes(&bz), Some(CompressionFormat::Bzip2));
        assert_eq!(decompress(&bz, CompressionFormat::Bzip2).unwrap(), data);

        let zst = compress(&data, CompressionFormat::Zstd).unwrap();
        assert_eq!(CompressionFormat::from_magic_bytes(&zst), Some(CompressionFormat::Zstd));
        assert_eq!(decompress(&zst, CompressionFormat::Zstd).unwrap(), data);
    }

    #[test]
    fn test_magic_bytes_short_input() {
        assert_eq!(CompressionFormat::from_magic_bytes(b"BZ"), None);
        assert_eq!(CompressionFormat::from_magic_bytes(&[]), None);
    }

    #[test]
    fn test_corrupt_input() {
        let err = decompress(b"BZh9 not really", CompressionFormat::Bzip2).unwrap_err();
        assert!(err.to_string().contains("bzip2"));
    }
}
