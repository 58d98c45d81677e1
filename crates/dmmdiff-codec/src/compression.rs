//! Transparent compression framing for map files.
//!
//! Compression only changes the on-disk bytes. Readers detect the framing
//! from magic bytes, so callers never need to know how a file was written.

use std::io::{Read, Write};

use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use serde::{Deserialize, Serialize};

use crate::error::{CodecError, CodecResult};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
const ZSTD_MAGIC: [u8; 4] = [0x28, 0xb5, 0x2f, 0xfd];

/// zstd level used for written maps.
const ZSTD_LEVEL: i32 = 3;

/// Byte-level framing applied when writing a map.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    #[default]
    None,
    Gzip,
    Zstd,
}

impl Compression {
    /// Identify the framing of `bytes` from its leading magic number.
    pub fn detect(bytes: &[u8]) -> Self {
        if bytes.starts_with(&GZIP_MAGIC) {
            Self::Gzip
        } else if bytes.starts_with(&ZSTD_MAGIC) {
            Self::Zstd
        } else {
            Self::None
        }
    }
}

/// Apply `compression` to `data`.
pub fn compress(data: &[u8], compression: Compression) -> CodecResult<Vec<u8>> {
    match compression {
        Compression::None => Ok(data.to_vec()),
        Compression::Gzip => {
            let mut encoder = GzEncoder::new(Vec::new(), flate2::Compression::default());
            encoder
                .write_all(data)
                .map_err(|e| CodecError::CompressionFailed(e.to_string()))?;
            encoder
                .finish()
                .map_err(|e| CodecError::CompressionFailed(e.to_string()))
        }
        Compression::Zstd => zstd::encode_all(data, ZSTD_LEVEL)
            .map_err(|e| CodecError::CompressionFailed(e.to_string())),
    }
}

/// Undo whatever framing `bytes` carries; plain input is returned as-is.
pub fn decompress(bytes: &[u8]) -> CodecResult<Vec<u8>> {
    match Compression::detect(bytes) {
        Compression::None => Ok(bytes.to_vec()),
        Compression::Gzip => {
            let mut out = Vec::new();
            MultiGzDecoder::new(bytes)
                .read_to_end(&mut out)
                .map_err(|e| CodecError::DecompressionFailed(e.to_string()))?;
            Ok(out)
        }
        Compression::Zstd => {
            zstd::decode_all(bytes).map_err(|e| CodecError::DecompressionFailed(e.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &[u8] = b"\"a\" = (/turf/open/floor,/area/station)\n";

    #[test]
    fn detect_plain_text() {
        assert_eq!(Compression::detect(SAMPLE), Compression::None);
        assert_eq!(Compression::detect(b""), Compression::None);
    }

    #[test]
    fn gzip_is_detected_and_reversed() {
        let packed = compress(SAMPLE, Compression::Gzip).unwrap();
        assert_eq!(Compression::detect(&packed), Compression::Gzip);
        assert_eq!(decompress(&packed).unwrap(), SAMPLE);
    }

    #[test]
    fn zstd_is_detected_and_reversed() {
        let packed = compress(SAMPLE, Compression::Zstd).unwrap();
        assert_eq!(Compression::detect(&packed), Compression::Zstd);
        assert_eq!(decompress(&packed).unwrap(), SAMPLE);
    }

    #[test]
    fn none_is_identity() {
        assert_eq!(compress(SAMPLE, Compression::None).unwrap(), SAMPLE);
        assert_eq!(decompress(SAMPLE).unwrap(), SAMPLE);
    }

    #[test]
    fn truncated_gzip_fails() {
        let packed = compress(SAMPLE, Compression::Gzip).unwrap();
        let err = decompress(&packed[..6]).unwrap_err();
        assert!(matches!(err, CodecError::DecompressionFailed(_)));
    }

    #[test]
    fn large_input_shrinks() {
        let data = SAMPLE.repeat(500);
        assert!(compress(&data, Compression::Gzip).unwrap().len() < data.len());
        assert!(compress(&data, Compression::Zstd).unwrap().len() < data.len());
    }
}
