//! Reading and writing map files.

use std::path::Path;

use dmmdiff_map::Map;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::compression::{compress, decompress, Compression};
use crate::error::{CodecError, CodecResult};
use crate::parse::parse;
use crate::write::{serialize, MapLayout};

/// How a map is turned into bytes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteOptions {
    pub layout: MapLayout,
    pub compression: Compression,
}

impl WriteOptions {
    pub fn new(layout: MapLayout, compression: Compression) -> Self {
        Self {
            layout,
            compression,
        }
    }

    /// Convenience for the common boolean "compress with gzip" switch.
    pub fn gzip(layout: MapLayout, enabled: bool) -> Self {
        let compression = if enabled {
            Compression::Gzip
        } else {
            Compression::None
        };
        Self::new(layout, compression)
    }
}

/// Strip any compression framing and decode the result as UTF-8.
pub fn decode_text(bytes: &[u8]) -> CodecResult<String> {
    let raw = decompress(bytes)?;
    String::from_utf8(raw).map_err(|e| CodecError::Encoding(e.to_string()))
}

/// Parse a map from raw (possibly compressed) file contents.
pub fn load_map_bytes(bytes: &[u8]) -> CodecResult<Map> {
    parse(&decode_text(bytes)?)
}

/// Serialize and frame a map.
pub fn encode_map(map: &Map, options: WriteOptions) -> CodecResult<Vec<u8>> {
    let text = serialize(map, options.layout)?;
    compress(text.as_bytes(), options.compression)
}

/// Read and parse the map file at `path`.
pub fn read_map(path: impl AsRef<Path>) -> CodecResult<Map> {
    let path = path.as_ref();
    let bytes = std::fs::read(path)?;
    debug!(path = %path.display(), bytes = bytes.len(), "read map file");
    load_map_bytes(&bytes)
}

/// Serialize `map` and write it to `path`, replacing any existing file.
pub fn write_map(map: &Map, path: impl AsRef<Path>, options: WriteOptions) -> CodecResult<()> {
    let path = path.as_ref();
    let bytes = encode_map(map, options)?;
    std::fs::write(path, &bytes)?;
    debug!(
        path = %path.display(),
        bytes = bytes.len(),
        layout = options.layout.as_str(),
        "wrote map file"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_utf8_is_an_encoding_error() {
        let err = decode_text(&[b'"', 0xff, 0xfe, b'"']).unwrap_err();
        assert!(matches!(err, CodecError::Encoding(_)));
    }

    #[test]
    fn gzip_switch() {
        assert_eq!(
            WriteOptions::gzip(MapLayout::Dmm, true).compression,
            Compression::Gzip
        );
        assert_eq!(
            WriteOptions::gzip(MapLayout::Dmm, false),
            WriteOptions::new(MapLayout::Dmm, Compression::None)
        );
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_map(dir.path().join("absent.dmm")).unwrap_err();
        assert!(matches!(err, CodecError::Io(_)));
    }
}
