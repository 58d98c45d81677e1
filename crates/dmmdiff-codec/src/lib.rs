//! Text codec for dmmdiff maps.
//!
//! Parses the dictionary-plus-grid map format into a [`dmmdiff_map::Map`] and
//! writes it back out, in either the standard layout or the merge-friendly
//! TGM layout. Compression is a byte-level wrapper applied after
//! serialization and detected by magic bytes before parsing.
//!
//! # Key Types
//!
//! - [`parse`] / [`serialize`] -- Text to map and back
//! - [`MapLayout`] -- Standard DMM or TGM text layout
//! - [`Compression`] -- None, gzip or zstd framing
//! - [`WriteOptions`] -- Layout plus compression for file output
//! - [`FormatError`] / [`FormatErrorKind`] -- What was wrong with a map file, and where

pub mod compression;
pub mod error;
pub mod file;
pub mod parse;
mod scan;
pub mod write;

pub use compression::{compress, decompress, Compression};
pub use error::{CodecError, CodecResult, FormatError, FormatErrorKind};
pub use file::{decode_text, encode_map, load_map_bytes, read_map, write_map, WriteOptions};
pub use parse::{parse, parse_atom, parse_tile};
pub use write::{detect_layout, serialize, MapLayout, TGM_HEADER};
