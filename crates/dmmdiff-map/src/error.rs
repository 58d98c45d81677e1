use dmmdiff_types::{Coord, Dimensions};

use crate::key::TileKey;

/// Errors from map model operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MapError {
    /// A coordinate outside the declared extents was accessed.
    #[error("coordinate {coord} is outside map dimensions {dimensions}")]
    OutOfBounds { coord: Coord, dimensions: Dimensions },

    /// A cell was read before anything was written to it.
    #[error("no tile has been set at {0}")]
    UnsetCell(Coord),

    /// A grid cell was bound to a key missing from the dictionary.
    #[error("key {0} is not in the dictionary")]
    UnknownKey(TileKey),

    /// A dictionary key was defined twice.
    #[error("key {0} is already defined")]
    DuplicateKey(TileKey),

    /// Key text contains characters outside `a-z` / `A-Z`.
    #[error("invalid key {0:?}: keys use only the letters a-z and A-Z")]
    InvalidKey(String),

    /// Key width outside `1..=MAX_KEY_LENGTH`.
    #[error("invalid key length {0}")]
    InvalidKeyLength(usize),

    /// A key number does not fit in the requested width.
    #[error("key {index} does not fit in key length {key_length}")]
    KeyTooLarge { index: u32, key_length: usize },

    /// No more keys can be minted even at the maximum width.
    #[error("key space exhausted with {entries} dictionary entries")]
    KeySpaceExhausted { entries: usize },
}

/// Result alias for map operations.
pub type MapResult<T> = Result<T, MapError>;
