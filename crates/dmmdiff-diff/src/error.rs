//! Error types for the diff crate.

use dmmdiff_codec::CodecError;
use dmmdiff_map::MapError;

/// Errors that can occur while diffing two maps.
#[derive(Debug, thiserror::Error)]
pub enum DiffError {
    /// A map was missing a cell or ran out of dictionary keys.
    #[error("map error: {0}")]
    Map(#[from] MapError),

    /// One of the input texts could not be decoded.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
}

/// Convenience alias for diff results.
pub type DiffResult<T> = Result<T, DiffError>;
