use std::fmt;

use dmmdiff_map::MapError;
use dmmdiff_types::Coord;
use thiserror::Error;

/// What was wrong with a map file.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatErrorKind {
    #[error("malformed dictionary entry: {0}")]
    MalformedEntry(String),

    #[error("invalid key {0:?}")]
    InvalidKey(String),

    #[error("key {key:?} does not match the key width {expected} used by earlier entries")]
    KeyWidthMismatch { key: String, expected: usize },

    #[error("key {0:?} is defined more than once")]
    DuplicateKey(String),

    #[error("grid row of length {length} is not a multiple of the key width {key_length}")]
    RowLength { length: usize, key_length: usize },

    #[error("grid references undefined key {0:?}")]
    DanglingKey(String),

    #[error("invalid grid coordinate {0:?}")]
    InvalidCoordinate(String),

    #[error("cell {0} is defined by more than one grid block")]
    OverlappingCell(Coord),

    #[error("grid has no tile at {0}")]
    IncompleteGrid(Coord),

    #[error("map has no dictionary entries")]
    EmptyDictionary,

    #[error("map has no grid section")]
    MissingGrid,

    #[error("unexpected end of input inside {0}")]
    UnexpectedEof(&'static str),
}

/// A map file could not be parsed. Parsing is all-or-nothing: no partial
/// map is ever produced alongside this error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatError {
    /// 1-based source line, when the problem has a location.
    pub line: Option<usize>,
    pub kind: FormatErrorKind,
}

impl FormatError {
    pub fn new(kind: FormatErrorKind) -> Self {
        Self { line: None, kind }
    }

    pub fn at(line: usize, kind: FormatErrorKind) -> Self {
        Self {
            line: Some(line),
            kind,
        }
    }
}

impl fmt::Display for FormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "line {line}: {}", self.kind),
            None => write!(f, "{}", self.kind),
        }
    }
}

impl std::error::Error for FormatError {}

/// Errors from reading or writing map files.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("format error: {0}")]
    Format(#[from] FormatError),

    #[error("map error: {0}")]
    Map(#[from] MapError),

    #[error("cannot serialize an incomplete map: no tile at {0}")]
    IncompleteMap(Coord),

    #[error("map text is not valid UTF-8: {0}")]
    Encoding(String),

    #[error("compression failed: {0}")]
    CompressionFailed(String),

    #[error("decompression failed: {0}")]
    DecompressionFailed(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;
