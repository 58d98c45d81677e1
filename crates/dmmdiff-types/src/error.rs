use thiserror::Error;

/// Errors produced by type construction.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid map dimensions ({x}, {y}, {z}): every extent must be at least 1")]
    InvalidDimensions { x: u32, y: u32, z: u32 },

    #[error("map dimensions ({x}, {y}, {z}) have more cells than can be addressed")]
    TooLarge { x: u32, y: u32, z: u32 },
}
