use std::path::PathBuf;

use dmmdiff_codec::CodecError;
use dmmdiff_diff::DiffError;
use thiserror::Error;

use crate::forge::ForgeError;

/// Problems loading or validating [`ServerConfig`](crate::ServerConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),

    #[error("cannot prepare save directory {path}: {source}")]
    SaveDir {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Webhook signature verification failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    #[error("no signature header")]
    Missing,

    #[error("unsupported signature algorithm {0:?}")]
    UnsupportedAlgorithm(String),

    #[error("malformed signature header")]
    Malformed,

    #[error("signature does not match payload")]
    Mismatch,
}

/// Failures of a diff job. The check run has already been moved to an
/// "Internal error" state when one of these is returned.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("forge error: {0}")]
    Forge(#[from] ForgeError),

    #[error("download failed: {0}")]
    Download(ForgeError),

    #[error("diff failed: {0}")]
    Diff(#[from] DiffError),

    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("background task failed: {0}")]
    Task(String),

    #[error("updating check run failed: {0}")]
    Report(ForgeError),
}

/// Errors from running the HTTP service.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type ServerResult<T> = Result<T, ServerError>;
pub type JobResult<T> = Result<T, JobError>;
