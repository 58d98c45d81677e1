//! Webhook service that diffs the maps touched by a pull request.
//!
//! A signed pull-request event starts a [`DiffJob`]: both revisions of every
//! modified `.dmm` file are downloaded and diffed, the annotated maps are
//! stored for download, and a markdown summary is reported as a check run.
//!
//! # Key Types
//!
//! - [`ServerConfig`] -- TOML-loadable service configuration
//! - [`DiffJob`] -- download, diff, store and report for one event
//! - [`BlobSource`] / [`CheckReporter`] -- the forge as seen by a job
//! - [`DmmDiffServer`] -- the axum service

pub mod config;
pub mod error;
pub mod forge;
pub mod handler;
pub mod job;
pub mod report;
pub mod router;
pub mod server;
pub mod signature;
pub mod store;
pub mod webhook;

pub use config::ServerConfig;
pub use error::{ConfigError, JobError, JobResult, ServerError, ServerResult, SignatureError};
pub use forge::{
    BlobSource, ChangedFile, CheckOutcome, CheckReporter, CheckRunId, Conclusion, FileStatus,
    ForgeError, MemoryForge, RecordedRun,
};
pub use job::{DiffJob, JobReport};
pub use report::{check_title, render_report, EntryResult, MapEntry, ReportContext};
pub use router::{build_router, AppState};
pub use server::DmmDiffServer;
pub use signature::{sign_sha256, verify_signature};
pub use store::DiffStore;
pub use webhook::{accept_event, DiffRequest, Rejection};
