//! The hosting service seen from dmmdiff.
//!
//! Jobs only talk to the forge through [`BlobSource`] (what changed, and the
//! file contents at a revision) and [`CheckReporter`] (check-run status).
//! [`MemoryForge`] implements both in memory.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ForgeError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("cannot decode response: {0}")]
    Decode(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Added,
    Modified,
    Removed,
    Renamed,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangedFile {
    pub path: String,
    pub status: FileStatus,
}

impl ChangedFile {
    pub fn new(path: impl Into<String>, status: FileStatus) -> Self {
        Self {
            path: path.into(),
            status,
        }
    }

    /// A map that exists on both sides of the comparison.
    pub fn is_modified_map(&self) -> bool {
        self.status == FileStatus::Modified && self.path.ends_with(".dmm")
    }
}

/// Where map revisions come from.
#[async_trait]
pub trait BlobSource: Send + Sync {
    /// Files that differ between `base` and `head`.
    async fn changed_files(
        &self,
        repo: &str,
        base: &str,
        head: &str,
    ) -> Result<Vec<ChangedFile>, ForgeError>;

    /// Raw text of `path` at `revision`.
    async fn fetch_blob(
        &self,
        repo: &str,
        path: &str,
        revision: &str,
    ) -> Result<String, ForgeError>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CheckRunId(pub u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Conclusion {
    Success,
    Skipped,
}

/// Final state of a check run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckOutcome {
    pub conclusion: Conclusion,
    pub title: String,
    pub summary: String,
    pub text: Option<String>,
    pub completed_at: DateTime<Utc>,
}

impl CheckOutcome {
    pub fn new(
        conclusion: Conclusion,
        title: impl Into<String>,
        summary: impl Into<String>,
    ) -> Self {
        Self {
            conclusion,
            title: title.into(),
            summary: summary.into(),
            text: None,
            completed_at: Utc::now().trunc_subsecs(0),
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// A skipped run titled "Internal error".
    pub fn internal_error(summary: impl Into<String>) -> Self {
        Self::new(Conclusion::Skipped, "Internal error", summary)
    }
}

/// Where job results go.
#[async_trait]
pub trait CheckReporter: Send + Sync {
    /// Open an in-progress check run on `head_sha`.
    async fn start(&self, repo: &str, head_sha: &str, name: &str)
        -> Result<CheckRunId, ForgeError>;

    /// Complete a run opened with [`start`](Self::start).
    async fn finish(
        &self,
        repo: &str,
        id: CheckRunId,
        outcome: CheckOutcome,
    ) -> Result<(), ForgeError>;

    /// Create a run that is already complete.
    async fn publish(
        &self,
        repo: &str,
        head_sha: &str,
        name: &str,
        outcome: CheckOutcome,
    ) -> Result<CheckRunId, ForgeError>;
}

/// A check run as recorded by [`MemoryForge`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordedRun {
    pub id: CheckRunId,
    pub repo: String,
    pub head_sha: String,
    pub name: String,
    pub outcome: Option<CheckOutcome>,
}

#[derive(Default)]
struct ForgeState {
    changes: HashMap<(String, String, String), Vec<ChangedFile>>,
    blobs: HashMap<(String, String, String), String>,
    broken_blobs: HashSet<(String, String, String)>,
    runs: Vec<RecordedRun>,
    rejected_finishes: usize,
}

/// In-memory forge: changed files and blobs are registered up front, check
/// runs are recorded for inspection.
#[derive(Default)]
pub struct MemoryForge {
    state: Mutex<ForgeState>,
}

impl MemoryForge {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, ForgeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn add_change(&self, repo: &str, base: &str, head: &str, file: ChangedFile) {
        self.state()
            .changes
            .entry((repo.into(), base.into(), head.into()))
            .or_default()
            .push(file);
    }

    pub fn put_blob(&self, repo: &str, path: &str, revision: &str, text: impl Into<String>) {
        self.state()
            .blobs
            .insert((repo.into(), path.into(), revision.into()), text.into());
    }

    /// Make fetches of this blob fail with a transport error.
    pub fn break_blob(&self, repo: &str, path: &str, revision: &str) {
        self.state()
            .broken_blobs
            .insert((repo.into(), path.into(), revision.into()));
    }

    /// Reject the next `count` calls to [`CheckReporter::finish`].
    pub fn reject_finishes(&self, count: usize) {
        self.state().rejected_finishes = count;
    }

    pub fn runs(&self) -> Vec<RecordedRun> {
        self.state().runs.clone()
    }

    fn record(
        &self,
        repo: &str,
        head_sha: &str,
        name: &str,
        outcome: Option<CheckOutcome>,
    ) -> CheckRunId {
        let mut state = self.state();
        let id = CheckRunId(state.runs.len() as u64 + 1);
        state.runs.push(RecordedRun {
            id,
            repo: repo.into(),
            head_sha: head_sha.into(),
            name: name.into(),
            outcome,
        });
        id
    }
}

#[async_trait]
impl BlobSource for MemoryForge {
    async fn changed_files(
        &self,
        repo: &str,
        base: &str,
        head: &str,
    ) -> Result<Vec<ChangedFile>, ForgeError> {
        Ok(self
            .state()
            .changes
            .get(&(repo.to_string(), base.to_string(), head.to_string()))
            .cloned()
            .unwrap_or_default())
    }

    async fn fetch_blob(
        &self,
        repo: &str,
        path: &str,
        revision: &str,
    ) -> Result<String, ForgeError> {
        let key = (repo.to_string(), path.to_string(), revision.to_string());
        let state = self.state();
        if state.broken_blobs.contains(&key) {
            return Err(ForgeError::Transport(format!(
                "connection reset fetching {path}@{revision}"
            )));
        }
        state
            .blobs
            .get(&key)
            .cloned()
            .ok_or_else(|| ForgeError::NotFound(format!("{repo}/{path}@{revision}")))
    }
}

#[async_trait]
impl CheckReporter for MemoryForge {
    async fn start(
        &self,
        repo: &str,
        head_sha: &str,
        name: &str,
    ) -> Result<CheckRunId, ForgeError> {
        Ok(self.record(repo, head_sha, name, None))
    }

    async fn finish(
        &self,
        repo: &str,
        id: CheckRunId,
        outcome: CheckOutcome,
    ) -> Result<(), ForgeError> {
        let mut state = self.state();
        if state.rejected_finishes > 0 {
            state.rejected_finishes -= 1;
            return Err(ForgeError::Transport("payload too large".into()));
        }
        let run = state
            .runs
            .iter_mut()
            .find(|r| r.id == id && r.repo == repo)
            .ok_or_else(|| ForgeError::NotFound(format!("check run {}", id.0)))?;
        run.outcome = Some(outcome);
        Ok(())
    }

    async fn publish(
        &self,
        repo: &str,
        head_sha: &str,
        name: &str,
        outcome: CheckOutcome,
    ) -> Result<CheckRunId, ForgeError> {
        Ok(self.record(repo, head_sha, name, Some(outcome)))
    }
}
