//! On-disk home of generated diff maps.

use std::path::PathBuf;

use dmmdiff_codec::{write_map, WriteOptions};
use dmmdiff_map::Map;
use tracing::debug;

use crate::error::{JobError, JobResult};
use crate::webhook::sanitize;

#[derive(Clone, Debug)]
pub struct DiffStore {
    root: PathBuf,
}

impl DiffStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Stable, opaque file name for the diff of `map_path` within a job.
    pub fn file_name(unique_id: &str, map_path: &str) -> String {
        let seed = format!("{unique_id}-{}", sanitize(map_path));
        format!("{}.dmm", blake3::hash(seed.as_bytes()).to_hex())
    }

    /// Path of a stored file, or `None` if `file_name` could escape the
    /// store directory.
    pub fn resolve(&self, file_name: &str) -> Option<PathBuf> {
        let safe = !file_name.is_empty()
            && !file_name.contains("..")
            && file_name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'));
        safe.then(|| self.root.join(file_name))
    }

    /// Serialize `map` into the store on the blocking pool.
    pub async fn write(
        &self,
        map: Map,
        file_name: String,
        options: WriteOptions,
    ) -> JobResult<PathBuf> {
        let path = self
            .resolve(&file_name)
            .ok_or_else(|| JobError::Task(format!("refusing to write {file_name:?}")))?;
        let target = path.clone();
        tokio::task::spawn_blocking(move || write_map(&map, &target, options))
            .await
            .map_err(|e| JobError::Task(e.to_string()))??;
        debug!(path = %path.display(), "stored diff map");
        Ok(path)
    }
}
