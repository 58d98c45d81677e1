//! The diff job run for every accepted pull-request event.
//!
//! A job opens a check run, downloads both revisions of every modified map,
//! diffs them on the blocking pool, stores the output maps and finally
//! completes the check run with a markdown report. Downloads and diffs are
//! bounded by semaphores shared between all jobs.

use std::sync::Arc;

use dmmdiff_codec::{CodecError, WriteOptions};
use dmmdiff_diff::{create_diff, MapDiff};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::config::ServerConfig;
use crate::error::{JobError, JobResult};
use crate::forge::{BlobSource, CheckOutcome, CheckReporter, CheckRunId, Conclusion};
use crate::report::{check_title, render_report, EntryResult, MapEntry, ReportContext};
use crate::store::DiffStore;
use crate::webhook::DiffRequest;

pub const IGNORED_SUMMARY: &str = "pull request ignored due to [MDB IGNORE] in title. \
     Use [MDB IGNORE]DMM to allow MDB-DMM, but not other MDBs.";
pub const DOWNLOAD_FAILED: &str = "error encountered while performing data download";
pub const DIFF_FAILED: &str = "error encountered while performing diff";
pub const WRITE_FAILED: &str = "error encountered while writing";
pub const UPDATE_FAILED: &str =
    "error encountered while updating check run status. The diff may be too large.";

/// Both revisions of one changed map.
#[derive(Clone, Debug)]
struct Download {
    path: String,
    before: String,
    after: String,
}

enum PairOutcome {
    Diffed(MapDiff),
    Unparseable(String),
}

/// What a finished job reported.
#[derive(Clone, Debug)]
pub struct JobReport {
    pub unique_id: String,
    pub check_run: CheckRunId,
    pub maps_changed: usize,
    pub entries: Vec<MapEntry>,
    pub outcome: CheckOutcome,
}

/// Runs diff jobs against a forge.
pub struct DiffJob {
    config: Arc<ServerConfig>,
    source: Arc<dyn BlobSource>,
    reporter: Arc<dyn CheckReporter>,
    store: DiffStore,
    fetch_permits: Arc<Semaphore>,
    diff_permits: Arc<Semaphore>,
}

impl DiffJob {
    pub fn new(
        config: Arc<ServerConfig>,
        source: Arc<dyn BlobSource>,
        reporter: Arc<dyn CheckReporter>,
    ) -> Self {
        Self {
            store: DiffStore::new(config.dmm_save_path.clone()),
            fetch_permits: Arc::new(Semaphore::new(config.fetch_concurrency)),
            diff_permits: Arc::new(Semaphore::new(config.diff_concurrency)),
            config,
            source,
            reporter,
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn store(&self) -> &DiffStore {
        &self.store
    }

    /// Run one job to completion.
    ///
    /// Failures are reported to the check run before being returned.
    pub async fn run(&self, request: DiffRequest) -> JobResult<JobReport> {
        let repo = request.full_name.as_str();
        let unique_id = request.unique_id();

        if request.is_ignored() {
            let outcome = CheckOutcome::new(Conclusion::Skipped, "Ignored", IGNORED_SUMMARY);
            let check_run = self
                .reporter
                .publish(repo, &request.head_sha, &self.config.name, outcome.clone())
                .await?;
            info!(%unique_id, "pull request ignored by title tag");
            return Ok(JobReport {
                unique_id,
                check_run,
                maps_changed: 0,
                entries: Vec::new(),
                outcome,
            });
        }

        let check_run = self
            .reporter
            .start(repo, &request.head_sha, &self.config.name)
            .await?;

        let maps: Vec<String> = match self
            .source
            .changed_files(repo, &request.base_sha, &request.head_sha)
            .await
        {
            Ok(files) => files
                .into_iter()
                .filter(|f| f.is_modified_map())
                .map(|f| f.path)
                .collect(),
            Err(e) => {
                return self
                    .fail(repo, check_run, DOWNLOAD_FAILED, JobError::Download(e))
                    .await
            }
        };
        info!(%unique_id, maps_changed = maps.len(), "created check run");

        let downloads = match self.download(&request, &maps).await {
            Ok(downloads) => downloads,
            Err(e) => return self.fail(repo, check_run, DOWNLOAD_FAILED, e).await,
        };
        let diffs = match self.diff_all(downloads).await {
            Ok(diffs) => diffs,
            Err(e) => return self.fail(repo, check_run, DIFF_FAILED, e).await,
        };
        let entries = match self.store_all(&unique_id, diffs).await {
            Ok(entries) => entries,
            Err(e) => return self.fail(repo, check_run, WRITE_FAILED, e).await,
        };

        let ctx = ReportContext {
            full_name: repo,
            base_sha: &request.base_sha,
            head_sha: &request.head_sha,
            fastdmm_host: self.config.fastdmm_host.as_deref(),
            maps_changed: maps.len(),
        };
        let conclusion = if maps.is_empty() {
            Conclusion::Skipped
        } else {
            Conclusion::Success
        };
        let outcome = CheckOutcome::new(conclusion, check_title(maps.len()), "")
            .with_text(render_report(&entries, &ctx));

        if let Err(e) = self.reporter.finish(repo, check_run, outcome.clone()).await {
            warn!(%unique_id, error = %e, "error while completing check run");
            if let Err(e) = self
                .reporter
                .finish(repo, check_run, CheckOutcome::internal_error(UPDATE_FAILED))
                .await
            {
                warn!(%unique_id, error = %e, "could not report check run failure");
            }
            return Err(JobError::Report(e));
        }
        info!(%unique_id, "check run complete");

        Ok(JobReport {
            unique_id,
            check_run,
            maps_changed: maps.len(),
            entries,
            outcome,
        })
    }

    async fn fail(
        &self,
        repo: &str,
        check_run: CheckRunId,
        summary: &str,
        error: JobError,
    ) -> JobResult<JobReport> {
        warn!(repo, error = %error, "{summary}");
        if let Err(e) = self
            .reporter
            .finish(repo, check_run, CheckOutcome::internal_error(summary))
            .await
        {
            warn!(repo, error = %e, "could not report check run failure");
        }
        Err(error)
    }

    async fn download(&self, request: &DiffRequest, maps: &[String]) -> JobResult<Vec<Download>> {
        let mut tasks = JoinSet::new();
        for (index, path) in maps.iter().enumerate() {
            let source = Arc::clone(&self.source);
            let permits = Arc::clone(&self.fetch_permits);
            let repo = request.full_name.clone();
            let base = request.base_sha.clone();
            let head = request.head_sha.clone();
            let path = path.clone();
            tasks.spawn(async move {
                let _permit = permits
                    .acquire_owned()
                    .await
                    .map_err(|e| JobError::Task(e.to_string()))?;
                let before = source
                    .fetch_blob(&repo, &path, &base)
                    .await
                    .map_err(JobError::Download)?;
                let after = source
                    .fetch_blob(&repo, &path, &head)
                    .await
                    .map_err(JobError::Download)?;
                debug!(path = %path, "downloaded map revisions");
                Ok::<_, JobError>((index, Download { path, before, after }))
            });
        }

        let mut slots: Vec<Option<Download>> = vec![None; maps.len()];
        while let Some(joined) = tasks.join_next().await {
            let (index, download) = joined.map_err(|e| JobError::Task(e.to_string()))??;
            slots[index] = Some(download);
        }
        Ok(slots.into_iter().flatten().collect())
    }

    async fn diff_all(&self, downloads: Vec<Download>) -> JobResult<Vec<(String, PairOutcome)>> {
        let mut tasks = JoinSet::new();
        let count = downloads.len();
        for (index, download) in downloads.into_iter().enumerate() {
            let permits = Arc::clone(&self.diff_permits);
            tasks.spawn(async move {
                let _permit = permits
                    .acquire_owned()
                    .await
                    .map_err(|e| JobError::Task(e.to_string()))?;
                let path = download.path.clone();
                let outcome = tokio::task::spawn_blocking(move || diff_pair(&download))
                    .await
                    .map_err(|e| JobError::Task(e.to_string()))??;
                Ok::<_, JobError>((index, path, outcome))
            });
        }

        let mut slots: Vec<Option<(String, PairOutcome)>> = (0..count).map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            let (index, path, outcome) = joined.map_err(|e| JobError::Task(e.to_string()))??;
            slots[index] = Some((path, outcome));
        }
        Ok(slots.into_iter().flatten().collect())
    }

    async fn store_all(
        &self,
        unique_id: &str,
        diffs: Vec<(String, PairOutcome)>,
    ) -> JobResult<Vec<MapEntry>> {
        let options = WriteOptions::gzip(self.config.layout, self.config.use_gzip);
        let mut entries = Vec::with_capacity(diffs.len());
        let mut writes = JoinSet::new();

        for (path, outcome) in diffs {
            let result = match outcome {
                PairOutcome::Unparseable(error) => EntryResult::Unparseable { error },
                PairOutcome::Diffed(diff) => {
                    let stats = diff.stats();
                    match diff.diff_map {
                        None => EntryResult::NotCompared {
                            note: stats.note.unwrap_or_default(),
                        },
                        Some(map) => {
                            let file_name = DiffStore::file_name(unique_id, &path);
                            let download_url = self.config.download_url(&file_name);
                            let store = self.store.clone();
                            writes.spawn(async move { store.write(map, file_name, options).await });
                            EntryResult::Diffed {
                                stats,
                                download_url,
                            }
                        }
                    }
                }
            };
            entries.push(MapEntry { path, result });
        }

        while let Some(joined) = writes.join_next().await {
            joined.map_err(|e| JobError::Task(e.to_string()))??;
        }
        Ok(entries)
    }
}

/// Parse both revisions and diff them. A revision that is not a valid map is
/// reported rather than failing the job.
fn diff_pair(download: &Download) -> JobResult<PairOutcome> {
    let before = match dmmdiff_codec::parse(&download.before) {
        Ok(map) => map,
        Err(CodecError::Format(e)) => {
            return Ok(PairOutcome::Unparseable(format!("base revision: {e}")))
        }
        Err(e) => return Err(e.into()),
    };
    let after = match dmmdiff_codec::parse(&download.after) {
        Ok(map) => map,
        Err(CodecError::Format(e)) => {
            return Ok(PairOutcome::Unparseable(format!("head revision: {e}")))
        }
        Err(e) => return Err(e.into()),
    };
    Ok(PairOutcome::Diffed(create_diff(&before, &after)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forge::{ChangedFile, FileStatus, MemoryForge};
    use dmmdiff_codec::read_map;

    const REPO: &str = "org/station";
    const BASE: &str = "basesha";
    const HEAD: &str = "headsha";

    const FLOOR_2X1: &str = "\"a\" = (/turf/floor,/area/a)\n(1,1,1) = {\"\naa\n\"}\n";
    const CRATE_2X1: &str =
        "\"a\" = (/turf/floor,/area/a)\n\"b\" = (/obj/crate,/turf/floor,/area/a)\n(1,1,1) = {\"\nab\n\"}\n";
    const WALLS_2X1: &str =
        "\"a\" = (/turf/wall,/area/a)\n(1,1,1) = {\"\naa\n\"}\n";
    const FLOOR_3X1: &str = "\"a\" = (/turf/floor,/area/a)\n(1,1,1) = {\"\naaa\n\"}\n";

    fn request(title: &str) -> DiffRequest {
        DiffRequest {
            owner: "org".into(),
            repo: "station".into(),
            full_name: REPO.into(),
            pull_request_id: 7,
            title: title.into(),
            base_sha: BASE.into(),
            head_sha: HEAD.into(),
        }
    }

    fn map_change(forge: &MemoryForge, path: &str, before: &str, after: &str) {
        forge.add_change(REPO, BASE, HEAD, ChangedFile::new(path, FileStatus::Modified));
        forge.put_blob(REPO, path, BASE, before);
        forge.put_blob(REPO, path, HEAD, after);
    }

    fn job(forge: &Arc<MemoryForge>, dir: &tempfile::TempDir, config: ServerConfig) -> DiffJob {
        let config = ServerConfig {
            dmm_save_path: dir.path().to_path_buf(),
            ..config
        };
        DiffJob::new(Arc::new(config), forge.clone(), forge.clone())
    }

    #[tokio::test]
    async fn diffs_modified_maps_and_reports_sorted() {
        let forge = Arc::new(MemoryForge::new());
        map_change(&forge, "_maps/small.dmm", FLOOR_2X1, CRATE_2X1);
        map_change(&forge, "_maps/big.dmm", FLOOR_2X1, WALLS_2X1);
        forge.add_change(REPO, BASE, HEAD, ChangedFile::new("_maps/new.dmm", FileStatus::Added));
        forge.add_change(REPO, BASE, HEAD, ChangedFile::new("code/x.dm", FileStatus::Modified));
        let dir = tempfile::tempdir().unwrap();
        let job = job(&forge, &dir, ServerConfig::default());

        let report = job.run(request("Remap")).await.unwrap();
        assert_eq!(report.maps_changed, 2);
        assert_eq!(report.outcome.conclusion, Conclusion::Success);
        assert_eq!(report.outcome.title, "2 maps changed");

        let text = report.outcome.text.as_deref().unwrap();
        let big = text.find("### _maps/big.dmm").unwrap();
        let small = text.find("### _maps/small.dmm").unwrap();
        assert!(big < small);
        assert!(text.contains("2 tiles changed"));
        assert!(text.contains("1 movables added, 0 movables deleted"));

        let runs = forge.runs();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].outcome.as_ref(), Some(&report.outcome));

        let file = DiffStore::file_name(&request("").unique_id(), "_maps/big.dmm");
        let stored = read_map(dir.path().join(&file)).unwrap();
        assert_eq!(stored.dimensions(), dmmdiff_types::Dimensions::new(2, 1, 1).unwrap());
        assert!(text.contains(&format!("Download: [diff](http://127.0.0.1:5000/dmm/{file})")));
    }

    #[tokio::test]
    async fn no_maps_changed() {
        let forge = Arc::new(MemoryForge::new());
        let dir = tempfile::tempdir().unwrap();
        let report = job(&forge, &dir, ServerConfig::default())
            .run(request("Docs"))
            .await
            .unwrap();
        assert_eq!(report.outcome.conclusion, Conclusion::Skipped);
        assert_eq!(report.outcome.title, "No maps changed");
        assert_eq!(report.outcome.text.as_deref(), Some("No maps changed"));
    }

    #[tokio::test]
    async fn ignore_tag_publishes_skipped_run() {
        let forge = Arc::new(MemoryForge::new());
        map_change(&forge, "_maps/a.dmm", FLOOR_2X1, WALLS_2X1);
        let dir = tempfile::tempdir().unwrap();

        let report = job(&forge, &dir, ServerConfig::default())
            .run(request("[MDB IGNORE] mass rename"))
            .await
            .unwrap();
        assert_eq!(report.outcome.title, "Ignored");
        assert_eq!(report.outcome.conclusion, Conclusion::Skipped);
        let runs = forge.runs();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].outcome.as_ref().unwrap().summary, IGNORED_SUMMARY);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn download_failure_reports_internal_error() {
        let forge = Arc::new(MemoryForge::new());
        map_change(&forge, "_maps/a.dmm", FLOOR_2X1, WALLS_2X1);
        forge.break_blob(REPO, "_maps/a.dmm", HEAD);
        let dir = tempfile::tempdir().unwrap();

        let err = job(&forge, &dir, ServerConfig::default())
            .run(request("Remap"))
            .await
            .unwrap_err();
        assert!(matches!(err, JobError::Download(_)));
        let outcome = forge.runs()[0].outcome.clone().unwrap();
        assert_eq!(outcome.title, "Internal error");
        assert_eq!(outcome.summary, DOWNLOAD_FAILED);
    }

    #[tokio::test]
    async fn parse_failure_stays_in_its_entry() {
        let forge = Arc::new(MemoryForge::new());
        map_change(&forge, "_maps/good.dmm", FLOOR_2X1, WALLS_2X1);
        map_change(&forge, "_maps/bad.dmm", FLOOR_2X1, "\"a\" = (/turf/floor");
        let dir = tempfile::tempdir().unwrap();

        let report = job(&forge, &dir, ServerConfig::default())
            .run(request("Remap"))
            .await
            .unwrap();
        assert_eq!(report.maps_changed, 2);
        let bad = report.entries.iter().find(|e| e.path == "_maps/bad.dmm").unwrap();
        assert!(matches!(&bad.result, EntryResult::Unparseable { error } if error.starts_with("head revision")));
        assert!(report.outcome.text.unwrap().contains("Could not parse map"));
    }

    #[tokio::test]
    async fn size_change_is_noted_without_file() {
        let forge = Arc::new(MemoryForge::new());
        map_change(&forge, "_maps/a.dmm", FLOOR_2X1, FLOOR_3X1);
        let dir = tempfile::tempdir().unwrap();

        let report = job(&forge, &dir, ServerConfig::default())
            .run(request("Expand"))
            .await
            .unwrap();
        assert_eq!(
            report.entries[0].result,
            EntryResult::NotCompared {
                note: "Size changed: (2, 1, 1) to (3, 1, 1)".into()
            }
        );
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn write_failure_reports_internal_error() {
        let forge = Arc::new(MemoryForge::new());
        map_change(&forge, "_maps/a.dmm", FLOOR_2X1, WALLS_2X1);
        let dir = tempfile::tempdir().unwrap();
        let missing = ServerConfig {
            dmm_save_path: dir.path().join("does-not-exist"),
            ..ServerConfig::default()
        };
        let job = DiffJob::new(Arc::new(missing), forge.clone(), forge.clone());

        let err = job.run(request("Remap")).await.unwrap_err();
        assert!(matches!(err, JobError::Codec(CodecError::Io(_))));
        assert_eq!(forge.runs()[0].outcome.clone().unwrap().summary, WRITE_FAILED);
    }

    #[tokio::test]
    async fn rejected_report_falls_back() {
        let forge = Arc::new(MemoryForge::new());
        map_change(&forge, "_maps/a.dmm", FLOOR_2X1, WALLS_2X1);
        forge.reject_finishes(1);
        let dir = tempfile::tempdir().unwrap();

        let err = job(&forge, &dir, ServerConfig::default())
            .run(request("Remap"))
            .await
            .unwrap_err();
        assert!(matches!(err, JobError::Report(_)));
        assert_eq!(forge.runs()[0].outcome.clone().unwrap().summary, UPDATE_FAILED);
    }

    #[tokio::test]
    async fn gzip_and_layout_follow_config() {
        let forge = Arc::new(MemoryForge::new());
        map_change(&forge, "_maps/a.dmm", FLOOR_2X1, WALLS_2X1);
        let dir = tempfile::tempdir().unwrap();
        let config = ServerConfig {
            use_gzip: true,
            layout: dmmdiff_codec::MapLayout::Dmm,
            ..ServerConfig::default()
        };
        job(&forge, &dir, config).run(request("Remap")).await.unwrap();

        let file = DiffStore::file_name(&request("").unique_id(), "_maps/a.dmm");
        let bytes = std::fs::read(dir.path().join(file)).unwrap();
        assert_eq!(dmmdiff_codec::Compression::detect(&bytes), dmmdiff_codec::Compression::Gzip);
        let text = dmmdiff_codec::decode_text(&bytes).unwrap();
        assert_eq!(dmmdiff_codec::detect_layout(&text), dmmdiff_codec::MapLayout::Dmm);
    }
}
