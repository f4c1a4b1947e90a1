use std::path::PathBuf;
use std::sync::Arc;

use tracing::{error, info, warn, Instrument};

use crate::config::Config;
use crate::error::{CompositorError, JobError, Result};
use crate::filters::FilterKind;
use crate::jobs::fetch::VideoFetcher;
use crate::jobs::store::JobStore;
use crate::jobs::types::{JobId, JobRecord, JobUpdate};
use crate::jobs::workspace::{random_name, Workspace};
use crate::processing::{ProcessOutcome, ProcessPaths, VideoProcessor};

/// Public URL prefix for result videos
pub const VIDEO_ROUTE: &str = "/videos";

/// Public URL prefix for thumbnails
pub const THUMB_ROUTE: &str = "/thumb";

/// URL schemes a submitted source may use
pub const ALLOWED_SCHEMES: [&str; 2] = ["http", "https"];

fn has_allowed_scheme(source: &str) -> bool {
    match source.split_once("://") {
        Some((scheme, rest)) => {
            !rest.is_empty() && ALLOWED_SCHEMES.iter().any(|allowed| scheme.eq_ignore_ascii_case(allowed))
        }
        None => false,
    }
}

/// Accepts jobs, runs one background worker per job and answers status
/// queries.
///
/// Every worker runs inside a guard that records `failed` for any error or
/// panic, so no job stays `processing` after its worker has ended.
#[derive(Clone)]
pub struct JobManager {
    store: Arc<dyn JobStore>,
    fetcher: Arc<dyn VideoFetcher>,
    processor: Arc<dyn VideoProcessor>,
    workspace: Workspace,
    keep_intermediates: bool,
    thumbnails: bool,
}

/// Scratch and result files of one job
struct JobFiles {
    paths: ProcessPaths,
}

impl JobFiles {
    fn scratch(&self) -> Vec<PathBuf> {
        let mut files = vec![
            self.paths.source.clone(),
            self.paths.intermediate.clone(),
            self.paths.remux_scratch.clone(),
        ];
        if let Some((scratch, _)) = &self.paths.thumbnail {
            files.push(scratch.clone());
        }
        files
    }
}

impl JobManager {
    pub fn new(
        store: Arc<dyn JobStore>,
        fetcher: Arc<dyn VideoFetcher>,
        processor: Arc<dyn VideoProcessor>,
        config: &Config,
    ) -> Self {
        Self {
            store,
            fetcher,
            processor,
            workspace: Workspace::new(config.storage.scratch_dir.clone()),
            keep_intermediates: config.storage.keep_intermediates,
            thumbnails: config.thumbnail.enabled,
        }
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    /// Validate, record a queued job and start its worker. Returns without
    /// waiting for any processing.
    pub async fn submit(&self, video_source: &str, filter_name: &str) -> Result<JobId> {
        let filter = FilterKind::from_name(filter_name)?;
        let source = video_source.trim();
        if source.is_empty() {
            return Err(JobError::MissingSource.into());
        }
        if !has_allowed_scheme(source) {
            return Err(JobError::UnsupportedSource { source_url: source.to_string() }.into());
        }

        self.workspace.ensure_exists()?;
        let job_id = self.allocate_job_id().await;
        self.store.insert(JobRecord::queued(job_id.clone(), filter.name())).await?;

        let files = self.allocate_files(&job_id);
        info!(job_id = %job_id, filter = %filter, "Job queued for {}", source);

        let manager = self.clone();
        let source = source.to_string();
        let span = tracing::info_span!("job", job_id = %job_id);
        tokio::spawn(
            {
                let job_id = job_id.clone();
                async move { manager.guarded_worker(job_id, source, filter, files).await }
            }
            .instrument(span),
        );

        Ok(job_id)
    }

    pub async fn status(&self, job_id: &JobId) -> Result<JobRecord> {
        self.store.get(job_id).await
    }

    async fn allocate_job_id(&self) -> JobId {
        let mut candidate = JobId::new(random_name());
        for _ in 0..16 {
            let taken = self.store.contains(&candidate).await
                || self.workspace.result_path(candidate.as_str(), "mp4").exists();
            if !taken {
                break;
            }
            candidate = JobId::new(random_name());
        }
        candidate
    }

    fn allocate_files(&self, job_id: &JobId) -> JobFiles {
        let thumbnail = self.thumbnails.then(|| {
            (
                self.workspace.allocate("part"),
                self.workspace.result_path(job_id.as_str(), "jpg"),
            )
        });

        JobFiles {
            paths: ProcessPaths {
                source: self.workspace.allocate("mp4"),
                intermediate: self.workspace.allocate("mp4"),
                remux_scratch: self.workspace.allocate("part"),
                output: self.workspace.result_path(job_id.as_str(), "mp4"),
                thumbnail,
            },
        }
    }

    /// Runs the job body in its own task so a panic surfaces as a join error
    /// here instead of vanishing
    async fn guarded_worker(self, job_id: JobId, source: String, filter: FilterKind, files: JobFiles) {
        let body = {
            let manager = self.clone();
            let job_id = job_id.clone();
            let paths = files.paths.clone();
            tokio::spawn(async move { manager.run_job(&job_id, &source, filter, paths).await }.in_current_span())
        };

        let failure = match body.await {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(e.user_message()),
            Err(join_error) => Some(format!("worker crashed: {}", join_error)),
        };

        if let Some(message) = failure {
            error!("Job failed: {}", message);
            if let Err(e) = self.store.update(&job_id, JobUpdate::Failed { error: message }).await {
                error!("Could not record failure: {}", e);
            }
        }

        if self.keep_intermediates {
            info!("Keeping intermediates in {}", self.workspace.root().display());
        } else {
            self.workspace.remove_all(&files.scratch());
        }
    }

    async fn run_job(&self, job_id: &JobId, source: &str, filter: FilterKind, paths: ProcessPaths) -> Result<()> {
        self.fetcher.fetch(source, &paths.source).await?;
        self.store.update(job_id, JobUpdate::Processing).await?;
        info!("Processing with {} filter", filter);

        let processor = self.processor.clone();
        let outcome: ProcessOutcome = tokio::task::spawn_blocking(move || processor.process(filter, &paths))
            .await
            .map_err(|e| CompositorError::generic(format!("processing crashed: {}", e)))??;

        if let Some(thumbnail) = &outcome.thumbnail {
            if !thumbnail.exists() {
                warn!("Reported thumbnail {} is missing", thumbnail.display());
            }
        }

        let update = JobUpdate::Done {
            result: format!("{}/{}.mp4", VIDEO_ROUTE, job_id),
            thumbnail: outcome
                .thumbnail
                .as_ref()
                .map(|_| format!("{}/{}.jpg", THUMB_ROUTE, job_id)),
        };
        self.store.update(job_id, update).await?;

        info!("Job done: {} frames", outcome.report.frames_out);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use tempfile::{tempdir, TempDir};

    use crate::error::VideoError;
    use crate::jobs::store::InMemoryJobStore;
    use crate::jobs::types::JobStatus;
    use crate::jobs::workspace::RESULTS_DIR;
    use crate::video::{FrameRate, PipelineReport, StreamDescriptor};

    /// Copies a canned payload instead of downloading
    struct StubFetcher {
        fail: bool,
    }

    #[async_trait]
    impl VideoFetcher for StubFetcher {
        async fn fetch(&self, source: &str, destination: &Path) -> Result<()> {
            if self.fail {
                return Err(VideoError::FetchFailed {
                    source_url: source.to_string(),
                    reason: "404 Not Found".into(),
                }
                .into());
            }
            tokio::fs::write(destination, b"source").await?;
            Ok(())
        }
    }

    enum Behaviour {
        Succeed,
        Fail,
        Panic,
    }

    struct StubProcessor {
        behaviour: Behaviour,
        calls: AtomicUsize,
    }

    impl StubProcessor {
        fn new(behaviour: Behaviour) -> Self {
            Self { behaviour, calls: AtomicUsize::new(0) }
        }
    }

    impl VideoProcessor for StubProcessor {
        fn process(&self, _filter: FilterKind, paths: &ProcessPaths) -> Result<ProcessOutcome> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            assert!(paths.source.exists());
            std::fs::write(&paths.intermediate, b"intermediate").unwrap();

            match self.behaviour {
                Behaviour::Succeed => {
                    std::fs::write(&paths.output, b"result").unwrap();
                    let thumbnail = paths.thumbnail.as_ref().map(|(_, target)| {
                        std::fs::write(target, b"jpg").unwrap();
                        target.clone()
                    });
                    Ok(ProcessOutcome {
                        descriptor: StreamDescriptor {
                            width: 64,
                            height: 48,
                            frame_rate: FrameRate::new(30, 1),
                            has_audio: false,
                        },
                        report: PipelineReport { frames_in: 10, frames_out: 10, mask_refreshes: 1 },
                        output: paths.output.clone(),
                        thumbnail,
                    })
                }
                Behaviour::Fail => Err(VideoError::DecodeFailed { reason: "moov atom not found".into() }.into()),
                Behaviour::Panic => panic!("segmenter blew up"),
            }
        }
    }

    struct Harness {
        _dir: TempDir,
        scratch: PathBuf,
        store: Arc<InMemoryJobStore>,
        processor: Arc<StubProcessor>,
        manager: JobManager,
    }

    fn harness(fetch_fails: bool, behaviour: Behaviour) -> Harness {
        let dir = tempdir().unwrap();
        let scratch = dir.path().join("scratch");
        let mut config = Config::default();
        config.storage.scratch_dir = scratch.clone();

        let store = Arc::new(InMemoryJobStore::new());
        let processor = Arc::new(StubProcessor::new(behaviour));
        let manager = JobManager::new(
            store.clone(),
            Arc::new(StubFetcher { fail: fetch_fails }),
            processor.clone(),
            &config,
        );
        Harness { _dir: dir, scratch, store, processor, manager }
    }

    async fn wait_for_terminal(manager: &JobManager, id: &JobId) -> JobRecord {
        for _ in 0..200 {
            let record = manager.status(id).await.unwrap();
            if record.status.is_terminal() {
                // let the guard finish its cleanup
                tokio::time::sleep(Duration::from_millis(20)).await;
                return record;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("job {} never finished", id);
    }

    fn scratch_files(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[tokio::test]
    async fn test_invalid_filter_creates_no_job() {
        let h = harness(false, Behaviour::Succeed);
        let err = h.manager.submit("https://example/clip.mp4", "blur").await.unwrap_err();
        assert!(matches!(err, CompositorError::Job(JobError::InvalidFilter { ref name }) if name == "blur"));

        // filter is checked before the source
        let err = h.manager.submit("", "blur").await.unwrap_err();
        assert!(matches!(err, CompositorError::Job(JobError::InvalidFilter { .. })));
        assert_eq!(h.store.len().await, 0);
    }

    #[tokio::test]
    async fn test_missing_source_creates_no_job() {
        let h = harness(false, Behaviour::Succeed);
        for source in ["", "   "] {
            let err = h.manager.submit(source, "grayscale").await.unwrap_err();
            assert!(matches!(err, CompositorError::Job(JobError::MissingSource)));
        }
        assert_eq!(h.store.len().await, 0);
    }

    #[tokio::test]
    async fn test_non_http_source_creates_no_job() {
        let h = harness(false, Behaviour::Succeed);
        for source in [
            "/etc/passwd",
            "file:///etc/passwd",
            "concat:a.mp4|b.mp4",
            "rtmp://example/live",
            "https://",
        ] {
            let err = h.manager.submit(source, "grayscale").await.unwrap_err();
            assert!(
                matches!(err, CompositorError::Job(JobError::UnsupportedSource { ref source_url }) if source_url == source),
                "{} was accepted",
                source
            );
        }
        assert_eq!(h.store.len().await, 0);

        // scheme match ignores case
        let id = h.manager.submit("HTTPS://example/clip.mp4", "grayscale").await.unwrap();
        assert_eq!(wait_for_terminal(&h.manager, &id).await.status, JobStatus::Done);
    }

    #[tokio::test]
    async fn test_unknown_job_status() {
        let h = harness(false, Behaviour::Succeed);
        let err = h.manager.status(&JobId::new("temp_deadbeef")).await.unwrap_err();
        assert!(matches!(err, CompositorError::Job(JobError::JobNotFound { .. })));
    }

    #[tokio::test]
    async fn test_successful_job() {
        let h = harness(false, Behaviour::Succeed);
        let id = h.manager.submit("https://example/clip.mp4", "grayscale").await.unwrap();
        assert!(id.as_str().starts_with("temp_"));

        let record = wait_for_terminal(&h.manager, &id).await;
        assert_eq!(record.status, JobStatus::Done);
        assert_eq!(record.filter, "grayscale");
        assert_eq!(record.result, Some(format!("/videos/{}.mp4", id)));
        assert_eq!(record.thumbnail, Some(format!("/thumb/{}.jpg", id)));
        assert!(record.error.is_none());

        // only the published artifacts remain, inside results/
        assert_eq!(scratch_files(&h.scratch), vec![RESULTS_DIR.to_string()]);
        assert_eq!(
            scratch_files(&h.scratch.join(RESULTS_DIR)),
            vec![format!("{}.jpg", id), format!("{}.mp4", id)]
        );
    }

    #[tokio::test]
    async fn test_fetch_failure_marks_failed() {
        let h = harness(true, Behaviour::Succeed);
        let id = h.manager.submit("https://example/missing.mp4", "sepia").await.unwrap();

        let record = wait_for_terminal(&h.manager, &id).await;
        assert_eq!(record.status, JobStatus::Failed);
        assert!(record.error.unwrap().contains("404 Not Found"));
        assert_eq!(h.processor.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_processing_error_marks_failed_and_cleans_up() {
        let h = harness(false, Behaviour::Fail);
        let id = h.manager.submit("https://example/clip.mp4", "identity").await.unwrap();

        let record = wait_for_terminal(&h.manager, &id).await;
        assert_eq!(record.status, JobStatus::Failed);
        assert!(record.error.unwrap().contains("moov atom not found"));
        assert!(record.result.is_none());
        assert_eq!(scratch_files(&h.scratch), vec![RESULTS_DIR.to_string()]);
        assert!(scratch_files(&h.scratch.join(RESULTS_DIR)).is_empty());
    }

    #[tokio::test]
    async fn test_panic_in_worker_marks_failed() {
        let h = harness(false, Behaviour::Panic);
        let id = h.manager.submit("https://example/clip.mp4", "no transform").await.unwrap();

        let record = wait_for_terminal(&h.manager, &id).await;
        assert_eq!(record.status, JobStatus::Failed);
        assert!(record.error.unwrap().contains("crashed"));
        assert_eq!(scratch_files(&h.scratch), vec![RESULTS_DIR.to_string()]);
        assert!(scratch_files(&h.scratch.join(RESULTS_DIR)).is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_jobs_are_independent() {
        let h = harness(false, Behaviour::Succeed);
        let mut ids = Vec::new();
        for filter in ["grayscale", "sepia", "identity", "grayscale"] {
            ids.push(h.manager.submit("https://example/clip.mp4", filter).await.unwrap());
        }

        for id in &ids {
            assert_eq!(wait_for_terminal(&h.manager, id).await.status, JobStatus::Done);
        }
        assert_eq!(h.store.len().await, 4);
        assert_eq!(h.processor.calls.load(Ordering::SeqCst), 4);
    }
}
