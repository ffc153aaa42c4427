//! Background analysis worker
//!
//! A semaphore-bounded task pool that executes queued analysis jobs. Each
//! job transitions its project to `analyzing`, runs the detector pipeline,
//! persists the results, and settles the job row in a terminal state.
//! Working directories are removed by the pipeline on every exit path.

use sqlx::SqlitePool;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::cache::ResponseCache;
use crate::config::Config;
use crate::db::{jobs, projects, ProjectStatus};
use crate::detectors::{OriginProvider, RemoteOriginDetector};
use crate::mapper;
use crate::pipeline::{DbProgressTracker, PipelineRunner, ProgressReporter};

/// Bounded pool executing analysis jobs
pub struct AnalysisWorker {
    pool: SqlitePool,
    cache: ResponseCache,
    config: Config,
    permits: Arc<Semaphore>,
    /// Cancellation handles of in-flight jobs, by job id
    active: Arc<Mutex<HashMap<String, CancellationToken>>>,
}

impl AnalysisWorker {
    pub fn new(pool: SqlitePool, cache: ResponseCache, config: Config) -> Self {
        let permits = Arc::new(Semaphore::new(config.worker_pool_size));
        Self {
            pool,
            cache,
            config,
            permits,
            active: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Submit a job for background execution. Returns immediately; the
    /// job waits for a pool permit.
    pub fn spawn_job(&self, project_id: String, job_id: String, repo_url: String) {
        let pool = self.pool.clone();
        let cache = self.cache.clone();
        let config = self.config.clone();
        let permits = self.permits.clone();
        let active = self.active.clone();
        let cancel = CancellationToken::new();

        let registered = cancel.clone();
        let registered_id = job_id.clone();
        tokio::spawn(async move {
            active.lock().await.insert(registered_id.clone(), registered);

            let _permit = match permits.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    error!("Worker pool closed; job {registered_id} not run");
                    active.lock().await.remove(&registered_id);
                    return;
                }
            };

            run_analysis_job(&pool, &cache, &config, &project_id, &job_id, &repo_url, cancel).await;
            active.lock().await.remove(&registered_id);
        });
    }

    /// Signal cancellation to a running job. Returns false when the job
    /// is not in flight.
    pub async fn cancel_job(&self, job_id: &str) -> bool {
        if let Some(token) = self.active.lock().await.get(job_id) {
            token.cancel();
            true
        } else {
            false
        }
    }
}

/// Execute one analysis job end to end.
///
/// Fatal pipeline errors (clone failure, aggregator failure, cancellation)
/// mark both the job and the project `failed`; persistence sub-failures
/// after a successful pipeline are already handled best-effort by the
/// mapper.
pub async fn run_analysis_job(
    pool: &SqlitePool,
    cache: &ResponseCache,
    config: &Config,
    project_id: &str,
    job_id: &str,
    repo_url: &str,
    cancel: CancellationToken,
) {
    info!("Starting analysis job {job_id} for {repo_url}");

    if let Err(e) = projects::update_status(pool, project_id, ProjectStatus::Analyzing).await {
        error!("Failed to mark project {project_id} analyzing: {e}");
        let _ = jobs::fail_job(pool, job_id, &format!("Failed to start: {e}")).await;
        return;
    }

    let progress: Arc<dyn ProgressReporter> =
        Arc::new(DbProgressTracker::new(pool.clone(), job_id.to_string()));
    progress.report("starting", 0).await;

    let mut providers: Vec<Box<dyn OriginProvider>> = Vec::new();
    if let (Some(url), Some(key)) = (&config.origin_detector_url, &config.origin_detector_key) {
        providers.push(Box::new(RemoteOriginDetector::new(
            "remote",
            url.clone(),
            key.clone(),
        )));
    }

    let runner = PipelineRunner::new(config.clone(), progress)
        .with_providers(providers)
        .with_cancel_token(cancel);

    match runner.run(repo_url).await {
        Ok(report) => {
            match mapper::save_analysis_results(pool, cache, project_id, &report).await {
                Ok(()) => {
                    if let Err(e) = jobs::complete_job(pool, job_id).await {
                        warn!("Failed to mark job {job_id} completed: {e}");
                    }
                    info!("Analysis job {job_id} completed");
                }
                Err(e) => {
                    error!("Failed to persist results for job {job_id}: {e}");
                    let _ = jobs::fail_job(pool, job_id, &format!("Failed to save results: {e}")).await;
                    let _ = projects::update_status(pool, project_id, ProjectStatus::Failed).await;
                }
            }
        }
        Err(e) => {
            error!("Analysis job {job_id} failed: {e:#}");
            let _ = jobs::fail_job(pool, job_id, &format!("{e:#}")).await;
            let _ = projects::update_status(pool, project_id, ProjectStatus::Failed).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{test_pool, JobStatus};
    use git2::Signature;
    use std::path::Path;

    fn fixture_repo() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let repo = git2::Repository::init(dir.path()).unwrap();
        std::fs::write(dir.path().join("README.md"), "# fixture\n").unwrap();
        std::fs::write(
            dir.path().join("main.rs"),
            "fn main() { println!(\"fixture\"); }\n".repeat(20),
        )
        .unwrap();
        let mut index = repo.index().unwrap();
        index.add_path(Path::new("README.md")).unwrap();
        index.add_path(Path::new("main.rs")).unwrap();
        index.write().unwrap();
        let tree_id = index.write_tree().unwrap();
        let tree = repo.find_tree(tree_id).unwrap();
        let sig = Signature::now("Fixture", "fixture@example.com").unwrap();
        repo.commit(Some("HEAD"), &sig, &sig, "initial", &tree, &[]).unwrap();
        dir
    }

    #[tokio::test]
    async fn test_job_completes_against_local_repo() {
        let pool = test_pool().await;
        let fixture = fixture_repo();
        let url = fixture.path().to_string_lossy().to_string();

        let project = projects::create_project(&pool, &url, Some("T1")).await.unwrap();
        let job = jobs::create_job(&pool, &project.id).await.unwrap();

        run_analysis_job(
            &pool,
            &ResponseCache::disabled(),
            &Config::default(),
            &project.id,
            &job.id,
            &url,
            CancellationToken::new(),
        )
        .await;

        let done = jobs::get_job(&pool, &job.id).await.unwrap().unwrap();
        assert_eq!(done.status(), JobStatus::Completed);
        assert_eq!(done.progress, 100);

        let saved = projects::get_project(&pool, &project.id).await.unwrap().unwrap();
        assert_eq!(saved.status, "completed");
        assert!(saved.total_score.is_some());
        assert_eq!(saved.total_commits, Some(1));
    }

    #[tokio::test]
    async fn test_failed_clone_fails_job_and_project() {
        let pool = test_pool().await;
        let url = "https://invalid.invalid/ghost/repo.git";

        let project = projects::create_project(&pool, url, None).await.unwrap();
        let job = jobs::create_job(&pool, &project.id).await.unwrap();

        run_analysis_job(
            &pool,
            &ResponseCache::disabled(),
            &Config::default(),
            &project.id,
            &job.id,
            url,
            CancellationToken::new(),
        )
        .await;

        let failed = jobs::get_job(&pool, &job.id).await.unwrap().unwrap();
        assert_eq!(failed.status(), JobStatus::Failed);
        assert!(failed.error_message.is_some());

        let saved = projects::get_project(&pool, &project.id).await.unwrap().unwrap();
        assert_eq!(saved.status, "failed");
    }

    #[tokio::test]
    async fn test_cancel_unknown_job_is_a_noop() {
        let pool = test_pool().await;
        let worker = AnalysisWorker::new(pool, ResponseCache::disabled(), Config::default());
        assert!(!worker.cancel_job("no-such-job").await);
    }

    #[tokio::test]
    async fn test_pre_cancelled_job_fails_with_reason() {
        let pool = test_pool().await;
        let fixture = fixture_repo();
        let url = fixture.path().to_string_lossy().to_string();

        let project = projects::create_project(&pool, &url, None).await.unwrap();
        let job = jobs::create_job(&pool, &project.id).await.unwrap();

        let cancel = CancellationToken::new();
        cancel.cancel();
        run_analysis_job(
            &pool,
            &ResponseCache::disabled(),
            &Config::default(),
            &project.id,
            &job.id,
            &url,
            cancel,
        )
        .await;

        let failed = jobs::get_job(&pool, &job.id).await.unwrap().unwrap();
        assert_eq!(failed.status(), JobStatus::Failed);
        assert!(failed.error_message.unwrap().to_lowercase().contains("cancel"));
    }
}
