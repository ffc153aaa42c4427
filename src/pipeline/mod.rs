//! The analysis pipeline
//!
//! A fixed-topology DAG: `clone` runs first; eight detectors fan out
//! concurrently over the shared working copy; the `aggregator` runs last
//! behind a barrier. Clone failure is fatal; every other detector failure
//! downgrades to a skipped output. The working directory is removed on all
//! exit paths.

pub mod aggregate;
pub mod graph;
pub mod progress;
pub mod report;

pub use graph::{GraphOutcome, TaskGraph};
pub use progress::{stage_percent, DbProgressTracker, NullProgress, ProgressGate, ProgressReporter};
pub use report::{FileRisk, Report, Scores};

use anyhow::{anyhow, Context as _, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::Config;
use crate::detectors::{self, JudgeClient, JudgeVerdict, OriginProvider, Workspace};

/// Shared state threaded through the pipeline nodes
pub struct PipelineCtx {
    repo_url: String,
    config: Config,
    judge: Option<Arc<JudgeClient>>,
    providers: Arc<Vec<Box<dyn OriginProvider>>>,
    progress: Arc<dyn ProgressReporter>,
    gate: ProgressGate,
    workdir: Mutex<Option<PathBuf>>,
    workspace: Mutex<Option<Workspace>>,
    report: Mutex<Report>,
}

impl PipelineCtx {
    /// Emit a stage notification through the monotonic gate
    async fn emit(&self, stage: &str) {
        let percent = stage_percent(stage);
        if self.gate.admit(percent) {
            self.progress.report(stage, percent).await;
        }
    }

    /// Working copy path; error when clone has not produced one
    async fn workdir(&self) -> Result<PathBuf> {
        self.workdir
            .lock()
            .await
            .clone()
            .ok_or_else(|| anyhow!("No working copy available"))
    }
}

/// Executes the detector DAG for one job
pub struct PipelineRunner {
    config: Config,
    judge: Option<Arc<JudgeClient>>,
    providers: Arc<Vec<Box<dyn OriginProvider>>>,
    progress: Arc<dyn ProgressReporter>,
    cancel: CancellationToken,
}

impl PipelineRunner {
    pub fn new(config: Config, progress: Arc<dyn ProgressReporter>) -> Self {
        let judge = config
            .judge_api_key
            .as_ref()
            .map(|key| Arc::new(JudgeClient::new(key.clone())));
        Self {
            config,
            judge,
            providers: Arc::new(Vec::new()),
            progress,
            cancel: CancellationToken::new(),
        }
    }

    /// Install external origin detectors
    pub fn with_providers(mut self, providers: Vec<Box<dyn OriginProvider>>) -> Self {
        self.providers = Arc::new(providers);
        self
    }

    /// Use an externally owned cancellation token (the job owner's)
    pub fn with_cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Run the full pipeline for one submission and return the report.
    ///
    /// `repo_url` may also be a local directory (CLI runs and tests), in
    /// which case the clone node degrades to a path check.
    pub async fn run(&self, repo_url: &str) -> Result<Report> {
        let ctx = Arc::new(PipelineCtx {
            repo_url: repo_url.to_string(),
            config: self.config.clone(),
            judge: self.judge.clone(),
            providers: self.providers.clone(),
            progress: self.progress.clone(),
            gate: ProgressGate::new(),
            workdir: Mutex::new(None),
            workspace: Mutex::new(None),
            report: Mutex::new(Report::new(repo_url)),
        });

        let graph = build_graph()?;
        let outcome = graph.run(ctx.clone(), &self.cancel).await;

        // The working directory is owned by this job: remove it whether
        // the run completed, failed, or was cancelled
        if let Some(workspace) = ctx.workspace.lock().await.take() {
            workspace.cleanup();
        }

        outcome?;
        ctx.emit("completed").await;

        let report = ctx.report.lock().await.clone();
        Ok(report)
    }
}

/// Wire the fixed detector topology
fn build_graph() -> Result<TaskGraph<PipelineCtx>> {
    let mut graph: TaskGraph<PipelineCtx> = TaskGraph::new();

    graph.add_node("clone", &[], true, |ctx: Arc<PipelineCtx>| async move {
        ctx.emit("cloning").await;
        let url = ctx.repo_url.clone();
        let (path, workspace) =
            tokio::task::spawn_blocking(move || detectors::path_or_clone(&url))
                .await
                .context("Clone task aborted")??;
        info!("Working copy ready at {:?}", path);
        *ctx.workdir.lock().await = Some(path);
        *ctx.workspace.lock().await = workspace;
        Ok(())
    })?;

    graph.add_node("stack", &["clone"], false, |ctx: Arc<PipelineCtx>| async move {
        ctx.emit("stack_detection").await;
        let path = ctx.workdir().await?;
        let stack = tokio::task::spawn_blocking(move || detectors::detect_tech_stack(&path))
            .await
            .context("Stack task aborted")?;
        ctx.report.lock().await.stack = Some(stack);
        Ok(())
    })?;

    graph.add_node("structure", &["clone"], false, |ctx: Arc<PipelineCtx>| async move {
        ctx.emit("structure_analysis").await;
        let path = ctx.workdir().await?;
        let structure = tokio::task::spawn_blocking(move || detectors::analyze_structure(&path))
            .await
            .context("Structure task aborted")?;
        ctx.report.lock().await.structure = Some(structure);
        Ok(())
    })?;

    graph.add_node("maturity", &["clone"], false, |ctx: Arc<PipelineCtx>| async move {
        ctx.emit("maturity_check").await;
        let path = ctx.workdir().await?;
        let maturity = tokio::task::spawn_blocking(move || detectors::scan_project_maturity(&path))
            .await
            .context("Maturity task aborted")?;
        ctx.report.lock().await.maturity = Some(maturity);
        Ok(())
    })?;

    graph.add_node("commits", &["clone"], false, |ctx: Arc<PipelineCtx>| async move {
        ctx.emit("commit_forensics").await;
        let path = ctx.workdir().await?;
        let forensics = tokio::task::spawn_blocking(move || detectors::analyze_commits(&path))
            .await
            .context("Forensics task aborted")??;
        ctx.report.lock().await.forensics = Some(forensics);
        Ok(())
    })?;

    graph.add_node("quality", &["clone"], false, |ctx: Arc<PipelineCtx>| async move {
        ctx.emit("quality_check").await;
        let path = ctx.workdir().await?;
        let quality = tokio::task::spawn_blocking(move || detectors::analyze_quality(&path))
            .await
            .context("Quality task aborted")?;
        ctx.report.lock().await.quality = Some(quality);
        Ok(())
    })?;

    graph.add_node("security", &["clone"], false, |ctx: Arc<PipelineCtx>| async move {
        ctx.emit("security_scan").await;
        let path = ctx.workdir().await?;
        let config = ctx.config.clone();
        let security =
            tokio::task::spawn_blocking(move || detectors::scan_for_secrets(&path, &config))
                .await
                .context("Security task aborted")?;
        ctx.report.lock().await.security = Some(security);
        Ok(())
    })?;

    graph.add_node("origin", &["clone"], false, |ctx: Arc<PipelineCtx>| async move {
        ctx.emit("origin_scan").await;
        let path = ctx.workdir().await?;
        let origin = detectors::analyze_origin(&path, &ctx.providers).await;
        ctx.report.lock().await.origin = Some(origin);
        Ok(())
    })?;

    graph.add_node("judge", &["clone"], false, |ctx: Arc<PipelineCtx>| async move {
        ctx.emit("ai_judge").await;
        let verdict = match &ctx.judge {
            Some(judge) => {
                let path = ctx.workdir().await?;
                match judge.evaluate(&path).await {
                    Ok(v) => v,
                    Err(e) => JudgeVerdict::skipped(&format!("AI analysis failed: {e}")),
                }
            }
            None => JudgeVerdict::skipped("No judge API key configured"),
        };
        ctx.report.lock().await.judge = Some(verdict);
        Ok(())
    })?;

    graph.add_node(
        "aggregator",
        &["stack", "structure", "maturity", "commits", "quality", "security", "origin", "judge"],
        true,
        |ctx: Arc<PipelineCtx>| async move {
            ctx.emit("aggregation").await;
            let mut report = ctx.report.lock().await;
            aggregate::aggregate(&mut report);
            Ok(())
        },
    )?;

    Ok(graph)
}
