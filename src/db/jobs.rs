//! Analysis job storage
//!
//! A job is one analysis attempt bound to a project. Progress is
//! monotonically non-decreasing within a run and jobs never leave a
//! terminal state; both invariants are enforced in the UPDATE guards.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

use super::{DbError, DbResult};

/// Job lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "running" => Self::Running,
            "completed" => Self::Completed,
            "failed" => Self::Failed,
            _ => Self::Queued,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// One analysis attempt
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AnalysisJob {
    pub id: String,
    pub project_id: String,
    pub status: String,
    pub progress: i64,
    pub current_stage: Option<String>,
    pub error_message: Option<String>,
    pub started_at: i64,
    pub completed_at: Option<i64>,
}

impl AnalysisJob {
    pub fn status(&self) -> JobStatus {
        JobStatus::parse(&self.status)
    }
}

/// Create a job in status `queued`
pub async fn create_job(pool: &SqlitePool, project_id: &str) -> DbResult<AnalysisJob> {
    let id = uuid::Uuid::new_v4().to_string();
    let now = Utc::now().timestamp();

    sqlx::query(
        r#"
        INSERT INTO analysis_jobs (id, project_id, status, progress, started_at)
        VALUES (?, ?, 'queued', 0, ?)
        "#,
    )
    .bind(&id)
    .bind(project_id)
    .bind(now)
    .execute(pool)
    .await?;

    get_job(pool, &id)
        .await?
        .ok_or_else(|| DbError::NotFound(format!("Job {id}")))
}

/// Get a job by id
pub async fn get_job(pool: &SqlitePool, id: &str) -> DbResult<Option<AnalysisJob>> {
    sqlx::query_as::<_, AnalysisJob>("SELECT * FROM analysis_jobs WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(Into::into)
}

/// Latest job for a project
pub async fn latest_job_for_project(
    pool: &SqlitePool,
    project_id: &str,
) -> DbResult<Option<AnalysisJob>> {
    sqlx::query_as::<_, AnalysisJob>(
        "SELECT * FROM analysis_jobs WHERE project_id = ? ORDER BY started_at DESC, id DESC LIMIT 1",
    )
    .bind(project_id)
    .fetch_optional(pool)
    .await
    .map_err(Into::into)
}

/// Update job progress and stage; marks the job `running`.
///
/// The guard keeps progress non-decreasing and never touches a job that
/// already reached a terminal state.
pub async fn update_progress(
    pool: &SqlitePool,
    id: &str,
    progress: i64,
    stage: &str,
) -> DbResult<()> {
    sqlx::query(
        r#"
        UPDATE analysis_jobs
        SET progress = MAX(progress, ?), current_stage = ?, status = 'running'
        WHERE id = ? AND status NOT IN ('completed', 'failed')
        "#,
    )
    .bind(progress)
    .bind(stage)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Mark a job completed with progress 100
pub async fn complete_job(pool: &SqlitePool, id: &str) -> DbResult<()> {
    let now = Utc::now().timestamp();
    sqlx::query(
        r#"
        UPDATE analysis_jobs
        SET status = 'completed', progress = 100, current_stage = 'completed', completed_at = ?
        WHERE id = ? AND status NOT IN ('completed', 'failed')
        "#,
    )
    .bind(now)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Mark a job failed with an error message
pub async fn fail_job(pool: &SqlitePool, id: &str, error: &str) -> DbResult<()> {
    let now = Utc::now().timestamp();
    sqlx::query(
        r#"
        UPDATE analysis_jobs
        SET status = 'failed', error_message = ?, completed_at = ?
        WHERE id = ? AND status NOT IN ('completed', 'failed')
        "#,
    )
    .bind(error)
    .bind(now)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}
