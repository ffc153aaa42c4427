//! Project storage
//!
//! One project per unique repository URL. Scores are nullable until an
//! analysis completes; status follows pending → analyzing → {completed,
//! failed}.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

use super::{DbError, DbResult};

/// Project lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectStatus {
    Pending,
    Analyzing,
    Completed,
    Failed,
}

impl ProjectStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Analyzing => "analyzing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "analyzing" => Self::Analyzing,
            "completed" => Self::Completed,
            "failed" => Self::Failed,
            _ => Self::Pending,
        }
    }
}

/// A project row (one per analyzed repository)
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Project {
    pub id: String,
    pub repo_url: String,
    pub team_name: Option<String>,
    pub status: String,
    pub total_score: Option<f64>,
    pub originality_score: Option<f64>,
    pub quality_score: Option<f64>,
    pub security_score: Option<f64>,
    pub effort_score: Option<f64>,
    pub implementation_score: Option<f64>,
    pub engineering_score: Option<f64>,
    pub organization_score: Option<f64>,
    pub documentation_score: Option<f64>,
    pub total_commits: Option<i64>,
    pub verdict: Option<String>,
    pub ai_pros: Option<String>,
    pub ai_cons: Option<String>,
    pub report_json: Option<String>,
    pub created_at: i64,
    pub analyzed_at: Option<i64>,
}

impl Project {
    pub fn status(&self) -> ProjectStatus {
        ProjectStatus::parse(&self.status)
    }

    /// Whether a new submission for this URL must be rejected
    pub fn blocks_resubmission(&self) -> bool {
        matches!(self.status(), ProjectStatus::Analyzing | ProjectStatus::Completed)
    }
}

/// Completed-analysis column update
#[derive(Debug, Clone, Default)]
pub struct ProjectUpdate {
    pub total_score: f64,
    pub originality_score: f64,
    pub quality_score: f64,
    pub security_score: f64,
    pub effort_score: f64,
    pub implementation_score: f64,
    pub engineering_score: f64,
    pub organization_score: f64,
    pub documentation_score: f64,
    pub total_commits: i64,
    pub verdict: Option<String>,
    pub ai_pros: Option<String>,
    pub ai_cons: Option<String>,
    pub report_json: Option<String>,
}

/// Create a project in status `pending`.
///
/// The repo-URL uniqueness constraint surfaces as `InvalidInput`.
pub async fn create_project(
    pool: &SqlitePool,
    repo_url: &str,
    team_name: Option<&str>,
) -> DbResult<Project> {
    let id = uuid::Uuid::new_v4().to_string();
    let now = Utc::now().timestamp();

    sqlx::query(
        r#"
        INSERT INTO projects (id, repo_url, team_name, status, created_at)
        VALUES (?, ?, ?, 'pending', ?)
        "#,
    )
    .bind(&id)
    .bind(repo_url)
    .bind(team_name)
    .bind(now)
    .execute(pool)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(ref db) if db.is_unique_violation() => {
            DbError::InvalidInput(format!("Project already exists for {repo_url}"))
        }
        other => DbError::Sqlx(other),
    })?;

    get_project(pool, &id)
        .await?
        .ok_or_else(|| DbError::NotFound(format!("Project {id}")))
}

/// Get a project by id
pub async fn get_project(pool: &SqlitePool, id: &str) -> DbResult<Option<Project>> {
    sqlx::query_as::<_, Project>("SELECT * FROM projects WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(Into::into)
}

/// Get a project by repository URL
pub async fn get_project_by_url(pool: &SqlitePool, repo_url: &str) -> DbResult<Option<Project>> {
    sqlx::query_as::<_, Project>("SELECT * FROM projects WHERE repo_url = ?")
        .bind(repo_url)
        .fetch_optional(pool)
        .await
        .map_err(Into::into)
}

/// Update lifecycle status
pub async fn update_status(pool: &SqlitePool, id: &str, status: ProjectStatus) -> DbResult<()> {
    sqlx::query("UPDATE projects SET status = ? WHERE id = ?")
        .bind(status.as_str())
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Reset a failed/pending project for re-analysis: clears scores so the
/// completed-implies-scores invariant holds while the new run is queued
pub async fn reset_for_reanalysis(pool: &SqlitePool, id: &str, team_name: Option<&str>) -> DbResult<()> {
    sqlx::query(
        r#"
        UPDATE projects
        SET status = 'pending', team_name = COALESCE(?, team_name),
            total_score = NULL, originality_score = NULL, quality_score = NULL,
            security_score = NULL, effort_score = NULL, implementation_score = NULL,
            engineering_score = NULL, organization_score = NULL, documentation_score = NULL,
            analyzed_at = NULL
        WHERE id = ?
        "#,
    )
    .bind(team_name)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

/// All projects, newest first
pub async fn list_projects(pool: &SqlitePool) -> DbResult<Vec<Project>> {
    sqlx::query_as::<_, Project>("SELECT * FROM projects ORDER BY created_at DESC")
        .fetch_all(pool)
        .await
        .map_err(Into::into)
}

/// Completed projects ranked by a score column, best first.
///
/// `sort_column` must come from the caller's fixed allowlist; it is
/// interpolated, not bound.
pub async fn leaderboard(pool: &SqlitePool, sort_column: &str) -> DbResult<Vec<Project>> {
    let sql = format!(
        "SELECT * FROM projects WHERE status = 'completed' AND total_score IS NOT NULL \
         ORDER BY {sort_column} DESC"
    );
    sqlx::query_as::<_, Project>(&sql)
        .fetch_all(pool)
        .await
        .map_err(Into::into)
}

/// Persist the completed analysis onto the project row
pub async fn complete_analysis(pool: &SqlitePool, id: &str, update: &ProjectUpdate) -> DbResult<()> {
    let now = Utc::now().timestamp();
    sqlx::query(
        r#"
        UPDATE projects
        SET total_score = ?, originality_score = ?, quality_score = ?, security_score = ?,
            effort_score = ?, implementation_score = ?, engineering_score = ?,
            organization_score = ?, documentation_score = ?, total_commits = ?,
            verdict = ?, ai_pros = ?, ai_cons = ?, report_json = ?,
            status = 'completed', analyzed_at = ?
        WHERE id = ?
        "#,
    )
    .bind(update.total_score)
    .bind(update.originality_score)
    .bind(update.quality_score)
    .bind(update.security_score)
    .bind(update.effort_score)
    .bind(update.implementation_score)
    .bind(update.engineering_score)
    .bind(update.organization_score)
    .bind(update.documentation_score)
    .bind(update.total_commits)
    .bind(&update.verdict)
    .bind(&update.ai_pros)
    .bind(&update.ai_cons)
    .bind(&update.report_json)
    .bind(now)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Delete a project and everything it owns. Returns false when absent.
pub async fn delete_project(pool: &SqlitePool, id: &str) -> DbResult<bool> {
    // Children are removed explicitly; the FK cascade is the backstop
    super::children::delete_children(pool, id).await?;
    sqlx::query("DELETE FROM analysis_jobs WHERE project_id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    let result = sqlx::query("DELETE FROM projects WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
