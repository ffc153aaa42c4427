//! Database module
//!
//! SQLite-backed storage for projects, analysis jobs, and their child
//! tables (tech stack, issues, team members). Uses sqlx for async access;
//! the schema is created on startup. A project exclusively owns its
//! children: deletion cascades.

pub mod children;
pub mod jobs;
pub mod projects;

pub use children::{Issue, TeamMember, TechStackEntry};
pub use jobs::{AnalysisJob, JobStatus};
pub use projects::{Project, ProjectStatus, ProjectUpdate};

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use thiserror::Error;
use tracing::info;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

pub type DbResult<T> = Result<T, DbError>;

// ============================================================================
// Initialization
// ============================================================================

/// Connect to the database and create the schema if missing
pub async fn init_db(database_url: &str) -> DbResult<SqlitePool> {
    let options = SqliteConnectOptions::from_str(database_url)
        .map_err(sqlx::Error::from)?
        .create_if_missing(true)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(8)
        .connect_with(options)
        .await?;

    create_tables(&pool).await?;
    info!("Database initialized at {}", database_url);
    Ok(pool)
}

async fn create_tables(pool: &SqlitePool) -> DbResult<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS projects (
            id TEXT PRIMARY KEY,
            repo_url TEXT NOT NULL UNIQUE,
            team_name TEXT,
            status TEXT NOT NULL DEFAULT 'pending',
            total_score REAL,
            originality_score REAL,
            quality_score REAL,
            security_score REAL,
            effort_score REAL,
            implementation_score REAL,
            engineering_score REAL,
            organization_score REAL,
            documentation_score REAL,
            total_commits INTEGER,
            verdict TEXT,
            ai_pros TEXT,
            ai_cons TEXT,
            report_json TEXT,
            created_at INTEGER NOT NULL,
            analyzed_at INTEGER
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS analysis_jobs (
            id TEXT PRIMARY KEY,
            project_id TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
            status TEXT NOT NULL DEFAULT 'queued',
            progress INTEGER NOT NULL DEFAULT 0,
            current_stage TEXT,
            error_message TEXT,
            started_at INTEGER NOT NULL,
            completed_at INTEGER
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS tech_stack (
            id TEXT PRIMARY KEY,
            project_id TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
            technology TEXT NOT NULL,
            category TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS issues (
            id TEXT PRIMARY KEY,
            project_id TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
            kind TEXT NOT NULL,
            severity TEXT NOT NULL,
            file_path TEXT,
            description TEXT NOT NULL,
            ai_probability REAL,
            plagiarism_score REAL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS team_members (
            id TEXT PRIMARY KEY,
            project_id TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
            name TEXT NOT NULL,
            commits INTEGER NOT NULL,
            contribution_pct REAL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_projects_status ON projects(status)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_jobs_project ON analysis_jobs(project_id)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_tech_project ON tech_stack(project_id)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_issues_project ON issues(project_id)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_members_project ON team_members(project_id)")
        .execute(pool)
        .await?;

    Ok(())
}

#[cfg(test)]
pub(crate) async fn test_pool() -> SqlitePool {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("test.db");
    // The tempdir must outlive the pool for the duration of the test
    std::mem::forget(dir);
    init_db(&format!("sqlite:{}", path.display()))
        .await
        .expect("test db")
}
