//! Child tables owned by a project: tech stack, issues, team members

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

use super::DbResult;

/// One detected technology
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TechStackEntry {
    pub id: String,
    pub project_id: String,
    pub technology: String,
    /// language, framework, database, or tool
    pub category: Option<String>,
}

/// One derived issue
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Issue {
    pub id: String,
    pub project_id: String,
    /// security, quality, or plagiarism
    pub kind: String,
    /// low, medium, or high
    pub severity: String,
    pub file_path: Option<String>,
    pub description: String,
    pub ai_probability: Option<f64>,
    pub plagiarism_score: Option<f64>,
}

/// One contributor
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TeamMember {
    pub id: String,
    pub project_id: String,
    pub name: String,
    pub commits: i64,
    pub contribution_pct: Option<f64>,
}

/// Insert tech stack rows for a project
pub async fn add_technologies(
    pool: &SqlitePool,
    project_id: &str,
    technologies: &[(String, String)],
) -> DbResult<()> {
    for (technology, category) in technologies {
        sqlx::query(
            "INSERT INTO tech_stack (id, project_id, technology, category) VALUES (?, ?, ?, ?)",
        )
        .bind(uuid::Uuid::new_v4().to_string())
        .bind(project_id)
        .bind(technology)
        .bind(category)
        .execute(pool)
        .await?;
    }
    Ok(())
}

/// Tech stack of a project
pub async fn get_tech_stack(pool: &SqlitePool, project_id: &str) -> DbResult<Vec<TechStackEntry>> {
    sqlx::query_as::<_, TechStackEntry>(
        "SELECT * FROM tech_stack WHERE project_id = ? ORDER BY technology",
    )
    .bind(project_id)
    .fetch_all(pool)
    .await
    .map_err(Into::into)
}

/// Issue insert payload
#[derive(Debug, Clone)]
pub struct NewIssue {
    pub kind: String,
    pub severity: String,
    pub file_path: Option<String>,
    pub description: String,
    pub ai_probability: Option<f64>,
    pub plagiarism_score: Option<f64>,
}

/// Insert issues for a project
pub async fn add_issues(pool: &SqlitePool, project_id: &str, issues: &[NewIssue]) -> DbResult<()> {
    for issue in issues {
        sqlx::query(
            r#"
            INSERT INTO issues (id, project_id, kind, severity, file_path, description,
                                ai_probability, plagiarism_score)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(uuid::Uuid::new_v4().to_string())
        .bind(project_id)
        .bind(&issue.kind)
        .bind(&issue.severity)
        .bind(&issue.file_path)
        .bind(&issue.description)
        .bind(issue.ai_probability)
        .bind(issue.plagiarism_score)
        .execute(pool)
        .await?;
    }
    Ok(())
}

/// Issues of a project
pub async fn get_issues(pool: &SqlitePool, project_id: &str) -> DbResult<Vec<Issue>> {
    sqlx::query_as::<_, Issue>("SELECT * FROM issues WHERE project_id = ? ORDER BY severity, kind")
        .bind(project_id)
        .fetch_all(pool)
        .await
        .map_err(Into::into)
}

/// Member insert payload: (name, commits, contribution_pct)
pub async fn add_members(
    pool: &SqlitePool,
    project_id: &str,
    members: &[(String, i64, f64)],
) -> DbResult<()> {
    for (name, commits, contribution_pct) in members {
        sqlx::query(
            "INSERT INTO team_members (id, project_id, name, commits, contribution_pct) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(uuid::Uuid::new_v4().to_string())
        .bind(project_id)
        .bind(name)
        .bind(commits)
        .bind(contribution_pct)
        .execute(pool)
        .await?;
    }
    Ok(())
}

/// Team members of a project, most commits first
pub async fn get_team_members(pool: &SqlitePool, project_id: &str) -> DbResult<Vec<TeamMember>> {
    sqlx::query_as::<_, TeamMember>(
        "SELECT * FROM team_members WHERE project_id = ? ORDER BY commits DESC, name",
    )
    .bind(project_id)
    .fetch_all(pool)
    .await
    .map_err(Into::into)
}

/// Remove all child rows of a project
pub async fn delete_children(pool: &SqlitePool, project_id: &str) -> DbResult<()> {
    for table in ["tech_stack", "issues", "team_members"] {
        sqlx::query(&format!("DELETE FROM {table} WHERE project_id = ?"))
            .bind(project_id)
            .execute(pool)
            .await?;
    }
    Ok(())
}
