//! API request and response types
//!
//! The response shapes are contractually fixed for the frontend: list,
//! leaderboard, chart, and stats payloads use camelCase field names.

use serde::{Deserialize, Serialize};

use crate::db::{AnalysisJob, Issue, Project, TeamMember, TechStackEntry};

// ============================================================================
// Submission
// ============================================================================

/// Body of POST /api/analyze-repo
#[derive(Debug, Clone, Deserialize)]
pub struct AnalyzeRepoRequest {
    pub repo_url: String,
    pub team_name: Option<String>,
}

/// 202 response for an accepted submission
#[derive(Debug, Clone, Serialize)]
pub struct AnalyzeRepoResponse {
    pub job_id: String,
    pub project_id: String,
    pub status: String,
    pub message: String,
}

// ============================================================================
// Job status & result
// ============================================================================

/// Response for GET /api/analysis-status/{job_id}
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisStatusResponse {
    pub job_id: String,
    pub project_id: String,
    pub status: String,
    pub progress: i64,
    pub current_stage: Option<String>,
    pub error_message: Option<String>,
    pub started_at: i64,
    pub completed_at: Option<i64>,
}

impl AnalysisStatusResponse {
    pub fn from_job(job: AnalysisJob) -> Self {
        Self {
            job_id: job.id,
            project_id: job.project_id,
            status: job.status,
            progress: job.progress,
            current_stage: job.current_stage,
            error_message: job.error_message,
            started_at: job.started_at,
            completed_at: job.completed_at,
        }
    }
}

/// The eight component scores plus the weighted total
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub total_score: Option<f64>,
    pub originality_score: Option<f64>,
    pub quality_score: Option<f64>,
    pub security_score: Option<f64>,
    pub effort_score: Option<f64>,
    pub implementation_score: Option<f64>,
    pub engineering_score: Option<f64>,
    pub organization_score: Option<f64>,
    pub documentation_score: Option<f64>,
}

impl ScoreBreakdown {
    pub fn from_project(project: &Project) -> Self {
        Self {
            total_score: project.total_score,
            originality_score: project.originality_score,
            quality_score: project.quality_score,
            security_score: project.security_score,
            effort_score: project.effort_score,
            implementation_score: project.implementation_score,
            engineering_score: project.engineering_score,
            organization_score: project.organization_score,
            documentation_score: project.documentation_score,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TechStackItem {
    pub technology: String,
    pub category: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueItem {
    #[serde(rename = "type")]
    pub kind: String,
    pub severity: String,
    pub file_path: Option<String>,
    pub description: String,
    pub ai_probability: Option<f64>,
    pub plagiarism_score: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamMemberItem {
    pub name: String,
    pub commits: i64,
    pub contribution_pct: Option<f64>,
}

/// Response for GET /api/analysis-result/{job_id} and project detail
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResultResponse {
    pub project_id: String,
    pub repo_url: String,
    pub team_name: Option<String>,
    pub status: String,
    pub analyzed_at: Option<i64>,
    pub scores: ScoreBreakdown,
    pub total_commits: Option<i64>,
    pub verdict: Option<String>,
    pub ai_pros: Option<String>,
    pub ai_cons: Option<String>,
    pub tech_stack: Vec<TechStackItem>,
    pub issues: Vec<IssueItem>,
    pub team_members: Vec<TeamMemberItem>,
    /// Latest analysis attempt for this project
    pub job: Option<AnalysisStatusResponse>,
    pub report_json: Option<serde_json::Value>,
}

impl AnalysisResultResponse {
    pub fn assemble(
        project: Project,
        tech_stack: Vec<TechStackEntry>,
        issues: Vec<Issue>,
        team_members: Vec<TeamMember>,
        job: Option<AnalysisJob>,
    ) -> Self {
        let scores = ScoreBreakdown::from_project(&project);
        let report_json = project
            .report_json
            .as_deref()
            .and_then(|raw| serde_json::from_str(raw).ok());
        Self {
            project_id: project.id,
            repo_url: project.repo_url,
            team_name: project.team_name,
            status: project.status,
            analyzed_at: project.analyzed_at,
            scores,
            total_commits: project.total_commits,
            verdict: project.verdict,
            ai_pros: project.ai_pros,
            ai_cons: project.ai_cons,
            tech_stack: tech_stack
                .into_iter()
                .map(|t| TechStackItem { technology: t.technology, category: t.category })
                .collect(),
            issues: issues
                .into_iter()
                .map(|i| IssueItem {
                    kind: i.kind,
                    severity: i.severity,
                    file_path: i.file_path,
                    description: i.description,
                    ai_probability: i.ai_probability,
                    plagiarism_score: i.plagiarism_score,
                })
                .collect(),
            team_members: team_members
                .into_iter()
                .map(|m| TeamMemberItem {
                    name: m.name,
                    commits: m.commits,
                    contribution_pct: m.contribution_pct,
                })
                .collect(),
            job: job.map(AnalysisStatusResponse::from_job),
            report_json,
        }
    }
}

// ============================================================================
// Lists, leaderboard, stats
// ============================================================================

/// Query parameters for GET /api/projects
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProjectListQuery {
    pub status: Option<String>,
    pub tech: Option<String>,
    #[serde(default)]
    pub sort: Option<String>,
    pub search: Option<String>,
}

/// One row of GET /api/projects
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectListItem {
    pub id: String,
    pub team_name: Option<String>,
    pub repo_url: String,
    pub status: String,
    pub total_score: Option<f64>,
    pub tech_stack: Vec<String>,
    pub security_issues: usize,
    pub created_at: i64,
    pub analyzed_at: Option<i64>,
}

/// Query parameters for GET /api/leaderboard
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LeaderboardQuery {
    pub tech: Option<String>,
    #[serde(default)]
    pub sort: Option<String>,
    pub search: Option<String>,
}

/// One row of GET /api/leaderboard
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub rank: usize,
    pub id: String,
    pub team_name: Option<String>,
    pub repo_url: String,
    pub total_score: f64,
    pub originality_score: f64,
    pub quality_score: f64,
    pub security_score: f64,
    pub architecture_score: f64,
    pub documentation_score: f64,
    pub tech_stack: Vec<String>,
}

/// One bar of GET /api/leaderboard/chart
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartEntry {
    pub team_name: Option<String>,
    pub total_score: f64,
    pub quality_score: f64,
    pub security_score: f64,
    pub originality_score: f64,
    pub architecture_score: f64,
    pub documentation_score: f64,
}

/// Response for GET /api/stats
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_projects: usize,
    pub completed_projects: usize,
    pub pending_projects: usize,
    pub average_score: f64,
    pub total_security_issues: usize,
}

/// One row of GET /api/tech-stacks
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TechHistogramEntry {
    pub name: String,
    pub count: usize,
}

// ============================================================================
// Batch upload
// ============================================================================

/// One accepted batch row
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchQueuedRow {
    pub row: usize,
    pub team_name: String,
    pub repo_url: String,
    pub job_id: String,
    pub project_id: String,
}

/// One rejected batch row
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchFailedRow {
    pub row: usize,
    pub error: String,
}

/// Response for POST /api/batch-upload
#[derive(Debug, Clone, Serialize)]
pub struct BatchUploadResponse {
    pub success: usize,
    pub failed: usize,
    pub total: usize,
    pub queued: Vec<BatchQueuedRow>,
    pub errors: Vec<BatchFailedRow>,
}

/// Error payload for every non-2xx response
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}
