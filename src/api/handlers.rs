//! Endpoint handlers
//!
//! Thin adapters over the core: request validation, status-code mapping,
//! and response shaping. Read-heavy endpoints memoize through the cache
//! port with short TTLs.

use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::error;

use super::types::*;
use crate::cache::{self, ResponseCache};
use crate::db::{children, jobs, projects, JobStatus, Project, ProjectStatus};
use crate::server::AppState;

// ============================================================================
// Error Mapping
// ============================================================================

/// Domain errors mapped onto the HTTP status table
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    TooEarly(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::BadRequest(m) => (StatusCode::BAD_REQUEST, m),
            Self::NotFound(m) => (StatusCode::NOT_FOUND, m),
            Self::Conflict(m) => (StatusCode::CONFLICT, m),
            Self::TooEarly(m) => (
                StatusCode::from_u16(425).unwrap_or(StatusCode::CONFLICT),
                m,
            ),
            Self::Internal(m) => {
                error!("Internal error: {m}");
                (StatusCode::INTERNAL_SERVER_ERROR, m)
            }
        };
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

impl From<crate::db::DbError> for ApiError {
    fn from(e: crate::db::DbError) -> Self {
        match e {
            crate::db::DbError::NotFound(m) => Self::NotFound(m),
            crate::db::DbError::InvalidInput(m) => Self::BadRequest(m),
            other => Self::Internal(other.to_string()),
        }
    }
}

type ApiResult<T> = Result<T, ApiError>;

/// Submitted URLs must be http(s) GitHub URLs
fn validate_repo_url(repo_url: &str) -> Result<(), ApiError> {
    let parsed = url::Url::parse(repo_url)
        .map_err(|_| ApiError::BadRequest(format!("Invalid repository URL: {repo_url}")))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ApiError::BadRequest(
            "Repository URL must use http or https".to_string(),
        ));
    }
    if !parsed.host_str().map(|h| h.contains("github.com")).unwrap_or(false) {
        return Err(ApiError::BadRequest(
            "Only GitHub repositories are supported".to_string(),
        ));
    }
    Ok(())
}

// ============================================================================
// Submission & Status
// ============================================================================

/// POST /api/analyze-repo
pub async fn analyze_repo(
    State(state): State<AppState>,
    Json(request): Json<AnalyzeRepoRequest>,
) -> ApiResult<impl IntoResponse> {
    validate_repo_url(&request.repo_url)?;
    let response = submit(&state, &request.repo_url, request.team_name.as_deref()).await?;
    Ok((StatusCode::ACCEPTED, Json(response)))
}

/// Shared submission path for single submits and batch rows
async fn submit(
    state: &AppState,
    repo_url: &str,
    team_name: Option<&str>,
) -> ApiResult<AnalyzeRepoResponse> {
    let project_id = match projects::get_project_by_url(&state.pool, repo_url).await? {
        Some(existing) if existing.blocks_resubmission() => {
            return Err(ApiError::Conflict(format!(
                "Repository already {}",
                existing.status
            )));
        }
        Some(existing) => {
            // Failed or pending: reset and re-analyze
            projects::reset_for_reanalysis(&state.pool, &existing.id, team_name).await?;
            existing.id
        }
        None => {
            projects::create_project(&state.pool, repo_url, team_name)
                .await?
                .id
        }
    };

    let job = jobs::create_job(&state.pool, &project_id).await?;
    state
        .worker
        .spawn_job(project_id.clone(), job.id.clone(), repo_url.to_string());

    Ok(AnalyzeRepoResponse {
        job_id: job.id,
        project_id,
        status: "queued".to_string(),
        message: "Analysis queued successfully".to_string(),
    })
}

/// GET /api/analysis-status/{job_id}
pub async fn analysis_status(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<Json<AnalysisStatusResponse>> {
    let job = jobs::get_job(&state.pool, &job_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Analysis job not found".to_string()))?;
    Ok(Json(AnalysisStatusResponse::from_job(job)))
}

/// GET /api/analysis-result/{job_id}
pub async fn analysis_result(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<Json<AnalysisResultResponse>> {
    let job = jobs::get_job(&state.pool, &job_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Analysis job not found".to_string()))?;

    if job.status() != JobStatus::Completed {
        return Err(ApiError::TooEarly(format!(
            "Analysis not completed yet. Current status: {}",
            job.status
        )));
    }

    let project = projects::get_project(&state.pool, &job.project_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Project not found".to_string()))?;

    let tech_stack = children::get_tech_stack(&state.pool, &project.id).await?;
    let issues = children::get_issues(&state.pool, &project.id).await?;
    let team_members = children::get_team_members(&state.pool, &project.id).await?;

    Ok(Json(AnalysisResultResponse::assemble(
        project,
        tech_stack,
        issues,
        team_members,
        Some(job),
    )))
}

// ============================================================================
// Projects
// ============================================================================

/// GET /api/projects/{id}
pub async fn project_detail(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
) -> ApiResult<Json<AnalysisResultResponse>> {
    let cache_key = ResponseCache::key("project", &[&project_id]);
    if let Some(cached) = state.cache.get::<serde_json::Value>(&cache_key).await {
        // Serve the memoized projection verbatim
        return serde_json::from_value(cached)
            .map(Json)
            .map_err(|e| ApiError::Internal(e.to_string()));
    }

    let project = projects::get_project(&state.pool, &project_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Project not found".to_string()))?;
    let completed = project.status() == ProjectStatus::Completed;

    let tech_stack = children::get_tech_stack(&state.pool, &project.id).await?;
    let issues = children::get_issues(&state.pool, &project.id).await?;
    let team_members = children::get_team_members(&state.pool, &project.id).await?;
    let latest_job = jobs::latest_job_for_project(&state.pool, &project.id).await?;
    let response =
        AnalysisResultResponse::assemble(project, tech_stack, issues, team_members, latest_job);

    // Only completed projects are stable enough to memoize
    if completed {
        if let Ok(value) = serde_json::to_value(&response) {
            state.cache.set(&cache_key, &value, cache::TTL_MEDIUM_SECS).await;
        }
    }

    Ok(Json(response))
}

async fn list_item(state: &AppState, project: &Project) -> ApiResult<ProjectListItem> {
    let tech_stack = children::get_tech_stack(&state.pool, &project.id).await?;
    let issues = children::get_issues(&state.pool, &project.id).await?;
    let security_issues = issues.iter().filter(|i| i.kind == "security").count();
    Ok(ProjectListItem {
        id: project.id.clone(),
        team_name: project.team_name.clone(),
        repo_url: project.repo_url.clone(),
        status: project.status.clone(),
        total_score: project.total_score,
        tech_stack: tech_stack.into_iter().map(|t| t.technology).collect(),
        security_issues,
        created_at: project.created_at,
        analyzed_at: project.analyzed_at,
    })
}

/// GET /api/projects
pub async fn list_projects(
    State(state): State<AppState>,
    Query(query): Query<ProjectListQuery>,
) -> ApiResult<Json<Vec<ProjectListItem>>> {
    let sort = query.sort.as_deref().unwrap_or("recent");
    if !matches!(sort, "recent" | "score") {
        return Err(ApiError::BadRequest(format!("Unknown sort key: {sort}")));
    }

    // Search results are not memoized
    let cache_key = ResponseCache::key(
        "projects",
        &[
            query.status.as_deref().unwrap_or(""),
            query.tech.as_deref().unwrap_or(""),
            sort,
        ],
    );
    if query.search.is_none() {
        if let Some(cached) = state.cache.get::<Vec<ProjectListItem>>(&cache_key).await {
            return Ok(Json(cached));
        }
    }

    let mut rows = projects::list_projects(&state.pool).await?;

    if let Some(status) = query.status.as_deref().filter(|s| *s != "all") {
        rows.retain(|p| p.status == status);
    }
    if let Some(search) = query.search.as_deref() {
        let needle = search.to_lowercase();
        rows.retain(|p| {
            p.team_name
                .as_deref()
                .map(|t| t.to_lowercase().contains(&needle))
                .unwrap_or(false)
                || p.repo_url.to_lowercase().contains(&needle)
        });
    }
    match sort {
        "score" => rows.sort_by(|a, b| {
            b.total_score
                .unwrap_or(0.0)
                .partial_cmp(&a.total_score.unwrap_or(0.0))
                .unwrap_or(std::cmp::Ordering::Equal)
        }),
        _ => rows.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
    }

    let mut items = Vec::with_capacity(rows.len());
    for project in &rows {
        let item = list_item(&state, project).await?;
        if let Some(tech) = query.tech.as_deref() {
            if !item.tech_stack.iter().any(|t| t == tech) {
                continue;
            }
        }
        items.push(item);
    }

    if query.search.is_none() {
        state.cache.set(&cache_key, &items, cache::TTL_SHORT_SECS).await;
    }
    Ok(Json(items))
}

/// DELETE /api/projects/{id}
pub async fn delete_project(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
) -> ApiResult<StatusCode> {
    let removed = projects::delete_project(&state.pool, &project_id).await?;
    if !removed {
        return Err(ApiError::NotFound("Project not found".to_string()));
    }
    state.cache.invalidate_project(&project_id).await;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Leaderboard & Stats
// ============================================================================

/// Sort keys accepted by the leaderboard, mapped to score columns
fn leaderboard_column(sort: &str) -> Option<&'static str> {
    match sort {
        "total" => Some("total_score"),
        "quality" => Some("quality_score"),
        "security" => Some("security_score"),
        "originality" => Some("originality_score"),
        "architecture" => Some("engineering_score"),
        "documentation" => Some("documentation_score"),
        _ => None,
    }
}

/// GET /api/leaderboard
pub async fn leaderboard(
    State(state): State<AppState>,
    Query(query): Query<LeaderboardQuery>,
) -> ApiResult<Json<Vec<LeaderboardEntry>>> {
    let sort = query.sort.as_deref().unwrap_or("total");
    let column = leaderboard_column(sort)
        .ok_or_else(|| ApiError::BadRequest(format!("Unknown sort key: {sort}")))?;

    let cache_key =
        ResponseCache::key("leaderboard", &[query.tech.as_deref().unwrap_or(""), sort]);
    if query.search.is_none() {
        if let Some(cached) = state.cache.get::<Vec<LeaderboardEntry>>(&cache_key).await {
            return Ok(Json(cached));
        }
    }

    let mut rows = projects::leaderboard(&state.pool, column).await?;
    if let Some(search) = query.search.as_deref() {
        let needle = search.to_lowercase();
        rows.retain(|p| {
            p.team_name
                .as_deref()
                .map(|t| t.to_lowercase().contains(&needle))
                .unwrap_or(false)
        });
    }

    let mut entries = Vec::with_capacity(rows.len());
    for project in rows {
        let tech_stack = children::get_tech_stack(&state.pool, &project.id).await?;
        let tech_names: Vec<String> = tech_stack.into_iter().map(|t| t.technology).collect();
        if let Some(tech) = query.tech.as_deref() {
            if !tech_names.iter().any(|t| t == tech) {
                continue;
            }
        }
        entries.push(LeaderboardEntry {
            rank: entries.len() + 1,
            id: project.id,
            team_name: project.team_name,
            repo_url: project.repo_url,
            total_score: project.total_score.unwrap_or(0.0),
            originality_score: project.originality_score.unwrap_or(0.0),
            quality_score: project.quality_score.unwrap_or(0.0),
            security_score: project.security_score.unwrap_or(0.0),
            architecture_score: project.engineering_score.unwrap_or(0.0),
            documentation_score: project.documentation_score.unwrap_or(0.0),
            tech_stack: tech_names,
        });
    }

    if query.search.is_none() {
        state.cache.set(&cache_key, &entries, cache::TTL_SHORT_SECS).await;
    }
    Ok(Json(entries))
}

/// GET /api/leaderboard/chart
pub async fn leaderboard_chart(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<ChartEntry>>> {
    let cache_key = ResponseCache::key("leaderboard:chart", &[]);
    if let Some(cached) = state.cache.get::<Vec<ChartEntry>>(&cache_key).await {
        return Ok(Json(cached));
    }

    let rows = projects::leaderboard(&state.pool, "total_score").await?;
    let chart: Vec<ChartEntry> = rows
        .into_iter()
        .take(10)
        .map(|p| ChartEntry {
            team_name: p.team_name,
            total_score: p.total_score.unwrap_or(0.0),
            quality_score: p.quality_score.unwrap_or(0.0),
            security_score: p.security_score.unwrap_or(0.0),
            originality_score: p.originality_score.unwrap_or(0.0),
            architecture_score: p.engineering_score.unwrap_or(0.0),
            documentation_score: p.documentation_score.unwrap_or(0.0),
        })
        .collect();

    state.cache.set(&cache_key, &chart, cache::TTL_CHART_SECS).await;
    Ok(Json(chart))
}

/// GET /api/stats
pub async fn dashboard_stats(State(state): State<AppState>) -> ApiResult<Json<DashboardStats>> {
    let cache_key = ResponseCache::key("stats", &[]);
    if let Some(cached) = state.cache.get::<DashboardStats>(&cache_key).await {
        return Ok(Json(cached));
    }

    let rows = projects::list_projects(&state.pool).await?;
    let completed: Vec<&Project> = rows.iter().filter(|p| p.status == "completed").collect();
    let pending = rows
        .iter()
        .filter(|p| matches!(p.status.as_str(), "pending" | "analyzing"))
        .count();

    let average_score = if completed.is_empty() {
        0.0
    } else {
        let sum: f64 = completed.iter().filter_map(|p| p.total_score).sum();
        ((sum / completed.len() as f64) * 10.0).round() / 10.0
    };

    let mut total_security_issues = 0usize;
    for project in &completed {
        let issues = children::get_issues(&state.pool, &project.id).await?;
        total_security_issues += issues.iter().filter(|i| i.kind == "security").count();
    }

    let stats = DashboardStats {
        total_projects: rows.len(),
        completed_projects: completed.len(),
        pending_projects: pending,
        average_score,
        total_security_issues,
    };

    state.cache.set(&cache_key, &stats, cache::TTL_SHORT_SECS).await;
    Ok(Json(stats))
}

/// GET /api/tech-stacks
pub async fn tech_stacks(State(state): State<AppState>) -> ApiResult<Json<Vec<TechHistogramEntry>>> {
    let rows = projects::list_projects(&state.pool).await?;
    let mut counts: std::collections::HashMap<String, usize> = std::collections::HashMap::new();
    for project in &rows {
        for entry in children::get_tech_stack(&state.pool, &project.id).await? {
            *counts.entry(entry.technology).or_insert(0) += 1;
        }
    }
    let mut histogram: Vec<TechHistogramEntry> = counts
        .into_iter()
        .map(|(name, count)| TechHistogramEntry { name, count })
        .collect();
    histogram.sort_by(|a, b| b.count.cmp(&a.count).then(a.name.cmp(&b.name)));
    Ok(Json(histogram))
}

// ============================================================================
// Batch Upload
// ============================================================================

/// POST /api/batch-upload
///
/// Multipart CSV with required `teamName`/`repoUrl` columns. Rows with
/// missing fields or invalid URLs are reported per row; valid rows queue
/// analysis jobs exactly like single submissions.
pub async fn batch_upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<impl IntoResponse> {
    let mut csv_bytes: Option<Vec<u8>> = None;
    while let Ok(Some(field)) = multipart.next_field().await {
        if field.name() == Some("file") {
            csv_bytes = field.bytes().await.ok().map(|b| b.to_vec());
            break;
        }
    }
    let csv_bytes =
        csv_bytes.ok_or_else(|| ApiError::BadRequest("Missing CSV file field".to_string()))?;

    let mut reader = csv::Reader::from_reader(csv_bytes.as_slice());
    let headers = reader
        .headers()
        .map_err(|e| ApiError::BadRequest(format!("Unreadable CSV header: {e}")))?
        .clone();

    let team_idx = headers.iter().position(|h| h == "teamName");
    let url_idx = headers.iter().position(|h| h == "repoUrl");
    let (Some(team_idx), Some(url_idx)) = (team_idx, url_idx) else {
        return Err(ApiError::BadRequest(
            "CSV missing required columns: teamName, repoUrl".to_string(),
        ));
    };

    let mut queued = Vec::new();
    let mut errors = Vec::new();

    // Header is row 1, data starts at row 2
    for (offset, record) in reader.records().enumerate() {
        let row = offset + 2;
        let record = match record {
            Ok(r) => r,
            Err(e) => {
                errors.push(BatchFailedRow { row, error: format!("Unparseable row: {e}") });
                continue;
            }
        };
        let team_name = record.get(team_idx).unwrap_or("").trim().to_string();
        let repo_url = record.get(url_idx).unwrap_or("").trim().to_string();

        if team_name.is_empty() || repo_url.is_empty() {
            errors.push(BatchFailedRow { row, error: "Missing teamName or repoUrl".to_string() });
            continue;
        }
        if let Err(ApiError::BadRequest(message)) = validate_repo_url(&repo_url) {
            errors.push(BatchFailedRow { row, error: message });
            continue;
        }

        match submit(&state, &repo_url, Some(&team_name)).await {
            Ok(response) => queued.push(BatchQueuedRow {
                row,
                team_name,
                repo_url,
                job_id: response.job_id,
                project_id: response.project_id,
            }),
            Err(ApiError::Conflict(message)) | Err(ApiError::BadRequest(message)) => {
                errors.push(BatchFailedRow { row, error: message });
            }
            Err(other) => return Err(other),
        }
    }

    let response = BatchUploadResponse {
        success: queued.len(),
        failed: errors.len(),
        total: queued.len() + errors.len(),
        queued,
        errors,
    };
    Ok((StatusCode::ACCEPTED, Json(response)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_validation() {
        assert!(validate_repo_url("https://github.com/octocat/Hello-World").is_ok());
        assert!(validate_repo_url("http://github.com/a/b").is_ok());
        assert!(validate_repo_url("ftp://example.com/x").is_err());
        assert!(validate_repo_url("https://gitlab.com/a/b").is_err());
        assert!(validate_repo_url("not a url").is_err());
    }

    #[test]
    fn test_leaderboard_sort_allowlist() {
        assert_eq!(leaderboard_column("total"), Some("total_score"));
        assert_eq!(leaderboard_column("architecture"), Some("engineering_score"));
        assert_eq!(leaderboard_column("effort"), None);
        assert_eq!(leaderboard_column("; DROP TABLE projects"), None);
    }
}
