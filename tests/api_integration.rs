//! HTTP surface tests
//!
//! Spins up the full router on an ephemeral port against a scratch SQLite
//! database (cache disabled, judge skipped) and exercises the status-code
//! contract: 202/400/404/409/425, delete cascade, and the list/
//! leaderboard/stats projections.

use repojudge::db;
use repojudge::{AppState, Config};
use serde_json::{json, Value};
use std::time::Duration;
use tokio::time::sleep;

// ============================================================================
// Test Setup
// ============================================================================

struct TestServer {
    base_url: String,
    pool: sqlx::SqlitePool,
    client: reqwest::Client,
    _db_dir: tempfile::TempDir,
}

async fn start_server() -> TestServer {
    let db_dir = tempfile::tempdir().expect("tempdir");
    let database_url = format!("sqlite:{}", db_dir.path().join("api.db").display());

    let config = Config {
        database_url,
        redis_url: None,
        judge_api_key: None,
        ..Config::default()
    };

    let state = AppState::new(config).await.expect("app state");
    let pool = state.pool.clone();
    let app = repojudge::server::build_router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });
    sleep(Duration::from_millis(50)).await;

    TestServer {
        base_url: format!("http://{addr}"),
        pool,
        client: reqwest::Client::new(),
        _db_dir: db_dir,
    }
}

impl TestServer {
    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Insert a completed project directly, bypassing the pipeline
    async fn seed_completed(&self, repo_url: &str, team: &str, total: f64) -> String {
        let project = db::projects::create_project(&self.pool, repo_url, Some(team))
            .await
            .expect("create project");
        let update = db::ProjectUpdate {
            total_score: total,
            originality_score: 90.0,
            quality_score: 70.0,
            security_score: 100.0,
            effort_score: 40.0,
            implementation_score: 60.0,
            engineering_score: 50.0,
            organization_score: 100.0,
            documentation_score: 30.0,
            total_commits: 12,
            verdict: Some("Prototype".to_string()),
            ..Default::default()
        };
        db::projects::complete_analysis(&self.pool, &project.id, &update)
            .await
            .expect("complete");
        db::children::add_technologies(
            &self.pool,
            &project.id,
            &[("Rust".to_string(), "language".to_string())],
        )
        .await
        .expect("tech");
        project.id
    }
}

// ============================================================================
// Submission validation
// ============================================================================

#[tokio::test]
async fn bad_url_is_rejected_without_side_effects() {
    let server = start_server().await;

    for bad in ["ftp://example.com/x", "https://gitlab.com/a/b", "not-a-url"] {
        let response = server
            .client
            .post(server.url("/api/analyze-repo"))
            .json(&json!({ "repo_url": bad }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 400, "{bad} should be rejected");
    }

    // No project rows were created
    let rows = db::projects::list_projects(&server.pool).await.unwrap();
    assert!(rows.is_empty());
}

#[tokio::test]
async fn submission_returns_accepted_with_job_handle() {
    let server = start_server().await;

    let response = server
        .client
        .post(server.url("/api/analyze-repo"))
        .json(&json!({
            "repo_url": "https://github.com/octocat/Hello-World",
            "team_name": "T1"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 202);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "queued");
    assert!(!body["job_id"].as_str().unwrap().is_empty());
    assert!(!body["project_id"].as_str().unwrap().is_empty());

    // The status endpoint knows the job immediately
    let status = server
        .client
        .get(server.url(&format!("/api/analysis-status/{}", body["job_id"].as_str().unwrap())))
        .send()
        .await
        .unwrap();
    assert_eq!(status.status(), 200);
}

#[tokio::test]
async fn duplicate_submission_conflicts() {
    let server = start_server().await;
    server
        .seed_completed("https://github.com/octocat/Hello-World", "T1", 80.0)
        .await;

    let response = server
        .client
        .post(server.url("/api/analyze-repo"))
        .json(&json!({ "repo_url": "https://github.com/octocat/Hello-World" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 409);
}

#[tokio::test]
async fn analyzing_project_also_conflicts() {
    let server = start_server().await;
    let project = db::projects::create_project(
        &server.pool,
        "https://github.com/octocat/busy",
        None,
    )
    .await
    .unwrap();
    db::projects::update_status(&server.pool, &project.id, db::ProjectStatus::Analyzing)
        .await
        .unwrap();

    let response = server
        .client
        .post(server.url("/api/analyze-repo"))
        .json(&json!({ "repo_url": "https://github.com/octocat/busy" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 409);
}

// ============================================================================
// Status & results
// ============================================================================

#[tokio::test]
async fn unknown_job_is_not_found() {
    let server = start_server().await;
    let response = server
        .client
        .get(server.url("/api/analysis-status/no-such-job"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn result_before_completion_is_too_early() {
    let server = start_server().await;
    let project = db::projects::create_project(
        &server.pool,
        "https://github.com/octocat/pending",
        None,
    )
    .await
    .unwrap();
    let job = db::jobs::create_job(&server.pool, &project.id).await.unwrap();

    let response = server
        .client
        .get(server.url(&format!("/api/analysis-result/{}", job.id)))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 425);
}

#[tokio::test]
async fn completed_result_includes_scores_and_children() {
    let server = start_server().await;
    let project_id = server
        .seed_completed("https://github.com/octocat/done", "T2", 72.5)
        .await;
    let job = db::jobs::create_job(&server.pool, &project_id).await.unwrap();
    db::jobs::complete_job(&server.pool, &job.id).await.unwrap();

    let response = server
        .client
        .get(server.url(&format!("/api/analysis-result/{}", job.id)))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["scores"]["total_score"], 72.5);
    assert_eq!(body["verdict"], "Prototype");
    assert_eq!(body["tech_stack"][0]["technology"], "Rust");
}

// ============================================================================
// Projects, leaderboard, stats
// ============================================================================

#[tokio::test]
async fn delete_project_cascades() {
    let server = start_server().await;
    let project_id = server
        .seed_completed("https://github.com/octocat/gone", "T3", 50.0)
        .await;
    let job = db::jobs::create_job(&server.pool, &project_id).await.unwrap();

    let response = server
        .client
        .delete(server.url(&format!("/api/projects/{project_id}")))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 204);

    // Everything the project owned is gone
    assert!(db::projects::get_project(&server.pool, &project_id)
        .await
        .unwrap()
        .is_none());
    assert!(db::jobs::get_job(&server.pool, &job.id).await.unwrap().is_none());
    assert!(db::children::get_tech_stack(&server.pool, &project_id)
        .await
        .unwrap()
        .is_empty());

    // A second delete is a 404
    let again = server
        .client
        .delete(server.url(&format!("/api/projects/{project_id}")))
        .send()
        .await
        .unwrap();
    assert_eq!(again.status(), 404);
}

#[tokio::test]
async fn leaderboard_ranks_completed_projects() {
    let server = start_server().await;
    server.seed_completed("https://github.com/a/low", "Low", 40.0).await;
    server.seed_completed("https://github.com/a/high", "High", 90.0).await;
    // Pending projects never appear
    db::projects::create_project(&server.pool, "https://github.com/a/pending", None)
        .await
        .unwrap();

    let response = server
        .client
        .get(server.url("/api/leaderboard"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let body: Value = response.json().await.unwrap();
    let entries = body.as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["teamName"], "High");
    assert_eq!(entries[0]["rank"], 1);
    assert_eq!(entries[1]["teamName"], "Low");
    assert_eq!(entries[1]["rank"], 2);

    // Unknown sort keys are rejected
    let bad_sort = server
        .client
        .get(server.url("/api/leaderboard?sort=effort"))
        .send()
        .await
        .unwrap();
    assert_eq!(bad_sort.status(), 400);
}

#[tokio::test]
async fn chart_returns_top_ten_projection() {
    let server = start_server().await;
    for i in 0..12 {
        server
            .seed_completed(
                &format!("https://github.com/a/p{i}"),
                &format!("Team{i}"),
                50.0 + i as f64,
            )
            .await;
    }

    let response = server
        .client
        .get(server.url("/api/leaderboard/chart"))
        .send()
        .await
        .unwrap();
    let body: Value = response.json().await.unwrap();
    let entries = body.as_array().unwrap();
    assert_eq!(entries.len(), 10);
    assert_eq!(entries[0]["teamName"], "Team11");
    assert!(entries[0]["totalScore"].as_f64().unwrap() >= entries[9]["totalScore"].as_f64().unwrap());
}

#[tokio::test]
async fn stats_count_by_status() {
    let server = start_server().await;
    server.seed_completed("https://github.com/a/done", "Done", 80.0).await;
    db::projects::create_project(&server.pool, "https://github.com/a/waiting", None)
        .await
        .unwrap();

    let response = server
        .client
        .get(server.url("/api/stats"))
        .send()
        .await
        .unwrap();
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["totalProjects"], 2);
    assert_eq!(body["completedProjects"], 1);
    assert_eq!(body["pendingProjects"], 1);
    assert_eq!(body["averageScore"], 80.0);
}

#[tokio::test]
async fn project_list_filters_by_status_and_search() {
    let server = start_server().await;
    server.seed_completed("https://github.com/a/widget", "Widget Makers", 70.0).await;
    db::projects::create_project(&server.pool, "https://github.com/a/other", Some("Other"))
        .await
        .unwrap();

    let completed: Value = server
        .client
        .get(server.url("/api/projects?status=completed"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(completed.as_array().unwrap().len(), 1);

    let searched: Value = server
        .client
        .get(server.url("/api/projects?search=widget"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(searched.as_array().unwrap().len(), 1);
    assert_eq!(searched[0]["teamName"], "Widget Makers");

    let histogram: Value = server
        .client
        .get(server.url("/api/tech-stacks"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(histogram[0]["name"], "Rust");
}

// ============================================================================
// Batch upload
// ============================================================================

#[tokio::test]
async fn batch_upload_reports_row_errors() {
    let server = start_server().await;

    let csv = "teamName,repoUrl\n\
               Alpha,https://github.com/batch/alpha\n\
               ,https://github.com/batch/missing-team\n\
               Gamma,ftp://bad.example.com/repo\n";
    let part = reqwest::multipart::Part::bytes(csv.as_bytes().to_vec())
        .file_name("batch.csv")
        .mime_str("text/csv")
        .unwrap();
    let form = reqwest::multipart::Form::new().part("file", part);

    let response = server
        .client
        .post(server.url("/api/batch-upload"))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 202);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], 1);
    assert_eq!(body["failed"], 2);
    assert_eq!(body["total"], 3);
    assert_eq!(body["queued"][0]["teamName"], "Alpha");
    // Row numbers are reported relative to the header
    assert_eq!(body["errors"][0]["row"], 3);
}

#[tokio::test]
async fn batch_upload_requires_columns() {
    let server = start_server().await;

    let csv = "name,url\nAlpha,https://github.com/batch/alpha\n";
    let part = reqwest::multipart::Part::bytes(csv.as_bytes().to_vec())
        .file_name("batch.csv")
        .mime_str("text/csv")
        .unwrap();
    let form = reqwest::multipart::Form::new().part("file", part);

    let response = server
        .client
        .post(server.url("/api/batch-upload"))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
}
