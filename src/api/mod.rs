//! HTTP API module
//!
//! Router assembly for the analysis service. The handlers are thin
//! adapters: validation, status-code mapping, and response shaping live
//! here; everything else is the core's business.

pub mod handlers;
pub mod types;

pub use types::*;

use axum::routing::{delete, get, post};
use axum::Router;

use crate::server::AppState;

/// Build the API router; state is applied by the caller
pub fn create_api_router() -> Router<AppState> {
    Router::new()
        // Analysis
        .route("/api/analyze-repo", post(handlers::analyze_repo))
        .route("/api/analysis-status/:job_id", get(handlers::analysis_status))
        .route("/api/analysis-result/:job_id", get(handlers::analysis_result))
        .route("/api/batch-upload", post(handlers::batch_upload))
        // Projects
        .route("/api/projects", get(handlers::list_projects))
        .route("/api/projects/:id", get(handlers::project_detail))
        .route("/api/projects/:id", delete(handlers::delete_project))
        // Leaderboard & stats
        .route("/api/leaderboard", get(handlers::leaderboard))
        .route("/api/leaderboard/chart", get(handlers::leaderboard_chart))
        .route("/api/stats", get(handlers::dashboard_stats))
        .route("/api/tech-stacks", get(handlers::tech_stacks))
}
