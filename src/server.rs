//! Axum API server for the analysis service
//!
//! Wires the shared application state (database pool, cache port, worker
//! pool) into the router and serves it. CORS is restricted to configured
//! origins; request tracing is applied to every route.

use axum::extract::State;
use axum::http::{header, Method, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::cache::ResponseCache;
use crate::config::Config;
use crate::db;
use crate::error::{AnalysisError, Result};
use crate::worker::AnalysisWorker;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub pool: sqlx::SqlitePool,
    pub cache: ResponseCache,
    pub worker: Arc<AnalysisWorker>,
}

impl AppState {
    /// Create new application state
    pub async fn new(config: Config) -> Result<Self> {
        let pool = db::init_db(&config.database_url).await?;
        let cache = ResponseCache::connect(config.redis_url.as_deref()).await;
        let worker = Arc::new(AnalysisWorker::new(pool.clone(), cache.clone(), config.clone()));

        Ok(Self {
            config: Arc::new(config),
            pool,
            cache,
            worker,
        })
    }
}

/// Run the analysis server
pub async fn run_server(config: Config) -> Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let socket_addr: SocketAddr = addr
        .parse()
        .map_err(|e| AnalysisError::config(format!("Invalid server address: {e}")))?;

    let state = AppState::new(config).await?;
    let app = build_router(state);

    info!("Analysis API listening on {}", socket_addr);
    let listener = tokio::net::TcpListener::bind(&socket_addr)
        .await
        .map_err(|e| AnalysisError::config(format!("Failed to bind to {socket_addr}: {e}")))?;

    axum::serve(listener, app)
        .await
        .map_err(|e| AnalysisError::Pipeline(format!("Server error: {e}")))?;

    Ok(())
}

/// Assemble the full router (also used by the integration tests)
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .merge(crate::api::create_api_router())
        .layer(build_cors_layer())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Root endpoint: service info + endpoint map
async fn root() -> impl IntoResponse {
    Json(json!({
        "name": "RepoJudge Analysis API",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running",
        "endpoints": {
            "analyze": "POST /api/analyze-repo",
            "status": "GET /api/analysis-status/{job_id}",
            "result": "GET /api/analysis-result/{job_id}",
            "batch_upload": "POST /api/batch-upload",
            "project_list": "GET /api/projects?status=&tech=&sort=&search=",
            "project_detail": "GET /api/projects/{id}",
            "delete_project": "DELETE /api/projects/{id}",
            "leaderboard": "GET /api/leaderboard?tech=&sort=&search=",
            "leaderboard_chart": "GET /api/leaderboard/chart",
            "stats": "GET /api/stats",
            "tech_stacks": "GET /api/tech-stacks",
        }
    }))
}

/// Health check: verifies database reachability
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let db_healthy = sqlx::query("SELECT 1").fetch_one(&state.pool).await.is_ok();
    let body = json!({
        "status": if db_healthy { "healthy" } else { "unhealthy" },
        "database": if db_healthy { "connected" } else { "error" },
        "cache": if state.cache.is_enabled() { "connected" } else { "disabled" },
    });
    let status = if db_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(body))
}

/// Restrictive CORS: only configured origins, common methods and headers
fn build_cors_layer() -> CorsLayer {
    let allowed_origins: Vec<String> = std::env::var("CORS_ALLOWED_ORIGINS")
        .map(|s| s.split(',').map(|o| o.trim().to_string()).collect())
        .unwrap_or_else(|_| {
            vec![
                "http://localhost:3000".to_string(),
                "http://127.0.0.1:3000".to_string(),
            ]
        });

    CorsLayer::new()
        .allow_origin(
            allowed_origins
                .iter()
                .filter_map(|o| o.parse().ok())
                .collect::<Vec<header::HeaderValue>>(),
        )
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT])
}
