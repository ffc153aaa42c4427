//! Analysis API server entry point

use repojudge::{run_server, Config};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env();
    info!(
        "Starting RepoJudge server on {}:{} (workers: {}, judge: {}, cache: {})",
        config.host,
        config.port,
        config.worker_pool_size,
        if config.judge_api_key.is_some() { "enabled" } else { "disabled" },
        if config.redis_url.is_some() { "configured" } else { "disabled" },
    );

    run_server(config).await?;
    Ok(())
}
