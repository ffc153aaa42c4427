//! Process-wide configuration
//!
//! Collected once at startup from environment variables (a `.env` file is
//! honored via dotenvy). Everything downstream receives the config by
//! reference; nothing else reads the environment.

use serde::{Deserialize, Serialize};

/// Default number of concurrently running analysis jobs.
///
/// Each job clones a repository and fans out nine detectors, so the pool
/// stays small to bound disk and network load.
pub const DEFAULT_WORKER_POOL_SIZE: usize = 2;

/// Service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// SQLite database URL (e.g. `sqlite:data/repojudge.db?mode=rwc`)
    pub database_url: String,

    /// Optional Redis URL; caching is disabled when absent
    pub redis_url: Option<String>,

    /// API key for the LLM judge; the judge is skipped when absent
    pub judge_api_key: Option<String>,

    /// Optional external origin-detector endpoint (joins the ensemble)
    pub origin_detector_url: Option<String>,

    /// Credential for the external origin detector
    pub origin_detector_key: Option<String>,

    /// HTTP bind host
    pub host: String,

    /// HTTP bind port
    pub port: u16,

    /// Maximum concurrently running analysis jobs
    pub worker_pool_size: usize,

    /// Security score never drops below this floor
    pub security_score_floor: u32,

    /// Cap on the total security penalty
    pub security_penalty_cap: u32,

    /// Penalty per leaked secret
    pub security_penalty_per_leak: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: "sqlite:data/repojudge.db?mode=rwc".to_string(),
            redis_url: None,
            judge_api_key: None,
            origin_detector_url: None,
            origin_detector_key: None,
            host: "0.0.0.0".to_string(),
            port: 8000,
            worker_pool_size: DEFAULT_WORKER_POOL_SIZE,
            security_score_floor: 20,
            security_penalty_cap: 80,
            security_penalty_per_leak: 10,
        }
    }
}

impl Config {
    /// Load configuration from the environment
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let defaults = Self::default();

        Self {
            database_url: std::env::var("DATABASE_URL").unwrap_or(defaults.database_url),
            redis_url: std::env::var("REDIS_URL").ok().filter(|s| !s.is_empty()),
            judge_api_key: std::env::var("JUDGE_API_KEY")
                .or_else(|_| std::env::var("XAI_API_KEY"))
                .ok()
                .filter(|s| !s.is_empty()),
            origin_detector_url: std::env::var("ORIGIN_DETECTOR_URL")
                .ok()
                .filter(|s| !s.is_empty()),
            origin_detector_key: std::env::var("ORIGIN_DETECTOR_KEY")
                .ok()
                .filter(|s| !s.is_empty()),
            host: std::env::var("HOST").unwrap_or(defaults.host),
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            worker_pool_size: std::env::var("WORKER_POOL_SIZE")
                .ok()
                .and_then(|p| p.parse().ok())
                .filter(|&n| n > 0)
                .unwrap_or(defaults.worker_pool_size),
            security_score_floor: defaults.security_score_floor,
            security_penalty_cap: defaults.security_penalty_cap,
            security_penalty_per_leak: defaults.security_penalty_per_leak,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.worker_pool_size, DEFAULT_WORKER_POOL_SIZE);
        assert_eq!(config.security_score_floor, 20);
        assert_eq!(config.security_penalty_per_leak, 10);
        assert!(config.judge_api_key.is_none());
    }
}
