//! Response cache port
//!
//! Redis-backed memoization for the read-heavy HTTP endpoints, with short
//! TTLs. The cache is strictly optional: when `REDIS_URL` is unset or the
//! connection fails, every operation silently degrades to a miss and the
//! handlers fall through to direct reads.

use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

/// Key namespace prefix
const NAMESPACE: &str = "repojudge";

/// TTL for list/stats payloads (frequently changing)
pub const TTL_SHORT_SECS: u64 = 30;

/// TTL for completed-project detail (changes rarely)
pub const TTL_MEDIUM_SECS: u64 = 300;

/// TTL for the leaderboard chart
pub const TTL_CHART_SECS: u64 = 60;

/// Optional Redis-backed response cache
#[derive(Clone)]
pub struct ResponseCache {
    manager: Option<ConnectionManager>,
}

impl ResponseCache {
    /// Connect to Redis; any failure disables caching silently
    pub async fn connect(redis_url: Option<&str>) -> Self {
        let Some(url) = redis_url else {
            info!("No cache URL configured - caching disabled");
            return Self { manager: None };
        };

        let manager = match redis::Client::open(url) {
            Ok(client) => match ConnectionManager::new(client).await {
                Ok(manager) => {
                    info!("Cache connected");
                    Some(manager)
                }
                Err(e) => {
                    warn!("Cache connection failed ({e}) - caching disabled");
                    None
                }
            },
            Err(e) => {
                warn!("Invalid cache URL ({e}) - caching disabled");
                None
            }
        };

        Self { manager }
    }

    /// A cache that never hits (tests, CLI runs)
    pub fn disabled() -> Self {
        Self { manager: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.manager.is_some()
    }

    /// Namespaced key; variable parts are hashed to keep keys bounded
    pub fn key(prefix: &str, parts: &[&str]) -> String {
        if parts.is_empty() {
            return format!("{NAMESPACE}:{prefix}");
        }
        let mut hasher = Sha256::new();
        for part in parts {
            hasher.update(part.as_bytes());
            hasher.update([0u8]);
        }
        let digest = hex::encode(hasher.finalize());
        format!("{NAMESPACE}:{prefix}:{}", &digest[..12])
    }

    /// Fetch and deserialize a cached value
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let mut conn = self.manager.clone()?;
        match conn.get::<_, Option<String>>(key).await {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(value) => {
                    debug!("Cache HIT: {key}");
                    Some(value)
                }
                Err(e) => {
                    warn!("Cache entry for {key} undeserializable: {e}");
                    None
                }
            },
            Ok(None) => {
                debug!("Cache MISS: {key}");
                None
            }
            Err(e) => {
                warn!("Cache read failed for {key}: {e}");
                None
            }
        }
    }

    /// Serialize and store a value with a TTL
    pub async fn set<T: Serialize>(&self, key: &str, value: &T, ttl_secs: u64) {
        let Some(mut conn) = self.manager.clone() else {
            return;
        };
        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Cache value for {key} unserializable: {e}");
                return;
            }
        };
        if let Err(e) = conn.set_ex::<_, _, ()>(key, raw, ttl_secs).await {
            warn!("Cache write failed for {key}: {e}");
        }
    }

    /// Delete every key under a namespace prefix (SCAN + DEL)
    async fn invalidate_prefix(&self, prefix: &str) {
        let Some(mut conn) = self.manager.clone() else {
            return;
        };
        let pattern = format!("{NAMESPACE}:{prefix}*");
        let mut cursor: u64 = 0;
        loop {
            let result: Result<(u64, Vec<String>), _> = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(100)
                .query_async(&mut conn)
                .await;
            let (next, keys) = match result {
                Ok(pair) => pair,
                Err(e) => {
                    warn!("Cache scan failed for {pattern}: {e}");
                    return;
                }
            };
            if !keys.is_empty() {
                if let Err(e) = conn.del::<_, ()>(keys).await {
                    warn!("Cache delete failed for {pattern}: {e}");
                }
            }
            cursor = next;
            if cursor == 0 {
                break;
            }
        }
    }

    /// Invalidate everything affected by a completed or deleted project:
    /// its detail entry plus the aggregate namespaces.
    pub async fn invalidate_project(&self, project_id: &str) {
        if self.manager.is_none() {
            return;
        }
        let detail_key = Self::key("project", &[project_id]);
        if let Some(mut conn) = self.manager.clone() {
            if let Err(e) = conn.del::<_, ()>(&detail_key).await {
                warn!("Cache delete failed for {detail_key}: {e}");
            }
        }
        for prefix in ["projects", "leaderboard", "stats"] {
            self.invalidate_prefix(prefix).await;
        }
        debug!("Cache invalidated for project {project_id}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_shapes() {
        assert_eq!(ResponseCache::key("stats", &[]), "repojudge:stats");
        let k1 = ResponseCache::key("projects", &["completed", "recent"]);
        let k2 = ResponseCache::key("projects", &["completed", "recent"]);
        let k3 = ResponseCache::key("projects", &["completed", "score"]);
        assert_eq!(k1, k2);
        assert_ne!(k1, k3);
        assert!(k1.starts_with("repojudge:projects:"));
    }

    #[tokio::test]
    async fn test_disabled_cache_degrades_silently() {
        let cache = ResponseCache::disabled();
        assert!(!cache.is_enabled());
        cache.set("repojudge:stats", &42u32, TTL_SHORT_SECS).await;
        let value: Option<u32> = cache.get("repojudge:stats").await;
        assert!(value.is_none());
        cache.invalidate_project("nope").await;
    }
}
