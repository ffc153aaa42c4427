//! Job progress reporting
//!
//! Detector nodes emit a stage label + percent when they start. Reporters
//! are best-effort sinks: a failed progress write is logged, never raised.
//! The runner coalesces updates so published percents are monotonically
//! non-decreasing even though detectors start concurrently.

use async_trait::async_trait;
use sqlx::SqlitePool;
use std::sync::atomic::{AtomicU8, Ordering};
use tracing::{debug, warn};

/// Stage labels in pipeline order with their entry percents
pub const STAGE_PROGRESS: &[(&str, u8)] = &[
    ("starting", 0),
    ("cloning", 10),
    ("stack_detection", 20),
    ("structure_analysis", 30),
    ("maturity_check", 40),
    ("commit_forensics", 50),
    ("quality_check", 60),
    ("security_scan", 70),
    ("origin_scan", 80),
    ("ai_judge", 90),
    ("aggregation", 95),
    ("completed", 100),
];

/// Percent for a stage label; unknown stages map to 0
pub fn stage_percent(stage: &str) -> u8 {
    STAGE_PROGRESS
        .iter()
        .find(|(name, _)| *name == stage)
        .map(|&(_, pct)| pct)
        .unwrap_or(0)
}

/// Sink for stage/percent notifications
#[async_trait]
pub trait ProgressReporter: Send + Sync {
    async fn report(&self, stage: &str, percent: u8);
}

/// Reporter that drops all updates (CLI one-shot runs, tests)
pub struct NullProgress;

#[async_trait]
impl ProgressReporter for NullProgress {
    async fn report(&self, _stage: &str, _percent: u8) {}
}

/// Reporter that persists progress onto the job row.
///
/// Writes are non-critical: failures are logged and swallowed so a flaky
/// store cannot fail an otherwise healthy analysis.
pub struct DbProgressTracker {
    pool: SqlitePool,
    job_id: String,
}

impl DbProgressTracker {
    pub fn new(pool: SqlitePool, job_id: impl Into<String>) -> Self {
        Self { pool, job_id: job_id.into() }
    }
}

#[async_trait]
impl ProgressReporter for DbProgressTracker {
    async fn report(&self, stage: &str, percent: u8) {
        debug!("Progress {}: {}% - {}", self.job_id, percent, stage);
        if let Err(e) =
            crate::db::jobs::update_progress(&self.pool, &self.job_id, percent as i64, stage).await
        {
            warn!("Failed to persist progress for job {}: {}", self.job_id, e);
        }
    }
}

/// Monotonic gate used by the runner: admits an update only when it does
/// not decrease the highest percent already published.
pub struct ProgressGate {
    last: AtomicU8,
}

impl ProgressGate {
    pub fn new() -> Self {
        Self { last: AtomicU8::new(0) }
    }

    /// True when `percent` should be published
    pub fn admit(&self, percent: u8) -> bool {
        let mut current = self.last.load(Ordering::Acquire);
        loop {
            if percent < current {
                return false;
            }
            match self.last.compare_exchange_weak(
                current,
                percent,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(observed) => current = observed,
            }
        }
    }

    pub fn highest(&self) -> u8 {
        self.last.load(Ordering::Acquire)
    }
}

impl Default for ProgressGate {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_mapping() {
        assert_eq!(stage_percent("cloning"), 10);
        assert_eq!(stage_percent("origin_scan"), 80);
        assert_eq!(stage_percent("completed"), 100);
        assert_eq!(stage_percent("mystery"), 0);
    }

    #[test]
    fn test_gate_is_monotonic() {
        let gate = ProgressGate::new();
        assert!(gate.admit(10));
        assert!(gate.admit(30));
        // A slower node starting late must not roll progress back
        assert!(!gate.admit(20));
        assert!(gate.admit(30));
        assert_eq!(gate.highest(), 30);
    }
}
