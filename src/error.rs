//! Error types for the analysis service
//!
//! Fatal pipeline errors (clone failure, aggregator failure) are the only
//! errors that fail a job; individual detector errors are caught at the
//! node boundary and downgraded to skipped outputs. HTTP-facing errors
//! are mapped separately in the API layer.

use thiserror::Error;

/// Top-level error taxonomy for the analysis core
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Database error: {0}")]
    Db(#[from] crate::db::DbError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Pipeline error: {0}")]
    Pipeline(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl AnalysisError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, AnalysisError>;
