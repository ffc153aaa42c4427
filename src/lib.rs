//! # RepoJudge - Repository Quality Scorecard Service
//!
//! Analyzes remote git repositories and produces a multi-dimensional
//! quality scorecard: originality, implementation, engineering maturity,
//! code quality, security, organization, documentation, and effort.
//!
//! ## Architecture
//!
//! - A DAG-structured detector pipeline fans out over a cloned working
//!   copy: commit forensics, code-origin ensemble (token-entropy heuristic
//!   + winnowing fingerprints + AST alignment), security scan, maturity
//!   and structure classification, quality metrics, and an LLM judge
//! - An aggregator blends detector outputs into per-file risk rows and a
//!   weighted total score that feeds a leaderboard
//! - A bounded worker pool drives the asynchronous job lifecycle
//!   (queue → run → progress → persist) against SQLite, with an optional
//!   Redis response cache in front of the read endpoints

pub mod api;
pub mod ast_sim;
pub mod cache;
pub mod config;
pub mod db;
pub mod detectors;
pub mod error;
pub mod fingerprint;
pub mod fsutil;
pub mod mapper;
pub mod pipeline;
pub mod server;
pub mod summary;
pub mod worker;

pub use cache::ResponseCache;
pub use config::Config;
pub use db::{init_db, AnalysisJob, Issue, JobStatus, Project, ProjectStatus, TeamMember, TechStackEntry};
pub use detectors::{
    analyze_commits, analyze_origin, analyze_quality, analyze_structure, clone_repository,
    detect_tech_stack, scan_for_secrets, scan_project_maturity, ForensicsReport, JudgeClient,
    JudgeVerdict, MaturityReport, OriginProvider, OriginReport, QualityReport, SecurityReport,
    StructureReport,
};
pub use error::{AnalysisError, Result};
pub use mapper::{calculate_total_score, save_analysis_results};
pub use pipeline::{
    DbProgressTracker, FileRisk, NullProgress, PipelineRunner, ProgressReporter, Report, Scores,
};
pub use server::{run_server, AppState};
pub use worker::{run_analysis_job, AnalysisWorker};
