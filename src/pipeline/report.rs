//! The in-memory analysis report
//!
//! A typed document with one field per detector output. A field is `None`
//! when its detector was skipped or failed; the aggregator is the only
//! component that reads across fields and it defaults absent values to
//! zero/empty. The report lives only for the duration of one job; a
//! bounded projection of it is persisted as the project's report blob.

use serde::{Deserialize, Serialize};

use crate::detectors::{
    ForensicsReport, JudgeVerdict, MaturityReport, OriginReport, QualityReport, SecurityReport,
    StructureReport,
};

/// Risk row for one analyzed file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRisk {
    pub name: String,
    /// LLM-likelihood as a percentage
    pub ai_pct: f64,
    /// Best-match plagiarism similarity as a percentage
    pub plag_pct: f64,
    /// Best-matching file, when the plagiarism lane scored this file
    pub matched_file: Option<String>,
    /// Blended risk percentage used for ranking
    pub risk_pct: f64,
}

/// The eight component scores, each 0-100
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Scores {
    pub originality: f64,
    pub quality: f64,
    pub security: f64,
    pub effort: f64,
    pub implementation: f64,
    pub engineering: f64,
    pub organization: f64,
    pub documentation: f64,
}

/// Full analysis report assembled by the pipeline
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Report {
    pub repo_url: String,

    // Detector outputs; `None` = detector skipped or failed
    pub stack: Option<Vec<String>>,
    pub structure: Option<StructureReport>,
    pub maturity: Option<MaturityReport>,
    pub forensics: Option<ForensicsReport>,
    pub quality: Option<QualityReport>,
    pub security: Option<SecurityReport>,
    pub origin: Option<OriginReport>,
    pub judge: Option<JudgeVerdict>,

    // Aggregator outputs
    pub scores: Scores,
    pub files: Vec<FileRisk>,
}

impl Report {
    pub fn new(repo_url: impl Into<String>) -> Self {
        Self { repo_url: repo_url.into(), ..Default::default() }
    }

    /// Total commits observed by forensics, 0 when the detector skipped
    pub fn total_commits(&self) -> usize {
        self.forensics.as_ref().map(|f| f.total_commits).unwrap_or(0)
    }
}
