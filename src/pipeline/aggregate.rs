//! Aggregator node
//!
//! The terminal pipeline node. Reads every detector field of the report,
//! materializes per-file risk rows, and fills the component score table.
//! Absent detector outputs default to zero or neutral values; the
//! aggregator never fails on missing fields.

use std::collections::BTreeSet;

use super::report::{FileRisk, Report, Scores};

/// Weight of the LLM likelihood in the blended file risk
const RISK_AI_WEIGHT: f64 = 0.6;

/// Files below this blended risk percent are dropped from the detail list
const RISK_THRESHOLD_PCT: f64 = 15.0;

/// Compute per-file risk rows and the component score table in place.
pub fn aggregate(report: &mut Report) {
    report.files = file_risks(report);
    report.scores = score_table(report);
}

/// Blend the LLM and plagiarism maps into ranked risk rows
fn file_risks(report: &Report) -> Vec<FileRisk> {
    let Some(origin) = report.origin.as_ref() else {
        return Vec::new();
    };

    let names: BTreeSet<&String> = origin
        .llm_scores
        .keys()
        .chain(origin.plagiarism.keys())
        .collect();

    let mut rows: Vec<FileRisk> = names
        .into_iter()
        .map(|name| {
            let ai = origin.llm_scores.get(name).copied().unwrap_or(0.0);
            let matched = origin.plagiarism.get(name);
            let plag = matched.map(|m| m.similarity).unwrap_or(0.0);
            let risk = (RISK_AI_WEIGHT * ai + (1.0 - RISK_AI_WEIGHT) * plag) * 100.0;
            FileRisk {
                name: name.clone(),
                ai_pct: ai * 100.0,
                plag_pct: plag * 100.0,
                matched_file: matched.map(|m| m.matched_file.clone()),
                risk_pct: risk,
            }
        })
        .filter(|row| row.risk_pct > RISK_THRESHOLD_PCT)
        .collect();

    rows.sort_by(|a, b| b.risk_pct.partial_cmp(&a.risk_pct).unwrap_or(std::cmp::Ordering::Equal));
    rows
}

/// Fill the eight component scores from the detector outputs
fn score_table(report: &Report) -> Scores {
    let max_ai_pct = report
        .origin
        .as_ref()
        .map(|o| {
            o.llm_scores
                .values()
                .fold(0.0f64, |acc, &v| acc.max(v * 100.0))
        })
        .unwrap_or(0.0);

    Scores {
        originality: (100.0 - max_ai_pct).max(0.0),
        quality: report
            .quality
            .as_ref()
            .map(|q| q.maintainability_index)
            .unwrap_or(0.0),
        security: report.security.as_ref().map(|s| s.score).unwrap_or(0.0),
        effort: (report.total_commits() as f64).min(100.0),
        implementation: report
            .judge
            .as_ref()
            .map(|j| j.implementation_score.clamp(0.0, 100.0))
            .unwrap_or(0.0),
        engineering: report.maturity.as_ref().map(|m| m.score).unwrap_or(0.0),
        organization: report
            .structure
            .as_ref()
            .map(|s| s.organization_score)
            .unwrap_or(0.0),
        documentation: report
            .quality
            .as_ref()
            .map(|q| q.documentation_score)
            .unwrap_or(0.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detectors::{MaturityReport, OriginReport, PlagiarismMatch, QualityReport, SecurityReport};

    fn origin_with(llm: &[(&str, f64)], plag: &[(&str, &str, f64)]) -> OriginReport {
        let mut report = OriginReport::default();
        for (name, score) in llm {
            report.llm_scores.insert(name.to_string(), *score);
        }
        for (name, matched, sim) in plag {
            report.plagiarism.insert(
                name.to_string(),
                PlagiarismMatch {
                    matched_file: matched.to_string(),
                    similarity: *sim,
                    token_similarity: *sim,
                    ast_similarity: 0.0,
                },
            );
        }
        report
    }

    #[test]
    fn test_file_risk_blend_and_threshold() {
        let mut report = Report::new("url");
        report.origin = Some(origin_with(
            &[("hot.rs", 0.9), ("cold.rs", 0.05)],
            &[("hot.rs", "twin.rs", 0.8), ("cold.rs", "other.rs", 0.1)],
        ));
        aggregate(&mut report);

        // hot: (0.6*0.9 + 0.4*0.8)*100 = 86; cold: (0.6*0.05+0.4*0.1)*100 = 7
        assert_eq!(report.files.len(), 1);
        let hot = &report.files[0];
        assert_eq!(hot.name, "hot.rs");
        assert!((hot.risk_pct - 86.0).abs() < 1e-9);
        assert_eq!(hot.matched_file.as_deref(), Some("twin.rs"));
    }

    #[test]
    fn test_risk_rows_sorted_descending() {
        let mut report = Report::new("url");
        report.origin = Some(origin_with(
            &[("a.rs", 0.5), ("b.rs", 0.9), ("c.rs", 0.7)],
            &[],
        ));
        aggregate(&mut report);
        let risks: Vec<f64> = report.files.iter().map(|f| f.risk_pct).collect();
        let mut sorted = risks.clone();
        sorted.sort_by(|a, b| b.partial_cmp(a).unwrap());
        assert_eq!(risks, sorted);
    }

    #[test]
    fn test_originality_from_max_ai() {
        let mut report = Report::new("url");
        report.origin = Some(origin_with(&[("a.rs", 0.25), ("b.rs", 0.60)], &[]));
        aggregate(&mut report);
        assert!((report.scores.originality - 40.0).abs() < 1e-9);
    }

    #[test]
    fn test_missing_detectors_default_to_zero() {
        let mut report = Report::new("url");
        aggregate(&mut report);
        assert_eq!(report.scores.originality, 100.0);
        assert_eq!(report.scores.quality, 0.0);
        assert_eq!(report.scores.implementation, 0.0);
        assert_eq!(report.scores.effort, 0.0);
        assert!(report.files.is_empty());
    }

    #[test]
    fn test_score_table_wiring() {
        let mut report = Report::new("url");
        report.quality = Some(QualityReport {
            avg_complexity: 3.0,
            maintainability_index: 71.5,
            documentation_score: 55.0,
            analyzed_files: 4,
        });
        report.security = Some(SecurityReport { score: 90.0, leak_count: 1, details: vec![] });
        report.maturity = Some(MaturityReport { score: 60.0, ..Default::default() });
        report.forensics = Some(crate::detectors::ForensicsReport {
            total_commits: 250,
            ..Default::default()
        });
        aggregate(&mut report);

        assert_eq!(report.scores.quality, 71.5);
        assert_eq!(report.scores.security, 90.0);
        assert_eq!(report.scores.engineering, 60.0);
        assert_eq!(report.scores.documentation, 55.0);
        // Effort saturates at 100 commits
        assert_eq!(report.scores.effort, 100.0);
    }
}
