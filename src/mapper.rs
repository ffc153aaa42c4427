//! Report persistence mapping
//!
//! Converts the in-memory analysis report into persistence commands: the
//! project row with weighted scores, then the child tables (tech stack,
//! issues, team members). The project row is the primary record; each
//! child-table write is independent and best-effort, and cache
//! invalidation runs last.

use serde_json::json;
use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::cache::ResponseCache;
use crate::db::children::NewIssue;
use crate::db::{children, projects, ProjectUpdate};
use crate::pipeline::{Report, Scores};

/// Component weights of the total score; they sum to 1.0
pub const SCORE_WEIGHTS: &[(&str, f64)] = &[
    ("originality", 0.20),
    ("quality", 0.15),
    ("security", 0.10),
    ("effort", 0.10),
    ("implementation", 0.25),
    ("engineering", 0.10),
    ("organization", 0.05),
    ("documentation", 0.05),
];

/// File-risk rows retained in the persisted report blob
const REPORT_FILE_CAP: usize = 30;

/// Verdict column width
const VERDICT_CAP: usize = 255;

/// Feedback column width
const FEEDBACK_CAP: usize = 5000;

/// Issue thresholds
const ISSUE_PCT_THRESHOLD: f64 = 50.0;
const ISSUE_HIGH_PCT: f64 = 80.0;
const LOW_MAINTAINABILITY: f64 = 50.0;
const CRITICAL_MAINTAINABILITY: f64 = 20.0;

/// Weighted total of the component scores, rounded to two decimals
pub fn calculate_total_score(scores: &Scores) -> f64 {
    let total: f64 = SCORE_WEIGHTS
        .iter()
        .map(|(key, weight)| component(scores, key) * weight)
        .sum();
    (total * 100.0).round() / 100.0
}

fn component(scores: &Scores, key: &str) -> f64 {
    match key {
        "originality" => scores.originality,
        "quality" => scores.quality,
        "security" => scores.security,
        "effort" => scores.effort,
        "implementation" => scores.implementation,
        "engineering" => scores.engineering,
        "organization" => scores.organization,
        "documentation" => scores.documentation,
        _ => 0.0,
    }
}

fn truncated(s: &str, cap: usize) -> String {
    s.chars().take(cap).collect()
}

/// Categorize a technology label for the tech_stack table
pub fn categorize_technology(technology: &str) -> &'static str {
    let lower = technology.to_lowercase();
    const LANGUAGES: &[&str] = &[
        "python", "javascript", "typescript", "java", "go", "rust", "ruby", "php", "c++", "c#",
    ];
    const FRAMEWORKS: &[&str] = &[
        "react", "vue", "angular", "django", "flask", "fastapi", "express", "next", "axum",
        "rails", "spring", "flutter", "tailwind", "vite",
    ];
    const DATABASES: &[&str] = &[
        "postgres", "mysql", "mongo", "redis", "sqlite", "supabase",
    ];

    if LANGUAGES.iter().any(|l| lower.contains(l)) {
        "language"
    } else if FRAMEWORKS.iter().any(|f| lower.contains(f)) {
        "framework"
    } else if DATABASES.iter().any(|d| lower.contains(d)) {
        "database"
    } else {
        "tool"
    }
}

/// Derive issue rows from the report
pub fn map_issues(report: &Report) -> Vec<NewIssue> {
    let mut issues = Vec::new();

    // Every leaked secret is a high-severity security issue
    if let Some(security) = &report.security {
        for leak in &security.details {
            issues.push(NewIssue {
                kind: "security".to_string(),
                severity: "high".to_string(),
                file_path: Some(leak.path.clone()),
                description: format!("Secret detected: {}", leak.kind),
                ai_probability: None,
                plagiarism_score: None,
            });
        }
    }

    for file in &report.files {
        if file.ai_pct > ISSUE_PCT_THRESHOLD {
            issues.push(NewIssue {
                kind: "plagiarism".to_string(),
                severity: severity_for(file.ai_pct).to_string(),
                file_path: Some(file.name.clone()),
                description: "High AI-generated probability detected".to_string(),
                ai_probability: Some(file.ai_pct / 100.0),
                plagiarism_score: None,
            });
        }
        if file.plag_pct > ISSUE_PCT_THRESHOLD {
            let matched = file.matched_file.as_deref().unwrap_or("another file");
            issues.push(NewIssue {
                kind: "plagiarism".to_string(),
                severity: severity_for(file.plag_pct).to_string(),
                file_path: Some(file.name.clone()),
                description: format!("High similarity with: {matched}"),
                ai_probability: None,
                plagiarism_score: Some(file.plag_pct / 100.0),
            });
        }
    }

    if let Some(quality) = &report.quality {
        let mi = quality.maintainability_index;
        if mi < LOW_MAINTAINABILITY {
            issues.push(NewIssue {
                kind: "quality".to_string(),
                severity: if mi < CRITICAL_MAINTAINABILITY { "high" } else { "medium" }.to_string(),
                file_path: None,
                description: format!("Low maintainability index: {mi:.1}"),
                ai_probability: None,
                plagiarism_score: None,
            });
        }
    }

    issues
}

fn severity_for(pct: f64) -> &'static str {
    if pct > ISSUE_HIGH_PCT {
        "high"
    } else {
        "medium"
    }
}

/// Derive team-member rows with contribution percentages
pub fn map_team_members(report: &Report) -> Vec<(String, i64, f64)> {
    let Some(forensics) = &report.forensics else {
        return Vec::new();
    };
    let total: u64 = forensics.author_stats.values().map(|a| a.commits).sum();
    if total == 0 {
        return Vec::new();
    }
    forensics
        .author_stats
        .iter()
        .map(|(name, stats)| {
            let pct = (stats.commits as f64 / total as f64) * 10000.0;
            (name.clone(), stats.commits as i64, pct.round() / 100.0)
        })
        .collect()
}

/// The bounded report blob persisted on the project row
fn report_blob(report: &Report) -> Option<String> {
    let files: Vec<_> = report
        .files
        .iter()
        .take(REPORT_FILE_CAP)
        .map(|f| {
            json!({
                "name": f.name,
                "ai_pct": f.ai_pct,
                "plag_pct": f.plag_pct,
                "match": f.matched_file,
                "risk_pct": f.risk_pct,
            })
        })
        .collect();

    let team = report
        .forensics
        .as_ref()
        .map(|f| serde_json::to_value(&f.author_stats).unwrap_or_default())
        .unwrap_or_default();

    let blob = json!({
        "scores": report.scores,
        "stack": report.stack,
        "files": files,
        "judge": report.judge,
        "team": team,
        "security": report.security.as_ref().map(|s| json!({
            "score": s.score,
            "leak_count": s.leak_count,
        })),
        "maturity": report.maturity,
        "structure": report.structure,
        "forensics": report.forensics.as_ref().map(|f| json!({
            "total_commits": f.total_commits,
            "branch_count": f.branch_count,
            "dummy_commits": f.dummy_commits,
            "suspicious": f.suspicious_list,
            "consistency": f.consistency_stats,
        })),
    });

    serde_json::to_string(&blob).ok()
}

/// Persist a completed analysis.
///
/// The project row (scores + metadata) is written first and is the only
/// write that can fail the save; the blob gets one retry without itself,
/// and the three child-table inserts plus cache invalidation are each
/// best-effort.
pub async fn save_analysis_results(
    pool: &SqlitePool,
    cache: &ResponseCache,
    project_id: &str,
    report: &Report,
) -> crate::error::Result<()> {
    let scores = &report.scores;
    let judge = report.judge.as_ref();

    let mut update = ProjectUpdate {
        total_score: calculate_total_score(scores),
        originality_score: scores.originality,
        quality_score: scores.quality,
        security_score: scores.security,
        effort_score: scores.effort,
        implementation_score: scores.implementation,
        engineering_score: scores.engineering,
        organization_score: scores.organization,
        documentation_score: scores.documentation,
        total_commits: report.total_commits() as i64,
        verdict: judge.map(|j| truncated(&j.verdict, VERDICT_CAP)),
        ai_pros: judge.map(|j| truncated(&j.positive_feedback, FEEDBACK_CAP)),
        ai_cons: judge.map(|j| truncated(&j.constructive_feedback, FEEDBACK_CAP)),
        report_json: report_blob(report),
    };

    info!("Saving analysis results for project {project_id}");
    if let Err(e) = projects::complete_analysis(pool, project_id, &update).await {
        // The blob is the only oversized-payload suspect: retry without it
        warn!("Save with report blob failed ({e}), retrying without blob");
        update.report_json = None;
        projects::complete_analysis(pool, project_id, &update).await?;
    }

    if let Some(stack) = &report.stack {
        let technologies: Vec<(String, String)> = stack
            .iter()
            .map(|t| (t.clone(), categorize_technology(t).to_string()))
            .collect();
        if let Err(e) = children::add_technologies(pool, project_id, &technologies).await {
            warn!("Failed to save tech stack for {project_id}: {e}");
        }
    }

    let issues = map_issues(report);
    if !issues.is_empty() {
        if let Err(e) = children::add_issues(pool, project_id, &issues).await {
            warn!("Failed to save issues for {project_id}: {e}");
        }
    }

    let members = map_team_members(report);
    if !members.is_empty() {
        if let Err(e) = children::add_members(pool, project_id, &members).await {
            warn!("Failed to save team members for {project_id}: {e}");
        }
    }

    cache.invalidate_project(project_id).await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detectors::{AuthorStats, ForensicsReport, QualityReport, SecurityReport};
    use crate::detectors::security::Leak;
    use crate::pipeline::FileRisk;

    #[test]
    fn test_weights_sum_to_one() {
        let sum: f64 = SCORE_WEIGHTS.iter().map(|(_, w)| w).sum();
        assert!((sum - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_total_score_weighted_sum() {
        let scores = Scores {
            originality: 80.0,
            quality: 60.0,
            security: 100.0,
            effort: 50.0,
            implementation: 70.0,
            engineering: 40.0,
            organization: 100.0,
            documentation: 20.0,
        };
        let total = calculate_total_score(&scores);
        let expected = 80.0 * 0.20 + 60.0 * 0.15 + 100.0 * 0.10 + 50.0 * 0.10
            + 70.0 * 0.25 + 40.0 * 0.10 + 100.0 * 0.05 + 20.0 * 0.05;
        assert!((total - expected).abs() < 0.01);
        assert!((0.0..=100.0).contains(&total));
    }

    #[test]
    fn test_categorize_technology() {
        assert_eq!(categorize_technology("Python"), "language");
        assert_eq!(categorize_technology("Next.js"), "framework");
        assert_eq!(categorize_technology("PostgreSQL"), "database");
        assert_eq!(categorize_technology("Docker"), "tool");
    }

    #[test]
    fn test_security_issues_are_high() {
        let mut report = Report::new("url");
        report.security = Some(SecurityReport {
            score: 80.0,
            leak_count: 2,
            details: vec![
                Leak {
                    file: "a.py".to_string(),
                    path: "src/a.py".to_string(),
                    line_number: 3,
                    kind: "Hardcoded Password".to_string(),
                    snippet: "password = ...".to_string(),
                },
                Leak {
                    file: "b.py".to_string(),
                    path: "src/b.py".to_string(),
                    line_number: 9,
                    kind: "AWS Access Key".to_string(),
                    snippet: "AKIA...".to_string(),
                },
            ],
        });

        let issues = map_issues(&report);
        assert_eq!(issues.len(), 2);
        assert!(issues.iter().all(|i| i.kind == "security" && i.severity == "high"));
    }

    #[test]
    fn test_risk_file_issue_severities() {
        let mut report = Report::new("url");
        report.files = vec![
            FileRisk {
                name: "gen.rs".to_string(),
                ai_pct: 85.0,
                plag_pct: 10.0,
                matched_file: None,
                risk_pct: 55.0,
            },
            FileRisk {
                name: "copy.rs".to_string(),
                ai_pct: 10.0,
                plag_pct: 65.0,
                matched_file: Some("src/original.rs".to_string()),
                risk_pct: 32.0,
            },
        ];

        let issues = map_issues(&report);
        assert_eq!(issues.len(), 2);
        assert_eq!(issues[0].severity, "high");
        assert_eq!(issues[0].ai_probability, Some(0.85));
        assert_eq!(issues[1].severity, "medium");
        assert!(issues[1].description.contains("src/original.rs"));
    }

    #[test]
    fn test_low_maintainability_issue() {
        let mut report = Report::new("url");
        report.quality = Some(QualityReport {
            avg_complexity: 12.0,
            maintainability_index: 15.0,
            documentation_score: 10.0,
            analyzed_files: 3,
        });
        let issues = map_issues(&report);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].kind, "quality");
        assert_eq!(issues[0].severity, "high");
    }

    #[test]
    fn test_team_contribution_sums_to_hundred() {
        let mut report = Report::new("url");
        let mut forensics = ForensicsReport::default();
        for (name, commits) in [("Alice", 7u64), ("Bob", 2), ("Cara", 1)] {
            forensics.author_stats.insert(
                name.to_string(),
                AuthorStats { commits, ..Default::default() },
            );
        }
        report.forensics = Some(forensics);

        let members = map_team_members(&report);
        assert_eq!(members.len(), 3);
        let sum: f64 = members.iter().map(|(_, _, pct)| pct).sum();
        assert!((sum - 100.0).abs() <= 1.0);
    }

    #[tokio::test]
    async fn test_save_results_end_to_end() {
        let pool = crate::db::test_pool().await;
        let project = crate::db::projects::create_project(&pool, "https://github.com/a/b", None)
            .await
            .unwrap();

        let mut report = Report::new("https://github.com/a/b");
        report.stack = Some(vec!["Rust".to_string(), "Docker".to_string()]);
        report.scores = Scores { originality: 100.0, implementation: 40.0, ..Default::default() };

        let cache = ResponseCache::disabled();
        save_analysis_results(&pool, &cache, &project.id, &report)
            .await
            .unwrap();

        let saved = crate::db::projects::get_project(&pool, &project.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(saved.status, "completed");
        assert!(saved.total_score.is_some());
        assert!(saved.report_json.is_some());

        let stack = crate::db::children::get_tech_stack(&pool, &project.id).await.unwrap();
        assert_eq!(stack.len(), 2);
    }
}
