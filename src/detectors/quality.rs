//! Code quality metrics
//!
//! For source files of a supported language (currently Rust, the language
//! this toolchain can parse), computes per-file cyclomatic complexity,
//! a maintainability index, and raw line counts, then aggregates. When a
//! repository contains no supported files it returns neutral defaults so
//! that projects in other languages are not punished for toolchain
//! absence.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use syn::visit::Visit;
use walkdir::WalkDir;

use crate::fingerprint;
use crate::fsutil;

/// Neutral fallbacks for unsupported repositories
const NEUTRAL_COMPLEXITY: f64 = 5.0;
const NEUTRAL_MAINTAINABILITY: f64 = 60.0;
const NEUTRAL_DOC_SCORE: f64 = 40.0;

/// Comment-to-code ratio treated as fully documented
const IDEAL_COMMENT_RATIO: f64 = 0.15;

/// Quality detector output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityReport {
    pub avg_complexity: f64,
    pub maintainability_index: f64,
    pub documentation_score: f64,
    pub analyzed_files: usize,
}

impl Default for QualityReport {
    fn default() -> Self {
        Self {
            avg_complexity: NEUTRAL_COMPLEXITY,
            maintainability_index: NEUTRAL_MAINTAINABILITY,
            documentation_score: NEUTRAL_DOC_SCORE,
            analyzed_files: 0,
        }
    }
}

/// Counts decision points per function
struct ComplexityVisitor {
    /// complexity of each function block (1 + decision points)
    blocks: Vec<u64>,
    current: Option<u64>,
}

impl ComplexityVisitor {
    fn bump(&mut self) {
        if let Some(ref mut c) = self.current {
            *c += 1;
        }
    }
}

impl<'ast> Visit<'ast> for ComplexityVisitor {
    fn visit_item_fn(&mut self, node: &'ast syn::ItemFn) {
        let outer = self.current.replace(1);
        syn::visit::visit_item_fn(self, node);
        if let Some(done) = self.current.take() {
            self.blocks.push(done);
        }
        self.current = outer;
    }

    fn visit_impl_item_fn(&mut self, node: &'ast syn::ImplItemFn) {
        let outer = self.current.replace(1);
        syn::visit::visit_impl_item_fn(self, node);
        if let Some(done) = self.current.take() {
            self.blocks.push(done);
        }
        self.current = outer;
    }

    fn visit_expr(&mut self, node: &'ast syn::Expr) {
        match node {
            syn::Expr::If(_) | syn::Expr::While(_) | syn::Expr::ForLoop(_) | syn::Expr::Loop(_) | syn::Expr::Try(_) => {
                self.bump()
            }
            syn::Expr::Binary(b)
                if matches!(b.op, syn::BinOp::And(_) | syn::BinOp::Or(_)) =>
            {
                self.bump()
            }
            syn::Expr::Match(m) => {
                // Each arm beyond the first is an extra path
                let arms = m.arms.len().saturating_sub(1) as u64;
                if let Some(ref mut c) = self.current {
                    *c += arms;
                }
            }
            _ => {}
        }
        syn::visit::visit_expr(self, node);
    }
}

/// Per-file metrics
struct FileMetrics {
    complexity: f64,
    maintainability: f64,
    loc: usize,
    comments: usize,
}

fn analyze_file(content: &str) -> Option<FileMetrics> {
    if content.trim().is_empty() {
        return None;
    }

    let ast = syn::parse_file(content).ok()?;
    let mut visitor = ComplexityVisitor { blocks: Vec::new(), current: None };
    visitor.visit_file(&ast);

    let complexity = if visitor.blocks.is_empty() {
        1.0
    } else {
        visitor.blocks.iter().sum::<u64>() as f64 / visitor.blocks.len() as f64
    };

    let mut loc = 0usize;
    let mut comments = 0usize;
    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        loc += 1;
        if trimmed.starts_with("//") || trimmed.starts_with("/*") || trimmed.starts_with('*') {
            comments += 1;
        }
    }

    Some(FileMetrics {
        complexity,
        maintainability: maintainability_index(content, complexity, loc),
        loc,
        comments,
    })
}

/// Maintainability index on the standard 171-point scale, rescaled 0-100.
///
/// Halstead volume is approximated from the token stream: N·log2(n) for N
/// total and n distinct tokens.
fn maintainability_index(content: &str, complexity: f64, loc: usize) -> f64 {
    let tokens = fingerprint::tokenize(content);
    let total = tokens.len().max(1) as f64;
    let distinct = tokens.iter().collect::<HashSet<_>>().len().max(2) as f64;
    let volume = (total * distinct.log2()).max(1.0);
    let loc = loc.max(1) as f64;

    let raw = 171.0 - 5.2 * volume.ln() - 0.23 * complexity - 16.2 * loc.ln();
    (raw * 100.0 / 171.0).clamp(0.0, 100.0)
}

/// Analyze quality of every supported source file in the tree
pub fn analyze_quality(repo_path: &Path) -> QualityReport {
    let mut total_complexity = 0.0;
    let mut total_maintainability = 0.0;
    let mut total_loc = 0usize;
    let mut total_comments = 0usize;
    let mut analyzed_files = 0usize;

    for entry in WalkDir::new(repo_path)
        .into_iter()
        .filter_entry(|e| !(e.depth() > 0 && fsutil::is_hidden(e.file_name().to_string_lossy().as_ref())))
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| fsutil::extension(e.path()).as_deref() == Some("rs"))
    {
        let Ok(content) = fsutil::read_lossy(entry.path()) else {
            continue;
        };
        if let Some(metrics) = analyze_file(&content) {
            total_complexity += metrics.complexity;
            total_maintainability += metrics.maintainability;
            total_loc += metrics.loc;
            total_comments += metrics.comments;
            analyzed_files += 1;
        }
    }

    if analyzed_files == 0 {
        return QualityReport::default();
    }

    let documentation_score = if total_loc > 0 {
        let ratio = total_comments as f64 / total_loc as f64;
        (ratio / IDEAL_COMMENT_RATIO).min(1.0) * 100.0
    } else {
        NEUTRAL_DOC_SCORE
    };

    QualityReport {
        avg_complexity: round2(total_complexity / analyzed_files as f64),
        maintainability_index: round2(total_maintainability / analyzed_files as f64),
        documentation_score: round2(documentation_score),
        analyzed_files,
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_neutral_defaults_for_unsupported_repo() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("app.py"), "print('hi')\n").unwrap();

        let report = analyze_quality(dir.path());
        assert_eq!(report.analyzed_files, 0);
        assert_eq!(report.avg_complexity, NEUTRAL_COMPLEXITY);
        assert_eq!(report.maintainability_index, NEUTRAL_MAINTAINABILITY);
        assert_eq!(report.documentation_score, NEUTRAL_DOC_SCORE);
    }

    #[test]
    fn test_branching_raises_complexity() {
        let simple = analyze_file("fn a() { let x = 1; }\n").unwrap();
        let branchy = analyze_file(
            r#"
            fn b(n: i32) -> i32 {
                if n > 0 {
                    if n > 10 { 2 } else { 1 }
                } else {
                    match n {
                        -1 => 0,
                        -2 => 1,
                        _ => 2,
                    }
                }
            }
            "#,
        )
        .unwrap();
        assert!(branchy.complexity > simple.complexity);
    }

    #[test]
    fn test_comment_counting() {
        let metrics = analyze_file(
            "// doc line\nfn c() {\n    // inline\n    let y = 2;\n}\n",
        )
        .unwrap();
        assert_eq!(metrics.comments, 2);
        assert_eq!(metrics.loc, 5);
    }

    #[test]
    fn test_rust_repo_is_scored() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("lib.rs"),
            "// entry\nfn top(flag: bool) -> u8 {\n    if flag { 1 } else { 0 }\n}\n",
        )
        .unwrap();

        let report = analyze_quality(dir.path());
        assert_eq!(report.analyzed_files, 1);
        assert!(report.maintainability_index > 0.0);
        assert!(report.documentation_score > 0.0);
    }
}
