//! Repository summary for the judge oracle
//!
//! Compresses a working copy into a bounded textual summary: the directory
//! tree to a fixed depth, full content of canonical config files when
//! present, and truncated snippets of the largest source files.

use std::path::Path;
use walkdir::WalkDir;

use crate::fsutil;

/// Overall summary budget in characters
pub const SUMMARY_CAP: usize = 40_000;

/// Tree rendering depth
const TREE_DEPTH: usize = 3;

/// Files rendered per folder before truncating
const TREE_FILES_PER_DIR: usize = 15;

/// Config files read in full (up to a per-file cap)
const CANONICAL_FILES: &[&str] = &[
    "README.md",
    "Cargo.toml",
    "requirements.txt",
    "package.json",
    "Dockerfile",
    "schema.sql",
    ".env.example",
];

/// Per-canonical-file character cap
const CANONICAL_CAP: usize = 2000;

/// Largest source files sampled
const SOURCE_SAMPLE: usize = 10;

/// Per-source-file character cap
const SOURCE_CAP: usize = 3000;

/// Render the directory tree to `TREE_DEPTH`, hidden entries skipped
fn render_tree(repo_path: &Path) -> String {
    let mut lines = Vec::new();
    let mut walker = WalkDir::new(repo_path)
        .max_depth(TREE_DEPTH)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !(e.depth() > 0 && fsutil::is_hidden(e.file_name().to_string_lossy().as_ref())));

    let mut files_in_dir = 0usize;
    let mut last_dir_depth = 0usize;
    while let Some(Ok(entry)) = walker.next() {
        let depth = entry.depth();
        let indent = "  ".repeat(depth);
        let name = entry.file_name().to_string_lossy();
        if entry.file_type().is_dir() {
            lines.push(format!("{indent}{name}/"));
            files_in_dir = 0;
            last_dir_depth = depth;
        } else {
            files_in_dir += 1;
            if files_in_dir > TREE_FILES_PER_DIR {
                if files_in_dir == TREE_FILES_PER_DIR + 1 {
                    lines.push(format!("{}  ...", "  ".repeat(last_dir_depth)));
                }
                continue;
            }
            lines.push(format!("{indent}{name}"));
        }
    }
    lines.join("\n")
}

/// Generate the judge input for a working copy, capped at `SUMMARY_CAP`.
pub fn generate_repo_summary(repo_path: &Path) -> String {
    let mut summary = String::new();

    summary.push_str("=== DIRECTORY STRUCTURE ===\n");
    summary.push_str(&render_tree(repo_path));

    summary.push_str("\n\n=== CRITICAL CONFIGURATION ===\n");
    for name in CANONICAL_FILES {
        let path = repo_path.join(name);
        if let Ok(content) = fsutil::read_lossy(&path) {
            summary.push_str(&format!("\n--- {name} ---\n"));
            summary.extend(content.chars().take(CANONICAL_CAP));
            summary.push('\n');
        }
    }

    summary.push_str("\n=== SOURCE CODE SAMPLES ===\n");
    let mut sources: Vec<(std::path::PathBuf, u64)> = WalkDir::new(repo_path)
        .into_iter()
        .filter_entry(|e| !(e.depth() > 0 && fsutil::is_hidden(e.file_name().to_string_lossy().as_ref())))
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| fsutil::is_source_file(e.path()))
        .filter_map(|e| {
            let size = e.metadata().ok()?.len();
            Some((e.into_path(), size))
        })
        .collect();
    sources.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

    for (path, _) in sources.into_iter().take(SOURCE_SAMPLE) {
        if summary.len() > SUMMARY_CAP {
            break;
        }
        let rel = path.strip_prefix(repo_path).unwrap_or(&path).to_string_lossy().to_string();
        if let Ok(content) = fsutil::read_lossy(&path) {
            summary.push_str(&format!("\n--- FILE: {rel} ---\n"));
            summary.extend(content.chars().take(SOURCE_CAP));
            summary.push('\n');
        }
    }

    if summary.len() > SUMMARY_CAP {
        summary.truncate(
            summary
                .char_indices()
                .take_while(|(i, _)| *i < SUMMARY_CAP)
                .last()
                .map(|(i, c)| i + c.len_utf8())
                .unwrap_or(0),
        );
    }
    summary
}
