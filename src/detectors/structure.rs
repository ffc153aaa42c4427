//! Directory structure analysis
//!
//! Walks the tree (skipping hidden and VCS folders), measures nesting
//! depth and folder counts, and classifies the architecture by matching
//! the observed folder names against fixed rule patterns. The organization
//! score starts at 100 and deducts for root clutter and nesting depth.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use walkdir::WalkDir;

use crate::fsutil;

/// Architecture rule: a label, required folder names, minimum matches
struct ArchRule {
    label: &'static str,
    required: &'static [&'static str],
    threshold: usize,
}

/// Rules checked in order; the first whose threshold is met wins
const ARCH_RULES: &[ArchRule] = &[
    ArchRule {
        label: "MVC (Model-View-Controller)",
        required: &["models", "views", "controllers"],
        threshold: 2,
    },
    ArchRule {
        label: "Clean Architecture",
        required: &["domain", "use_cases", "data", "presentation", "core"],
        threshold: 2,
    },
    ArchRule {
        label: "Microservices",
        required: &["services", "api-gateway", "kubernetes", "docker", "proto"],
        threshold: 2,
    },
    ArchRule {
        label: "Modern React/Next",
        required: &["components", "hooks", "context", "pages", "public", "app"],
        threshold: 3,
    },
    ArchRule {
        label: "Django Standard",
        required: &["migrations", "templates", "static", "apps"],
        threshold: 3,
    },
    ArchRule {
        label: "Standard Go",
        required: &["cmd", "internal", "pkg", "api"],
        threshold: 2,
    },
    ArchRule {
        label: "Flutter/Mobile",
        required: &["lib", "ios", "android", "assets"],
        threshold: 3,
    },
];

/// Structure detector output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructureReport {
    pub architecture: String,
    pub max_depth: usize,
    pub folder_count: usize,
    pub root_file_count: usize,
    pub organization_score: f64,
}

impl Default for StructureReport {
    fn default() -> Self {
        Self {
            architecture: "Unknown".to_string(),
            max_depth: 0,
            folder_count: 0,
            root_file_count: 0,
            organization_score: 0.0,
        }
    }
}

/// Analyze the directory structure of a working tree
pub fn analyze_structure(repo_path: &Path) -> StructureReport {
    let mut folders: HashSet<String> = HashSet::new();
    let mut max_depth = 0usize;
    let mut folder_count = 0usize;
    let mut root_file_count = 0usize;

    for entry in WalkDir::new(repo_path)
        .into_iter()
        .filter_entry(|e| !(e.depth() > 0 && fsutil::is_hidden(e.file_name().to_string_lossy().as_ref())))
        .filter_map(|e| e.ok())
    {
        if entry.depth() == 0 {
            continue;
        }
        if entry.file_type().is_dir() {
            folders.insert(entry.file_name().to_string_lossy().to_lowercase());
            folder_count += 1;
            max_depth = max_depth.max(entry.depth());
        } else if entry.depth() == 1 {
            root_file_count += 1;
        }
    }

    // Pattern match: a required name counts when it names a folder or is a
    // substring of one (e.g. `user_models` satisfies `models`)
    let mut architecture = "Monolithic / Unstructured".to_string();
    for rule in ARCH_RULES {
        let matches = rule
            .required
            .iter()
            .filter(|req| folders.iter().any(|f| f.contains(*req)))
            .count();
        if matches >= rule.threshold {
            architecture = rule.label.to_string();
            break;
        }
    }

    let mut organization_score: f64 = 100.0;

    // Root clutter: many files at the top with almost no folders
    if root_file_count > 15 && folder_count < 3 {
        organization_score -= 40.0;
        if architecture == "Monolithic / Unstructured" {
            architecture = "Flat Spaghetti Code".to_string();
        }
    }

    // Nesting depth penalty
    if max_depth > 6 {
        organization_score -= 20.0;
    }

    // Near-empty tree
    if folder_count == 0 && root_file_count < 5 {
        organization_score = 0.0;
        architecture = "Empty / Minimal".to_string();
    }

    StructureReport {
        architecture,
        max_depth,
        folder_count,
        root_file_count,
        organization_score: organization_score.max(0.0),
    }
}
