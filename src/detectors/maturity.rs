//! Project maturity detection
//!
//! Looks for DevOps markers in four categories (container, CI, cloud
//! deploy, linting) and counts real test files. A test file must match a
//! test-name pattern AND contain an assertion token, which filters out
//! fixtures and data files that merely live under `tests/`.

use serde::{Deserialize, Serialize};
use std::path::Path;
use walkdir::WalkDir;

use crate::fsutil;

/// Path fragments that indicate testing infrastructure
const TEST_PATTERNS: &[&str] = &[
    "test_",
    "_test.py",
    "_test.go",
    ".spec.js",
    ".test.js",
    ".spec.ts",
    ".test.ts",
    "src/test",
    "tests/",
    "__tests__",
];

/// DevOps marker filenames per category
const CONTAINER_FILES: &[&str] = &["dockerfile", "docker-compose.yml", ".dockerignore"];
const CI_FILES: &[&str] = &[".gitlab-ci.yml", "azure-pipelines.yml", "circleci.config.yml", "jenkinsfile"];
const CLOUD_FILES: &[&str] = &["vercel.json", "netlify.toml", "app.yaml", "serverless.yml", "procfile", "fly.toml"];
const LINT_FILES: &[&str] = &[".eslintrc", ".pylintrc", "pyproject.toml", ".prettierrc", "rustfmt.toml", "clippy.toml"];

/// Maturity detector output
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MaturityReport {
    pub score: f64,
    pub test_files: usize,
    pub test_lines: usize,
    pub devops_tools: Vec<String>,
    pub has_tests: bool,
    pub is_deployable: bool,
}

/// Scan a working tree for maturity signals
pub fn scan_project_maturity(repo_path: &Path) -> MaturityReport {
    let mut test_files = 0usize;
    let mut test_lines = 0usize;
    let mut has_container = false;
    let mut has_ci = false;
    let mut has_cloud = false;
    let mut has_lint = false;

    for entry in WalkDir::new(repo_path).into_iter().filter_map(|e| e.ok()) {
        let rel = entry
            .path()
            .strip_prefix(repo_path)
            .unwrap_or(entry.path())
            .to_string_lossy()
            .to_lowercase();

        // CI lives in hidden folders, so check paths before skipping them
        if rel.contains(".github/workflows") || rel.contains(".gitlab-ci") {
            has_ci = true;
        }

        if !entry.file_type().is_file() {
            continue;
        }

        let name = entry.file_name().to_string_lossy().to_lowercase();
        has_container |= CONTAINER_FILES.iter().any(|m| name.contains(m));
        has_ci |= CI_FILES.iter().any(|m| name.contains(m));
        has_cloud |= CLOUD_FILES.iter().any(|m| name.contains(m));
        has_lint |= LINT_FILES.iter().any(|m| name.contains(m));

        // Test detection: name/path pattern + assertion token in content
        let looks_like_test = TEST_PATTERNS.iter().any(|p| rel.contains(p) || name.contains(p));
        if looks_like_test
            && !name.ends_with(".png")
            && !name.ends_with(".xml")
            && !name.ends_with(".json")
        {
            if let Ok(content) = fsutil::read_lossy(entry.path()) {
                if content.contains("assert") || content.contains("expect(") || content.contains("testing") {
                    test_files += 1;
                    test_lines += content.lines().count();
                }
            }
        }
    }

    let mut devops_tools = Vec::new();
    let mut devops_score = 0.0;
    if has_container {
        devops_tools.push("Docker".to_string());
        devops_score += 20.0;
    }
    if has_cloud {
        devops_tools.push("Cloud".to_string());
        devops_score += 20.0;
    }
    if has_ci {
        devops_tools.push("CI/CD".to_string());
        devops_score += 20.0;
    }
    if has_lint {
        devops_tools.push("Linting".to_string());
        devops_score += 10.0;
    }

    let test_score = (test_files as f64 * 6.0).min(30.0);
    let score = (devops_score + test_score).min(100.0);

    MaturityReport {
        score,
        test_files,
        test_lines,
        devops_tools,
        has_tests: test_files > 0,
        is_deployable: has_container || has_cloud,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_devops_markers_scored() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("Dockerfile"), "FROM rust").unwrap();
        fs::write(dir.path().join("vercel.json"), "{}").unwrap();

        let report = scan_project_maturity(dir.path());
        assert!(report.is_deployable);
        assert!(report.devops_tools.contains(&"Docker".to_string()));
        assert_eq!(report.score, 40.0);
    }

    #[test]
    fn test_test_files_need_assertions() {
        let dir = tempfile::tempdir().unwrap();
        let tests = dir.path().join("tests");
        fs::create_dir_all(&tests).unwrap();
        fs::write(tests.join("test_math.py"), "def test_add():\n    assert 1 + 1 == 2\n").unwrap();
        fs::write(tests.join("test_stub.py"), "# placeholder, nothing here\n").unwrap();

        let report = scan_project_maturity(dir.path());
        assert_eq!(report.test_files, 1);
        assert!(report.has_tests);
        assert_eq!(report.score, 6.0);
    }

    #[test]
    fn test_ci_workflow_folder_detected() {
        let dir = tempfile::tempdir().unwrap();
        let wf = dir.path().join(".github/workflows");
        fs::create_dir_all(&wf).unwrap();
        fs::write(wf.join("ci.yml"), "on: push").unwrap();

        let report = scan_project_maturity(dir.path());
        assert!(report.devops_tools.contains(&"CI/CD".to_string()));
        assert_eq!(report.score, 20.0);
    }

    #[test]
    fn test_test_volume_capped() {
        let dir = tempfile::tempdir().unwrap();
        let tests = dir.path().join("tests");
        fs::create_dir_all(&tests).unwrap();
        for i in 0..10 {
            fs::write(tests.join(format!("test_{i}.py")), "assert True\n").unwrap();
        }
        let report = scan_project_maturity(dir.path());
        assert_eq!(report.test_files, 10);
        // min(30, 10 * 6)
        assert_eq!(report.score, 30.0);
    }
}
