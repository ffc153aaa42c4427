//! Tech-stack detection
//!
//! Pure file-name heuristics over the working tree: manifest and config
//! files map to language/framework labels. When nothing matches, falls
//! back to the most common source extension.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use walkdir::WalkDir;

use crate::fsutil;

/// Marker file (lowercased) → technology label
const MARKERS: &[(&str, &str)] = &[
    ("requirements.txt", "Python"),
    ("pyproject.toml", "Python"),
    ("package.json", "Node.js"),
    ("pom.xml", "Java"),
    ("build.gradle", "Java"),
    ("go.mod", "Go"),
    ("cargo.toml", "Rust"),
    ("composer.json", "PHP"),
    ("gemfile", "Ruby"),
    ("dockerfile", "Docker"),
    ("manage.py", "Django"),
    ("next.config.js", "Next.js"),
    ("next.config.mjs", "Next.js"),
    ("tailwind.config.js", "Tailwind"),
    ("vite.config.js", "Vite"),
    ("vite.config.ts", "Vite"),
    ("angular.json", "Angular"),
    ("pubspec.yaml", "Flutter"),
    ("docker-compose.yml", "Docker"),
];

/// Extension → fallback language label
const EXT_LANGS: &[(&str, &str)] = &[
    ("py", "Python"),
    ("js", "JavaScript"),
    ("ts", "TypeScript"),
    ("java", "Java"),
    ("go", "Go"),
    ("rs", "Rust"),
    ("rb", "Ruby"),
    ("php", "PHP"),
    ("c", "C"),
    ("cpp", "C++"),
];

/// Detect the technology stack of a working tree.
///
/// Returns a sorted, de-duplicated list of labels; `["Generic/Unknown"]`
/// when no marker or known source extension is present.
pub fn detect_tech_stack(repo_path: &Path) -> Vec<String> {
    let mut stack: HashSet<&str> = HashSet::new();
    let mut ext_counts: HashMap<String, usize> = HashMap::new();

    for entry in WalkDir::new(repo_path)
        .into_iter()
        .filter_entry(|e| !(e.depth() > 0 && fsutil::is_hidden(e.file_name().to_string_lossy().as_ref())))
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
    {
        let name = entry.file_name().to_string_lossy().to_lowercase();
        for (marker, label) in MARKERS {
            if name == *marker {
                stack.insert(label);
            }
        }
        if let Some(ext) = fsutil::extension(entry.path()) {
            *ext_counts.entry(ext).or_insert(0) += 1;
        }
    }

    if stack.is_empty() {
        // Fallback: primary language from the most common source extension
        let primary = EXT_LANGS
            .iter()
            .filter_map(|(ext, label)| ext_counts.get(*ext).map(|&n| (n, *label)))
            .max_by_key(|&(n, _)| n)
            .map(|(_, label)| label);
        stack.insert(primary.unwrap_or("Generic/Unknown"));
    }

    let mut labels: Vec<String> = stack.into_iter().map(String::from).collect();
    labels.sort();
    labels
}
