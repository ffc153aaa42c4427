//! Filesystem helpers shared by the detectors
//!
//! Lossy file reading, extension-based language detection, and the skip
//! rules (hidden entries, binary extensions) that every tree walker uses.

use std::path::Path;

/// Extensions treated as binary or otherwise unscannable
pub const BINARY_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "ico", "svg", "pdf", "zip", "tar", "gz", "exe", "dll", "so",
    "dylib", "class", "pyc", "woff", "woff2", "ttf", "eot", "mp4", "mp3", "webm",
];

/// Source extensions sampled by the origin ensemble
pub const SOURCE_EXTENSIONS: &[&str] = &["py", "js", "ts", "java", "c", "cpp", "go", "rs"];

/// Read a file as UTF-8, replacing invalid sequences.
///
/// Repositories under analysis contain arbitrary encodings; a lossy read
/// keeps the walkers moving instead of aborting on the first Latin-1 file.
pub fn read_lossy(path: &Path) -> std::io::Result<String> {
    let raw = std::fs::read(path)?;
    Ok(String::from_utf8_lossy(&raw).into_owned())
}

/// Lowercased extension of a path, if any
pub fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
}

/// Map a file extension to a language label
pub fn detect_language(path: &Path) -> &'static str {
    match extension(path).as_deref() {
        Some("py") => "python",
        Some("js") => "javascript",
        Some("ts") => "typescript",
        Some("java") => "java",
        Some("c") | Some("h") => "c",
        Some("cpp") | Some("cc") | Some("hpp") => "cpp",
        Some("go") => "go",
        Some("rs") => "rust",
        _ => "unknown",
    }
}

/// Whether a directory entry name is hidden (dotfile)
pub fn is_hidden(name: &str) -> bool {
    name.starts_with('.')
}

/// Whether the file looks binary by extension
pub fn is_binary_ext(path: &Path) -> bool {
    matches!(extension(path).as_deref(), Some(ext) if BINARY_EXTENSIONS.contains(&ext))
}

/// Whether the file is a source file the origin ensemble samples
pub fn is_source_file(path: &Path) -> bool {
    matches!(extension(path).as_deref(), Some(ext) if SOURCE_EXTENSIONS.contains(&ext))
}
