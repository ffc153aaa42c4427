//! Winnowing fingerprints for plagiarism comparison
//!
//! A file is tokenized with a language-neutral regex, split into k-grams,
//! and each k-gram is hashed with a truncated SHA-1. The winnowing
//! selection keeps the minimum hash of every sliding window; the union of
//! selections is the file's fingerprint. Two fingerprints compare by
//! Jaccard similarity.
//!
//! The selection is fully deterministic: identical token streams produce
//! identical fingerprints across runs and machines.

use once_cell::sync::Lazy;
use regex::Regex;
use sha1::{Digest, Sha1};
use std::collections::HashSet;

/// k-gram length
pub const K: usize = 5;

/// Winnowing window size
pub const W: usize = 4;

/// Language-neutral token pattern: identifiers, numerics, multi-char
/// operators, single punctuation.
static TOKEN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[A-Za-z_]\w+|\d+|==|!=|<=|>=|[{}()\[\];,.<>+\-*/%=]").expect("valid token regex")
});

/// Tokenize source text
pub fn tokenize(code: &str) -> Vec<String> {
    TOKEN_RE
        .find_iter(code)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Hash one k-gram: first 8 bytes of SHA-1 over the space-joined tokens,
/// interpreted big-endian.
fn kgram_hash(kgram: &[String]) -> u64 {
    let mut hasher = Sha1::new();
    hasher.update(kgram.join(" ").as_bytes());
    let digest = hasher.finalize();
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(bytes)
}

/// (hash, position) for every k-gram in the token stream
fn kgram_hashes(tokens: &[String], k: usize) -> Vec<(u64, usize)> {
    if tokens.len() < k {
        return Vec::new();
    }
    tokens
        .windows(k)
        .enumerate()
        .map(|(i, kg)| (kgram_hash(kg), i))
        .collect()
}

/// Winnowing selection over the k-gram hash stream.
///
/// Every window of `w` consecutive k-gram hashes contributes its minimum;
/// ties prefer the rightmost occurrence. Returns the fingerprint set.
pub fn winnow(tokens: &[String], k: usize, w: usize) -> HashSet<u64> {
    let khashes = kgram_hashes(tokens, k);
    let mut selected = HashSet::new();
    if khashes.len() < w {
        // No complete window, no selections
        return selected;
    }
    for window in khashes.windows(w) {
        if let Some(min) = window_min(window) {
            selected.insert(min);
        }
    }
    selected
}

/// Minimum of a window by (hash, rightmost position)
fn window_min(window: &[(u64, usize)]) -> Option<u64> {
    window
        .iter()
        .min_by(|a, b| a.0.cmp(&b.0).then(b.1.cmp(&a.1)))
        .map(|&(h, _)| h)
}

/// Fingerprint a file with the default parameters
pub fn fingerprint(code: &str) -> HashSet<u64> {
    winnow(&tokenize(code), K, W)
}

/// Jaccard similarity of two fingerprints
pub fn jaccard(a: &HashSet<u64>, b: &HashSet<u64>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 0.0;
    }
    let inter = a.intersection(b).count();
    let union = a.union(b).count();
    if union == 0 {
        0.0
    } else {
        inter as f64 / union as f64
    }
}
