//! Code-origin ensemble: LLM likelihood + internal plagiarism
//!
//! Samples the largest source files of the working copy and scores each on
//! two axes:
//!
//! - **LLM likelihood** in [0, 1]: a local token-entropy heuristic
//!   (LLM-like code exhibits lower token entropy than human code),
//!   averaged with any configured external detectors that respond.
//! - **Internal plagiarism**: pairwise winnowing-fingerprint similarity
//!   across the pool; for language pairs with an AST backend, combined
//!   with AST-shape similarity. Each file records its best-matching peer.
//!
//! An empty sample (no source files) yields empty maps, which the
//! aggregator reads as zero risk.

use async_trait::async_trait;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::ast_sim;
use crate::fingerprint;
use crate::fsutil;

/// Files scored for LLM likelihood (largest first)
const LLM_SAMPLE: usize = 15;

/// Files entered into the pairwise plagiarism pool
const PLAG_SAMPLE: usize = 20;

/// Minimum file size considered
const MIN_FILE_BYTES: u64 = 100;

/// Entropy midpoint of the logistic transform
const ENTROPY_MIDPOINT: f64 = 6.0;

/// Token count at which the length dampener saturates
const LENGTH_SATURATION: f64 = 2000.0;

/// Content cap forwarded to external detectors
const PROVIDER_CONTENT_CAP: usize = 20_000;

/// Weight of AST similarity in the combined plagiarism score
const AST_WEIGHT: f64 = 0.6;

/// An external origin detector returning a likelihood in [0, 1].
///
/// `Ok(None)` means the provider is configured but could not produce a
/// score (missing credential, API error); the ensemble simply proceeds
/// without it.
#[async_trait]
pub trait OriginProvider: Send + Sync {
    fn name(&self) -> &str;
    async fn detect(&self, content: &str) -> Option<f64>;
}

/// Remote detector speaking a simple JSON POST protocol
pub struct RemoteOriginDetector {
    name: String,
    endpoint: String,
    api_key: String,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct DetectRequest<'a> {
    content: &'a str,
}

#[derive(Deserialize)]
struct DetectResponse {
    #[serde(alias = "ai_likelihood", alias = "ai_probability")]
    score: Option<f64>,
}

impl RemoteOriginDetector {
    pub fn new(name: impl Into<String>, endpoint: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl OriginProvider for RemoteOriginDetector {
    fn name(&self) -> &str {
        &self.name
    }

    async fn detect(&self, content: &str) -> Option<f64> {
        let body = DetectRequest { content };
        let result = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await;

        match result {
            Ok(resp) => match resp.error_for_status() {
                Ok(resp) => resp
                    .json::<DetectResponse>()
                    .await
                    .ok()
                    .and_then(|r| r.score)
                    .map(|s| s.clamp(0.0, 1.0)),
                Err(e) => {
                    warn!("Origin provider {} rejected request: {}", self.name, e);
                    None
                }
            },
            Err(e) => {
                warn!("Origin provider {} unreachable: {}", self.name, e);
                None
            }
        }
    }
}

/// Per-file entry in the plagiarism map
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlagiarismMatch {
    /// Best-matching other file in the pool
    pub matched_file: String,
    /// Combined similarity in [0, 1]
    pub similarity: f64,
    pub token_similarity: f64,
    pub ast_similarity: f64,
}

/// Origin detector output: both maps are keyed by repo-relative path
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OriginReport {
    pub llm_scores: BTreeMap<String, f64>,
    pub plagiarism: BTreeMap<String, PlagiarismMatch>,
    pub sampled_files: usize,
}

/// A sampled file with its precomputed analysis artifacts
struct SampledFile {
    rel_path: String,
    lang: &'static str,
    content: String,
    tokens: Vec<String>,
    fingerprint: HashSet<u64>,
}

/// Collect candidate source files, largest first
fn sample_files(repo_path: &Path, limit: usize) -> Vec<(PathBuf, u64)> {
    let mut candidates: Vec<(PathBuf, u64)> = WalkDir::new(repo_path)
        .into_iter()
        .filter_entry(|e| !(e.depth() > 0 && fsutil::is_hidden(e.file_name().to_string_lossy().as_ref())))
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| fsutil::is_source_file(e.path()))
        .filter_map(|e| {
            let size = e.metadata().ok()?.len();
            (size >= MIN_FILE_BYTES).then(|| (e.into_path(), size))
        })
        .collect();

    candidates.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    candidates.truncate(limit);
    candidates
}

/// Shannon entropy of the token distribution, in bits
pub fn token_entropy(tokens: &[String]) -> f64 {
    if tokens.is_empty() {
        return 0.0;
    }
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for t in tokens {
        *counts.entry(t.as_str()).or_insert(0) += 1;
    }
    let n = tokens.len() as f64;
    -counts
        .values()
        .map(|&c| {
            let p = c as f64 / n;
            p * p.log2()
        })
        .sum::<f64>()
}

/// Local LLM-likelihood heuristic in [0, 1].
///
/// Logistic in (midpoint − entropy), dampened for short files so that a
/// handful of tokens cannot claim confidence.
pub fn llm_heuristic_score(tokens: &[String]) -> f64 {
    if tokens.is_empty() {
        return 0.0;
    }
    let entropy = token_entropy(tokens);
    let logistic = 1.0 / (1.0 + (entropy - ENTROPY_MIDPOINT).exp());
    let length_factor = (tokens.len() as f64 / LENGTH_SATURATION).min(1.0);
    logistic * length_factor
}

/// Ensemble score for one file: unweighted mean of the local heuristic and
/// every provider that returned a number.
async fn ensemble_score(content: &str, tokens: &[String], providers: &[Box<dyn OriginProvider>]) -> f64 {
    let local = llm_heuristic_score(tokens);
    let capped: String = content.chars().take(PROVIDER_CONTENT_CAP).collect();

    let remote = join_all(providers.iter().map(|p| p.detect(&capped))).await;
    let mut scores: Vec<f64> = vec![local];
    scores.extend(remote.into_iter().flatten());

    scores.iter().sum::<f64>() / scores.len() as f64
}

/// Combined similarity of two sampled files
fn pair_similarity(a: &SampledFile, b: &SampledFile) -> (f64, f64, f64) {
    let token_sim = fingerprint::jaccard(&a.fingerprint, &b.fingerprint);
    if ast_sim::ast_supported(a.lang, b.lang) {
        let ast = ast_sim::ast_similarity(&a.content, &b.content);
        (AST_WEIGHT * ast + (1.0 - AST_WEIGHT) * token_sim, token_sim, ast)
    } else {
        (token_sim, token_sim, 0.0)
    }
}

/// Run the origin ensemble over a working copy
pub async fn analyze_origin(repo_path: &Path, providers: &[Box<dyn OriginProvider>]) -> OriginReport {
    let candidates = sample_files(repo_path, PLAG_SAMPLE);
    if candidates.is_empty() {
        debug!("Origin ensemble found no source files to sample");
        return OriginReport::default();
    }

    let mut pool: Vec<SampledFile> = Vec::new();
    for (path, _) in &candidates {
        let Ok(content) = fsutil::read_lossy(path) else {
            continue;
        };
        let tokens = fingerprint::tokenize(&content);
        let fp = fingerprint::winnow(&tokens, fingerprint::K, fingerprint::W);
        pool.push(SampledFile {
            rel_path: path
                .strip_prefix(repo_path)
                .unwrap_or(path)
                .to_string_lossy()
                .to_string(),
            lang: fsutil::detect_language(path),
            content,
            tokens,
            fingerprint: fp,
        });
    }

    // LLM likelihood over the largest files of the pool
    let mut llm_scores = BTreeMap::new();
    for file in pool.iter().take(LLM_SAMPLE) {
        let score = ensemble_score(&file.content, &file.tokens, providers).await;
        llm_scores.insert(file.rel_path.clone(), score);
    }

    // Pairwise plagiarism: best-matching other file per pool member
    let mut plagiarism = BTreeMap::new();
    for (i, a) in pool.iter().enumerate() {
        let mut best: Option<PlagiarismMatch> = None;
        for (j, b) in pool.iter().enumerate() {
            if i == j {
                continue;
            }
            let (combined, token_sim, ast) = pair_similarity(a, b);
            let better = best.as_ref().map(|m| combined > m.similarity).unwrap_or(true);
            if better {
                best = Some(PlagiarismMatch {
                    matched_file: b.rel_path.clone(),
                    similarity: combined,
                    token_similarity: token_sim,
                    ast_similarity: ast,
                });
            }
        }
        if let Some(m) = best {
            plagiarism.insert(a.rel_path.clone(), m);
        }
    }

    OriginReport { llm_scores, plagiarism, sampled_files: pool.len() }
}
