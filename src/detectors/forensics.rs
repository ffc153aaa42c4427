//! Commit forensics
//!
//! Walks every commit reachable from any ref (bounded), attributes work to
//! authors, aggregates activity into day/week/month buckets, and flags
//! suspicious commits: empty commits, repeated-message spam, and
//! superhuman commit cadence. Also reports which author "won" the most
//! periods at each granularity.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use git2::{BranchType, Repository};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use tracing::debug;

/// Upper bound on commits walked across all refs
const MAX_COMMITS: usize = 5000;

/// Commits inspected per local branch for branch attribution
const MAX_BRANCH_COMMITS: usize = 100;

/// Seconds under which two same-message commits count as spam
const SPAM_WINDOW_SECS: i64 = 300;

/// Seconds under which any commit pair counts as superhuman
const SUPERHUMAN_SECS: i64 = 10;

/// Per-author rollup
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthorStats {
    pub commits: u64,
    pub lines_changed: u64,
    pub active_days_count: usize,
    /// Top three file extensions touched, as `ext (count)` strings
    pub top_file_types: String,
}

/// One flagged commit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuspiciousCommit {
    pub hash: String,
    pub author: String,
    pub message: String,
    pub reasons: Vec<String>,
}

/// Winner of the most periods at one granularity
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PeriodWinners {
    pub top_daily: String,
    pub top_weekly: String,
    pub top_monthly: String,
}

/// Forensics detector output
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ForensicsReport {
    pub total_commits: usize,
    pub branch_count: usize,
    pub branches: Vec<String>,
    /// branch → author → commit count over the branch's recent history
    pub branch_activity: BTreeMap<String, BTreeMap<String, u64>>,
    pub author_stats: BTreeMap<String, AuthorStats>,
    pub dummy_commits: usize,
    pub suspicious_list: Vec<SuspiciousCommit>,
    pub consistency_stats: PeriodWinners,
}

/// Working state accumulated per author during the walk
#[derive(Default)]
struct AuthorAccum {
    commits: u64,
    lines_added: u64,
    lines_deleted: u64,
    active_days: HashSet<String>,
    file_types: HashMap<String, u64>,
}

/// Analyze commit history of a cloned working copy
pub fn analyze_commits(repo_path: &Path) -> Result<ForensicsReport> {
    let repo = Repository::open(repo_path).context("Failed to open repository")?;

    let branches = collect_branches(&repo);
    let branch_activity = branch_author_breakdown(&repo);

    // Full history from all refs, oldest first for timeline analysis
    let mut commits = collect_commits(&repo)?;
    commits.sort_by_key(|c| c.time().seconds());

    let mut authors: HashMap<String, AuthorAccum> = HashMap::new();
    let mut daily: HashMap<String, HashMap<String, u64>> = HashMap::new();
    let mut weekly: HashMap<String, HashMap<String, u64>> = HashMap::new();
    let mut monthly: HashMap<String, HashMap<String, u64>> = HashMap::new();
    let mut suspicious = Vec::new();
    let mut dummy_commits = 0usize;
    let mut prev: Option<(i64, String)> = None;

    for commit in &commits {
        let author = commit
            .author()
            .name()
            .unwrap_or("Unknown")
            .to_string();
        let when = commit.time().seconds();
        let message = commit.message().unwrap_or("").trim().to_string();

        let (day_key, week_key, month_key) = period_keys(when);

        *daily.entry(day_key.clone()).or_default().entry(author.clone()).or_insert(0) += 1;
        *weekly.entry(week_key).or_default().entry(author.clone()).or_insert(0) += 1;
        *monthly.entry(month_key).or_default().entry(author.clone()).or_insert(0) += 1;

        let accum = authors.entry(author.clone()).or_default();
        accum.commits += 1;
        accum.active_days.insert(day_key);

        // Diff stats against the first parent; root commits (and any
        // commit whose diff fails) contribute 0/0 rather than aborting
        let (added, deleted) = match commit_diff(&repo, commit, accum) {
            Ok(pair) => pair,
            Err(e) => {
                debug!("diff failed for {}: {}", commit.id(), e);
                (0, 0)
            }
        };
        accum.lines_added += added;
        accum.lines_deleted += deleted;

        let mut reasons = Vec::new();
        if added == 0 && deleted == 0 {
            reasons.push("Empty/Dummy Commit".to_string());
            dummy_commits += 1;
        }
        if let Some((prev_when, prev_msg)) = &prev {
            let delta = when - prev_when;
            if message == *prev_msg && delta < SPAM_WINDOW_SECS {
                reasons.push("Repeated Commit (Spam)".to_string());
            }
            if delta < SUPERHUMAN_SECS {
                reasons.push("Superhuman Speed (<10s)".to_string());
            }
        }
        if !reasons.is_empty() {
            suspicious.push(SuspiciousCommit {
                hash: commit.id().to_string()[..7].to_string(),
                author: author.clone(),
                message: message.chars().take(30).collect(),
                reasons,
            });
        }

        prev = Some((when, message));
    }

    let consistency_stats = PeriodWinners {
        top_daily: period_winner(&daily, "days"),
        top_weekly: period_winner(&weekly, "weeks"),
        top_monthly: period_winner(&monthly, "months"),
    };

    let author_stats = authors
        .into_iter()
        .map(|(name, accum)| {
            let mut types: Vec<(String, u64)> = accum.file_types.into_iter().collect();
            types.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
            let top_file_types = types
                .iter()
                .take(3)
                .map(|(ext, n)| format!("{ext} ({n})"))
                .collect::<Vec<_>>()
                .join(", ");
            (
                name,
                AuthorStats {
                    commits: accum.commits,
                    lines_changed: accum.lines_added + accum.lines_deleted,
                    active_days_count: accum.active_days.len(),
                    top_file_types,
                },
            )
        })
        .collect();

    Ok(ForensicsReport {
        total_commits: commits.len(),
        branch_count: branches.len(),
        branches,
        branch_activity,
        author_stats,
        dummy_commits,
        suspicious_list: suspicious,
        consistency_stats,
    })
}

/// Union of local and remote branch names
fn collect_branches(repo: &Repository) -> Vec<String> {
    let mut names = HashSet::new();
    if let Ok(branches) = repo.branches(None) {
        for branch in branches.flatten() {
            if let Ok(Some(name)) = branch.0.name() {
                names.insert(name.to_string());
            }
        }
    }
    if names.is_empty() {
        names.insert("master".to_string());
    }
    let mut out: Vec<String> = names.into_iter().collect();
    out.sort();
    out
}

/// Per-branch author→count over each local branch's recent commits
fn branch_author_breakdown(repo: &Repository) -> BTreeMap<String, BTreeMap<String, u64>> {
    let mut out = BTreeMap::new();
    let Ok(branches) = repo.branches(Some(BranchType::Local)) else {
        return out;
    };
    for branch in branches.flatten() {
        let (branch, _) = branch;
        let Ok(Some(name)) = branch.name().map(|n| n.map(String::from)) else {
            continue;
        };
        let Some(target) = branch.get().target() else {
            continue;
        };
        let Ok(mut walk) = repo.revwalk() else {
            continue;
        };
        if walk.push(target).is_err() {
            continue;
        }
        let mut counts: BTreeMap<String, u64> = BTreeMap::new();
        for oid in walk.flatten().take(MAX_BRANCH_COMMITS) {
            if let Ok(commit) = repo.find_commit(oid) {
                let author = commit.author().name().unwrap_or("Unknown").to_string();
                *counts.entry(author).or_insert(0) += 1;
            }
        }
        out.insert(name, counts);
    }
    out
}

/// All commits reachable from any ref, bounded to `MAX_COMMITS`
fn collect_commits(repo: &Repository) -> Result<Vec<git2::Commit<'_>>> {
    let mut walk = repo.revwalk().context("Failed to create revwalk")?;
    walk.push_glob("*").context("Failed to push refs")?;

    let mut commits = Vec::new();
    for oid in walk.flatten().take(MAX_COMMITS) {
        if let Ok(commit) = repo.find_commit(oid) {
            commits.push(commit);
        }
    }
    Ok(commits)
}

/// Insertions/deletions of a commit against its first parent, also
/// tallying per-extension file-type counts for the author
fn commit_diff(
    repo: &Repository,
    commit: &git2::Commit<'_>,
    accum: &mut AuthorAccum,
) -> Result<(u64, u64)> {
    if commit.parent_count() == 0 {
        return Ok((0, 0));
    }
    let parent_tree = commit.parent(0)?.tree()?;
    let tree = commit.tree()?;
    let diff = repo.diff_tree_to_tree(Some(&parent_tree), Some(&tree), None)?;

    for delta in diff.deltas() {
        if let Some(path) = delta.new_file().path() {
            let ext = path
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or("no_ext")
                .to_string();
            *accum.file_types.entry(ext).or_insert(0) += 1;
        }
    }

    let stats = diff.stats()?;
    Ok((stats.insertions() as u64, stats.deletions() as u64))
}

/// Day / week / month bucket keys for a committer timestamp
fn period_keys(epoch_secs: i64) -> (String, String, String) {
    let dt: DateTime<Utc> = DateTime::from_timestamp(epoch_secs, 0).unwrap_or_default();
    (
        dt.format("%Y-%m-%d").to_string(),
        dt.format("%Y-W%U").to_string(),
        dt.format("%Y-%m").to_string(),
    )
}

/// Which author topped the most periods at one granularity
fn period_winner(activity: &HashMap<String, HashMap<String, u64>>, unit: &str) -> String {
    let mut wins: HashMap<&String, u64> = HashMap::new();
    for counts in activity.values() {
        if let Some((top, _)) = counts
            .iter()
            .max_by(|a, b| a.1.cmp(b.1).then(b.0.cmp(a.0)))
        {
            *wins.entry(top).or_insert(0) += 1;
        }
    }
    match wins.iter().max_by(|a, b| a.1.cmp(b.1).then(b.0.cmp(a.0))) {
        Some((author, count)) => format!("{author} (Led {count} {unit})"),
        None => format!("None (Led 0 {unit})"),
    }
}
