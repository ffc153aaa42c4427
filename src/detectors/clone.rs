//! Repository clone node
//!
//! Clones the submitted URL into a freshly allocated temporary directory
//! with full history (commit forensics needs every commit, so shallow
//! clones are disabled). If the in-process git2 clone fails, falls back to
//! the external `git` binary. Clone failure is the only fatal detector
//! outcome: without a working copy nothing downstream can run.

use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{info, warn};

/// A cloned working copy rooted in a temp directory.
///
/// The directory is owned by exactly one job and removed explicitly on
/// every job exit path (`cleanup`); `TempDir`'s drop is the backstop.
pub struct Workspace {
    dir: tempfile::TempDir,
}

impl Workspace {
    /// Absolute path of the working copy
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Remove the working directory, best-effort
    pub fn cleanup(self) {
        let path = self.dir.path().to_path_buf();
        if let Err(e) = self.dir.close() {
            warn!("Failed to remove working directory {:?}: {}", path, e);
        }
    }
}

/// Clone `url` into a new temporary working directory with full history.
pub fn clone_repository(url: &str) -> Result<Workspace> {
    let dir = tempfile::Builder::new()
        .prefix("repojudge-")
        .tempdir()
        .context("Failed to allocate working directory")?;

    info!("Cloning {} into {:?}", url, dir.path());

    match git2::Repository::clone(url, dir.path()) {
        Ok(_) => {
            info!("Cloned {} (libgit2)", url);
            Ok(Workspace { dir })
        }
        Err(e) => {
            warn!("libgit2 clone failed ({}), retrying with git CLI", e);
            clone_with_cli(url, dir.path())?;
            Ok(Workspace { dir })
        }
    }
}

/// Fallback clone through the external `git` binary.
///
/// Some transports (credential helpers, exotic schemes) work there when
/// libgit2 does not.
fn clone_with_cli(url: &str, target: &Path) -> Result<()> {
    // git refuses to clone into a non-empty directory; a failed libgit2
    // attempt may have left partial state behind
    clear_dir(target)?;

    let output = Command::new("git")
        .arg("clone")
        .arg(url)
        .arg(target)
        .env("GIT_TERMINAL_PROMPT", "0")
        .output()
        .context("Failed to execute git clone")?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(anyhow!("git clone failed: {}", stderr.trim()));
    }

    info!("Cloned {} (git CLI)", url);
    Ok(())
}

fn clear_dir(target: &Path) -> Result<()> {
    for entry in std::fs::read_dir(target).context("Failed to read working directory")? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            std::fs::remove_dir_all(&path)?;
        } else {
            std::fs::remove_file(&path)?;
        }
    }
    Ok(())
}

/// Resolve a working path for the submission: local paths (used by the CLI
/// and tests) skip the network clone entirely.
pub fn path_or_clone(url_or_path: &str) -> Result<(PathBuf, Option<Workspace>)> {
    let candidate = Path::new(url_or_path);
    if candidate.is_dir() {
        return Ok((candidate.to_path_buf(), None));
    }
    let workspace = clone_repository(url_or_path)?;
    let path = workspace.path().to_path_buf();
    Ok((path, Some(workspace)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clone_rejects_bogus_url() {
        let err = clone_repository("https://invalid.invalid/nope/nope.git");
        assert!(err.is_err());
    }

    #[test]
    fn test_clone_local_repository() {
        // Author a tiny repo, then clone it through the normal path
        let source = tempfile::tempdir().unwrap();
        let repo = git2::Repository::init(source.path()).unwrap();
        std::fs::write(source.path().join("README.md"), "# fixture\n").unwrap();
        let mut index = repo.index().unwrap();
        index.add_path(Path::new("README.md")).unwrap();
        index.write().unwrap();
        let tree_id = index.write_tree().unwrap();
        let tree = repo.find_tree(tree_id).unwrap();
        let sig = git2::Signature::now("Fixture", "fixture@example.com").unwrap();
        repo.commit(Some("HEAD"), &sig, &sig, "initial", &tree, &[])
            .unwrap();

        let workspace = clone_repository(source.path().to_str().unwrap()).unwrap();
        assert!(workspace.path().join("README.md").exists());
        workspace.cleanup();
    }
}
