//! A temporary clone of the target repository.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tempfile::TempDir;
use tokio::process::Command;
use tracing::{debug, info};

use crate::error::{ChangeError, Result};

/// Name of the clone inside the temporary directory
const CLONE_DIR: &str = "repo";

/// Run git in `dir` and return its stdout.
pub(crate) async fn git(dir: &Path, args: &[&str]) -> Result<Vec<u8>> {
    debug!("git {} (in {})", args.join(" "), dir.display());

    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .env("GIT_TERMINAL_PROMPT", "0")
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|e| ChangeError::Git(format!("failed to run git {}: {}", args.join(" "), e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ChangeError::Git(format!(
            "git {} failed: {}",
            args.join(" "),
            stderr.trim()
        )));
    }

    Ok(output.stdout)
}

/// A repository cloned into a temporary directory.
///
/// The clone's checkout at open time is the baseline every diff and reset is
/// measured against. The directory is removed on [`Workspace::close`] or, at
/// the latest, when the value is dropped.
#[derive(Debug)]
pub struct Workspace {
    dir: Option<TempDir>,
    root: PathBuf,
    repo_url: String,
}

impl Workspace {
    /// Clone `repo_url` into a fresh temporary directory.
    pub async fn open(repo_url: &str) -> Result<Self> {
        let dir = tempfile::Builder::new().prefix("tinygen-").tempdir()?;

        info!("Cloning {}", repo_url);
        git(dir.path(), &["clone", "--quiet", "--", repo_url, CLONE_DIR])
            .await
            .map_err(|e| ChangeError::CloneFailed {
                url: repo_url.to_string(),
                reason: e.to_string(),
            })?;

        let root = dir.path().join(CLONE_DIR);
        debug!("Cloned {} into {}", repo_url, root.display());

        Ok(Self {
            dir: Some(dir),
            root,
            repo_url: repo_url.to_string(),
        })
    }

    /// Root of the working tree.
    pub fn path(&self) -> &Path {
        &self.root
    }

    pub fn repo_url(&self) -> &str {
        &self.repo_url
    }

    /// Restore tracked files and drop untracked ones.
    pub async fn reset_to_baseline(&self) -> Result<()> {
        git(&self.root, &["reset", "--hard", "--quiet"])
            .await
            .map_err(|e| ChangeError::ResetFailed(e.to_string()))?;
        git(&self.root, &["clean", "-fd", "--quiet"])
            .await
            .map_err(|e| ChangeError::ResetFailed(e.to_string()))?;
        debug!("Reset {} to baseline", self.root.display());
        Ok(())
    }

    /// Delete the directory and everything in it. Safe to call twice.
    pub fn close(&mut self) -> Result<()> {
        if let Some(dir) = self.dir.take() {
            dir.close()?;
            debug!("Removed workspace for {}", self.repo_url);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixture_repo;

    #[tokio::test]
    async fn test_open_clones_baseline() {
        let origin = fixture_repo(&[("src/main.py", "print('hi')\n"), ("README.md", "# demo\n")]);
        let workspace = Workspace::open(origin.url()).await.unwrap();

        let content = std::fs::read_to_string(workspace.path().join("src/main.py")).unwrap();
        assert_eq!(content, "print('hi')\n");
        assert!(workspace.path().join(".git").is_dir());
        assert_eq!(workspace.repo_url(), origin.url());
    }

    #[tokio::test]
    async fn test_open_unreachable_repo_fails_with_clone_error() {
        let missing = tempfile::TempDir::new().unwrap();
        let url = missing.path().join("does-not-exist");
        let err = Workspace::open(url.to_str().unwrap()).await.unwrap_err();
        assert!(matches!(err, ChangeError::CloneFailed { .. }));
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_reset_restores_tracked_and_removes_untracked() {
        let origin = fixture_repo(&[("src/main.py", "print('hi')\n")]);
        let workspace = Workspace::open(origin.url()).await.unwrap();
        let root = workspace.path();

        std::fs::write(root.join("src/main.py"), "print('changed')\n").unwrap();
        std::fs::write(root.join("stray.txt"), "junk").unwrap();
        std::fs::create_dir_all(root.join("newdir/nested")).unwrap();
        std::fs::write(root.join("newdir/nested/file.c"), "int x;").unwrap();

        workspace.reset_to_baseline().await.unwrap();

        assert_eq!(
            std::fs::read_to_string(root.join("src/main.py")).unwrap(),
            "print('hi')\n"
        );
        assert!(!root.join("stray.txt").exists());
        assert!(!root.join("newdir").exists());
    }

    #[tokio::test]
    async fn test_close_is_idempotent_and_removes_directory() {
        let origin = fixture_repo(&[("a.txt", "a\n")]);
        let mut workspace = Workspace::open(origin.url()).await.unwrap();
        let root = workspace.path().to_path_buf();
        assert!(root.exists());

        workspace.close().unwrap();
        assert!(!root.exists());
        workspace.close().unwrap();
    }

    #[tokio::test]
    async fn test_drop_removes_directory() {
        let origin = fixture_repo(&[("a.txt", "a\n")]);
        let root = {
            let workspace = Workspace::open(origin.url()).await.unwrap();
            workspace.path().to_path_buf()
        };
        assert!(!root.exists());
    }
}
