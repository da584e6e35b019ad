//! Unified diff of the working tree against the baseline.

use std::path::Path;

use tracing::debug;

use super::repo::{git, Workspace};
use crate::error::Result;

/// Paths whose status is `M` in `git diff --name-status -z` output.
fn modified_paths(name_status: &[u8]) -> Vec<String> {
    let mut fields = name_status
        .split(|b| *b == 0)
        .filter(|field| !field.is_empty())
        .map(|field| String::from_utf8_lossy(field).into_owned());

    let mut modified = Vec::new();
    while let Some(status) = fields.next() {
        // Renames and copies carry a source and a destination path.
        let path_count = if status.starts_with('R') || status.starts_with('C') {
            2
        } else {
            1
        };
        let paths: Vec<String> = fields.by_ref().take(path_count).collect();
        if status == "M" {
            if let Some(path) = paths.into_iter().next() {
                modified.push(path);
            }
        }
    }
    modified
}

/// Lines in `bytes`, counting a last line that has no newline.
fn line_count(bytes: &[u8]) -> usize {
    let newlines = bytes.iter().filter(|b| **b == b'\n').count();
    if bytes.last().is_some_and(|b| *b != b'\n') {
        newlines + 1
    } else {
        newlines
    }
}

/// Context lines that make one hunk span both versions of `path`.
async fn whole_file_context(root: &Path, path: &str) -> Result<usize> {
    let baseline = git(root, &["cat-file", "blob", &format!("HEAD:{}", path)]).await?;
    let current = tokio::fs::read(root.join(path)).await?;
    Ok(line_count(&baseline).max(line_count(&current)).max(1))
}

/// Concatenated full-context diffs of every modified tracked file, in the
/// order git lists them. Added, deleted and untracked files are left out.
pub async fn unified_diff(workspace: &Workspace) -> Result<String> {
    let root = workspace.path();
    let name_status = git(root, &["diff", "--name-status", "--no-renames", "-z"]).await?;
    let modified = modified_paths(&name_status);
    debug!("{} modified file(s)", modified.len());

    let mut diff = String::new();
    for path in &modified {
        let unified = format!("--unified={}", whole_file_context(root, path).await?);
        let output = git(
            root,
            &[
                "--literal-pathspecs",
                "diff",
                "--no-color",
                "--no-ext-diff",
                &unified,
                "--",
                path,
            ],
        )
        .await?;
        diff.push_str(&String::from_utf8_lossy(&output));
    }

    Ok(diff)
}
