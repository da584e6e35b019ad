//! Picks the files of a working tree the agent is allowed to see and edit.

use std::cmp::Ordering;
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::{DirEntry, WalkDir};

use crate::error::Result;

/// Extensions the agent may read and rewrite.
pub const DEFAULT_SUPPORTED_TYPES: [&str; 7] = [".c", ".cpp", ".py", ".sh", ".md", ".html", ".txt"];

/// A file chosen from the baseline tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedFile {
    /// Path relative to the tree root, `/`-separated.
    pub relative_path: String,
    pub absolute_path: PathBuf,
    /// Content at selection time.
    pub content: Vec<u8>,
}

fn is_git_dir(entry: &DirEntry) -> bool {
    entry.depth() > 0 && entry.file_type().is_dir() && entry.file_name() == ".git"
}

/// Sort key of an entry within its directory. Git orders a subtree as if its
/// name ended in `/`.
fn tree_order_key(entry: &DirEntry) -> OsString {
    let mut key = entry.file_name().to_os_string();
    if entry.file_type().is_dir() {
        key.push("/");
    }
    key
}

fn tree_order(a: &DirEntry, b: &DirEntry) -> Ordering {
    tree_order_key(a).cmp(&tree_order_key(b))
}

/// Whether a basename ends with one of `supported_types`.
pub fn is_supported(file_name: &str, supported_types: &[String]) -> bool {
    supported_types
        .iter()
        .any(|suffix| file_name.ends_with(suffix.as_str()))
}

/// Walk `root` depth-first in git tree order and collect every non-empty
/// regular file whose name ends with a supported extension.
///
/// Symlinks are not followed and `.git` is skipped. Any entry that cannot be
/// walked or read fails the whole selection.
pub fn select_files(root: &Path, supported_types: &[String]) -> Result<Vec<SelectedFile>> {
    let mut selected = Vec::new();

    debug!("Selecting files under {}", root.display());

    let walker = WalkDir::new(root)
        .sort_by(tree_order)
        .into_iter()
        .filter_entry(|entry| !is_git_dir(entry));

    for entry in walker {
        let entry = entry.map_err(io::Error::from)?;

        if !entry.file_type().is_file() {
            continue;
        }

        let file_name = entry.file_name().to_string_lossy();
        if !is_supported(&file_name, supported_types) {
            continue;
        }

        let path = entry.path();
        let relative_path = path
            .strip_prefix(root)
            .map_err(|_| {
                io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("{} is outside {}", path.display(), root.display()),
                )
            })?
            .to_string_lossy()
            .replace('\\', "/");

        let content = fs::read(path).map_err(|e| {
            io::Error::new(e.kind(), format!("failed to read {}: {}", path.display(), e))
        })?;

        if content.is_empty() {
            debug!("Skipping empty file: {}", relative_path);
            continue;
        }

        selected.push(SelectedFile {
            relative_path,
            absolute_path: path.to_path_buf(),
            content,
        });
    }

    debug!("Selected {} files", selected.len());

    Ok(selected)
}
