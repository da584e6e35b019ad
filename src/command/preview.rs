use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::config::LoopConfig;
use crate::workspace::{select_files, SelectedFile};

fn format_size(total_bytes: usize) -> String {
    if total_bytes >= 1024 * 1024 {
        format!("{:.2} MB", total_bytes as f64 / (1024.0 * 1024.0))
    } else if total_bytes >= 1024 {
        format!("{:.2} KB", total_bytes as f64 / 1024.0)
    } else {
        format!("{} bytes", total_bytes)
    }
}

/// Paths that look like they hold credentials.
fn sensitive_paths(files: &[SelectedFile]) -> Vec<&str> {
    let sensitive_patterns = ["password", "secret", "credential", "api_key", "apikey", "token"];
    files
        .iter()
        .map(|f| f.relative_path.as_str())
        .filter(|path| {
            let lower_path = path.to_lowercase();
            sensitive_patterns.iter().any(|p| lower_path.contains(p))
        })
        .collect()
}

fn render(root: &Path, config: &LoopConfig, files: &[SelectedFile], verbose: bool) -> String {
    let mut out = String::new();
    let total_bytes: usize = files.iter().map(|f| f.content.len()).sum();

    out.push_str(&format!("Scanning workspace: {}\n\n", root.display()));
    out.push_str("Summary:\n");
    out.push_str(&format!(
        "  File types: {}\n",
        config.supported_types.join(" ")
    ));
    out.push_str(&format!("  Files to upload: {}\n", files.len()));
    out.push_str(&format!("  Total size: {}\n", format_size(total_bytes)));

    let sensitive = sensitive_paths(files);
    if !sensitive.is_empty() {
        out.push_str(&format!(
            "\nWarning: {} file(s) may contain sensitive data:\n",
            sensitive.len()
        ));
        for path in &sensitive {
            out.push_str(&format!("    - {}\n", path));
        }
    }

    if verbose {
        out.push_str("\nFiles:\n");
        for file in files {
            let size = file.content.len();
            let size_str = if size >= 1024 {
                format!("{:.1}K", size as f64 / 1024.0)
            } else {
                format!("{}B", size)
            };
            out.push_str(&format!("  {:>8}  {}\n", size_str, file.relative_path));
        }
    } else if !files.is_empty() {
        out.push_str("\n  Use --verbose to see all files\n");
    }

    out
}

/// List what a request against `workspace_root` would upload, without
/// contacting the provider.
pub async fn run_preview(
    config: &LoopConfig,
    workspace_root: Option<PathBuf>,
    verbose: bool,
) -> Result<()> {
    let root_path = match workspace_root {
        Some(path) => path,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };

    if !root_path.is_dir() {
        anyhow::bail!("Workspace path does not exist: {}", root_path.display());
    }

    let files = select_files(&root_path, &config.supported_types)
        .context("Failed to scan workspace")?;
    print!("{}", render(&root_path, config, &files, verbose));
    Ok(())
}
