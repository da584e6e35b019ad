use anyhow::{Context, Result};
use tracing::info;

use crate::api::OpenAiClient;
use crate::config::Settings;
use crate::reflection;
use crate::workspace::Workspace;

/// Run one request against the real provider and print the diff.
pub async fn run_change(settings: Settings, repo_url: &str, prompt: &str) -> Result<()> {
    let provider = OpenAiClient::new(&settings.openai_base_url, settings.api_key()?.to_string())?;

    let mut workspace = Workspace::open(repo_url).await?;
    let result = reflection::run(&provider, &settings.loop_config, &workspace, prompt).await;
    workspace.close()?;
    let report = result.context("Change request failed")?;

    info!(
        "{} after {} attempt(s)",
        if report.accepted { "Accepted" } else { "Gave up" },
        report.attempts
    );
    print!("{}", report.diff);
    Ok(())
}
