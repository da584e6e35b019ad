//! The reflection loop: edit, diff, judge, retry.

use std::panic::AssertUnwindSafe;

use futures_util::FutureExt;
use tracing::{debug, info};

use crate::agent::Agent;
use crate::api::LlmProvider;
use crate::config::LoopConfig;
use crate::error::Result;
use crate::judge::Judge;
use crate::workspace::{select_files, unified_diff, RemoteFileSet, Workspace};

/// Result of a finished loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeReport {
    /// Diff produced by the last attempt.
    pub diff: String,
    /// Agent passes that ran.
    pub attempts: usize,
    /// The judge approved the diff before attempts ran out.
    pub accepted: bool,
}

/// Run the agent against `workspace` until the judge approves its diff or
/// `config.max_attempts` passes have run.
///
/// The judge first sees a diff at the head of the second iteration. The tree
/// is reset after every pass, so the returned diff is the only artifact.
/// The assistant and the uploaded files are deleted on every exit path,
/// including panics.
pub async fn run(
    provider: &dyn LlmProvider,
    config: &LoopConfig,
    workspace: &Workspace,
    prompt: &str,
) -> Result<ChangeReport> {
    let mut files = RemoteFileSet::new(provider);
    let mut agent = None;

    let result = AssertUnwindSafe(attempts(
        provider,
        config,
        workspace,
        prompt,
        &mut files,
        &mut agent,
    ))
    .catch_unwind()
    .await;

    if let Some(mut agent) = agent {
        agent.close().await;
    }
    files.close().await;

    match result {
        Ok(report) => report,
        Err(panic) => std::panic::resume_unwind(panic),
    }
}

async fn attempts<'a>(
    provider: &'a dyn LlmProvider,
    config: &LoopConfig,
    workspace: &Workspace,
    prompt: &str,
    files: &mut RemoteFileSet<'a>,
    agent: &mut Option<Agent<'a>>,
) -> Result<ChangeReport> {
    let selected = select_files(workspace.path(), &config.supported_types)?;
    info!("Selected {} file(s) from {}", selected.len(), workspace.repo_url());

    files.upload(&selected).await?;
    let agent = agent.insert(Agent::create(provider, &config.model, files.files()).await?);
    let judge = Judge::new(provider, &config.model);

    let mut diff = String::new();
    let mut attempt = 0;
    let accepted = loop {
        if attempt >= config.max_attempts {
            break false;
        }
        if attempt > 0 && judge.is_good(&diff, prompt).await {
            break true;
        }

        attempt += 1;
        info!("Attempt {}/{}", attempt, config.max_attempts);

        let outcome = agent.run(prompt, workspace).await?;
        diff = unified_diff(workspace).await?;
        workspace.reset_to_baseline().await?;

        info!(
            "Attempt {} wrote {} file(s), discarded {} call(s), diff {} bytes{}",
            attempt,
            outcome.files_written.len(),
            outcome.calls_discarded,
            diff.len(),
            if outcome.errored { ", ended early" } else { "" }
        );
    };

    if accepted {
        info!("Change accepted after {} attempt(s)", attempt);
    } else {
        info!("No accepted change after {} attempt(s)", attempt);
    }
    debug!("Final diff:\n{}", diff);

    Ok(ChangeReport {
        diff,
        attempts: attempt,
        accepted,
    })
}
