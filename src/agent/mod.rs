//! The editing agent.
//!
//! An [`Agent`] owns one provider-side assistant configured with the uploaded
//! files and a `write_file` tool limited to their paths. Each [`Agent::run`]
//! streams one conversation and applies the assistant's writes to the
//! workspace as they arrive.

mod events;
mod tools;

pub use events::AgentOutcome;
pub use tools::WRITE_FILE;

use futures_util::StreamExt;
use tracing::{debug, warn};

use crate::api::{
    AssistantSpec, EventStream, FileAnnotation, LlmProvider, RemoteFile, RunEvent, ToolOutput,
};
use crate::error::{ChangeError, Result};
use crate::workspace::Workspace;
use events::EditPass;
use tools::WriteGuard;

/// Display name of the assistant.
pub const ASSISTANT_NAME: &str = "tinygen";

/// Upper bound on tool-output submissions within one pass.
pub const MAX_TOOL_ROUNDS: usize = 32;

fn run_failed(e: anyhow::Error) -> ChangeError {
    ChangeError::AgentRunFailed(format!("{:#}", e))
}

pub struct Agent<'a> {
    provider: &'a dyn LlmProvider,
    assistant_id: Option<String>,
    paths: Vec<String>,
}

impl<'a> Agent<'a> {
    /// Create the assistant for `files`.
    pub async fn create(
        provider: &'a dyn LlmProvider,
        model: &str,
        files: &[RemoteFile],
    ) -> Result<Agent<'a>> {
        let paths: Vec<String> = files.iter().map(|f| f.name.clone()).collect();
        let spec = AssistantSpec {
            name: ASSISTANT_NAME.to_string(),
            model: model.to_string(),
            instructions: tools::instructions(&paths),
            tools: vec![tools::code_interpreter_tool(), tools::write_file_tool(&paths)],
            file_ids: files.iter().map(|f| f.id.clone()).collect(),
        };

        let assistant_id = provider
            .create_assistant(&spec)
            .await
            .map_err(|e| e.context("failed to create assistant"))?;
        debug!("Created assistant {} over {} file(s)", assistant_id, paths.len());

        Ok(Self {
            provider,
            assistant_id: Some(assistant_id),
            paths,
        })
    }

    /// Run one edit pass for `prompt` against `workspace`.
    ///
    /// Provider failures and malformed tool arguments end the pass early and
    /// are reported through [`AgentOutcome::errored`]. Only filesystem errors
    /// are returned.
    pub async fn run(&self, prompt: &str, workspace: &Workspace) -> Result<AgentOutcome> {
        let assistant_id = self
            .assistant_id
            .as_deref()
            .ok_or_else(|| ChangeError::AgentRunFailed("assistant already deleted".to_string()))?;

        let mut pass = EditPass::new(WriteGuard::new(workspace.path(), &self.paths));

        let thread_id = match self.provider.create_thread(prompt).await {
            Ok(id) => id,
            Err(e) => {
                warn!("{}", run_failed(e.context("failed to create thread")));
                pass.mark_errored();
                return Ok(pass.into_outcome());
            }
        };
        debug!("Created thread {}", thread_id);

        let result = self.stream_pass(&thread_id, assistant_id, &mut pass).await;

        if let Err(e) = self.provider.delete_thread(&thread_id).await {
            debug!("Failed to delete thread {}: {:#}", thread_id, e);
        }

        match result {
            Ok(()) => {}
            Err(e) if !e.is_fatal() => {
                warn!("{}", e);
                pass.mark_errored();
            }
            Err(e) => return Err(e),
        }

        let outcome = pass.into_outcome();
        debug!(
            "Pass wrote {} file(s), discarded {} call(s)",
            outcome.files_written.len(),
            outcome.calls_discarded
        );
        Ok(outcome)
    }

    async fn stream_pass(
        &self,
        thread_id: &str,
        assistant_id: &str,
        pass: &mut EditPass<'_>,
    ) -> Result<()> {
        let mut stream = self
            .provider
            .stream_run(thread_id, assistant_id)
            .await
            .map_err(run_failed)?;
        let mut rounds = 0;

        loop {
            let Some((run_id, outputs)) = self.drain(&mut stream, pass).await? else {
                return Ok(());
            };

            rounds += 1;
            if rounds > MAX_TOOL_ROUNDS {
                return Err(ChangeError::AgentRunFailed(format!(
                    "run {} still requires action after {} rounds",
                    run_id, MAX_TOOL_ROUNDS
                )));
            }

            debug!("Submitting {} tool output(s) for run {}", outputs.len(), run_id);
            stream = self
                .provider
                .submit_tool_outputs(thread_id, &run_id, outputs)
                .await
                .map_err(run_failed)?;
        }
    }

    /// Consume `stream` until the run finishes or pauses. A pause yields the
    /// run id and the outputs to submit.
    async fn drain(
        &self,
        stream: &mut EventStream,
        pass: &mut EditPass<'_>,
    ) -> Result<Option<(String, Vec<ToolOutput>)>> {
        while let Some(event) = stream.next().await {
            match event.map_err(run_failed)? {
                RunEvent::TextDone { text, annotations } => {
                    debug!("Assistant: {}", text);
                    for annotation in &annotations {
                        self.apply_annotation(annotation, pass).await?;
                    }
                }
                RunEvent::ToolCallDone(call) => {
                    pass.apply_call(&call)?;
                }
                RunEvent::RequiresAction { run_id, tool_calls } => {
                    let mut outputs = Vec::with_capacity(tool_calls.len());
                    for call in &tool_calls {
                        outputs.push(ToolOutput {
                            tool_call_id: call.id.clone(),
                            output: pass.apply_call(call)?,
                        });
                    }
                    return Ok(Some((run_id, outputs)));
                }
                RunEvent::Failed(reason) => return Err(ChangeError::AgentRunFailed(reason)),
                RunEvent::Completed | RunEvent::Done => return Ok(None),
            }
        }
        Ok(None)
    }

    /// Copy a provider-generated file over the workspace file it is named after.
    async fn apply_annotation(
        &self,
        annotation: &FileAnnotation,
        pass: &mut EditPass<'_>,
    ) -> Result<()> {
        let file = match self.provider.retrieve_file(&annotation.file_id).await {
            Ok(file) => file,
            Err(e) => {
                warn!("Failed to fetch attachment {}: {:#}", annotation.file_id, e);
                return Ok(());
            }
        };
        debug!("Fetched attachment {} as {}", annotation.file_id, file.filename);
        pass.write(&file.filename, &file.bytes)?;
        Ok(())
    }

    /// Delete the assistant. Safe to call more than once.
    pub async fn close(&mut self) {
        let Some(assistant_id) = self.assistant_id.take() else {
            return;
        };
        match self.provider.delete_assistant(&assistant_id).await {
            Ok(()) => debug!("Deleted assistant {}", assistant_id),
            Err(e) => warn!(
                "{}",
                ChangeError::ResourceCleanupFailed {
                    resource: format!("assistant {}", assistant_id),
                    reason: format!("{:#}", e),
                }
            ),
        }
    }
}
