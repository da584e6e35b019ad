//! Applies the events of one edit pass to the workspace.

use std::collections::HashMap;
use std::fs;

use tracing::{debug, warn};

use super::tools::{WriteFileArgs, WriteGuard, WRITE_FILE};
use crate::api::ToolCall;
use crate::error::{ChangeError, Result};

/// Output reported for a call whose write went through.
pub const WRITTEN: &str = "ok";

/// What one edit pass did to the workspace.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AgentOutcome {
    /// Paths written, in write order.
    pub files_written: Vec<String>,
    /// Calls or attachments that named a file the agent may not write.
    pub calls_discarded: usize,
    /// The pass stopped on a provider or argument error.
    pub errored: bool,
}

/// State of an edit pass: the guard, the calls already handled and the
/// running outcome.
pub struct EditPass<'a> {
    guard: WriteGuard<'a>,
    handled: HashMap<String, String>,
    outcome: AgentOutcome,
}

impl<'a> EditPass<'a> {
    pub fn new(guard: WriteGuard<'a>) -> Self {
        Self {
            guard,
            handled: HashMap::new(),
            outcome: AgentOutcome::default(),
        }
    }

    /// Apply a tool call and return the output to report for it.
    ///
    /// A call id seen before is not applied again. Unparseable arguments end
    /// the pass with [`ChangeError::AgentRunFailed`].
    pub fn apply_call(&mut self, call: &ToolCall) -> Result<String> {
        if let Some(output) = self.handled.get(&call.id) {
            debug!("Tool call {} already handled", call.id);
            return Ok(output.clone());
        }

        let output = if call.name == WRITE_FILE {
            debug!(
                "write_file call {} ({} bytes of arguments)",
                call.id,
                call.arguments.len()
            );
            let args: WriteFileArgs = serde_json::from_str(&call.arguments).map_err(|e| {
                ChangeError::AgentRunFailed(format!(
                    "invalid write_file arguments in call {}: {}",
                    call.id, e
                ))
            })?;
            if self.write(&args.path, args.content.as_bytes())? {
                WRITTEN.to_string()
            } else {
                format!(
                    "rejected: {} is not one of the files you may modify",
                    args.path
                )
            }
        } else {
            warn!("Ignoring call to unknown tool {}", call.name);
            self.outcome.calls_discarded += 1;
            format!("unknown tool: {}", call.name)
        };

        if !call.id.is_empty() {
            self.handled.insert(call.id.clone(), output.clone());
        }
        Ok(output)
    }

    /// Overwrite `path` with `bytes` if the guard allows it.
    ///
    /// Returns whether the file was written. Filesystem errors are fatal.
    pub fn write(&mut self, path: &str, bytes: &[u8]) -> Result<bool> {
        match self.guard.resolve(path) {
            Some(target) => {
                fs::write(&target, bytes)?;
                debug!("Wrote {} ({} bytes)", path, bytes.len());
                self.outcome.files_written.push(path.to_string());
                Ok(true)
            }
            None => {
                warn!("Discarding write to {}", path);
                self.outcome.calls_discarded += 1;
                Ok(false)
            }
        }
    }

    pub fn mark_errored(&mut self) {
        self.outcome.errored = true;
    }

    pub fn into_outcome(self) -> AgentOutcome {
        self.outcome
    }
}
