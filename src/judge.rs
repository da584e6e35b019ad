//! Asks the model whether a diff is an acceptable fix.

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::api::{ChatMessage, ChatRequest, LlmProvider};
use crate::error::{ChangeError, Result};

const SYSTEM_PROMPT: &str = "You are a code reviewer. You determine if the changes are high \
quality using the following criteria:
  1. The changes fix the problem in the prompt.
  2. The changes are minimal and do not add or remove unnecessary code.
  3. The changes do not break the original program.
  4. The code is high quality.
Output in JSON with the parameter is_change_good set to true or false. The change is a diff of \
the code, - for removed lines, + for added lines.";

#[derive(Debug, Deserialize)]
struct Verdict {
    is_change_good: bool,
}

pub struct Judge<'a> {
    provider: &'a dyn LlmProvider,
    model: String,
}

impl<'a> Judge<'a> {
    pub fn new(provider: &'a dyn LlmProvider, model: &str) -> Self {
        Self {
            provider,
            model: model.to_string(),
        }
    }

    /// Whether `diff` is a good fix for `prompt`.
    ///
    /// An empty diff is never good. Provider errors and unparseable answers
    /// count as a rejection.
    pub async fn is_good(&self, diff: &str, prompt: &str) -> bool {
        if diff.is_empty() {
            warn!("No change detected");
            return false;
        }

        match self.verdict(diff, prompt).await {
            Ok(good) => {
                info!("Judge verdict: {}", if good { "good" } else { "not good" });
                good
            }
            Err(e) => {
                warn!("Judge failed, treating change as not good: {}", e);
                false
            }
        }
    }

    async fn verdict(&self, diff: &str, prompt: &str) -> Result<bool> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage::system(SYSTEM_PROMPT),
                ChatMessage::user(format!("Change: {}", diff)),
                ChatMessage::user(format!("Problem: {}", prompt)),
            ],
            json_response: true,
        };

        let choices = self.provider.chat_completion(&request).await?;
        parse_verdict(&choices)
    }
}

/// First choice whose JSON object carries `is_change_good`.
fn parse_verdict(choices: &[String]) -> Result<bool> {
    for content in choices {
        match serde_json::from_str::<Verdict>(content) {
            Ok(verdict) => return Ok(verdict.is_change_good),
            Err(e) => debug!("Skipping judge choice without a verdict: {}", e),
        }
    }
    Err(ChangeError::JudgeUnparseable)
}
