use anyhow::Result;

use super::client::OpenAiClient;
use super::http::RetryPolicy;
use super::types::{ChatCompletionBody, ChatCompletionResponse, ChatRequest, ResponseFormat};

impl OpenAiClient {
    /// Run a chat completion and return the content of every choice.
    pub async fn chat_completion(&self, request: &ChatRequest) -> Result<Vec<String>> {
        let body = ChatCompletionBody {
            model: &request.model,
            messages: &request.messages,
            response_format: request.json_response.then_some(ResponseFormat {
                format_type: "json_object",
            }),
        };

        // Completions create nothing that needs cleaning up.
        let response: ChatCompletionResponse = self
            .post_json("chat/completions", &body, false, RetryPolicy::Idempotent)
            .await?;

        Ok(response
            .choices
            .into_iter()
            .filter_map(|choice| choice.message.content)
            .collect())
    }
}
