use anyhow::Result;
use tracing::debug;

use super::client::OpenAiClient;
use super::http::RetryPolicy;
use super::stream::run_event_stream;
use super::types::{
    AssistantSpec, CodeInterpreterResources, CreateAssistantRequest, CreateRunRequest,
    CreateThreadRequest, DeletionStatus, ObjectId, SubmitToolOutputsRequest, ThreadMessage,
    ToolOutput, ToolResources,
};
use super::EventStream;

impl OpenAiClient {
    /// Create an assistant and return its id.
    pub async fn create_assistant(&self, spec: &AssistantSpec) -> Result<String> {
        let body = CreateAssistantRequest {
            name: &spec.name,
            model: &spec.model,
            instructions: &spec.instructions,
            tools: &spec.tools,
            tool_resources: ToolResources {
                code_interpreter: CodeInterpreterResources {
                    file_ids: &spec.file_ids,
                },
            },
        };
        let assistant: ObjectId = self
            .post_json("assistants", &body, true, RetryPolicy::NonIdempotent)
            .await?;
        debug!("Created assistant {}", assistant.id);
        Ok(assistant.id)
    }

    pub async fn delete_assistant(&self, assistant_id: &str) -> Result<()> {
        let status: DeletionStatus = self
            .delete(&format!("assistants/{}", assistant_id), true)
            .await?;
        if !status.deleted {
            anyhow::bail!("Provider did not delete assistant {}", assistant_id);
        }
        Ok(())
    }

    /// Start a conversation holding a single user message.
    pub async fn create_thread(&self, prompt: &str) -> Result<String> {
        let body = CreateThreadRequest {
            messages: vec![ThreadMessage {
                role: "user",
                content: prompt,
            }],
        };
        let thread: ObjectId = self
            .post_json("threads", &body, true, RetryPolicy::NonIdempotent)
            .await?;
        debug!("Created thread {}", thread.id);
        Ok(thread.id)
    }

    pub async fn delete_thread(&self, thread_id: &str) -> Result<()> {
        let _: DeletionStatus = self.delete(&format!("threads/{}", thread_id), true).await?;
        Ok(())
    }

    /// Run `assistant_id` on `thread_id`, streaming its events.
    pub async fn stream_run(&self, thread_id: &str, assistant_id: &str) -> Result<EventStream> {
        let body = CreateRunRequest {
            assistant_id,
            stream: true,
        };
        let response = self
            .post_stream(&format!("threads/{}/runs", thread_id), &body)
            .await?;
        Ok(run_event_stream(response))
    }

    /// Resume a paused run, streaming the events that follow.
    pub async fn submit_tool_outputs(
        &self,
        thread_id: &str,
        run_id: &str,
        outputs: Vec<ToolOutput>,
    ) -> Result<EventStream> {
        let body = SubmitToolOutputsRequest {
            tool_outputs: outputs,
            stream: true,
        };
        let response = self
            .post_stream(
                &format!("threads/{}/runs/{}/submit_tool_outputs", thread_id, run_id),
                &body,
            )
            .await?;
        Ok(run_event_stream(response))
    }
}
