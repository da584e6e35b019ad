//! Client for the LLM provider.
//!
//! Covers the file store, assistants, threads, streaming runs and chat
//! completions of an OpenAI-compatible API. Everything above this module talks
//! to the provider through the [`LlmProvider`] trait so the reflection loop can
//! run against fakes.

mod assistants;
mod chat;
mod client;
mod files;
mod http;
mod stream;
mod types;

pub use client::{OpenAiClient, DEFAULT_BASE_URL};
pub use types::{
    AssistantSpec, ChatMessage, ChatRequest, FileAnnotation, RemoteFile, RemoteFileContent,
    RunEvent, ToolCall, ToolOutput,
};

use std::pin::Pin;

use anyhow::Result;
use async_trait::async_trait;
use futures_util::Stream;

/// Events of one streaming run, in provider order.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<RunEvent>> + Send>>;

/// Provider operations used by the agent, judge and upload set.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn upload_file(&self, name: &str, bytes: Vec<u8>) -> Result<RemoteFile>;

    async fn delete_file(&self, file_id: &str) -> Result<()>;

    async fn retrieve_file(&self, file_id: &str) -> Result<RemoteFileContent>;

    async fn create_assistant(&self, spec: &AssistantSpec) -> Result<String>;

    async fn delete_assistant(&self, assistant_id: &str) -> Result<()>;

    async fn create_thread(&self, prompt: &str) -> Result<String>;

    async fn delete_thread(&self, thread_id: &str) -> Result<()>;

    async fn stream_run(&self, thread_id: &str, assistant_id: &str) -> Result<EventStream>;

    async fn submit_tool_outputs(
        &self,
        thread_id: &str,
        run_id: &str,
        outputs: Vec<ToolOutput>,
    ) -> Result<EventStream>;

    async fn chat_completion(&self, request: &ChatRequest) -> Result<Vec<String>>;
}

#[async_trait]
impl LlmProvider for OpenAiClient {
    async fn upload_file(&self, name: &str, bytes: Vec<u8>) -> Result<RemoteFile> {
        OpenAiClient::upload_file(self, name, bytes).await
    }

    async fn delete_file(&self, file_id: &str) -> Result<()> {
        OpenAiClient::delete_file(self, file_id).await
    }

    async fn retrieve_file(&self, file_id: &str) -> Result<RemoteFileContent> {
        OpenAiClient::retrieve_file(self, file_id).await
    }

    async fn create_assistant(&self, spec: &AssistantSpec) -> Result<String> {
        OpenAiClient::create_assistant(self, spec).await
    }

    async fn delete_assistant(&self, assistant_id: &str) -> Result<()> {
        OpenAiClient::delete_assistant(self, assistant_id).await
    }

    async fn create_thread(&self, prompt: &str) -> Result<String> {
        OpenAiClient::create_thread(self, prompt).await
    }

    async fn delete_thread(&self, thread_id: &str) -> Result<()> {
        OpenAiClient::delete_thread(self, thread_id).await
    }

    async fn stream_run(&self, thread_id: &str, assistant_id: &str) -> Result<EventStream> {
        OpenAiClient::stream_run(self, thread_id, assistant_id).await
    }

    async fn submit_tool_outputs(
        &self,
        thread_id: &str,
        run_id: &str,
        outputs: Vec<ToolOutput>,
    ) -> Result<EventStream> {
        OpenAiClient::submit_tool_outputs(self, thread_id, run_id, outputs).await
    }

    async fn chat_completion(&self, request: &ChatRequest) -> Result<Vec<String>> {
        OpenAiClient::chat_completion(self, request).await
    }
}
