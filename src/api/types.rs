//! Request and response types for the LLM provider API.
//!
//! Wire structs that only the client needs stay `pub(super)`; the types the
//! agent and judge consume are re-exported from `api`.

use serde::{Deserialize, Serialize};

// ============================================================================
// Files
// ============================================================================

/// A file stored with the provider, keyed by the name it was uploaded as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFile {
    pub id: String,
    pub name: String,
}

/// Downloaded content of a provider-side file.
#[derive(Debug, Clone)]
pub struct RemoteFileContent {
    pub filename: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Deserialize)]
pub(super) struct FileObject {
    pub id: String,
    #[serde(default)]
    pub filename: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct DeletionStatus {
    #[serde(default)]
    pub deleted: bool,
}

#[derive(Debug, Deserialize)]
pub(super) struct ObjectId {
    pub id: String,
}

// ============================================================================
// Assistants, threads and runs
// ============================================================================

/// Everything needed to create an assistant.
#[derive(Debug, Clone)]
pub struct AssistantSpec {
    pub name: String,
    pub model: String,
    pub instructions: String,
    /// Tool definitions, passed through verbatim.
    pub tools: Vec<serde_json::Value>,
    /// Uploaded files the assistant can read.
    pub file_ids: Vec<String>,
}

#[derive(Debug, Serialize)]
pub(super) struct CreateAssistantRequest<'a> {
    pub name: &'a str,
    pub model: &'a str,
    pub instructions: &'a str,
    pub tools: &'a [serde_json::Value],
    pub tool_resources: ToolResources<'a>,
}

#[derive(Debug, Serialize)]
pub(super) struct ToolResources<'a> {
    pub code_interpreter: CodeInterpreterResources<'a>,
}

#[derive(Debug, Serialize)]
pub(super) struct CodeInterpreterResources<'a> {
    pub file_ids: &'a [String],
}

#[derive(Debug, Serialize)]
pub(super) struct CreateThreadRequest<'a> {
    pub messages: Vec<ThreadMessage<'a>>,
}

#[derive(Debug, Serialize)]
pub(super) struct ThreadMessage<'a> {
    pub role: &'static str,
    pub content: &'a str,
}

#[derive(Debug, Serialize)]
pub(super) struct CreateRunRequest<'a> {
    pub assistant_id: &'a str,
    pub stream: bool,
}

/// Result reported back to a paused run for one tool call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolOutput {
    pub tool_call_id: String,
    pub output: String,
}

#[derive(Debug, Serialize)]
pub(super) struct SubmitToolOutputsRequest {
    pub tool_outputs: Vec<ToolOutput>,
    pub stream: bool,
}

// ============================================================================
// Run stream events
// ============================================================================

/// A function call issued by the assistant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    /// Raw JSON argument object as produced by the model.
    pub arguments: String,
}

/// A provider-generated file referenced from message text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileAnnotation {
    pub text: String,
    pub file_id: String,
}

/// Events of a streaming run that the agent reacts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunEvent {
    /// A message finished; text is for the logs, annotations may carry files.
    TextDone {
        text: String,
        annotations: Vec<FileAnnotation>,
    },
    /// A tool call finished as part of a completed run step.
    ToolCallDone(ToolCall),
    /// The run is paused until outputs for these calls are submitted.
    RequiresAction {
        run_id: String,
        tool_calls: Vec<ToolCall>,
    },
    Completed,
    Failed(String),
    /// End-of-stream sentinel.
    Done,
}

#[derive(Debug, Deserialize)]
pub(super) struct MessageObject {
    #[serde(default)]
    pub content: Vec<MessageContent>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub(super) enum MessageContent {
    Text { text: TextContent },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
pub(super) struct TextContent {
    pub value: String,
    #[serde(default)]
    pub annotations: Vec<AnnotationObject>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub(super) enum AnnotationObject {
    FilePath {
        #[serde(default)]
        text: String,
        file_path: FileRef,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
pub(super) struct FileRef {
    pub file_id: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct RunStepObject {
    pub step_details: StepDetails,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub(super) enum StepDetails {
    ToolCalls {
        #[serde(default)]
        tool_calls: Vec<ToolCallObject>,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub(super) enum ToolCallObject {
    Function { id: String, function: FunctionCall },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
pub(super) struct FunctionCall {
    pub name: String,
    #[serde(default)]
    pub arguments: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct RunObject {
    pub id: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub required_action: Option<RequiredAction>,
    #[serde(default)]
    pub last_error: Option<LastError>,
}

#[derive(Debug, Deserialize)]
pub(super) struct RequiredAction {
    #[serde(default)]
    pub submit_tool_outputs: Option<SubmitToolOutputsAction>,
}

#[derive(Debug, Deserialize)]
pub(super) struct SubmitToolOutputsAction {
    #[serde(default)]
    pub tool_calls: Vec<ToolCallObject>,
}

#[derive(Debug, Deserialize)]
pub(super) struct LastError {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
}

impl ToolCallObject {
    pub(super) fn into_tool_call(self) -> Option<ToolCall> {
        match self {
            ToolCallObject::Function { id, function } => Some(ToolCall {
                id,
                name: function.name,
                arguments: function.arguments,
            }),
            ToolCallObject::Other => None,
        }
    }
}

// ============================================================================
// Chat completions
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// A chat completion request.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    /// Ask the provider to constrain output to a JSON object.
    pub json_response: bool,
}

#[derive(Debug, Serialize)]
pub(super) struct ChatCompletionBody<'a> {
    pub model: &'a str,
    pub messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
pub(super) struct ResponseFormat {
    #[serde(rename = "type")]
    pub format_type: &'static str,
}

#[derive(Debug, Deserialize)]
pub(super) struct ChatCompletionResponse {
    #[serde(default)]
    pub choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
pub(super) struct Choice {
    pub message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
pub(super) struct ChoiceMessage {
    #[serde(default)]
    pub content: Option<String>,
}

// ============================================================================
// API Error Type
// ============================================================================

/// Broad category of a failed provider call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorKind {
    InvalidRequest,
    Unauthenticated,
    PermissionDenied,
    NotFound,
    RateLimited,
    Timeout,
    Unavailable,
    Unknown,
}

impl ApiErrorKind {
    pub fn from_http_status(http_status: u16) -> Self {
        match http_status {
            400 | 409 | 413 | 422 => ApiErrorKind::InvalidRequest,
            401 => ApiErrorKind::Unauthenticated,
            403 => ApiErrorKind::PermissionDenied,
            404 => ApiErrorKind::NotFound,
            408 | 504 => ApiErrorKind::Timeout,
            429 => ApiErrorKind::RateLimited,
            500..=599 => ApiErrorKind::Unavailable,
            _ => ApiErrorKind::Unknown,
        }
    }

    pub fn error_message(&self) -> &'static str {
        match self {
            ApiErrorKind::InvalidRequest => "Invalid request",
            ApiErrorKind::Unauthenticated => "Authentication failed; check OPENAI_API_KEY",
            ApiErrorKind::PermissionDenied => "Permission denied",
            ApiErrorKind::NotFound => "Resource not found",
            ApiErrorKind::RateLimited => "Rate limit exceeded",
            ApiErrorKind::Timeout => "Request timed out",
            ApiErrorKind::Unavailable => "Service temporarily unavailable",
            ApiErrorKind::Unknown => "Unknown error occurred",
        }
    }
}

/// Provider error body: `{"error": {"message": "..."}}`.
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

/// A non-success HTTP response from the provider.
#[derive(Debug, Clone)]
pub struct ApiError {
    pub kind: ApiErrorKind,
    pub http_status: u16,
    pub message: String,
}

impl ApiError {
    /// Build from the HTTP status and raw response body.
    pub fn from_http_response(http_status: u16, body: &str) -> Self {
        let kind = ApiErrorKind::from_http_status(http_status);
        let detail = serde_json::from_str::<ErrorEnvelope>(body)
            .map(|envelope| envelope.error.message)
            .unwrap_or_else(|_| body.trim().to_string());

        let message = if detail.is_empty() {
            format!("API error (HTTP {}): {}", http_status, kind.error_message())
        } else {
            format!(
                "API error (HTTP {}): {}: {}",
                http_status,
                kind.error_message(),
                detail
            )
        };

        Self {
            kind,
            http_status,
            message,
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ApiError {}
