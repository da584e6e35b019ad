//! Error taxonomy for a change request.
//!
//! Fatal variants abort the reflection loop and surface as an internal error at
//! the boundary. The remaining variants are absorbed where they happen and only
//! ever reach the logs.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChangeError {
    #[error("failed to clone {url}: {reason}")]
    CloneFailed { url: String, reason: String },

    #[error("failed to reset workspace to baseline: {0}")]
    ResetFailed(String),

    #[error("failed to upload {path}: {reason}")]
    UploadFailed { path: String, reason: String },

    #[error("agent run failed: {0}")]
    AgentRunFailed(String),

    #[error("judge returned no parseable verdict")]
    JudgeUnparseable,

    #[error("failed to release remote resource {resource}: {reason}")]
    ResourceCleanupFailed { resource: String, reason: String },

    #[error("audit insert into {table} failed: {reason}")]
    AuditFailed { table: String, reason: String },

    #[error("git: {0}")]
    Git(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ChangeError {
    /// Whether this error ends the request instead of the current attempt.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            ChangeError::AgentRunFailed(_)
                | ChangeError::JudgeUnparseable
                | ChangeError::ResourceCleanupFailed { .. }
                | ChangeError::AuditFailed { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, ChangeError>;
