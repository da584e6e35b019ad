//! HTTP boundary.
//!
//! `POST /` and `POST /change` take `{"repoUrl", "prompt"}` and answer with
//! the final diff as a JSON string.

pub mod audit;

pub use audit::{AuditSink, SupabaseAudit};

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::api::LlmProvider;
use crate::config::LoopConfig;
use crate::error::{ChangeError, Result};
use crate::reflection;
use crate::workspace::Workspace;

/// Shared state of the HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    provider: Arc<dyn LlmProvider>,
    config: Arc<LoopConfig>,
    audit: Option<Arc<dyn AuditSink>>,
}

impl AppState {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        config: LoopConfig,
        audit: Option<Arc<dyn AuditSink>>,
    ) -> Self {
        Self {
            provider,
            config: Arc::new(config),
            audit,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeRequest {
    pub repo_url: String,
    pub prompt: String,
}

/// A request that failed after it was accepted.
#[derive(Debug)]
pub struct AppError(String);

impl From<ChangeError> for AppError {
    fn from(e: ChangeError) -> Self {
        AppError(e.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({ "error": self.0 }));
        (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", post(change))
        .route("/change", post(change))
        .route("/change/", post(change))
        .route("/health", get(health))
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

async fn change(
    State(state): State<AppState>,
    Json(request): Json<ChangeRequest>,
) -> std::result::Result<Json<String>, AppError> {
    // Detached so that teardown finishes even if the client goes away.
    let task = tokio::spawn(async move { handle_change(&state, &request).await });

    match task.await {
        Ok(Ok(diff)) => Ok(Json(diff)),
        Ok(Err(e)) => {
            error!("Change request failed: {}", e);
            Err(e.into())
        }
        Err(e) => {
            error!("Change request task aborted: {}", e);
            Err(AppError(format!("request aborted: {}", e)))
        }
    }
}

/// Clone, run the reflection loop, clean up and audit one request.
pub async fn handle_change(state: &AppState, request: &ChangeRequest) -> Result<String> {
    let span = info_span!("change", request_id = %Uuid::new_v4());
    async {
        info!("Change request for {}", request.repo_url);

        if let Some(sink) = &state.audit {
            audit::record_input(sink.as_ref(), &request.repo_url, &request.prompt).await;
        }

        let mut workspace = Workspace::open(&request.repo_url).await?;
        let result = reflection::run(
            state.provider.as_ref(),
            &state.config,
            &workspace,
            &request.prompt,
        )
        .await;
        if let Err(e) = workspace.close() {
            warn!("Failed to remove workspace: {}", e);
        }
        let report = result?;

        info!(
            "Change request done: {} attempt(s), accepted: {}, diff {} bytes",
            report.attempts,
            report.accepted,
            report.diff.len()
        );

        if let Some(sink) = &state.audit {
            audit::record_output(
                sink.as_ref(),
                &request.repo_url,
                &request.prompt,
                &report.diff,
            )
            .await;
        }

        Ok(report.diff)
    }
    .instrument(span)
    .await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}

/// Serve the router on `bind` until Ctrl-C.
pub async fn serve(bind: SocketAddr, state: AppState) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("Failed to bind {}", bind))?;
    info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;
    Ok(())
}
