use anyhow::{Context, Result};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, error};
use url::Url;

use super::http::{send_with_retry, RetryPolicy};
use super::types::ApiError;

/// Default provider endpoint
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1/";

/// Default request timeout in seconds
pub(super) const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Timeout for streaming runs, which stay open while the assistant works
const STREAM_TIMEOUT_SECS: u64 = 600;

/// Beta header required by the assistants, threads and runs endpoints
const ASSISTANTS_BETA: &str = "assistants=v2";

/// Default client version (from Cargo.toml)
const DEFAULT_VERSION: &str = env!("CARGO_PKG_VERSION");

fn build_user_agent() -> String {
    format!("tinygen/{}", DEFAULT_VERSION)
}

/// HTTP client for an OpenAI-compatible provider.
#[derive(Clone)]
pub struct OpenAiClient {
    pub(super) client: Client,
    pub(super) stream_client: Client,
    base_url: Url,
    api_key: String,
    user_agent: String,
}

impl OpenAiClient {
    /// Create a client for `base_url` authenticating with `api_key`.
    pub fn new(base_url: &str, api_key: String) -> Result<Self> {
        let base_url = Self::normalize_base_url(base_url)?;

        let client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .context("Failed to build HTTP client")?;
        let stream_client = Client::builder()
            .timeout(Duration::from_secs(STREAM_TIMEOUT_SECS))
            .build()
            .context("Failed to build streaming HTTP client")?;

        Ok(Self {
            client,
            stream_client,
            base_url,
            api_key,
            user_agent: build_user_agent(),
        })
    }

    /// `Url::join` drops the last path segment unless the base ends in `/`.
    fn normalize_base_url(base_url: &str) -> Result<Url> {
        let mut base = base_url.trim().to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        Url::parse(&base).with_context(|| format!("Invalid base URL: {}", base_url))
    }

    fn build_url(base: &Url, endpoint: &str) -> Result<Url> {
        base.join(endpoint.trim_start_matches('/'))
            .with_context(|| format!("Failed to build URL for endpoint: {}", endpoint))
    }

    pub(super) fn url(&self, endpoint: &str) -> Result<Url> {
        Self::build_url(&self.base_url, endpoint)
    }

    /// Attach credentials and the standard headers.
    pub(super) fn authorize(&self, request: RequestBuilder, assistants_beta: bool) -> RequestBuilder {
        let request = request
            .header("User-Agent", &self.user_agent)
            .bearer_auth(&self.api_key);
        if assistants_beta {
            request.header("OpenAI-Beta", ASSISTANTS_BETA)
        } else {
            request
        }
    }

    /// Turn a non-success response into an `ApiError`.
    pub(super) async fn check_status(response: Response, what: &str) -> Result<Response> {
        let status = response.status();
        debug!("{} -> {}", what, status);
        if status.is_success() {
            return Ok(response);
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        let api_error = ApiError::from_http_response(status.as_u16(), &body);
        error!(
            http_status = api_error.http_status,
            kind = ?api_error.kind,
            "{} failed: {}",
            what,
            api_error
        );
        Err(anyhow::Error::new(api_error)).with_context(|| format!("{} failed", what))
    }

    pub(super) async fn read_json<R: DeserializeOwned>(response: Response, what: &str) -> Result<R> {
        let response_text = response
            .text()
            .await
            .with_context(|| format!("Failed to read {} response body", what))?;
        serde_json::from_str(&response_text)
            .with_context(|| format!("Failed to parse {} response", what))
    }

    pub(super) async fn post_json<T, R>(
        &self,
        endpoint: &str,
        body: &T,
        assistants_beta: bool,
        policy: RetryPolicy,
    ) -> Result<R>
    where
        T: Serialize,
        R: DeserializeOwned,
    {
        let url = self.url(endpoint)?;
        let what = format!("POST {}", endpoint);
        let response = send_with_retry(policy, || {
            self.authorize(self.client.post(url.clone()), assistants_beta)
                .json(body)
        })
        .await
        .with_context(|| format!("Failed to send request to {}", url))?;

        let response = Self::check_status(response, &what).await?;
        Self::read_json(response, &what).await
    }

    /// POST a body that asks for `stream: true` and hand back the open response.
    ///
    /// Starting or resuming a run is never resent once the server may have
    /// seen it.
    pub(super) async fn post_stream<T: Serialize>(&self, endpoint: &str, body: &T) -> Result<Response> {
        let url = self.url(endpoint)?;
        let what = format!("POST {}", endpoint);
        let response = send_with_retry(RetryPolicy::NonIdempotent, || {
            self.authorize(self.stream_client.post(url.clone()), true)
                .header("Accept", "text/event-stream")
                .json(body)
        })
        .await
        .with_context(|| format!("Failed to send request to {}", url))?;

        Self::check_status(response, &what).await
    }

    pub(super) async fn get_json<R: DeserializeOwned>(
        &self,
        endpoint: &str,
        assistants_beta: bool,
    ) -> Result<R> {
        let url = self.url(endpoint)?;
        let what = format!("GET {}", endpoint);
        let response = send_with_retry(RetryPolicy::Idempotent, || {
            self.authorize(self.client.get(url.clone()), assistants_beta)
        })
        .await
        .with_context(|| format!("Failed to send request to {}", url))?;

        let response = Self::check_status(response, &what).await?;
        Self::read_json(response, &what).await
    }

    pub(super) async fn get_bytes(&self, endpoint: &str) -> Result<Vec<u8>> {
        let url = self.url(endpoint)?;
        let what = format!("GET {}", endpoint);
        let response = send_with_retry(RetryPolicy::Idempotent, || {
            self.authorize(self.client.get(url.clone()), false)
        })
        .await
        .with_context(|| format!("Failed to send request to {}", url))?;

        let response = Self::check_status(response, &what).await?;
        let bytes = response
            .bytes()
            .await
            .with_context(|| format!("Failed to read {} response body", what))?;
        Ok(bytes.to_vec())
    }

    pub(super) async fn delete<R: DeserializeOwned>(
        &self,
        endpoint: &str,
        assistants_beta: bool,
    ) -> Result<R> {
        let url = self.url(endpoint)?;
        let what = format!("DELETE {}", endpoint);
        let response = send_with_retry(RetryPolicy::Idempotent, || {
            self.authorize(self.client.delete(url.clone()), assistants_beta)
        })
        .await
        .with_context(|| format!("Failed to send request to {}", url))?;

        let response = Self::check_status(response, &what).await?;
        Self::read_json(response, &what).await
    }
}

impl std::fmt::Debug for OpenAiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiClient")
            .field("base_url", &self.base_url.as_str())
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}
