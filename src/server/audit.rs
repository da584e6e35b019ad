//! Optional audit trail of requests and their results.
//!
//! Rows go to a Supabase (PostgREST) project when `SUPABASE_URL` and
//! `SUPABASE_KEY` are both set. Audit is best-effort: a failed insert is
//! logged and never changes the response.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, warn};
use url::Url;

use crate::config::{AuditConfig, SUPABASE_URL_ENV};
use crate::error::ChangeError;

pub const INPUTS_TABLE: &str = "inputs";
pub const OUTPUTS_TABLE: &str = "outputs";

const AUDIT_TIMEOUT: Duration = Duration::from_secs(10);

/// Destination for audit rows.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn insert(&self, table: &str, row: serde_json::Value) -> Result<()>;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InputRow<'a> {
    repo_url: &'a str,
    prompt: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OutputRow<'a> {
    repo_url: &'a str,
    prompt: &'a str,
    change: &'a str,
}

async fn insert_logged(sink: &dyn AuditSink, table: &str, row: impl Serialize) {
    let result = match serde_json::to_value(row) {
        Ok(row) => sink.insert(table, row).await,
        Err(e) => Err(e.into()),
    };
    match result {
        Ok(()) => debug!("Audit row written to {}", table),
        Err(e) => warn!(
            "{}",
            ChangeError::AuditFailed {
                table: table.to_string(),
                reason: format!("{:#}", e),
            }
        ),
    }
}

pub async fn record_input(sink: &dyn AuditSink, repo_url: &str, prompt: &str) {
    insert_logged(sink, INPUTS_TABLE, InputRow { repo_url, prompt }).await;
}

pub async fn record_output(sink: &dyn AuditSink, repo_url: &str, prompt: &str, change: &str) {
    let row = OutputRow {
        repo_url,
        prompt,
        change,
    };
    insert_logged(sink, OUTPUTS_TABLE, row).await;
}

/// Inserts rows through the PostgREST API of a Supabase project.
pub struct SupabaseAudit {
    client: reqwest::Client,
    rest_url: Url,
    key: String,
}

impl SupabaseAudit {
    pub fn new(config: &AuditConfig) -> Result<Self> {
        let mut base = config.url.trim_end_matches('/').to_string();
        base.push_str("/rest/v1/");
        let rest_url = Url::parse(&base)
            .with_context(|| format!("Invalid {} value: {}", SUPABASE_URL_ENV, config.url))?;

        let client = reqwest::Client::builder()
            .timeout(AUDIT_TIMEOUT)
            .build()
            .context("Failed to build audit HTTP client")?;

        Ok(Self {
            client,
            rest_url,
            key: config.key.clone(),
        })
    }

    pub fn table_url(&self, table: &str) -> Result<Url> {
        self.rest_url
            .join(table)
            .with_context(|| format!("Invalid audit table name: {}", table))
    }
}

#[async_trait]
impl AuditSink for SupabaseAudit {
    async fn insert(&self, table: &str, row: serde_json::Value) -> Result<()> {
        let response = self
            .client
            .post(self.table_url(table)?)
            .header("apikey", &self.key)
            .bearer_auth(&self.key)
            .header("Prefer", "return=minimal")
            .json(&row)
            .send()
            .await
            .context("Audit request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("HTTP {}: {}", status, body.trim());
        }
        Ok(())
    }
}
