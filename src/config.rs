//! Runtime settings assembled from CLI flags and the environment.

use anyhow::{bail, Context, Result};

use crate::cli::Cli;
use crate::workspace::DEFAULT_SUPPORTED_TYPES;

/// Model used for both the agent and the judge unless overridden.
pub const DEFAULT_MODEL: &str = "gpt-4o";

/// Attempts before the loop gives up.
pub const DEFAULT_MAX_ATTEMPTS: usize = 6;

pub const SUPABASE_URL_ENV: &str = "SUPABASE_URL";
pub const SUPABASE_KEY_ENV: &str = "SUPABASE_KEY";

/// Knobs of the reflection loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopConfig {
    pub model: String,
    pub max_attempts: usize,
    /// File-name suffixes the agent may edit, each starting with `.`.
    pub supported_types: Vec<String>,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            supported_types: DEFAULT_SUPPORTED_TYPES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl LoopConfig {
    pub fn new(model: &str, max_attempts: usize, supported_types: &[String]) -> Result<Self> {
        if model.trim().is_empty() {
            bail!("model must not be empty");
        }
        if max_attempts == 0 {
            bail!("max attempts must be at least 1");
        }
        Ok(Self {
            model: model.trim().to_string(),
            max_attempts,
            supported_types: normalize_types(supported_types)?,
        })
    }
}

/// Trim entries, drop blanks and make sure each starts with a dot.
pub fn normalize_types(raw: &[String]) -> Result<Vec<String>> {
    let mut types: Vec<String> = Vec::new();
    for entry in raw {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }
        let suffix = if entry.starts_with('.') {
            entry.to_string()
        } else {
            format!(".{}", entry)
        };
        if !types.contains(&suffix) {
            types.push(suffix);
        }
    }
    if types.is_empty() {
        bail!("at least one supported file type is required");
    }
    Ok(types)
}

/// Target of the optional audit inserts.
#[derive(Clone, PartialEq, Eq)]
pub struct AuditConfig {
    pub url: String,
    pub key: String,
}

impl std::fmt::Debug for AuditConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditConfig")
            .field("url", &self.url)
            .field("key", &"<redacted>")
            .finish()
    }
}

impl AuditConfig {
    /// Enabled only when both values are present and non-empty.
    pub fn from_values(url: Option<String>, key: Option<String>) -> Option<Self> {
        let url = url.filter(|v| !v.trim().is_empty())?;
        let key = key.filter(|v| !v.trim().is_empty())?;
        Some(Self {
            url: url.trim().to_string(),
            key: key.trim().to_string(),
        })
    }

    pub fn from_env() -> Option<Self> {
        Self::from_values(
            std::env::var(SUPABASE_URL_ENV).ok(),
            std::env::var(SUPABASE_KEY_ENV).ok(),
        )
    }
}

/// Everything the commands need to talk to the provider and run the loop.
#[derive(Debug, Clone)]
pub struct Settings {
    pub loop_config: LoopConfig,
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    pub audit: Option<AuditConfig>,
}

impl Settings {
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let loop_config = LoopConfig::new(&cli.model, cli.max_attempts, &cli.supported_types)
            .context("Invalid settings")?;
        Ok(Self {
            loop_config,
            openai_api_key: cli.openai_api_key.clone().filter(|k| !k.trim().is_empty()),
            openai_base_url: cli.openai_base_url.clone(),
            audit: AuditConfig::from_env(),
        })
    }

    pub fn api_key(&self) -> Result<&str> {
        self.openai_api_key
            .as_deref()
            .context("No provider API key; set OPENAI_API_KEY or pass --openai-api-key")
    }
}
