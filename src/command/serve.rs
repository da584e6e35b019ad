use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use crate::api::OpenAiClient;
use crate::config::Settings;
use crate::server::{self, AppState, AuditSink, SupabaseAudit};

pub async fn run_serve(settings: Settings, bind: SocketAddr) -> Result<()> {
    let provider = OpenAiClient::new(&settings.openai_base_url, settings.api_key()?.to_string())?;

    let audit: Option<Arc<dyn AuditSink>> = match &settings.audit {
        Some(config) => {
            info!("Audit enabled ({})", config.url);
            Some(Arc::new(SupabaseAudit::new(config)?))
        }
        None => {
            info!("Audit disabled");
            None
        }
    };

    info!(
        "Model {}, up to {} attempt(s), file types {}",
        settings.loop_config.model,
        settings.loop_config.max_attempts,
        settings.loop_config.supported_types.join(",")
    );

    let state = AppState::new(Arc::new(provider), settings.loop_config, audit);
    server::serve(bind, state).await
}
