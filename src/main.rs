use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

mod agent;
mod api;
mod cli;
mod command;
mod config;
mod error;
mod judge;
mod reflection;
mod server;
#[cfg(test)]
mod testing;
mod workspace;

use cli::{Cli, Commands};
use config::Settings;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins over --verbose when set
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    });

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let settings = Settings::from_cli(&cli)?;

    match cli.command {
        Commands::Serve { bind } => command::run_serve(settings, bind).await?,
        Commands::Change { repo_url, prompt } => {
            command::run_change(settings, &repo_url, &prompt).await?
        }
        Commands::Preview {
            workspace_root,
            verbose,
        } => command::run_preview(&settings.loop_config, workspace_root, verbose).await?,
    }

    Ok(())
}
