use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::api::DEFAULT_BASE_URL;
use crate::config::DEFAULT_MODEL;

/// tinygen - turn a repository and a problem statement into a diff
#[derive(Parser, Debug)]
#[command(name = "tinygen")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Model used by the agent and the judge
    #[arg(short = 'm', long, env = "TINYGEN_MODEL", default_value = DEFAULT_MODEL, global = true)]
    pub model: String,

    /// Attempts before giving up on a request
    #[arg(long, env = "TINYGEN_MAX_ATTEMPTS", default_value_t = 6, global = true)]
    pub max_attempts: usize,

    /// File extensions the agent may edit (comma separated)
    #[arg(
        long,
        env = "TINYGEN_SUPPORTED_TYPES",
        value_delimiter = ',',
        default_value = ".c,.cpp,.py,.sh,.md,.html,.txt",
        global = true
    )]
    pub supported_types: Vec<String>,

    /// Provider API key
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true, global = true)]
    pub openai_api_key: Option<String>,

    /// Provider API base URL
    #[arg(long, env = "OPENAI_BASE_URL", default_value = DEFAULT_BASE_URL, global = true)]
    pub openai_base_url: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Serve change requests over HTTP
    Serve {
        /// Address to listen on
        #[arg(long, env = "TINYGEN_BIND", default_value = "127.0.0.1:8000")]
        bind: SocketAddr,
    },
    /// Run one change request and print the diff
    Change {
        /// Repository to clone (URL or local path)
        #[arg(long)]
        repo_url: String,

        /// Problem to fix
        #[arg(long)]
        prompt: String,
    },
    /// Preview files that will be uploaded (dry-run)
    Preview {
        /// Directory to scan (defaults to the current directory)
        #[arg(short = 'w', long)]
        workspace_root: Option<PathBuf>,

        /// Show all files (not just summary)
        #[arg(short, long)]
        verbose: bool,
    },
}
