//! LearnEx Web Server
//!
//! Serves the LearnEx login, session and role-guarded view API.

use anyhow::Context;
use clap::Parser;
use learnex_core::{init_logging, AccessPolicy, LearnexConfig, SessionBackend};
use learnex_web::{apply_env_overrides, LearnexServerBuilder};
use std::path::PathBuf;
use tracing::info;

/// LearnEx Web Server - session and authorization API for the LearnEx school app
#[derive(Parser)]
#[command(name = "learnex-web")]
#[command(about = "Session and authorization API for LearnEx")]
#[command(version)]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Server host to bind to
    #[arg(long)]
    host: Option<String>,

    /// Server port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Enable development mode
    #[arg(long)]
    dev: bool,

    /// SQLite URL for the user table (in-memory demo accounts when unset)
    #[arg(long)]
    database_url: Option<String>,

    /// Keep sessions in files under the configured session directory
    #[arg(long)]
    persist_sessions: bool,

    /// Allow resources missing from the access table
    #[arg(long)]
    fail_open: bool,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long)]
    log_level: Option<String>,
}

impl Args {
    /// Layer command line flags over the loaded configuration
    fn apply(self, config: &mut LearnexConfig) {
        if let Some(host) = self.host {
            config.server.host = host;
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if self.dev {
            config.server.dev_mode = true;
        }
        if let Some(database_url) = self.database_url {
            config.storage.database_url = Some(database_url);
        }
        if self.persist_sessions {
            config.storage.session_backend = SessionBackend::File;
        }
        if self.fail_open {
            config.access.policy = AccessPolicy::FailOpen;
        }
        if let Some(level) = self.log_level {
            config.logging.level = level;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load environment variables
    dotenvy::dotenv().ok();

    let mut config = match &args.config {
        Some(path) => LearnexConfig::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => LearnexConfig::default(),
    };
    apply_env_overrides(&mut config);
    args.apply(&mut config);

    init_logging(&config.logging)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    info!("Starting LearnEx Web Server initialization");
    if let Some(db_url) = &config.storage.database_url {
        info!("Database: {}", db_url);
    }

    let server = LearnexServerBuilder::with_config(config)
        .build()
        .await
        .context("Failed to build server")?;

    server.start().await.context("Server failed")?;
    Ok(())
}
