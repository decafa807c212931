//! LearnEx Web Server
//!
//! Main web server implementation using Axum.

use crate::{create_app, AppState, WebError, WebResult};
use axum::serve;
use learnex_core::LearnexConfig;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// Main LearnEx web server
pub struct LearnexServer {
    config: LearnexConfig,
    state: AppState,
}

impl LearnexServer {
    /// Create a new LearnEx server
    pub async fn new(config: LearnexConfig) -> WebResult<Self> {
        config.validate().inspect_err(|e| e.log())?;
        let state = AppState::new(config.clone()).await?;

        Ok(Self { config, state })
    }

    /// Get the server address
    pub fn address(&self) -> String {
        format!("{}:{}", self.config.server.host, self.config.server.port)
    }

    /// Start the web server and run until Ctrl-C
    pub async fn start(self) -> WebResult<()> {
        let address = self.address();

        info!("Starting LearnEx Web Server");
        info!("Server address: http://{}", address);
        info!("Development mode: {}", self.config.server.dev_mode);
        info!(
            "Access policy: {}, idle timeout: {}s",
            self.state.access.policy(),
            self.config.session.timeout_secs
        );

        let app = create_app(self.state.clone());

        let listener = TcpListener::bind(&address)
            .await
            .map_err(WebError::Server)?;

        info!("Server listening on http://{}", address);

        let sweeper = self.spawn_sweeper();

        let result = serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await;
        sweeper.abort();

        if let Err(e) = result {
            error!("Server error: {}", e);
            return Err(WebError::Server(e));
        }

        info!("Server shut down");
        Ok(())
    }

    /// Periodically drop expired client contexts
    fn spawn_sweeper(&self) -> JoinHandle<()> {
        let sessions = self.state.sessions.clone();
        let period = self.config.session.sweep_interval();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                let dropped = sessions.sweep().await;
                debug!("Session sweep done, {} dropped", dropped);
            }
        })
    }

    /// Get server configuration
    pub fn config(&self) -> &LearnexConfig {
        &self.config
    }

    /// Get application state
    pub fn state(&self) -> &AppState {
        &self.state
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

/// Builder for LearnexServer
pub struct LearnexServerBuilder {
    config: LearnexConfig,
}

impl LearnexServerBuilder {
    /// Create a new server builder
    pub fn new() -> Self {
        Self {
            config: LearnexConfig::default(),
        }
    }

    /// Start from an existing configuration
    pub fn with_config(config: LearnexConfig) -> Self {
        Self { config }
    }

    /// Set the server host
    pub fn host<S: Into<String>>(mut self, host: S) -> Self {
        self.config.server.host = host.into();
        self
    }

    /// Set the server port
    pub fn port(mut self, port: u16) -> Self {
        self.config.server.port = port;
        self
    }

    /// Enable development mode
    pub fn dev_mode(mut self, dev_mode: bool) -> Self {
        self.config.server.dev_mode = dev_mode;
        self
    }

    /// Set database URL
    pub fn database_url<S: Into<String>>(mut self, database_url: S) -> Self {
        self.config.storage.database_url = Some(database_url.into());
        self
    }

    /// Build the server
    pub async fn build(self) -> WebResult<LearnexServer> {
        LearnexServer::new(self.config).await
    }
}

impl Default for LearnexServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_server_creation() {
        let server = LearnexServer::new(LearnexConfig::default()).await;
        assert!(server.is_ok());
    }

    #[tokio::test]
    async fn invalid_config_is_rejected() {
        let mut config = LearnexConfig::default();
        config.session.timeout_secs = 0;
        assert!(LearnexServer::new(config).await.is_err());
    }

    #[test]
    fn test_server_builder() {
        let builder = LearnexServerBuilder::new()
            .host("localhost")
            .port(3000)
            .dev_mode(true);

        assert_eq!(builder.config.server.host, "localhost");
        assert_eq!(builder.config.server.port, 3000);
        assert!(builder.config.server.dev_mode);
    }
}
