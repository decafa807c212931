//! Application state shared by all handlers

use crate::registry::SessionRegistry;
use crate::views::DashboardViews;
use crate::WebResult;
use learnex_auth::{
    AccessControlTable, Clock, CredentialStore, MemoryCredentialStore, RouteGuard, SessionConfig,
    SessionManager, SystemClock,
};
use learnex_core::LearnexConfig;
use std::sync::Arc;
use tracing::info;

#[cfg(feature = "sqlite")]
use learnex_auth::DatabaseCredentialStore;

#[derive(Clone)]
pub struct AppState {
    /// Configuration
    pub config: Arc<LearnexConfig>,
    /// User table
    pub credentials: Arc<dyn CredentialStore>,
    /// Resource → roles
    pub access: Arc<AccessControlTable>,
    /// Live client contexts
    pub sessions: SessionRegistry,
    pub views: Arc<DashboardViews>,
}

impl AppState {
    /// Create a new application state on the system clock
    pub async fn new(config: LearnexConfig) -> WebResult<Self> {
        Self::with_clock(config, Arc::new(SystemClock)).await
    }

    pub async fn with_clock(config: LearnexConfig, clock: Arc<dyn Clock>) -> WebResult<Self> {
        let credentials = open_credentials(&config).await?;
        let state = Self::from_parts(config, credentials, clock);

        let restored = state.sessions.restore().await?;
        if restored > 0 {
            info!("Resumed {} sessions from disk", restored);
        }
        Ok(state)
    }

    /// Assemble state around an existing credential store
    pub fn from_parts(
        config: LearnexConfig,
        credentials: Arc<dyn CredentialStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let access = Arc::new(AccessControlTable::from_settings(&config.access));
        let sessions = SessionRegistry::new(
            credentials.clone(),
            clock,
            SessionConfig::from(&config.session),
            config.storage.session_backend,
            config.storage.session_dir_path(),
        );
        let views = Arc::new(DashboardViews::new(access.clone()));

        Self {
            config: Arc::new(config),
            credentials,
            access,
            sessions,
            views,
        }
    }

    /// Route guard bound to one client context
    pub fn route_guard(&self, manager: SessionManager) -> RouteGuard<DashboardViews> {
        RouteGuard::new(manager, self.access.clone(), self.views.clone())
    }
}

#[cfg(feature = "sqlite")]
async fn open_credentials(config: &LearnexConfig) -> WebResult<Arc<dyn CredentialStore>> {
    match &config.storage.database_url {
        Some(url) => {
            let store = DatabaseCredentialStore::connect(url).await?;
            let seeded = store.seed_default_accounts().await?;
            if seeded > 0 {
                info!("Seeded {} demo accounts into {}", seeded, url);
            }
            Ok(Arc::new(store))
        }
        None => memory_credentials(),
    }
}

#[cfg(not(feature = "sqlite"))]
async fn open_credentials(config: &LearnexConfig) -> WebResult<Arc<dyn CredentialStore>> {
    if config.storage.database_url.is_some() {
        return Err(crate::WebError::Config(
            "database_url requires the sqlite feature".to_string(),
        ));
    }
    memory_credentials()
}

fn memory_credentials() -> WebResult<Arc<dyn CredentialStore>> {
    info!("Using in-memory credential store with demo accounts");
    Ok(Arc::new(MemoryCredentialStore::with_default_accounts()?))
}
