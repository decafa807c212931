//! Session registry
//!
//! The server side of "one session per client context": every login creates
//! a fresh [`SessionManager`] with its own store slot, registered under the
//! token it issued.

use crate::{WebError, WebResult};
use learnex_auth::{
    Clock, CredentialStore, FileSessionStore, MemorySessionStore, SessionConfig, SessionManager,
    SessionStore,
};
use learnex_core::SessionBackend;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// A registered client context
#[derive(Debug, Clone)]
pub struct ClientSlot {
    pub manager: SessionManager,
    /// Backing directory when sessions live on disk
    pub slot_dir: Option<PathBuf>,
}

/// Live client contexts keyed by session token
#[derive(Clone)]
pub struct SessionRegistry {
    contexts: Arc<RwLock<HashMap<String, ClientSlot>>>,
    credentials: Arc<dyn CredentialStore>,
    clock: Arc<dyn Clock>,
    config: SessionConfig,
    backend: SessionBackend,
    session_dir: PathBuf,
}

impl SessionRegistry {
    /// Registry creating per-client managers with `config`. The server sweep
    /// replaces per-session watchers, so `watch_interval` is dropped.
    pub fn new(
        credentials: Arc<dyn CredentialStore>,
        clock: Arc<dyn Clock>,
        config: SessionConfig,
        backend: SessionBackend,
        session_dir: PathBuf,
    ) -> Self {
        Self {
            contexts: Arc::new(RwLock::new(HashMap::new())),
            credentials,
            clock,
            config: config.with_watch_interval(None),
            backend,
            session_dir,
        }
    }

    pub fn session_config(&self) -> &SessionConfig {
        &self.config
    }

    /// A fresh, unregistered client context
    pub fn new_context(&self) -> WebResult<ClientSlot> {
        let client_id = uuid::Uuid::new_v4().to_string();
        match self.backend {
            SessionBackend::Memory => Ok(ClientSlot {
                manager: self.manager_for(Arc::new(MemorySessionStore::new())),
                slot_dir: None,
            }),
            SessionBackend::File => {
                let store = FileSessionStore::new(&self.session_dir, &client_id)?;
                let slot_dir = store.slot_dir().to_path_buf();
                Ok(ClientSlot {
                    manager: self.manager_for(Arc::new(store)),
                    slot_dir: Some(slot_dir),
                })
            }
        }
    }

    fn manager_for(&self, store: Arc<dyn SessionStore>) -> SessionManager {
        SessionManager::builder(self.credentials.clone(), store)
            .config(self.config.clone())
            .clock(self.clock.clone())
            .build()
    }

    pub async fn insert(&self, token: String, slot: ClientSlot) {
        self.contexts.write().await.insert(token, slot);
    }

    pub async fn get(&self, token: &str) -> Option<SessionManager> {
        self.contexts
            .read()
            .await
            .get(token)
            .map(|slot| slot.manager.clone())
    }

    /// Unregister a context, removing its (now empty) slot directory
    pub async fn remove(&self, token: &str) -> Option<SessionManager> {
        let slot = self.contexts.write().await.remove(token)?;
        if let Some(dir) = &slot.slot_dir {
            discard_slot_dir(dir).await;
        }
        Some(slot.manager)
    }

    /// Throw away a context that never got registered
    pub async fn discard(&self, slot: ClientSlot) {
        if let Some(dir) = &slot.slot_dir {
            discard_slot_dir(dir).await;
        }
    }

    pub async fn len(&self) -> usize {
        self.contexts.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Check every context and drop the expired ones. Returns how many were dropped.
    pub async fn sweep(&self) -> usize {
        let slots: Vec<(String, SessionManager)> = self
            .contexts
            .read()
            .await
            .iter()
            .map(|(token, slot)| (token.clone(), slot.manager.clone()))
            .collect();

        let mut expired = Vec::new();
        for (token, manager) in slots {
            if !manager.check_expiry().await {
                expired.push(token);
            }
        }

        for token in &expired {
            self.remove(token).await;
        }

        if !expired.is_empty() {
            info!("Session sweep dropped {} expired contexts", expired.len());
        }
        expired.len()
    }

    /// Re-register sessions persisted in the session directory (file backend only).
    /// Returns how many live sessions were restored.
    pub async fn restore(&self) -> WebResult<usize> {
        if self.backend != SessionBackend::File {
            return Ok(0);
        }

        let mut entries = match tokio::fs::read_dir(&self.session_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(WebError::Server(e)),
        };

        let mut restored = 0;
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            let Some(client_id) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };

            let store = FileSessionStore::new(&self.session_dir, &client_id)?;
            let slot_dir = store.slot_dir().to_path_buf();
            let manager = self.manager_for(Arc::new(store));

            if manager.check_expiry().await {
                if let Some(session) = manager.snapshot().await {
                    debug!("Restored session for {}", session.user.identifier);
                    self.insert(
                        session.token,
                        ClientSlot {
                            manager,
                            slot_dir: Some(slot_dir),
                        },
                    )
                    .await;
                    restored += 1;
                }
            } else {
                discard_slot_dir(&slot_dir).await;
            }
        }

        info!("Restored {} persisted sessions", restored);
        Ok(restored)
    }
}

async fn discard_slot_dir(dir: &std::path::Path) {
    if let Err(e) = tokio::fs::remove_dir(dir).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!("Could not remove session slot {}: {}", dir.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use learnex_auth::{ManualClock, MemoryCredentialStore};

    fn registry(clock: &ManualClock, backend: SessionBackend, dir: PathBuf) -> SessionRegistry {
        SessionRegistry::new(
            Arc::new(MemoryCredentialStore::with_default_accounts().unwrap()),
            Arc::new(clock.clone()),
            SessionConfig::with_timeout(Duration::minutes(30)),
            backend,
            dir,
        )
    }

    async fn login(registry: &SessionRegistry, user: &str, password: &str) -> String {
        let slot = registry.new_context().unwrap();
        let session = slot.manager.authenticate(user, password).await.unwrap();
        registry.insert(session.token.clone(), slot).await;
        session.token
    }

    #[tokio::test]
    async fn contexts_are_independent() {
        let clock = ManualClock::default();
        let registry = registry(&clock, SessionBackend::Memory, PathBuf::new());

        let teacher = login(&registry, "teacher", "teacher123").await;
        let parent = login(&registry, "parent", "parent123").await;
        assert_eq!(registry.len().await, 2);

        let manager = registry.get(&teacher).await.unwrap();
        manager.logout().await.unwrap();
        registry.remove(&teacher).await;

        assert!(registry.get(&teacher).await.is_none());
        let other = registry.get(&parent).await.unwrap();
        assert!(other.validate().await);
    }

    #[tokio::test]
    async fn sweep_drops_only_expired() {
        let clock = ManualClock::default();
        let registry = registry(&clock, SessionBackend::Memory, PathBuf::new());

        let idle = login(&registry, "student", "student123").await;
        clock.advance(Duration::minutes(20));
        let active = login(&registry, "admin", "admin123").await;
        clock.advance(Duration::minutes(15));

        assert_eq!(registry.sweep().await, 1);
        assert!(registry.get(&idle).await.is_none());
        assert!(registry.get(&active).await.is_some());
    }

    #[tokio::test]
    async fn file_backed_sessions_survive_restart() {
        let dir = tempfile::tempdir().unwrap();
        let clock = ManualClock::default();

        let first = registry(&clock, SessionBackend::File, dir.path().to_path_buf());
        let token = login(&first, "teacher", "teacher123").await;
        drop(first);

        let second = registry(&clock, SessionBackend::File, dir.path().to_path_buf());
        assert_eq!(second.restore().await.unwrap(), 1);

        let manager = second.get(&token).await.unwrap();
        assert_eq!(manager.current_user().await.unwrap().identifier, "teacher");
    }

    #[tokio::test]
    async fn restore_skips_expired_sessions() {
        let dir = tempfile::tempdir().unwrap();
        let clock = ManualClock::default();

        let first = registry(&clock, SessionBackend::File, dir.path().to_path_buf());
        login(&first, "student", "student123").await;
        drop(first);

        clock.advance(Duration::hours(1));
        let second = registry(&clock, SessionBackend::File, dir.path().to_path_buf());
        assert_eq!(second.restore().await.unwrap(), 0);
        assert!(second.is_empty().await);
    }
}
