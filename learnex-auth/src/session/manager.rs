//! Session Manager - issuance, activity tracking and expiry for one client context
//!
//! A [`SessionManager`] owns at most one current session. Reads and writes of
//! that session are serialized through a single mutex, so the background
//! watcher and interaction-driven [`SessionManager::touch`] calls never lose
//! an update to `last_activity_at`.
//!
//! `touch()` only updates the cached session. The write reaches the
//! [`SessionStore`] on the next `validate`, watcher tick, `flush` or logout.

use super::storage::{decode_session, encode_session, SessionStore, CURRENT_SESSION_KEY};
use super::{Principal, Session, SessionConfig, SessionEvent};
use crate::clock::{Clock, SystemClock};
use crate::credentials::CredentialStore;
use crate::{AuthError, AuthResult};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::{rngs::OsRng, RngCore};
use std::sync::{Arc, Mutex as StdMutex, PoisonError, Weak};
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// Token entropy in bytes
const TOKEN_BYTES: usize = 32;

/// Generate an opaque session token: 256 bits from the OS RNG, base64url
pub fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

#[derive(Debug, Default)]
struct SessionState {
    current: Option<Session>,
    /// Cached session has activity not yet written to the store
    dirty: bool,
}

struct Inner {
    credentials: Arc<dyn CredentialStore>,
    store: Arc<dyn SessionStore>,
    clock: Arc<dyn Clock>,
    config: SessionConfig,
    state: Mutex<SessionState>,
    watcher: StdMutex<Option<JoinHandle<()>>>,
    events: broadcast::Sender<SessionEvent>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        let handle = self
            .watcher
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            handle.abort();
        }
    }
}

/// Session lifecycle for a single client context. Cloning yields another
/// handle to the same context.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("store", &self.inner.store)
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

/// Builder for [`SessionManager`]
pub struct SessionManagerBuilder {
    credentials: Arc<dyn CredentialStore>,
    store: Arc<dyn SessionStore>,
    clock: Arc<dyn Clock>,
    config: SessionConfig,
}

impl SessionManagerBuilder {
    pub fn config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn build(self) -> SessionManager {
        // Buffer of 16 events; lagging subscribers skip ahead
        let (events, _) = broadcast::channel(16);

        SessionManager {
            inner: Arc::new(Inner {
                credentials: self.credentials,
                store: self.store,
                clock: self.clock,
                config: self.config,
                state: Mutex::new(SessionState::default()),
                watcher: StdMutex::new(None),
                events,
            }),
        }
    }
}

impl SessionManager {
    /// Manager on the system clock
    pub fn new(
        credentials: Arc<dyn CredentialStore>,
        store: Arc<dyn SessionStore>,
        config: SessionConfig,
    ) -> Self {
        Self::builder(credentials, store).config(config).build()
    }

    pub fn builder(
        credentials: Arc<dyn CredentialStore>,
        store: Arc<dyn SessionStore>,
    ) -> SessionManagerBuilder {
        SessionManagerBuilder {
            credentials,
            store,
            clock: Arc::new(SystemClock),
            config: SessionConfig::default(),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    /// Receive lifecycle events for this context
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    /// Verify `identifier`/`secret` and issue a new current session,
    /// replacing any previous one.
    pub async fn authenticate(&self, identifier: &str, secret: &str) -> AuthResult<Session> {
        if identifier.trim().is_empty() || secret.is_empty() {
            warn!("Login attempt with empty credentials");
            return Err(AuthError::InvalidCredentials);
        }

        let record = match self.inner.credentials.lookup(identifier).await? {
            Some(record) if record.verify_secret(secret) => record,
            Some(_) => {
                warn!("Login failed for {}: wrong secret", identifier.trim());
                return Err(AuthError::InvalidCredentials);
            }
            None => {
                warn!("Login failed for {}: unknown identifier", identifier.trim());
                return Err(AuthError::InvalidCredentials);
            }
        };

        let session = Session::new(generate_token(), record.principal(), self.inner.clock.now());

        {
            let mut state = self.inner.state.lock().await;
            self.persist(&session).await?;
            state.current = Some(session.clone());
            state.dirty = false;
        }

        self.start_watcher();
        self.emit(SessionEvent::Issued {
            identifier: session.user.identifier.clone(),
            role: session.user.role,
        });

        info!(
            "Session issued for {} ({})",
            session.user.identifier, session.user.role
        );
        Ok(session)
    }

    /// Check the current session, bumping its activity when valid.
    /// Expired or missing sessions are cleared.
    pub async fn validate(&self) -> bool {
        match self.require_session().await {
            Ok(_) => true,
            Err(e) if e.is_user_facing() => {
                debug!("Validation failed: {}", e);
                false
            }
            Err(e) => {
                error!("Session validation error: {}", e);
                false
            }
        }
    }

    /// Like [`validate`](Self::validate), but says why there is no session
    pub async fn require_session(&self) -> AuthResult<Session> {
        let mut state = self.inner.state.lock().await;
        let restored = self.load(&mut state).await?;

        let Some(session) = state.current.as_mut() else {
            return Err(AuthError::NotAuthenticated);
        };

        let now = self.inner.clock.now();
        if let Err(reason) = session.check(now, &self.inner.config) {
            debug!("Session for {} failed {:?} timeout", session.user.identifier, reason);
            let expired = self.clear(&mut state).await;
            drop(state);
            self.finish_expiry(expired);
            return Err(AuthError::SessionExpired);
        }

        session.bump(now);
        let session = session.clone();
        self.persist(&session).await?;
        state.dirty = false;
        drop(state);

        if restored {
            self.start_watcher();
        }
        Ok(session)
    }

    /// Record an interaction. Returns false when there is no live cached session.
    pub async fn touch(&self) -> bool {
        let mut state = self.inner.state.lock().await;
        let now = self.inner.clock.now();

        match state.current.as_mut() {
            Some(session) if session.is_valid_at(now, &self.inner.config) => {
                session.bump(now);
                state.dirty = true;
                true
            }
            _ => false,
        }
    }

    /// Write pending activity to the store
    pub async fn flush(&self) -> AuthResult<()> {
        let mut state = self.inner.state.lock().await;
        if state.dirty {
            if let Some(session) = state.current.as_ref() {
                self.persist(session).await?;
            }
            state.dirty = false;
        }
        Ok(())
    }

    /// Run the timeout check without counting it as activity. Expires the
    /// session on failure; flushes pending activity otherwise.
    pub async fn check_expiry(&self) -> bool {
        let mut state = self.inner.state.lock().await;
        if let Err(e) = self.load(&mut state).await {
            error!("Failed to load session: {}", e);
            return false;
        }

        let now = self.inner.clock.now();
        let valid = match state.current.as_ref() {
            Some(session) => session.is_valid_at(now, &self.inner.config),
            None => return false,
        };

        if !valid {
            let expired = self.clear(&mut state).await;
            drop(state);
            self.finish_expiry(expired);
            return false;
        }

        if state.dirty {
            if let Some(session) = state.current.as_ref() {
                if let Err(e) = self.persist(session).await {
                    error!("Failed to flush session activity: {}", e);
                    return true;
                }
            }
            state.dirty = false;
        }
        true
    }

    /// End the current session, removing it from the store and cancelling the watcher
    pub async fn logout(&self) -> AuthResult<()> {
        let ended = {
            let mut state = self.inner.state.lock().await;
            if let Err(e) = self.load(&mut state).await {
                warn!("Ignoring unreadable session at logout: {}", e);
            }
            state.dirty = false;
            let ended = state.current.take();
            self.inner.store.delete(CURRENT_SESSION_KEY).await?;
            ended
        };

        self.stop_watcher();

        if let Some(session) = ended {
            info!("Logged out {}", session.user.identifier);
            self.emit(SessionEvent::LoggedOut {
                identifier: session.user.identifier,
            });
        }
        Ok(())
    }

    /// Principal of the current session, if it validates
    pub async fn current_user(&self) -> Option<Principal> {
        self.require_session().await.ok().map(|s| s.user)
    }

    /// Cached session as-is, without checking or touching it
    pub async fn snapshot(&self) -> Option<Session> {
        self.inner.state.lock().await.current.clone()
    }

    /// Whether a background watcher task is currently running
    pub fn has_watcher(&self) -> bool {
        self.inner
            .watcher
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Fill the cache from the store when empty. Returns true when a session was restored.
    async fn load(&self, state: &mut SessionState) -> AuthResult<bool> {
        if state.current.is_some() {
            return Ok(false);
        }

        let Some(bytes) = self.inner.store.get(CURRENT_SESSION_KEY).await? else {
            return Ok(false);
        };

        match decode_session(&bytes) {
            Ok(session) => {
                debug!("Restored session for {}", session.user.identifier);
                state.current = Some(session);
                state.dirty = false;
                Ok(true)
            }
            Err(e) => {
                warn!("Discarding session record: {}", e);
                self.inner.store.delete(CURRENT_SESSION_KEY).await?;
                Ok(false)
            }
        }
    }

    async fn persist(&self, session: &Session) -> AuthResult<()> {
        let bytes = encode_session(session)?;
        self.inner.store.set(CURRENT_SESSION_KEY, bytes).await
    }

    /// Drop the cached and stored session, returning what was dropped
    async fn clear(&self, state: &mut SessionState) -> Option<Session> {
        state.dirty = false;
        let expired = state.current.take();
        if let Err(e) = self.inner.store.delete(CURRENT_SESSION_KEY).await {
            error!("Failed to delete expired session: {}", e);
        }
        expired
    }

    fn finish_expiry(&self, expired: Option<Session>) {
        self.stop_watcher();
        if let Some(session) = expired {
            info!("Session expired for {}", session.user.identifier);
            self.emit(SessionEvent::Expired {
                identifier: session.user.identifier,
            });
        }
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine
        let _ = self.inner.events.send(event);
    }

    /// Spawn the expiry watcher for the current session, replacing any running one
    fn start_watcher(&self) {
        let Some(period) = self.inner.config.watch_interval else {
            return;
        };

        let weak = Arc::downgrade(&self.inner);
        let handle = tokio::spawn(watch(weak, period));

        let previous = self
            .inner
            .watcher
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(handle);
        if let Some(previous) = previous {
            previous.abort();
        }
        debug!("Expiry watcher started ({:?})", period);
    }

    fn stop_watcher(&self) {
        let handle = self
            .inner
            .watcher
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            handle.abort();
            debug!("Expiry watcher stopped");
        }
    }
}

/// Watcher loop. Holds only a weak reference so it ends with the manager.
async fn watch(inner: Weak<Inner>, period: std::time::Duration) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately
    ticker.tick().await;

    loop {
        ticker.tick().await;

        let Some(inner) = inner.upgrade() else {
            break;
        };
        let manager = SessionManager { inner };
        if !manager.check_expiry().await {
            break;
        }
    }
}
