//! Session Storage - key-value slots holding the persisted session
//!
//! The current session lives under [`CURRENT_SESSION_KEY`] as base64 of its
//! JSON form. The encoding obscures the record; it is not a security boundary.

use super::Session;
use crate::{AuthError, AuthResult};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Key of the persisted current session
pub const CURRENT_SESSION_KEY: &str = "current-session";

/// Per-client key-value persistence
#[async_trait]
pub trait SessionStore: Send + Sync + std::fmt::Debug {
    async fn get(&self, key: &str) -> AuthResult<Option<Vec<u8>>>;

    async fn set(&self, key: &str, value: Vec<u8>) -> AuthResult<()>;

    /// Removing a missing key is not an error
    async fn delete(&self, key: &str) -> AuthResult<()>;
}

/// Encode a session for its storage slot
pub fn encode_session(session: &Session) -> AuthResult<Vec<u8>> {
    let json = serde_json::to_vec(session)?;
    Ok(STANDARD.encode(json).into_bytes())
}

/// Decode a stored session. Anything malformed is [`AuthError::SessionCorrupt`].
pub fn decode_session(bytes: &[u8]) -> AuthResult<Session> {
    let json = STANDARD
        .decode(bytes.trim_ascii())
        .map_err(|e| corrupt(format!("invalid base64: {}", e)))?;

    let session: Session =
        serde_json::from_slice(&json).map_err(|e| corrupt(format!("invalid JSON: {}", e)))?;

    if session.last_activity_at < session.issued_at {
        return Err(corrupt("lastActivityAt precedes issuedAt"));
    }

    Ok(session)
}

fn corrupt<S: Into<String>>(message: S) -> AuthError {
    AuthError::SessionCorrupt {
        message: message.into(),
    }
}

/// Store held in process memory
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    entries: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(&self, key: &str) -> AuthResult<Option<Vec<u8>>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> AuthResult<()> {
        self.entries.write().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> AuthResult<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }
}

/// Store backed by a directory per client slot, one file per key
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    slot_dir: PathBuf,
}

impl FileSessionStore {
    /// Open (creating if needed) the slot for `client_id` under `base_dir`
    pub fn new<P: AsRef<Path>>(base_dir: P, client_id: &str) -> AuthResult<Self> {
        let slot_dir = base_dir.as_ref().join(sanitize(client_id));
        std::fs::create_dir_all(&slot_dir)?;

        info!("Session storage initialized at: {}", slot_dir.display());
        Ok(Self { slot_dir })
    }

    pub fn slot_dir(&self) -> &Path {
        &self.slot_dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.slot_dir.join(sanitize(key))
    }
}

/// Keep names to a filesystem-safe alphabet
fn sanitize(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' => c,
            _ => '_',
        })
        .collect();

    if cleaned.is_empty() {
        "_".to_string()
    } else {
        cleaned
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn get(&self, key: &str) -> AuthResult<Option<Vec<u8>>> {
        match tokio::fs::read(self.path_for(key)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> AuthResult<()> {
        let path = self.path_for(key);
        let tmp = path.with_extension("tmp");

        tokio::fs::write(&tmp, value).await?;
        tokio::fs::rename(&tmp, &path).await?;

        debug!("Saved {} to {}", key, path.display());
        Ok(())
    }

    async fn delete(&self, key: &str) -> AuthResult<()> {
        match tokio::fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Principal;
    use chrono::{Duration, Utc};
    use learnex_core::Role;

    fn session() -> Session {
        Session::new(
            "abc".to_string(),
            Principal {
                identifier: "student".to_string(),
                role: Role::Student,
                display_name: "Demo Student".to_string(),
            },
            Utc::now(),
        )
    }

    #[test]
    fn encoded_record_is_base64_json() {
        let original = session();
        let encoded = encode_session(&original).unwrap();
        let json = STANDARD.decode(&encoded).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&json).unwrap();

        assert_eq!(value["token"], "abc");
        assert_eq!(value["user"]["identifier"], "student");
        assert_eq!(decode_session(&encoded).unwrap(), original);
    }

    #[test]
    fn malformed_records_are_corrupt() {
        assert!(matches!(
            decode_session(b"%%% not base64 %%%"),
            Err(AuthError::SessionCorrupt { .. })
        ));

        let not_json = STANDARD.encode("{token: nope").into_bytes();
        assert!(matches!(
            decode_session(&not_json),
            Err(AuthError::SessionCorrupt { .. })
        ));

        let mut backwards = session();
        backwards.last_activity_at = backwards.issued_at - Duration::seconds(1);
        let encoded = encode_session(&backwards).unwrap();
        assert!(matches!(
            decode_session(&encoded),
            Err(AuthError::SessionCorrupt { .. })
        ));
    }

    #[tokio::test]
    async fn memory_store_get_set_delete() {
        let store = MemorySessionStore::new();
        assert!(store.get(CURRENT_SESSION_KEY).await.unwrap().is_none());

        store
            .set(CURRENT_SESSION_KEY, b"value".to_vec())
            .await
            .unwrap();
        assert_eq!(
            store.get(CURRENT_SESSION_KEY).await.unwrap(),
            Some(b"value".to_vec())
        );

        store.delete(CURRENT_SESSION_KEY).await.unwrap();
        store.delete(CURRENT_SESSION_KEY).await.unwrap();
        assert!(store.get(CURRENT_SESSION_KEY).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn file_store_keeps_slots_apart() {
        let dir = tempfile::tempdir().unwrap();
        let alice = FileSessionStore::new(dir.path(), "client/alice").unwrap();
        let bob = FileSessionStore::new(dir.path(), "client-bob").unwrap();

        alice.set(CURRENT_SESSION_KEY, b"a".to_vec()).await.unwrap();
        assert_eq!(
            alice.get(CURRENT_SESSION_KEY).await.unwrap(),
            Some(b"a".to_vec())
        );
        assert!(bob.get(CURRENT_SESSION_KEY).await.unwrap().is_none());
        assert!(alice.slot_dir().starts_with(dir.path()));

        alice.delete(CURRENT_SESSION_KEY).await.unwrap();
        assert!(alice.get(CURRENT_SESSION_KEY).await.unwrap().is_none());
    }
}
