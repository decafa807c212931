//! In-memory credential store

use super::{
    normalize_identifier, CredentialRecord, CredentialStore, RegisterRequest, DEFAULT_ACCOUNTS,
};
use crate::{AuthError, AuthResult};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, info};

#[derive(Debug, Default)]
struct Tables {
    /// username key -> record
    users: HashMap<String, CredentialRecord>,
    /// email key -> username key
    emails: HashMap<String, String>,
}

impl Tables {
    fn resolve(&self, key: &str) -> Option<&CredentialRecord> {
        self.users
            .get(key)
            .or_else(|| self.emails.get(key).and_then(|u| self.users.get(u)))
    }

    fn insert(&mut self, record: CredentialRecord) -> AuthResult<()> {
        let username_key = record.username_key();
        if self.resolve(&username_key).is_some() {
            return Err(AuthError::IdentifierTaken {
                identifier: record.username,
            });
        }

        if let Some(email_key) = record.email_key() {
            if self.resolve(&email_key).is_some() {
                return Err(AuthError::IdentifierTaken {
                    identifier: record.email.unwrap_or(email_key),
                });
            }
            self.emails.insert(email_key, username_key.clone());
        }

        self.users.insert(username_key, record);
        Ok(())
    }
}

/// Credential table held in process memory (development and tests)
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    tables: RwLock<Tables>,
}

impl MemoryCredentialStore {
    /// Empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-loaded with the LearnEx demo accounts
    pub fn with_default_accounts() -> AuthResult<Self> {
        let records = DEFAULT_ACCOUNTS
            .iter()
            .map(|(username, email, password, display_name, role)| {
                CredentialRecord::new(
                    username.to_string(),
                    Some(email.to_string()),
                    password,
                    display_name.to_string(),
                    *role,
                )
            })
            .collect::<AuthResult<Vec<_>>>()?;

        let store = Self::from_records(records)?;
        info!("Loaded {} default LearnEx accounts", DEFAULT_ACCOUNTS.len());
        Ok(store)
    }

    /// Store built from existing records; duplicate identifiers are rejected
    pub fn from_records(records: impl IntoIterator<Item = CredentialRecord>) -> AuthResult<Self> {
        let mut tables = Tables::default();
        for record in records {
            tables.insert(record)?;
        }

        Ok(Self {
            tables: RwLock::new(tables),
        })
    }

    /// Number of registered users
    pub async fn len(&self) -> usize {
        self.tables.read().await.users.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn lookup(&self, identifier: &str) -> AuthResult<Option<CredentialRecord>> {
        let key = normalize_identifier(identifier);
        Ok(self.tables.read().await.resolve(&key).cloned())
    }

    async fn register(&self, request: RegisterRequest) -> AuthResult<CredentialRecord> {
        debug!("Starting registration for: {}", request.username);
        let record = request.into_record()?;

        self.tables.write().await.insert(record.clone())?;

        info!("Registered new {} account: {}", record.role, record.username);
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use learnex_core::Role;

    #[tokio::test]
    async fn lookup_by_username_or_email_ignores_case() {
        let store = MemoryCredentialStore::with_default_accounts().unwrap();

        let by_name = store.lookup("ADMIN").await.unwrap().unwrap();
        assert_eq!(by_name.role, Role::Admin);
        assert_eq!(by_name.display_name, "Administrator");

        let by_email = store.lookup("Teacher@LearnEx.local").await.unwrap().unwrap();
        assert_eq!(by_email.username, "teacher");

        assert!(store.lookup("principal").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn register_then_lookup() {
        let store = MemoryCredentialStore::new();
        assert!(store.is_empty().await);

        let record = store
            .register(RegisterRequest {
                username: "Frank".to_string(),
                email: Some("frank@school.test".to_string()),
                password: "hunter22".to_string(),
                display_name: Some("Frank F.".to_string()),
                role: Some(Role::Parent),
            })
            .await
            .unwrap();
        assert_eq!(record.role, Role::Parent);

        let found = store.lookup("frank").await.unwrap().unwrap();
        assert_eq!(found.id, record.id);
        assert!(found.verify_secret("hunter22"));
    }

    #[tokio::test]
    async fn duplicate_username_or_email_is_rejected() {
        let store = MemoryCredentialStore::with_default_accounts().unwrap();

        let taken_name = store
            .register(RegisterRequest {
                username: "Admin".to_string(),
                email: None,
                password: "password".to_string(),
                display_name: None,
                role: None,
            })
            .await;
        assert!(matches!(taken_name, Err(AuthError::IdentifierTaken { .. })));

        let taken_email = store
            .register(RegisterRequest {
                username: "newcomer".to_string(),
                email: Some("STUDENT@learnex.local".to_string()),
                password: "password".to_string(),
                display_name: None,
                role: None,
            })
            .await;
        assert!(matches!(taken_email, Err(AuthError::IdentifierTaken { .. })));

        // A username may not shadow someone else's email alias either
        let shadow = store
            .register(RegisterRequest {
                username: "parent@learnex.local".to_string(),
                email: None,
                password: "password".to_string(),
                display_name: None,
                role: None,
            })
            .await;
        assert!(matches!(shadow, Err(AuthError::IdentifierTaken { .. })));

        assert_eq!(store.len().await, 4);
    }
}
