//! Credential records and the stores that hold them

#[cfg(feature = "sqlite")]
mod database;
mod memory;

#[cfg(feature = "sqlite")]
pub use database::DatabaseCredentialStore;
pub use memory::MemoryCredentialStore;

use crate::session::Principal;
use crate::{AuthError, AuthResult};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use learnex_core::Role;
use serde::Deserialize;

/// Shortest password accepted at registration
pub const MIN_PASSWORD_LEN: usize = 6;

/// Demo accounts shipped with LearnEx: (username, email, password, display name, role)
pub const DEFAULT_ACCOUNTS: [(&str, &str, &str, &str, Role); 4] = [
    ("admin", "admin@learnex.local", "admin123", "Administrator", Role::Admin),
    ("teacher", "teacher@learnex.local", "teacher123", "Demo Teacher", Role::Teacher),
    ("student", "student@learnex.local", "student123", "Demo Student", Role::Student),
    ("parent", "parent@learnex.local", "parent123", "Demo Parent", Role::Parent),
];

/// Registration request
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    pub password: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub role: Option<Role>,
}

impl RegisterRequest {
    /// Reject empty identifiers and short passwords
    pub fn validate(&self) -> AuthResult<()> {
        if self.username.trim().is_empty() || self.password.is_empty() {
            return Err(AuthError::MissingCredentials);
        }

        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AuthError::WeakPassword {
                min: MIN_PASSWORD_LEN,
            });
        }

        Ok(())
    }

    /// Email with surrounding whitespace removed; blank counts as absent
    fn normalized_email(&self) -> Option<String> {
        self.email
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .map(str::to_string)
    }

    /// Build the record this request describes, hashing the password
    pub fn into_record(self) -> AuthResult<CredentialRecord> {
        self.validate()?;
        let email = self.normalized_email();
        let username = self.username.trim().to_string();
        let display_name = self
            .display_name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| username.clone());

        CredentialRecord::new(
            username,
            email,
            &self.password,
            display_name,
            self.role.unwrap_or_default(),
        )
    }
}

/// A user who can log in. Immutable once loaded.
#[derive(Debug, Clone)]
pub struct CredentialRecord {
    pub id: String,
    pub username: String,
    pub email: Option<String>,
    pub display_name: String,
    pub role: Role,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

impl CredentialRecord {
    /// Create a record with a freshly salted Argon2 hash of `password`
    pub fn new(
        username: String,
        email: Option<String>,
        password: &str,
        display_name: String,
        role: Role,
    ) -> AuthResult<Self> {
        Ok(Self {
            id: uuid::Uuid::new_v4().to_string(),
            username,
            email,
            display_name,
            role,
            password_hash: hash_password(password)?,
            created_at: Utc::now(),
        })
    }

    /// Verify a submitted secret against the stored hash
    pub fn verify_secret(&self, secret: &str) -> bool {
        verify_password(secret, &self.password_hash)
    }

    /// Lowercased username, the primary lookup key
    pub fn username_key(&self) -> String {
        normalize_identifier(&self.username)
    }

    /// Lowercased email alias, if any
    pub fn email_key(&self) -> Option<String> {
        self.email.as_deref().map(normalize_identifier)
    }

    /// Principal carried by sessions issued for this record
    pub fn principal(&self) -> Principal {
        Principal {
            identifier: self.username.clone(),
            role: self.role,
            display_name: self.display_name.clone(),
        }
    }
}

/// Lookup key for an identifier: trimmed and lowercased
pub fn normalize_identifier(identifier: &str) -> String {
    identifier.trim().to_lowercase()
}

/// Read-mostly table of users
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Find a record by username or email, case-insensitively. `Ok(None)` when absent.
    async fn lookup(&self, identifier: &str) -> AuthResult<Option<CredentialRecord>>;

    /// Add a new user
    async fn register(&self, request: RegisterRequest) -> AuthResult<CredentialRecord>;
}

/// Hash password using Argon2
fn hash_password(password: &str) -> AuthResult<String> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Verify password against hash; malformed hashes never verify
fn verify_password(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(username: &str, password: &str) -> RegisterRequest {
        RegisterRequest {
            username: username.to_string(),
            email: None,
            password: password.to_string(),
            display_name: None,
            role: None,
        }
    }

    #[test]
    fn secrets_are_hashed_and_salted() {
        let a = CredentialRecord::new(
            "alice".to_string(),
            None,
            "secret1",
            "Alice".to_string(),
            Role::Teacher,
        )
        .unwrap();
        let b = CredentialRecord::new(
            "bob".to_string(),
            None,
            "secret1",
            "Bob".to_string(),
            Role::Teacher,
        )
        .unwrap();

        assert!(a.password_hash.starts_with("$argon2"));
        assert_ne!(a.password_hash, b.password_hash);
        assert!(a.verify_secret("secret1"));
        assert!(!a.verify_secret("Secret1"));
    }

    #[test]
    fn malformed_hash_never_verifies() {
        let mut record = CredentialRecord::new(
            "carol".to_string(),
            None,
            "secret1",
            "Carol".to_string(),
            Role::Parent,
        )
        .unwrap();
        record.password_hash = "secret1".to_string();
        assert!(!record.verify_secret("secret1"));
    }

    #[test]
    fn registration_validation() {
        assert!(matches!(
            request("  ", "password").validate(),
            Err(AuthError::MissingCredentials)
        ));
        assert!(matches!(
            request("dave", "").validate(),
            Err(AuthError::MissingCredentials)
        ));
        assert!(matches!(
            request("dave", "12345").validate(),
            Err(AuthError::WeakPassword { min: 6 })
        ));
        assert!(request("dave", "123456").validate().is_ok());
    }

    #[test]
    fn into_record_defaults_role_and_display_name() {
        let mut req = request(" erin ", "password");
        req.email = Some("  ".to_string());
        let record = req.into_record().unwrap();

        assert_eq!(record.username, "erin");
        assert_eq!(record.display_name, "erin");
        assert_eq!(record.role, Role::Student);
        assert_eq!(record.email, None);
    }

    #[test]
    fn identifiers_normalize_to_lowercase() {
        assert_eq!(normalize_identifier("  Admin@LearnEx.Local "), "admin@learnex.local");
    }
}
