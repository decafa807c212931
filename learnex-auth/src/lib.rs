//! LearnEx Auth - Session and authorization lifecycle
//!
//! login → session issuance → activity tracking → expiry → logout, with every
//! navigation gated by a role/resource access table.
//!
//! ## Architecture
//!
//! - **Credentials** (`credentials`): identifier → hashed secret, role, display name
//! - **Sessions** (`session`): one current session per client context, persisted
//!   through a pluggable key-value slot
//! - **Access** (`access`): static resource → roles table
//! - **Guard** (`guard`): combines the two and calls into the view layer

pub mod access;
pub mod clock;
pub mod credentials;
pub mod guard;
pub mod session;

pub use access::AccessControlTable;
pub use clock::{Clock, ManualClock, SystemClock};
pub use credentials::{
    CredentialRecord, CredentialStore, MemoryCredentialStore, RegisterRequest,
};
#[cfg(feature = "sqlite")]
pub use credentials::DatabaseCredentialStore;
pub use guard::{GuardOutcome, RouteGuard, ViewLayer};
pub use learnex_core::{AccessPolicy, Role};
pub use session::{
    FileSessionStore, MemorySessionStore, Principal, Session, SessionConfig, SessionEvent,
    SessionManager, SessionStore,
};

/// Authentication and authorization error type
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Missing credentials")]
    MissingCredentials,

    #[error("Password must be at least {min} characters")]
    WeakPassword { min: usize },

    #[error("Identifier already registered: {identifier}")]
    IdentifierTaken { identifier: String },

    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("Session expired")]
    SessionExpired,

    #[error("Corrupt session record: {message}")]
    SessionCorrupt { message: String },

    #[error("Access denied to '{resource}' for role {role}")]
    AccessDenied { resource: String, role: Role },

    #[error("Password hashing failed")]
    PasswordHash,

    #[error("Storage error: {message}")]
    Storage { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type AuthResult<T> = Result<T, AuthError>;

impl AuthError {
    /// Create a storage error
    pub fn storage<S: Into<String>>(message: S) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Whether the error resolves to a UI-visible state rather than an operator concern
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            AuthError::InvalidCredentials
                | AuthError::MissingCredentials
                | AuthError::WeakPassword { .. }
                | AuthError::IdentifierTaken { .. }
                | AuthError::NotAuthenticated
                | AuthError::SessionExpired
                | AuthError::AccessDenied { .. }
        )
    }
}

#[cfg(feature = "sqlite")]
impl From<sqlx::Error> for AuthError {
    fn from(err: sqlx::Error) -> Self {
        AuthError::Storage {
            message: err.to_string(),
        }
    }
}
