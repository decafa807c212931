//! SQLite-backed credential store

use super::{
    normalize_identifier, CredentialRecord, CredentialStore, RegisterRequest, DEFAULT_ACCOUNTS,
};
use crate::{AuthError, AuthResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use learnex_core::Role;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use tracing::{debug, error, info};

/// Database user row
#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: String,
    username: String,
    email: Option<String>,
    display_name: String,
    role: String,
    password_hash: String,
    created_at: String, // RFC 3339
}

impl UserRow {
    fn into_record(self) -> AuthResult<CredentialRecord> {
        let role = Role::from_str(&self.role).map_err(AuthError::storage)?;
        let created_at = DateTime::parse_from_rfc3339(&self.created_at)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| AuthError::storage(format!("Bad created_at for {}: {}", self.id, e)))?;

        Ok(CredentialRecord {
            id: self.id,
            username: self.username,
            email: self.email,
            display_name: self.display_name,
            role,
            password_hash: self.password_hash,
            created_at,
        })
    }
}

const CREATE_USERS: &str = r#"
    CREATE TABLE IF NOT EXISTS users (
        id TEXT PRIMARY KEY,
        username TEXT NOT NULL,
        username_key TEXT NOT NULL UNIQUE,
        email TEXT,
        email_key TEXT UNIQUE,
        display_name TEXT NOT NULL,
        role TEXT NOT NULL,
        password_hash TEXT NOT NULL,
        created_at TEXT NOT NULL
    )
"#;

const CREATE_EMAIL_INDEX: &str = "CREATE INDEX IF NOT EXISTS idx_users_email_key ON users(email_key)";

const SELECT_BY_KEY: &str = r#"
    SELECT id, username, email, display_name, role, password_hash, created_at
    FROM users
    WHERE username_key = ? OR email_key = ?
    LIMIT 1
"#;

const INSERT_UNCLAIMED: &str = r#"
    INSERT INTO users (id, username, username_key, email, email_key, display_name, role, password_hash, created_at)
    SELECT ?, ?, ?, ?, ?, ?, ?, ?, ?
    WHERE NOT EXISTS (
        SELECT 1 FROM users
        WHERE username_key IN (?, ?) OR email_key IN (?, ?)
    )
"#;

/// Credential store over a `users` table
#[derive(Debug, Clone)]
pub struct DatabaseCredentialStore {
    pool: SqlitePool,
}

impl DatabaseCredentialStore {
    /// Connect to `database_url`, creating the file and schema when missing
    pub async fn connect(database_url: &str) -> AuthResult<Self> {
        info!("Connecting credential store to {}", database_url);

        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);

        // Every connection to an in-memory database sees its own empty database
        let pool_options = if database_url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None::<std::time::Duration>)
                .max_lifetime(None::<std::time::Duration>)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };

        let pool = pool_options.connect_with(options).await?;
        Self::new(pool).await
    }

    /// Wrap an existing pool, creating the schema if needed
    pub async fn new(pool: SqlitePool) -> AuthResult<Self> {
        let store = Self { pool };
        store.create_tables().await?;
        Ok(store)
    }

    async fn create_tables(&self) -> AuthResult<()> {
        for statement in [CREATE_USERS, CREATE_EMAIL_INDEX] {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| {
                    error!("Failed to create users table: {}", e);
                    AuthError::from(e)
                })?;
        }

        debug!("Users table ready");
        Ok(())
    }

    /// Insert the demo accounts when the table is empty. Returns how many were added.
    pub async fn seed_default_accounts(&self) -> AuthResult<usize> {
        if self.count().await? > 0 {
            debug!("Users table already populated, skipping seed");
            return Ok(0);
        }

        for (username, email, password, display_name, role) in DEFAULT_ACCOUNTS {
            let record = CredentialRecord::new(
                username.to_string(),
                Some(email.to_string()),
                password,
                display_name.to_string(),
                role,
            )?;
            self.insert(&record).await?;
        }

        info!("Seeded {} default LearnEx accounts", DEFAULT_ACCOUNTS.len());
        Ok(DEFAULT_ACCOUNTS.len())
    }

    /// Number of users in the table
    pub async fn count(&self) -> AuthResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn find_by_key(&self, key: &str) -> AuthResult<Option<CredentialRecord>> {
        let row = sqlx::query_as::<_, UserRow>(SELECT_BY_KEY)
            .bind(key)
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        row.map(UserRow::into_record).transpose()
    }

    /// Insert `record` unless its username or email is already claimed by
    /// any row, in either column. The check and the write are one statement.
    async fn insert(&self, record: &CredentialRecord) -> AuthResult<()> {
        let username_key = record.username_key();
        let email_key = record.email_key();

        let result = sqlx::query(INSERT_UNCLAIMED)
            .bind(&record.id)
            .bind(&record.username)
            .bind(&username_key)
            .bind(&record.email)
            .bind(&email_key)
            .bind(&record.display_name)
            .bind(record.role.as_str())
            .bind(&record.password_hash)
            .bind(record.created_at.to_rfc3339())
            .bind(&username_key)
            .bind(&email_key)
            .bind(&username_key)
            .bind(&email_key)
            .execute(&self.pool)
            .await;

        let taken = || AuthError::IdentifierTaken {
            identifier: record.username.clone(),
        };

        match result {
            Ok(done) if done.rows_affected() == 0 => Err(taken()),
            Ok(_) => {
                debug!("User inserted: {}", record.username);
                Ok(())
            }
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Err(taken()),
            Err(e) => {
                error!("Failed to insert user {}: {}", record.username, e);
                Err(e.into())
            }
        }
    }
}

#[async_trait]
impl CredentialStore for DatabaseCredentialStore {
    async fn lookup(&self, identifier: &str) -> AuthResult<Option<CredentialRecord>> {
        self.find_by_key(&normalize_identifier(identifier)).await
    }

    async fn register(&self, request: RegisterRequest) -> AuthResult<CredentialRecord> {
        let record = request.into_record()?;

        if self.find_by_key(&record.username_key()).await?.is_some() {
            return Err(AuthError::IdentifierTaken {
                identifier: record.username,
            });
        }
        if let Some(email_key) = record.email_key() {
            if self.find_by_key(&email_key).await?.is_some() {
                return Err(AuthError::IdentifierTaken {
                    identifier: email_key,
                });
            }
        }

        self.insert(&record).await?;
        info!("Registered new {} account: {}", record.role, record.username);
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn memory_store() -> DatabaseCredentialStore {
        DatabaseCredentialStore::connect("sqlite::memory:")
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn seeds_once() {
        let store = memory_store().await;
        assert_eq!(store.seed_default_accounts().await.unwrap(), 4);
        assert_eq!(store.seed_default_accounts().await.unwrap(), 0);
        assert_eq!(store.count().await.unwrap(), 4);
    }

    #[tokio::test]
    async fn lookup_matches_username_or_email_case_insensitively() {
        let store = memory_store().await;
        store.seed_default_accounts().await.unwrap();

        let admin = store.lookup("AdMiN").await.unwrap().unwrap();
        assert_eq!(admin.role, Role::Admin);
        assert!(admin.verify_secret("admin123"));

        let parent = store.lookup("parent@LEARNEX.local").await.unwrap().unwrap();
        assert_eq!(parent.username, "parent");
        assert_eq!(parent.display_name, "Demo Parent");

        assert!(store.lookup("nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn register_persists_and_rejects_duplicates() {
        let store = memory_store().await;

        let request = RegisterRequest {
            username: "Grace".to_string(),
            email: Some("grace@school.test".to_string()),
            password: "password1".to_string(),
            display_name: None,
            role: Some(Role::Teacher),
        };
        let record = store.register(request.clone()).await.unwrap();

        let found = store.lookup("GRACE@school.test").await.unwrap().unwrap();
        assert_eq!(found.id, record.id);
        assert_eq!(found.role, Role::Teacher);
        assert_eq!(found.created_at.timestamp(), record.created_at.timestamp());

        let again = store.register(request).await;
        assert!(matches!(again, Err(AuthError::IdentifierTaken { .. })));
    }

    #[tokio::test]
    async fn identifiers_are_unique_across_columns() {
        let store = memory_store().await;
        store.seed_default_accounts().await.unwrap();

        // Username equal to an existing email
        let shadow = CredentialRecord::new(
            "teacher@learnex.local".to_string(),
            None,
            "password1",
            "Shadow".to_string(),
            Role::Student,
        )
        .unwrap();
        assert!(matches!(
            store.insert(&shadow).await,
            Err(AuthError::IdentifierTaken { .. })
        ));

        // Email equal to an existing username
        let alias = CredentialRecord::new(
            "someone".to_string(),
            Some("Admin".to_string()),
            "password1",
            "Alias".to_string(),
            Role::Student,
        )
        .unwrap();
        assert!(matches!(
            store.insert(&alias).await,
            Err(AuthError::IdentifierTaken { .. })
        ));
        assert_eq!(store.count().await.unwrap(), 4);
    }

    #[tokio::test]
    async fn concurrent_duplicate_registration_has_one_winner() {
        let store = memory_store().await;
        let request = RegisterRequest {
            username: "ada".to_string(),
            email: None,
            password: "engine42".to_string(),
            display_name: None,
            role: None,
        };

        let (first, second) = tokio::join!(
            store.register(request.clone()),
            store.register(request)
        );

        let outcomes = [first, second];
        assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(outcomes
            .iter()
            .any(|r| matches!(r, Err(AuthError::IdentifierTaken { .. }))));
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn duplicate_insert_skipping_lookup_is_rejected() {
        let store = memory_store().await;
        let record = CredentialRecord::new(
            "grace".to_string(),
            Some("grace@school.test".to_string()),
            "password1",
            "Grace".to_string(),
            Role::Teacher,
        )
        .unwrap();

        store.insert(&record).await.unwrap();
        assert!(matches!(
            store.insert(&record).await,
            Err(AuthError::IdentifierTaken { .. })
        ));
    }
}
