//! Integration test helpers
//!
//! Drives the full router in-process with `oneshot`, on a manual clock so
//! session timeouts can be crossed without waiting.

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use async_trait::async_trait;
use learnex_auth::{
    AuthError, AuthResult, ManualClock, MemoryCredentialStore, MemorySessionStore, SessionStore,
};
use learnex_core::LearnexConfig;
use learnex_web::{create_app, AppState};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tower::ServiceExt;

pub struct TestApp {
    pub app: Router,
    pub state: AppState,
    pub clock: ManualClock,
}

impl TestApp {
    pub fn spawn() -> Self {
        Self::with_config(LearnexConfig::default())
    }

    pub fn with_config(config: LearnexConfig) -> Self {
        let clock = ManualClock::default();
        let credentials = Arc::new(MemoryCredentialStore::with_default_accounts().unwrap());
        let state = AppState::from_parts(config, credentials, Arc::new(clock.clone()));
        let app = create_app(state.clone());

        Self { app, state, clock }
    }

    pub async fn request(
        &self,
        method: &str,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);

        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {}", token));
        }

        let request = match body {
            Some(body) => builder
                .header("Content-Type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };

        (status, value)
    }

    /// Log in and return the session token
    pub async fn login(&self, identifier: &str, password: &str) -> String {
        let (status, body) = self
            .request(
                "POST",
                "/api/auth/login",
                Some(json!({"identifier": identifier, "password": password})),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::OK, "login failed: {}", body);
        body["token"].as_str().unwrap().to_string()
    }
}

/// Session store whose writes fail while `fail_writes` is set
#[derive(Debug, Default)]
pub struct FlakyStore {
    inner: MemorySessionStore,
    pub fail_writes: AtomicBool,
}

impl FlakyStore {
    pub fn set_failing(&self, failing: bool) {
        self.fail_writes.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl SessionStore for FlakyStore {
    async fn get(&self, key: &str) -> AuthResult<Option<Vec<u8>>> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> AuthResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(AuthError::storage("disk full"));
        }
        self.inner.set(key, value).await
    }

    async fn delete(&self, key: &str) -> AuthResult<()> {
        self.inner.delete(key).await
    }
}
