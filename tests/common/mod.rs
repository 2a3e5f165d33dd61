#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value;
use tower::ServiceExt;

use commerce_api::auth::{Argon2Hasher, PasswordError, PasswordHasher, Role, TokenVerifier};
use commerce_api::config::AppConfig;
use commerce_api::database::models::Product;
use commerce_api::database::MemoryStorage;
use commerce_api::handlers::AppState;

pub struct TestApp {
    pub router: Router,
    pub store: MemoryStorage,
    pub verifier: Arc<TokenVerifier>,
}

impl TestApp {
    pub fn new() -> Self {
        let config = AppConfig::for_tests();
        Self::build(config.transaction_timeout(), Arc::new(fast_hasher()))
    }

    pub fn with_tx_timeout(tx_timeout: Duration) -> Self {
        Self::build(tx_timeout, Arc::new(fast_hasher()))
    }

    pub fn with_hasher(hasher: Arc<dyn PasswordHasher>) -> Self {
        Self::build(AppConfig::for_tests().transaction_timeout(), hasher)
    }

    fn build(tx_timeout: Duration, hasher: Arc<dyn PasswordHasher>) -> Self {
        let config = AppConfig::for_tests();
        let store = MemoryStorage::new();
        let verifier = Arc::new(
            TokenVerifier::new(
                config.security.jwt_secret.as_bytes(),
                config.token_ttl().expect("test token ttl"),
            )
            .expect("test signing key"),
        );

        let state = Arc::new(AppState::new(store.clone(), verifier.clone(), hasher, tx_timeout));
        let router = commerce_api::create_app(state, &config);

        Self {
            router,
            store,
            verifier,
        }
    }

    pub fn token(&self, user_id: i64, role: Role) -> String {
        self.verifier
            .issue(user_id, &format!("user{}@example.com", user_id), role)
            .expect("issue token")
    }

    pub fn token_at(&self, user_id: i64, role: Role, issued: DateTime<Utc>) -> String {
        self.verifier
            .issue_at(user_id, &format!("user{}@example.com", user_id), role, issued)
            .expect("issue token")
    }

    pub async fn mug(&self, price: &str, stock: i32) -> Product {
        let price: Decimal = price.parse().expect("decimal");
        self.store.add_product(1, "Mug", price, stock).await
    }

    pub async fn send(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let body = body.map(|v| v.to_string());
        self.send_raw(method, uri, token, body).await
    }

    pub async fn send_raw(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<String>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }
}

/// Cheap parameters keep the suite fast.
pub fn fast_hasher() -> Argon2Hasher {
    Argon2Hasher::with_params(1024, 1, 1).expect("argon2 params")
}

/// Wraps a hasher and counts how often each side is called.
pub struct CountingHasher {
    inner: Argon2Hasher,
    pub hashes: AtomicUsize,
    pub verifies: AtomicUsize,
}

impl CountingHasher {
    pub fn new() -> Self {
        Self {
            inner: fast_hasher(),
            hashes: AtomicUsize::new(0),
            verifies: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.hashes.load(Ordering::SeqCst) + self.verifies.load(Ordering::SeqCst)
    }
}

impl PasswordHasher for CountingHasher {
    fn hash(&self, plaintext: &str) -> Result<String, PasswordError> {
        self.hashes.fetch_add(1, Ordering::SeqCst);
        self.inner.hash(plaintext)
    }

    fn verify(&self, digest: &str, plaintext: &str) -> bool {
        self.verifies.fetch_add(1, Ordering::SeqCst);
        self.inner.verify(digest, plaintext)
    }
}
