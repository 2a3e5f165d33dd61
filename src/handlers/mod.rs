//! Route handlers and the state they share.

pub mod health;
pub mod orders;
pub mod products;
pub mod shops;
pub mod users;

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::Json;

use crate::auth::{PasswordHasher, TokenVerifier};
use crate::database::Storage;
use crate::error::ApiError;
use crate::services::OrderService;

/// Shared application state accessible from all handlers.
pub struct AppState<S: Storage> {
    pub store: S,
    pub orders: OrderService<S>,
    pub verifier: Arc<TokenVerifier>,
    pub hasher: Arc<dyn PasswordHasher>,
}

impl<S: Storage> AppState<S> {
    pub fn new(
        store: S,
        verifier: Arc<TokenVerifier>,
        hasher: Arc<dyn PasswordHasher>,
        tx_timeout: std::time::Duration,
    ) -> Self {
        Self {
            orders: OrderService::new(store.clone(), tx_timeout),
            store,
            verifier,
            hasher,
        }
    }
}

/// Unwraps a JSON body, turning any rejection into a 400.
pub(crate) fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| ApiError::invalid_json(rejection.body_text()))
}

/// Parses a numeric path identifier.
pub(crate) fn parse_id(raw: &str) -> Result<i64, ApiError> {
    raw.parse::<i64>()
        .map_err(|_| ApiError::bad_request(format!("Invalid id: {}", raw)))
}
