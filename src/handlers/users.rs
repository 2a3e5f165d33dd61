//! Registration, login and profile endpoints.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::auth::{PasswordError, Role};
use crate::database::models::{NewUser, User};
use crate::database::Storage;
use crate::error::ApiError;
use crate::handlers::{json_body, AppState};
use crate::middleware::AuthUser;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub surname: String,
    pub email: String,
    pub password: String,
    pub role: String,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub token: String,
}

/// POST /users/register - create a customer or seller account.
#[tracing::instrument(skip(state, payload))]
pub async fn register<S: Storage>(
    State(state): State<Arc<AppState<S>>>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let req = json_body(payload)?;

    let email = req.email.trim().to_lowercase();
    if email.is_empty() || !email.contains('@') {
        return Err(ApiError::invalid_field("email", "a valid email address is required"));
    }
    if req.password.is_empty() {
        return Err(ApiError::invalid_field("password", "password is required"));
    }

    // Admin accounts are never self-registered.
    let role = match req.role.parse::<Role>() {
        Ok(role @ (Role::Customer | Role::Seller)) => role,
        _ => return Err(ApiError::invalid_field("role", "must be one of: customer, seller")),
    };

    let hasher = state.hasher.clone();
    let password = req.password;
    let password_hash = tokio::task::spawn_blocking(move || hasher.hash(&password))
        .await
        .map_err(|e| PasswordError::Hash(e.to_string()))??;

    let user = state
        .store
        .insert_user(NewUser {
            name: req.name,
            surname: req.surname,
            email,
            password_hash,
            role,
        })
        .await?;

    tracing::info!(user_id = user.id, role = %user.role, "user registered");
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "User registered successfully." })),
    ))
}

/// POST /users/login - exchange credentials for a session token.
#[tracing::instrument(skip(state, payload))]
pub async fn login<S: Storage>(
    State(state): State<Arc<AppState<S>>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>, ApiError> {
    let req = json_body(payload)?;
    let email = req.email.trim().to_lowercase();

    let user = state.store.find_user_by_email(&email).await?;

    // Unknown emails still pay for one Argon2 run so response time does not
    // reveal which accounts exist.
    let hasher = state.hasher.clone();
    let digest = user.as_ref().map(|u| u.password_hash.clone());
    let password = req.password;
    let matches = tokio::task::spawn_blocking(move || match digest {
        Some(digest) => hasher.verify(&digest, &password),
        None => {
            let _ = hasher.hash(&password);
            false
        }
    })
    .await
    .map_err(|e| PasswordError::Hash(e.to_string()))?;

    let user = match user {
        Some(user) if matches => user,
        Some(user) => {
            tracing::warn!(user_id = user.id, "login rejected: wrong password");
            return Err(invalid_credentials());
        }
        None => {
            tracing::debug!("login rejected: unknown email");
            return Err(invalid_credentials());
        }
    };

    let token = state.verifier.issue(user.id, &user.email, user.role)?;
    tracing::info!(user_id = user.id, "user logged in");
    Ok(Json(LoginResponse { token }))
}

/// GET /users/profile - the caller's own account.
pub async fn profile<S: Storage>(
    State(state): State<Arc<AppState<S>>>,
    AuthUser(identity): AuthUser,
) -> Result<Json<User>, ApiError> {
    let user = state
        .store
        .find_user(identity.user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found."))?;
    Ok(Json(user))
}

fn invalid_credentials() -> ApiError {
    ApiError::unauthorized("Invalid email or password.")
}
