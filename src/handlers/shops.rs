//! Seller shop endpoint.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::database::models::NewShop;
use crate::database::Storage;
use crate::error::ApiError;
use crate::handlers::{json_body, AppState};
use crate::middleware::AuthUser;

#[derive(Deserialize)]
pub struct CreateShopRequest {
    pub name: String,
}

/// POST /shop - open the caller's shop. A seller owns at most one.
#[tracing::instrument(skip(state, identity, payload), fields(user_id = identity.user_id))]
pub async fn create<S: Storage>(
    State(state): State<Arc<AppState<S>>>,
    AuthUser(identity): AuthUser,
    payload: Result<Json<CreateShopRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let req = json_body(payload)?;
    let name = req.name.trim();
    if name.is_empty() {
        return Err(ApiError::invalid_field("name", "shop name is required"));
    }

    if state.store.find_shop_by_owner(identity.user_id).await?.is_some() {
        return Err(ApiError::bad_request("You already have a shop."));
    }

    // A concurrent create that slips past the check above surfaces as 409.
    let shop = state
        .store
        .insert_shop(NewShop {
            name: name.to_string(),
            owner_id: identity.user_id,
        })
        .await?;

    tracing::info!(shop_id = shop.id, "shop created");
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Shop created successfully.", "shop_id": shop.id })),
    ))
}
