//! Order placement and fulfilment endpoints.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::database::models::{OrderStatus, UnknownStatus};
use crate::database::Storage;
use crate::error::ApiError;
use crate::handlers::{json_body, parse_id, AppState};
use crate::middleware::AuthUser;

#[derive(Deserialize)]
pub struct CreateOrderRequest {
    pub quantity: i32,
}

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

#[derive(Serialize)]
pub struct OrderCreatedResponse {
    pub message: &'static str,
    pub order_id: i64,
}

#[derive(Serialize)]
pub struct StatusUpdatedResponse {
    pub message: &'static str,
    pub status: OrderStatus,
}

/// POST /orders/:id - place an order for `quantity` units of product `id`.
#[tracing::instrument(skip(state, identity, payload), fields(user_id = identity.user_id))]
pub async fn create<S: Storage>(
    State(state): State<Arc<AppState<S>>>,
    AuthUser(identity): AuthUser,
    Path(product_id): Path<String>,
    payload: Result<Json<CreateOrderRequest>, JsonRejection>,
) -> Result<Json<OrderCreatedResponse>, ApiError> {
    let product_id = parse_id(&product_id)?;
    // An unknown product is reported before the body is looked at.
    let product = state.orders.find_product(product_id).await?;
    let req = json_body(payload)?;

    let placed = state
        .orders
        .place_order_for(&identity, &product, req.quantity)
        .await?;

    Ok(Json(OrderCreatedResponse {
        message: "Order created successfully.",
        order_id: placed.order.id,
    }))
}

/// PUT /orders/:id/status - move an order along its lifecycle.
#[tracing::instrument(skip(state, identity, payload), fields(user_id = identity.user_id))]
pub async fn update_status<S: Storage>(
    State(state): State<Arc<AppState<S>>>,
    AuthUser(identity): AuthUser,
    Path(order_id): Path<String>,
    payload: Result<Json<UpdateStatusRequest>, JsonRejection>,
) -> Result<Json<StatusUpdatedResponse>, ApiError> {
    let order_id = parse_id(&order_id)?;
    let req = json_body(payload)?;
    let next: OrderStatus = req
        .status
        .parse()
        .map_err(|e: UnknownStatus| ApiError::invalid_field("status", e.to_string()))?;

    let order = state.orders.update_status(order_id, next).await?;

    Ok(Json(StatusUpdatedResponse {
        message: "Order status updated successfully.",
        status: order.status,
    }))
}
