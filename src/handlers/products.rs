//! Seller catalogue endpoint.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::database::models::{NewProduct, Product};
use crate::database::Storage;
use crate::error::ApiError;
use crate::handlers::{json_body, AppState};
use crate::middleware::AuthUser;

#[derive(Deserialize)]
pub struct CreateProductRequest {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub image_url: Option<String>,
    pub category: String,
    pub price: Decimal,
    pub stock: i32,
}

impl CreateProductRequest {
    fn validate(&self) -> Result<(), ApiError> {
        if self.name.trim().is_empty() {
            return Err(ApiError::invalid_field("name", "product name is required"));
        }
        if self.price.is_sign_negative() {
            return Err(ApiError::invalid_field("price", "must not be negative"));
        }
        if self.stock < 0 {
            return Err(ApiError::invalid_field("stock", "must not be negative"));
        }
        Ok(())
    }
}

/// POST /products - list a product in the caller's shop.
#[tracing::instrument(skip(state, identity, payload), fields(user_id = identity.user_id))]
pub async fn create<S: Storage>(
    State(state): State<Arc<AppState<S>>>,
    AuthUser(identity): AuthUser,
    payload: Result<Json<CreateProductRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Product>), ApiError> {
    let req = json_body(payload)?;
    req.validate()?;

    let shop = state
        .store
        .find_shop_by_owner(identity.user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Shop not found."))?;

    let product = state
        .store
        .insert_product(NewProduct {
            shop_id: shop.id,
            name: req.name.trim().to_string(),
            description: req.description,
            image_url: req.image_url,
            category: req.category,
            price: req.price,
            stock: req.stock,
        })
        .await?;

    tracing::info!(shop_id = shop.id, product_id = product.id, "product listed");
    Ok((StatusCode::CREATED, Json(product)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(price: &str, stock: i32) -> CreateProductRequest {
        CreateProductRequest {
            name: "Kettle".to_string(),
            description: "Whistles".to_string(),
            image_url: None,
            category: "kitchen".to_string(),
            price: price.parse().unwrap(),
            stock,
        }
    }

    #[test]
    fn free_and_out_of_stock_products_are_allowed() {
        assert!(request("0", 0).validate().is_ok());
    }

    #[test]
    fn negative_price_or_stock_is_rejected() {
        assert_eq!(request("-0.01", 1).validate().unwrap_err().status_code(), 400);
        assert_eq!(request("1.00", -1).validate().unwrap_err().status_code(), 400);

        let mut blank = request("1.00", 1);
        blank.name = "   ".to_string();
        assert_eq!(blank.validate().unwrap_err().status_code(), 400);
    }
}
