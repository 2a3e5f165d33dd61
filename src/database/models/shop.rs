use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

/// A seller's storefront. Each seller owns at most one live shop.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Shop {
    pub id: i64,
    pub name: String,
    pub owner_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewShop {
    pub name: String,
    pub owner_id: i64,
}
