use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};

use crate::database::manager::{DatabaseError, DatabaseManager};
use crate::database::models::{
    NewOrder, NewOrderItem, NewProduct, NewShop, NewUser, Order, OrderItem, OrderStatus, Product, Shop, User,
};
use crate::database::store::{Storage, StorageTx};

const PRODUCT_COLUMNS: &str =
    "id, shop_id, name, description, image_url, category, price, stock, created_at, updated_at";
const SHOP_COLUMNS: &str = "id, name, owner_id, created_at, updated_at";
const USER_COLUMNS: &str = "id, name, surname, email, password_hash, role, created_at, updated_at";
const ORDER_COLUMNS: &str = "id, user_id, total_amount, status, created_at, updated_at";
const ORDER_ITEM_COLUMNS: &str = "id, order_id, product_id, quantity, unit_price, line_total, created_at";

/// PostgreSQL-backed storage.
#[derive(Clone)]
pub struct PgStorage {
    pool: PgPool,
}

impl PgStorage {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

pub struct PgTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl Storage for PgStorage {
    type Tx = PgTx;

    async fn health_check(&self) -> Result<(), DatabaseError> {
        DatabaseManager::health_check(&self.pool).await
    }

    async fn find_product(&self, id: i64) -> Result<Option<Product>, DatabaseError> {
        let query = format!(
            "SELECT {} FROM products WHERE id = $1 AND deleted_at IS NULL",
            PRODUCT_COLUMNS
        );
        let product = sqlx::query_as::<_, Product>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(product)
    }

    async fn find_user(&self, id: i64) -> Result<Option<User>, DatabaseError> {
        let query = format!("SELECT {} FROM users WHERE id = $1 AND deleted_at IS NULL", USER_COLUMNS);
        let user = sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, DatabaseError> {
        let query = format!(
            "SELECT {} FROM users WHERE email = $1 AND deleted_at IS NULL",
            USER_COLUMNS
        );
        let user = sqlx::query_as::<_, User>(&query)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn insert_user(&self, user: NewUser) -> Result<User, DatabaseError> {
        let query = format!(
            r#"
            INSERT INTO users (name, surname, email, password_hash, role)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {}
            "#,
            USER_COLUMNS
        );
        sqlx::query_as::<_, User>(&query)
            .bind(&user.name)
            .bind(&user.surname)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(user.role.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                    DatabaseError::Conflict(format!("email {} is already registered", user.email))
                }
                other => DatabaseError::Sqlx(other),
            })
    }

    async fn find_shop_by_owner(&self, owner_id: i64) -> Result<Option<Shop>, DatabaseError> {
        let query = format!(
            "SELECT {} FROM shops WHERE owner_id = $1 AND deleted_at IS NULL",
            SHOP_COLUMNS
        );
        let shop = sqlx::query_as::<_, Shop>(&query)
            .bind(owner_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(shop)
    }

    async fn insert_shop(&self, shop: NewShop) -> Result<Shop, DatabaseError> {
        let query = format!(
            "INSERT INTO shops (name, owner_id) VALUES ($1, $2) RETURNING {}",
            SHOP_COLUMNS
        );
        sqlx::query_as::<_, Shop>(&query)
            .bind(&shop.name)
            .bind(shop.owner_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| match e {
                // shops_owner_live: one live shop per owner
                sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                    DatabaseError::Conflict(format!("user {} already has a shop", shop.owner_id))
                }
                other => DatabaseError::Sqlx(other),
            })
    }

    async fn insert_product(&self, product: NewProduct) -> Result<Product, DatabaseError> {
        let query = format!(
            r#"
            INSERT INTO products (shop_id, name, description, image_url, category, price, stock)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {}
            "#,
            PRODUCT_COLUMNS
        );
        let product = sqlx::query_as::<_, Product>(&query)
            .bind(product.shop_id)
            .bind(&product.name)
            .bind(&product.description)
            .bind(&product.image_url)
            .bind(&product.category)
            .bind(product.price)
            .bind(product.stock)
            .fetch_one(&self.pool)
            .await?;
        Ok(product)
    }

    async fn begin(&self) -> Result<PgTx, DatabaseError> {
        let tx = self.pool.begin().await?;
        Ok(PgTx { tx })
    }
}

#[async_trait]
impl StorageTx for PgTx {
    async fn decrement_stock(&mut self, product_id: i64, quantity: i32) -> Result<Option<i32>, DatabaseError> {
        // The row lock taken by UPDATE serialises concurrent orders; the WHERE
        // clause is re-evaluated against the latest committed stock.
        let remaining = sqlx::query_scalar::<_, i32>(
            r#"
            UPDATE products
            SET stock = stock - $1, updated_at = NOW()
            WHERE id = $2 AND stock >= $1 AND deleted_at IS NULL
            RETURNING stock
            "#,
        )
        .bind(quantity)
        .bind(product_id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(remaining)
    }

    async fn restock(&mut self, product_id: i64, quantity: i32) -> Result<(), DatabaseError> {
        sqlx::query("UPDATE products SET stock = stock + $1, updated_at = NOW() WHERE id = $2")
            .bind(quantity)
            .bind(product_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn insert_order(&mut self, order: NewOrder) -> Result<Order, DatabaseError> {
        let query = format!(
            "INSERT INTO orders (user_id, total_amount, status) VALUES ($1, $2, $3) RETURNING {}",
            ORDER_COLUMNS
        );
        let order = sqlx::query_as::<_, Order>(&query)
            .bind(order.user_id)
            .bind(order.total_amount)
            .bind(order.status.as_str())
            .fetch_one(&mut *self.tx)
            .await?;
        Ok(order)
    }

    async fn insert_order_item(&mut self, item: NewOrderItem) -> Result<OrderItem, DatabaseError> {
        let query = format!(
            r#"
            INSERT INTO order_items (order_id, product_id, quantity, unit_price, line_total)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {}
            "#,
            ORDER_ITEM_COLUMNS
        );
        let item = sqlx::query_as::<_, OrderItem>(&query)
            .bind(item.order_id)
            .bind(item.product_id)
            .bind(item.quantity)
            .bind(item.unit_price)
            .bind(item.line_total)
            .fetch_one(&mut *self.tx)
            .await?;
        Ok(item)
    }

    async fn lock_order(&mut self, order_id: i64) -> Result<Option<Order>, DatabaseError> {
        let query = format!("SELECT {} FROM orders WHERE id = $1 FOR UPDATE", ORDER_COLUMNS);
        let order = sqlx::query_as::<_, Order>(&query)
            .bind(order_id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(order)
    }

    async fn order_items(&mut self, order_id: i64) -> Result<Vec<OrderItem>, DatabaseError> {
        let query = format!(
            "SELECT {} FROM order_items WHERE order_id = $1 ORDER BY id",
            ORDER_ITEM_COLUMNS
        );
        let items = sqlx::query_as::<_, OrderItem>(&query)
            .bind(order_id)
            .fetch_all(&mut *self.tx)
            .await?;
        Ok(items)
    }

    async fn set_order_status(&mut self, order_id: i64, status: OrderStatus) -> Result<Order, DatabaseError> {
        let query = format!(
            "UPDATE orders SET status = $1, updated_at = NOW() WHERE id = $2 RETURNING {}",
            ORDER_COLUMNS
        );
        let order = sqlx::query_as::<_, Order>(&query)
            .bind(status.as_str())
            .bind(order_id)
            .fetch_one(&mut *self.tx)
            .await?;
        Ok(order)
    }

    async fn commit(self) -> Result<(), DatabaseError> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> Result<(), DatabaseError> {
        self.tx.rollback().await?;
        Ok(())
    }
}
