use async_trait::async_trait;

use crate::database::manager::DatabaseError;
use crate::database::models::{
    NewOrder, NewOrderItem, NewProduct, NewShop, NewUser, Order, OrderItem, OrderStatus, Product, Shop, User,
};

/// Storage engine consumed by the handlers and the order service.
///
/// Implementations must be cheap to clone (a pool handle) and thread-safe.
/// Reads outside a transaction see committed data only.
#[async_trait]
pub trait Storage: Clone + Send + Sync + 'static {
    type Tx: StorageTx + 'static;

    async fn health_check(&self) -> Result<(), DatabaseError>;

    /// Live (not soft-deleted) product by id.
    async fn find_product(&self, id: i64) -> Result<Option<Product>, DatabaseError>;

    async fn find_user(&self, id: i64) -> Result<Option<User>, DatabaseError>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, DatabaseError>;

    /// Fails with `DatabaseError::Conflict` when the email is taken.
    async fn insert_user(&self, user: NewUser) -> Result<User, DatabaseError>;

    /// The owner's live shop, if any.
    async fn find_shop_by_owner(&self, owner_id: i64) -> Result<Option<Shop>, DatabaseError>;

    /// Fails with `DatabaseError::Conflict` when the owner already has a shop.
    async fn insert_shop(&self, shop: NewShop) -> Result<Shop, DatabaseError>;

    async fn insert_product(&self, product: NewProduct) -> Result<Product, DatabaseError>;

    async fn begin(&self) -> Result<Self::Tx, DatabaseError>;
}

/// An open storage transaction.
///
/// Writes become visible to other callers only after `commit`. Dropping the
/// transaction without committing rolls it back.
#[async_trait]
pub trait StorageTx: Send {
    /// Decrements stock by `quantity` only if at least `quantity` is on hand.
    /// Returns the remaining stock, or `None` when the product is missing or short.
    async fn decrement_stock(&mut self, product_id: i64, quantity: i32) -> Result<Option<i32>, DatabaseError>;

    async fn restock(&mut self, product_id: i64, quantity: i32) -> Result<(), DatabaseError>;

    async fn insert_order(&mut self, order: NewOrder) -> Result<Order, DatabaseError>;

    async fn insert_order_item(&mut self, item: NewOrderItem) -> Result<OrderItem, DatabaseError>;

    /// Loads the order and holds it against concurrent status changes until the transaction ends.
    async fn lock_order(&mut self, order_id: i64) -> Result<Option<Order>, DatabaseError>;

    async fn order_items(&mut self, order_id: i64) -> Result<Vec<OrderItem>, DatabaseError>;

    async fn set_order_status(&mut self, order_id: i64, status: OrderStatus) -> Result<Order, DatabaseError>;

    async fn commit(self) -> Result<(), DatabaseError>;

    async fn rollback(self) -> Result<(), DatabaseError>;
}
