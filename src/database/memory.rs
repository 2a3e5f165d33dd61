use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::database::manager::DatabaseError;
use crate::database::models::{
    NewOrder, NewOrderItem, NewProduct, NewShop, NewUser, Order, OrderItem, OrderStatus, Product, Shop, User,
};
use crate::database::store::{Storage, StorageTx};

/// A storage operation that can be forced to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Fault {
    Begin,
    DecrementStock,
    InsertOrder,
    InsertOrderItem,
    Commit,
    /// `insert_order_item` never completes.
    Stall,
}

#[derive(Debug, Clone, Default)]
struct MemoryState {
    users: BTreeMap<i64, User>,
    shops: BTreeMap<i64, Shop>,
    products: BTreeMap<i64, Product>,
    orders: BTreeMap<i64, Order>,
    order_items: BTreeMap<i64, OrderItem>,
    last_id: i64,
    faults: HashSet<Fault>,
}

impl MemoryState {
    fn next_id(&mut self) -> i64 {
        self.last_id += 1;
        self.last_id
    }

    fn check(&self, fault: Fault) -> Result<(), DatabaseError> {
        if self.faults.contains(&fault) {
            return Err(DatabaseError::Unavailable(format!("injected fault: {:?}", fault)));
        }
        Ok(())
    }
}

/// In-memory storage for tests and local runs.
///
/// Transactions are serializable: `begin` holds the store lock until the
/// transaction commits, rolls back or is dropped, and writes go to a private
/// copy that replaces the committed state only on commit.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    state: Arc<Mutex<MemoryState>>,
}

pub struct MemoryTx {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_product(&self, shop_id: i64, name: &str, price: Decimal, stock: i32) -> Product {
        let mut state = self.state.lock().await;
        let now = Utc::now();
        let product = Product {
            id: state.next_id(),
            shop_id,
            name: name.to_string(),
            description: format!("{} description", name),
            image_url: None,
            category: "general".to_string(),
            price,
            stock,
            created_at: now,
            updated_at: now,
        };
        state.products.insert(product.id, product.clone());
        product
    }

    pub async fn set_product_price(&self, id: i64, price: Decimal) {
        if let Some(product) = self.state.lock().await.products.get_mut(&id) {
            product.price = price;
            product.updated_at = Utc::now();
        }
    }

    pub async fn product(&self, id: i64) -> Option<Product> {
        self.state.lock().await.products.get(&id).cloned()
    }

    pub async fn products(&self) -> Vec<Product> {
        self.state.lock().await.products.values().cloned().collect()
    }

    pub async fn shops(&self) -> Vec<Shop> {
        self.state.lock().await.shops.values().cloned().collect()
    }

    pub async fn orders(&self) -> Vec<Order> {
        self.state.lock().await.orders.values().cloned().collect()
    }

    pub async fn order_items(&self) -> Vec<OrderItem> {
        self.state.lock().await.order_items.values().cloned().collect()
    }

    pub async fn inject_fault(&self, fault: Fault) {
        self.state.lock().await.faults.insert(fault);
    }

    pub async fn clear_faults(&self) {
        self.state.lock().await.faults.clear();
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    type Tx = MemoryTx;

    async fn health_check(&self) -> Result<(), DatabaseError> {
        Ok(())
    }

    async fn find_product(&self, id: i64) -> Result<Option<Product>, DatabaseError> {
        Ok(self.state.lock().await.products.get(&id).cloned())
    }

    async fn find_user(&self, id: i64) -> Result<Option<User>, DatabaseError> {
        Ok(self.state.lock().await.users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, DatabaseError> {
        let state = self.state.lock().await;
        Ok(state.users.values().find(|u| u.email == email).cloned())
    }

    async fn insert_user(&self, user: NewUser) -> Result<User, DatabaseError> {
        let mut state = self.state.lock().await;
        if state.users.values().any(|u| u.email == user.email) {
            return Err(DatabaseError::Conflict(format!(
                "email {} is already registered",
                user.email
            )));
        }

        let now = Utc::now();
        let user = User {
            id: state.next_id(),
            name: user.name,
            surname: user.surname,
            email: user.email,
            password_hash: user.password_hash,
            role: user.role,
            created_at: now,
            updated_at: now,
        };
        state.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_shop_by_owner(&self, owner_id: i64) -> Result<Option<Shop>, DatabaseError> {
        let state = self.state.lock().await;
        Ok(state.shops.values().find(|s| s.owner_id == owner_id).cloned())
    }

    async fn insert_shop(&self, shop: NewShop) -> Result<Shop, DatabaseError> {
        let mut state = self.state.lock().await;
        if state.shops.values().any(|s| s.owner_id == shop.owner_id) {
            return Err(DatabaseError::Conflict(format!(
                "user {} already has a shop",
                shop.owner_id
            )));
        }

        let now = Utc::now();
        let shop = Shop {
            id: state.next_id(),
            name: shop.name,
            owner_id: shop.owner_id,
            created_at: now,
            updated_at: now,
        };
        state.shops.insert(shop.id, shop.clone());
        Ok(shop)
    }

    async fn insert_product(&self, product: NewProduct) -> Result<Product, DatabaseError> {
        let mut state = self.state.lock().await;
        if !state.shops.contains_key(&product.shop_id) {
            return Err(DatabaseError::Conflict(format!(
                "shop {} does not exist",
                product.shop_id
            )));
        }

        let now = Utc::now();
        let product = Product {
            id: state.next_id(),
            shop_id: product.shop_id,
            name: product.name,
            description: product.description,
            image_url: product.image_url,
            category: product.category,
            price: product.price,
            stock: product.stock,
            created_at: now,
            updated_at: now,
        };
        state.products.insert(product.id, product.clone());
        Ok(product)
    }

    async fn begin(&self) -> Result<MemoryTx, DatabaseError> {
        let guard = self.state.clone().lock_owned().await;
        guard.check(Fault::Begin)?;
        let working = (*guard).clone();
        Ok(MemoryTx { guard, working })
    }
}

#[async_trait]
impl StorageTx for MemoryTx {
    async fn decrement_stock(&mut self, product_id: i64, quantity: i32) -> Result<Option<i32>, DatabaseError> {
        self.working.check(Fault::DecrementStock)?;
        match self.working.products.get_mut(&product_id) {
            Some(product) if product.stock >= quantity => {
                product.stock -= quantity;
                product.updated_at = Utc::now();
                Ok(Some(product.stock))
            }
            _ => Ok(None),
        }
    }

    async fn restock(&mut self, product_id: i64, quantity: i32) -> Result<(), DatabaseError> {
        if let Some(product) = self.working.products.get_mut(&product_id) {
            product.stock += quantity;
            product.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn insert_order(&mut self, order: NewOrder) -> Result<Order, DatabaseError> {
        self.working.check(Fault::InsertOrder)?;
        let now = Utc::now();
        let order = Order {
            id: self.working.next_id(),
            user_id: order.user_id,
            total_amount: order.total_amount,
            status: order.status,
            created_at: now,
            updated_at: now,
        };
        self.working.orders.insert(order.id, order.clone());
        Ok(order)
    }

    async fn insert_order_item(&mut self, item: NewOrderItem) -> Result<OrderItem, DatabaseError> {
        self.working.check(Fault::InsertOrderItem)?;
        if self.working.faults.contains(&Fault::Stall) {
            std::future::pending::<()>().await;
        }
        if !self.working.orders.contains_key(&item.order_id) {
            return Err(DatabaseError::Conflict(format!(
                "order {} does not exist",
                item.order_id
            )));
        }

        let item = OrderItem {
            id: self.working.next_id(),
            order_id: item.order_id,
            product_id: item.product_id,
            quantity: item.quantity,
            unit_price: item.unit_price,
            line_total: item.line_total,
            created_at: Utc::now(),
        };
        self.working.order_items.insert(item.id, item.clone());
        Ok(item)
    }

    async fn lock_order(&mut self, order_id: i64) -> Result<Option<Order>, DatabaseError> {
        Ok(self.working.orders.get(&order_id).cloned())
    }

    async fn order_items(&mut self, order_id: i64) -> Result<Vec<OrderItem>, DatabaseError> {
        Ok(self
            .working
            .order_items
            .values()
            .filter(|item| item.order_id == order_id)
            .cloned()
            .collect())
    }

    async fn set_order_status(&mut self, order_id: i64, status: OrderStatus) -> Result<Order, DatabaseError> {
        let order = self
            .working
            .orders
            .get_mut(&order_id)
            .ok_or_else(|| DatabaseError::CorruptRow(format!("order {} vanished", order_id)))?;
        order.status = status;
        order.updated_at = Utc::now();
        Ok(order.clone())
    }

    async fn commit(self) -> Result<(), DatabaseError> {
        self.working.check(Fault::Commit)?;
        let MemoryTx { mut guard, working } = self;
        *guard = working;
        Ok(())
    }

    async fn rollback(self) -> Result<(), DatabaseError> {
        Ok(())
    }
}
