use std::time::Duration;

use rust_decimal::Decimal;
use thiserror::Error;
use tracing::{info, warn};

use crate::auth::Identity;
use crate::database::models::{NewOrder, NewOrderItem, Order, OrderItem, OrderStatus, Product};
use crate::database::{DatabaseError, Storage, StorageTx};

#[derive(Debug, Error)]
pub enum OrderError {
    #[error("Quantity must be greater than zero, got {0}")]
    InvalidQuantity(i32),

    #[error("Product {0} not found")]
    ProductNotFound(i64),

    #[error("Not available in the required quantity: product {product_id}, requested {requested}")]
    InsufficientStock { product_id: i64, requested: i32 },

    #[error("Order {0} not found")]
    OrderNotFound(i64),

    #[error("Order cannot move from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    #[error("Failed to begin transaction: {0}")]
    TransactionUnavailable(#[source] DatabaseError),

    #[error("Persistence failure: {0}")]
    PersistenceFailure(#[source] DatabaseError),

    #[error("Transaction exceeded {0:?}")]
    DeadlineExceeded(Duration),
}

/// Result of a successful placement: the committed order and its line item.
#[derive(Debug, Clone)]
pub struct PlacedOrder {
    pub order: Order,
    pub item: OrderItem,
    pub remaining_stock: i32,
}

/// Values fixed before the transaction opens.
struct OrderDraft {
    user_id: i64,
    product_id: i64,
    quantity: i32,
    unit_price: Decimal,
    line_total: Decimal,
}

/// Places orders against product stock and moves them through their lifecycle.
///
/// Every state change runs inside one storage transaction bounded by
/// `tx_timeout`; a transaction that is abandoned (deadline, dropped request)
/// is dropped and therefore rolled back.
#[derive(Clone)]
pub struct OrderService<S: Storage> {
    store: S,
    tx_timeout: Duration,
}

impl<S: Storage> OrderService<S> {
    pub fn new(store: S, tx_timeout: Duration) -> Self {
        Self { store, tx_timeout }
    }

    /// Live product by id.
    pub async fn find_product(&self, product_id: i64) -> Result<Product, OrderError> {
        self.store
            .find_product(product_id)
            .await
            .map_err(OrderError::PersistenceFailure)?
            .ok_or(OrderError::ProductNotFound(product_id))
    }

    pub async fn place_order(
        &self,
        identity: &Identity,
        product_id: i64,
        quantity: i32,
    ) -> Result<PlacedOrder, OrderError> {
        let product = self.find_product(product_id).await?;
        self.place_order_for(identity, &product, quantity).await
    }

    /// Places an order against an already loaded product; the unit price is
    /// taken from that snapshot.
    #[tracing::instrument(skip(self, identity, product), fields(user_id = identity.user_id, product_id = product.id))]
    pub async fn place_order_for(
        &self,
        identity: &Identity,
        product: &Product,
        quantity: i32,
    ) -> Result<PlacedOrder, OrderError> {
        let product_id = product.id;
        if quantity <= 0 {
            return Err(OrderError::InvalidQuantity(quantity));
        }

        let unit_price = product.price;
        let line_total = unit_price * Decimal::from(quantity);

        if product.stock < quantity {
            return Err(OrderError::InsufficientStock {
                product_id,
                requested: quantity,
            });
        }

        let tx = self
            .store
            .begin()
            .await
            .map_err(OrderError::TransactionUnavailable)?;

        let draft = OrderDraft {
            user_id: identity.user_id,
            product_id,
            quantity,
            unit_price,
            line_total,
        };

        let placed = tokio::time::timeout(self.tx_timeout, write_order(tx, draft))
            .await
            .map_err(|_| {
                warn!(product_id, "order transaction abandoned after {:?}", self.tx_timeout);
                OrderError::DeadlineExceeded(self.tx_timeout)
            })??;

        info!(
            order_id = placed.order.id,
            product_id,
            quantity,
            total = %placed.order.total_amount,
            remaining_stock = placed.remaining_stock,
            "order placed"
        );
        Ok(placed)
    }

    /// Moves an order along the status graph; cancelling returns its items to stock.
    #[tracing::instrument(skip(self))]
    pub async fn update_status(&self, order_id: i64, next: OrderStatus) -> Result<Order, OrderError> {
        let tx = self
            .store
            .begin()
            .await
            .map_err(OrderError::TransactionUnavailable)?;

        let order = tokio::time::timeout(self.tx_timeout, transition_order(tx, order_id, next))
            .await
            .map_err(|_| OrderError::DeadlineExceeded(self.tx_timeout))??;

        info!(order_id, status = %order.status, "order status updated");
        Ok(order)
    }
}

async fn write_order<T: StorageTx>(mut tx: T, draft: OrderDraft) -> Result<PlacedOrder, OrderError> {
    // A concurrent order may have taken the stock since the check above.
    let remaining_stock = match tx.decrement_stock(draft.product_id, draft.quantity).await {
        Ok(Some(remaining)) => remaining,
        Ok(None) => {
            return Err(abort(
                tx,
                OrderError::InsufficientStock {
                    product_id: draft.product_id,
                    requested: draft.quantity,
                },
            )
            .await)
        }
        Err(e) => return Err(abort(tx, OrderError::PersistenceFailure(e)).await),
    };

    let new_order = NewOrder {
        user_id: draft.user_id,
        total_amount: draft.line_total,
        status: OrderStatus::Pending,
    };
    let order = match tx.insert_order(new_order).await {
        Ok(order) => order,
        Err(e) => return Err(abort(tx, OrderError::PersistenceFailure(e)).await),
    };

    let new_item = NewOrderItem {
        order_id: order.id,
        product_id: draft.product_id,
        quantity: draft.quantity,
        unit_price: draft.unit_price,
        line_total: draft.line_total,
    };
    let item = match tx.insert_order_item(new_item).await {
        Ok(item) => item,
        Err(e) => return Err(abort(tx, OrderError::PersistenceFailure(e)).await),
    };

    // On failure the consumed transaction is dropped, which rolls it back.
    tx.commit().await.map_err(OrderError::PersistenceFailure)?;

    Ok(PlacedOrder {
        order,
        item,
        remaining_stock,
    })
}

async fn transition_order<T: StorageTx>(mut tx: T, order_id: i64, next: OrderStatus) -> Result<Order, OrderError> {
    let current = match tx.lock_order(order_id).await {
        Ok(Some(order)) => order,
        Ok(None) => return Err(abort(tx, OrderError::OrderNotFound(order_id)).await),
        Err(e) => return Err(abort(tx, OrderError::PersistenceFailure(e)).await),
    };

    if !current.status.can_transition_to(next) {
        let err = OrderError::InvalidTransition {
            from: current.status,
            to: next,
        };
        return Err(abort(tx, err).await);
    }

    if next == OrderStatus::Cancelled {
        let items = match tx.order_items(order_id).await {
            Ok(items) => items,
            Err(e) => return Err(abort(tx, OrderError::PersistenceFailure(e)).await),
        };
        for item in items {
            if let Err(e) = tx.restock(item.product_id, item.quantity).await {
                return Err(abort(tx, OrderError::PersistenceFailure(e)).await);
            }
        }
    }

    let order = match tx.set_order_status(order_id, next).await {
        Ok(order) => order,
        Err(e) => return Err(abort(tx, OrderError::PersistenceFailure(e)).await),
    };

    tx.commit().await.map_err(OrderError::PersistenceFailure)?;
    Ok(order)
}

/// Rolls back and hands back the error that caused it.
async fn abort<T: StorageTx>(tx: T, cause: OrderError) -> OrderError {
    if let Err(e) = tx.rollback().await {
        warn!("rollback failed after {}: {}", cause, e);
    }
    cause
}
