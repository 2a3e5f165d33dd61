//! Storage tests against a real PostgreSQL instance.
//!
//! Every test returns early unless `DATABASE_URL` is set. Each run creates
//! its own users, shops and products, so a shared database can be reused.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use commerce_api::auth::{Identity, Role};
use commerce_api::database::models::{NewOrder, NewOrderItem, NewProduct, NewShop, NewUser, OrderStatus, Product};
use commerce_api::database::{DatabaseError, DatabaseManager, PgStorage, Storage, StorageTx};
use commerce_api::services::{OrderError, OrderService};

static SEQ: AtomicUsize = AtomicUsize::new(0);

async fn pool() -> Option<PgPool> {
    let url = match std::env::var("DATABASE_URL") {
        Ok(url) if !url.is_empty() => url,
        _ => {
            eprintln!("DATABASE_URL not set; skipping");
            return None;
        }
    };
    let pool = PgPoolOptions::new()
        .max_connections(20)
        .connect(&url)
        .await
        .expect("connect to DATABASE_URL");
    DatabaseManager::migrate(&pool).await.expect("apply migrations");
    Some(pool)
}

fn unique_email(prefix: &str) -> String {
    let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default();
    let seq = SEQ.fetch_add(1, Ordering::SeqCst);
    format!("{}-{}-{}@example.com", prefix, nanos, seq)
}

async fn user(store: &PgStorage, role: Role) -> Identity {
    let email = unique_email(&role.to_string());
    let user = store
        .insert_user(NewUser {
            name: "Test".to_string(),
            surname: "User".to_string(),
            email: email.clone(),
            password_hash: "$argon2id$placeholder".to_string(),
            role,
        })
        .await
        .unwrap();
    Identity {
        email,
        user_id: user.id,
        role,
    }
}

async fn product(store: &PgStorage, price: &str, stock: i32) -> Product {
    let seller = user(store, Role::Seller).await;
    let shop = store
        .insert_shop(NewShop {
            name: "Test Shop".to_string(),
            owner_id: seller.user_id,
        })
        .await
        .unwrap();
    store
        .insert_product(NewProduct {
            shop_id: shop.id,
            name: "Mug".to_string(),
            description: "Holds coffee".to_string(),
            image_url: None,
            category: "kitchen".to_string(),
            price: price.parse().unwrap(),
            stock,
        })
        .await
        .unwrap()
}

async fn orders_for(pool: &PgPool, user_id: i64) -> i64 {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM orders WHERE user_id = $1")
        .bind(user_id)
        .fetch_one(pool)
        .await
        .unwrap()
}

async fn items_for(pool: &PgPool, product_id: i64) -> i64 {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM order_items WHERE product_id = $1")
        .bind(product_id)
        .fetch_one(pool)
        .await
        .unwrap()
}

async fn stock_of(store: &PgStorage, product_id: i64) -> i32 {
    store.find_product(product_id).await.unwrap().unwrap().stock
}

#[tokio::test]
async fn concurrent_orders_never_oversell() {
    let Some(pool) = pool().await else { return };
    let store = PgStorage::new(pool.clone());
    let product = product(&store, "9.99", 5).await;
    let buyer = user(&store, Role::Customer).await;
    let service = OrderService::new(store.clone(), Duration::from_secs(10));

    let mut handles = Vec::new();
    for _ in 0..12 {
        let service = service.clone();
        let buyer = buyer.clone();
        let product_id = product.id;
        handles.push(tokio::spawn(async move {
            service.place_order(&buyer, product_id, 1).await
        }));
    }

    let mut placed = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => placed += 1,
            Err(OrderError::InsufficientStock { .. }) => {}
            Err(other) => panic!("unexpected error: {:?}", other),
        }
    }

    assert_eq!(placed, 5);
    assert_eq!(stock_of(&store, product.id).await, 0);
    assert_eq!(orders_for(&pool, buyer.user_id).await, 5);
    assert_eq!(items_for(&pool, product.id).await, 5);
}

#[tokio::test]
async fn failed_item_insert_rolls_back_order_and_stock() {
    let Some(pool) = pool().await else { return };
    let store = PgStorage::new(pool.clone());
    let product = product(&store, "9.99", 5).await;
    let buyer = user(&store, Role::Customer).await;

    let mut tx = store.begin().await.unwrap();
    assert_eq!(tx.decrement_stock(product.id, 2).await.unwrap(), Some(3));
    let order = tx
        .insert_order(NewOrder {
            user_id: buyer.user_id,
            total_amount: Decimal::new(1998, 2),
            status: OrderStatus::Pending,
        })
        .await
        .unwrap();

    // No such product: the foreign key rejects the item.
    let err = tx
        .insert_order_item(NewOrderItem {
            order_id: order.id,
            product_id: i64::MAX,
            quantity: 2,
            unit_price: Decimal::new(999, 2),
            line_total: Decimal::new(1998, 2),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, DatabaseError::Sqlx(_)), "{:?}", err);
    tx.rollback().await.unwrap();

    assert_eq!(stock_of(&store, product.id).await, 5);
    assert_eq!(orders_for(&pool, buyer.user_id).await, 0);
}

#[tokio::test]
async fn dropped_transaction_rolls_back() {
    let Some(pool) = pool().await else { return };
    let store = PgStorage::new(pool.clone());
    let product = product(&store, "9.99", 5).await;

    {
        let mut tx = store.begin().await.unwrap();
        assert_eq!(tx.decrement_stock(product.id, 5).await.unwrap(), Some(0));
        assert_eq!(tx.decrement_stock(product.id, 1).await.unwrap(), None);
    }

    assert_eq!(stock_of(&store, product.id).await, 5);
}

#[tokio::test]
async fn deadline_while_blocked_leaves_no_writes() {
    let Some(pool) = pool().await else { return };
    let store = PgStorage::new(pool.clone());
    let product = product(&store, "9.99", 5).await;
    let buyer = user(&store, Role::Customer).await;

    // Hold the product row so the order transaction blocks on its update.
    let mut blocker = pool.begin().await.unwrap();
    sqlx::query("SELECT id FROM products WHERE id = $1 FOR UPDATE")
        .bind(product.id)
        .execute(&mut *blocker)
        .await
        .unwrap();

    let service = OrderService::new(store.clone(), Duration::from_millis(200));
    let err = service.place_order(&buyer, product.id, 2).await.unwrap_err();
    assert!(matches!(err, OrderError::DeadlineExceeded(_)), "{:?}", err);

    blocker.rollback().await.unwrap();

    assert_eq!(stock_of(&store, product.id).await, 5);
    assert_eq!(orders_for(&pool, buyer.user_id).await, 0);
    assert_eq!(items_for(&pool, product.id).await, 0);
}

#[tokio::test]
async fn cancellation_restocks() {
    let Some(pool) = pool().await else { return };
    let store = PgStorage::new(pool.clone());
    let product = product(&store, "4.50", 10).await;
    let buyer = user(&store, Role::Customer).await;
    let service = OrderService::new(store.clone(), Duration::from_secs(10));

    let placed = service.place_order(&buyer, product.id, 4).await.unwrap();
    assert_eq!(placed.order.total_amount, Decimal::new(1800, 2));
    assert_eq!(stock_of(&store, product.id).await, 6);

    let order = service.update_status(placed.order.id, OrderStatus::Cancelled).await.unwrap();
    assert_eq!(order.status, OrderStatus::Cancelled);
    assert_eq!(stock_of(&store, product.id).await, 10);

    let err = service
        .update_status(placed.order.id, OrderStatus::Confirmed)
        .await
        .unwrap_err();
    assert!(matches!(err, OrderError::InvalidTransition { .. }));
}

#[tokio::test]
async fn duplicate_email_is_conflict() {
    let Some(pool) = pool().await else { return };
    let store = PgStorage::new(pool);
    let first = user(&store, Role::Customer).await;

    let err = store
        .insert_user(NewUser {
            name: "Again".to_string(),
            surname: "User".to_string(),
            email: first.email.clone(),
            password_hash: "$argon2id$placeholder".to_string(),
            role: Role::Seller,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, DatabaseError::Conflict(_)), "{:?}", err);

    let stored = store.find_user_by_email(&first.email).await.unwrap().unwrap();
    assert_eq!(stored.id, first.user_id);
    assert_eq!(stored.role, Role::Customer);
}

#[tokio::test]
async fn second_shop_for_owner_is_conflict() {
    let Some(pool) = pool().await else { return };
    let store = PgStorage::new(pool);
    let seller = user(&store, Role::Seller).await;
    let shop = NewShop {
        name: "First".to_string(),
        owner_id: seller.user_id,
    };

    store.insert_shop(shop.clone()).await.unwrap();
    let err = store.insert_shop(shop).await.unwrap_err();
    assert!(matches!(err, DatabaseError::Conflict(_)), "{:?}", err);
    assert!(store.find_shop_by_owner(seller.user_id).await.unwrap().is_some());
}
