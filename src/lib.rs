//! Commerce API: authenticated, transactional order placement over
//! PostgreSQL.

pub mod auth;
pub mod cli;
pub mod config;
pub mod database;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod services;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::HeaderValue;
use axum::routing::{get, post, put};
use axum::{middleware::from_fn_with_state, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::AppConfig;
use crate::database::Storage;
use crate::handlers::AppState;
use crate::middleware::{authenticate, authorize, RoleGate};

/// Creates the Axum application router with all routes and shared state.
///
/// Route layers run outermost-last: every protected group adds `authorize`
/// first and `authenticate` second, so authentication always runs before the
/// role check.
pub fn create_app<S: Storage>(state: Arc<AppState<S>>, config: &AppConfig) -> Router {
    let verifier = state.verifier.clone();

    let public = Router::new()
        .route("/health", get(handlers::health::check::<S>))
        .route("/users/register", post(handlers::users::register::<S>))
        .route("/users/login", post(handlers::users::login::<S>));

    let account = Router::new()
        .route("/users/profile", get(handlers::users::profile::<S>))
        .route_layer(from_fn_with_state(verifier.clone(), authenticate));

    let customer = Router::new()
        .route("/orders/:id", post(handlers::orders::create::<S>))
        .route_layer(from_fn_with_state(RoleGate::CUSTOMER, authorize))
        .route_layer(from_fn_with_state(verifier.clone(), authenticate));

    let fulfilment = Router::new()
        .route("/orders/:id/status", put(handlers::orders::update_status::<S>))
        .route_layer(from_fn_with_state(RoleGate::FULFILMENT, authorize))
        .route_layer(from_fn_with_state(verifier.clone(), authenticate));

    let seller = Router::new()
        .route("/shop", post(handlers::shops::create::<S>))
        .route("/products", post(handlers::products::create::<S>))
        .route_layer(from_fn_with_state(RoleGate::SELLER, authorize))
        .route_layer(from_fn_with_state(verifier, authenticate));

    Router::new()
        .merge(public)
        .merge(account)
        .merge(customer)
        .merge(fulfilment)
        .merge(seller)
        .with_state(state)
        .layer(DefaultBodyLimit::max(config.server.max_request_size_bytes))
        .layer(cors_layer(&config.security.cors_origins))
        .layer(TraceLayer::new_for_http())
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() || origins.iter().any(|o| o == "*") {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }

    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(Any)
        .allow_headers(Any)
}
