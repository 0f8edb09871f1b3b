//! HTTP API for the ecommerce storage service.
//!
//! Exposes REST endpoints for products, orders and users over any
//! [`store::Store`] implementation, with structured logging (tracing) and
//! Prometheus metrics.

pub mod config;
pub mod error;
pub mod password;
pub mod routes;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::routing::get;
use metrics_exporter_prometheus::PrometheusHandle;
use store::Store;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use routes::{AppState, orders, products, system, users};

/// Creates the Axum application router with all routes and shared state.
///
/// Requests running longer than `request_timeout` are aborted; an order
/// write in flight at that point is rolled back.
pub fn create_app<S: Store + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
    request_timeout: Duration,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(system::metrics))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(system::health::<S>))
        .route(
            "/products",
            get(products::list::<S>).post(products::create::<S>),
        )
        .route(
            "/products/{id}",
            get(products::get::<S>)
                .patch(products::update::<S>)
                .delete(products::delete::<S>),
        )
        .route("/orders", get(orders::list::<S>).post(orders::create::<S>))
        .route(
            "/orders/{id}",
            get(orders::get::<S>)
                .patch(orders::update::<S>)
                .delete(orders::delete::<S>),
        )
        .route(
            "/users",
            get(users::list::<S>)
                .post(users::create::<S>)
                .patch(users::update::<S>),
        )
        .route(
            "/users/{id}",
            get(users::get::<S>).delete(users::delete::<S>),
        )
        .with_state(state)
        .merge(metrics_router)
        .layer(TimeoutLayer::new(request_timeout))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}
