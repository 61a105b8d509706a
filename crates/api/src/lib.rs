//! HTTP surface for the warehouse system.
//!
//! REST endpoints for order management, rate shopping, fulfillment,
//! label retrieval and signed order-sync webhooks, with structured
//! logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;
pub mod signature;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use carriers::{CarrierClient, MockCarrier};
use fulfillment::{FulfillmentCoordinator, InMemoryNotifier, RateAggregator};
use metrics_exporter_prometheus::PrometheusHandle;
use store::{InMemoryStore, WarehouseStore};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared application state accessible from all handlers.
pub struct AppState {
    pub store: Arc<dyn WarehouseStore>,
    pub coordinator: Arc<FulfillmentCoordinator>,
    pub rates: Arc<RateAggregator>,
    pub webhook_secret: String,
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/orders", get(routes::orders::list))
        .route("/orders/{id}", get(routes::orders::get))
        .route("/orders/{id}/hold", post(routes::orders::hold))
        .route("/orders/{id}/resume", post(routes::orders::resume))
        .route("/orders/{id}/cancel", post(routes::orders::cancel))
        .route("/orders/{id}/rates", get(routes::orders::rates))
        .route("/orders/{id}/fulfill", post(routes::orders::fulfill))
        .route("/shipments/{id}/label", get(routes::shipments::label))
        .route("/webhooks/orders", post(routes::webhooks::order_sync))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates application state over a store with the given carriers and
/// notifier.
pub fn create_state(
    store: Arc<dyn WarehouseStore>,
    carriers: Vec<Arc<dyn CarrierClient>>,
    notifier: Arc<dyn fulfillment::PlatformNotifier>,
    public_base_url: String,
    webhook_secret: String,
) -> Arc<AppState> {
    let coordinator = Arc::new(FulfillmentCoordinator::new(
        Arc::clone(&store),
        carriers.clone(),
        notifier,
        public_base_url,
    ));
    let rates = Arc::new(RateAggregator::new(Arc::clone(&store), carriers));

    Arc::new(AppState {
        store,
        coordinator,
        rates,
        webhook_secret,
    })
}

/// Default in-memory state with mock carriers, for development and
/// tests.
pub fn create_default_state(webhook_secret: String) -> Arc<AppState> {
    let store: Arc<dyn WarehouseStore> = Arc::new(InMemoryStore::new());
    let carriers: Vec<Arc<dyn CarrierClient>> = vec![
        Arc::new(MockCarrier::new("UPS")),
        Arc::new(MockCarrier::new("USPS")),
    ];
    create_state(
        store,
        carriers,
        Arc::new(InMemoryNotifier::new()),
        "http://localhost:3000".to_string(),
        webhook_secret,
    )
}
