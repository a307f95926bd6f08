//! HTTP API server with observability for the collectible marketplace.
//!
//! Provides the POST endpoints fronting the marketplace sagas, with
//! structured logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use doc_store::DocumentStore;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use routes::market::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: DocumentStore + Clone + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/market/purchase", post(routes::market::purchase::<S>))
        .route("/market/collect", post(routes::market::collect::<S>))
        .route("/market/collectibles", post(routes::market::create::<S>))
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

/// Creates the default application state with in-memory collaborator
/// services around the given document store.
pub fn create_default_state<S: DocumentStore + Clone + 'static>(store: S) -> Arc<AppState<S>> {
    use saga::{
        InMemoryAuthResolver, InMemoryIdentityVerifier, InMemoryNotificationService,
        MarketCoordinator,
    };

    let auth = InMemoryAuthResolver::new();
    let identity = InMemoryIdentityVerifier::new();
    let notifier = InMemoryNotificationService::new();
    let market = MarketCoordinator::new(
        store.clone(),
        auth.clone(),
        identity.clone(),
        notifier.clone(),
    );

    Arc::new(AppState {
        market,
        store,
        auth,
        identity,
        notifier,
    })
}
