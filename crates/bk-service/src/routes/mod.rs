//! HTTP routes for the booking service.
//!
//! Defines the Axum router and application state.

use crate::auth::IdentityContext;
use crate::config::Config;
use crate::handlers;
use crate::middleware::{http_metrics_middleware, require_auth, AuthState};
use crate::repositories::BookingStore;
use crate::services::BookingCoordinator;
use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Service configuration.
    pub config: Config,

    /// Booking record store.
    pub store: Arc<dyn BookingStore>,

    /// Lifecycle coordinator backing the `/bookings` routes.
    pub coordinator: Arc<BookingCoordinator>,
}

/// Build the application routes.
///
/// Creates an Axum router with:
/// - `/health` - Store ping - public
/// - `/metrics` - Prometheus metrics endpoint - public
/// - `/bookings/*` - Booking lifecycle - requires a bearer token
/// - TraceLayer for request logging
/// - Permissive CORS, answering preflights before authentication
/// - HTTP metrics middleware
/// - 30 second request timeout
pub fn build_routes(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let identity = Arc::new(IdentityContext::new(
        state.config.jwt_secret.clone(),
        state.config.jwt_clock_skew_seconds,
    ));
    let auth_state = Arc::new(AuthState { identity });

    // Public routes (no authentication required)
    let public_routes = Router::new()
        .route("/health", get(handlers::health_check))
        .with_state(state.clone());

    // Metrics route with its own state
    let metrics_routes = Router::new()
        .route("/metrics", get(handlers::metrics_handler))
        .with_state(metrics_handle);

    // Protected routes (authentication required)
    let protected_routes = Router::new()
        .route("/bookings/create", post(handlers::create_booking))
        .route("/bookings/delete/:id", delete(handlers::cancel_booking))
        .route("/bookings/extend/:id", put(handlers::extend_booking))
        .route("/bookings/getAllBookings", get(handlers::list_bookings))
        .route_layer(middleware::from_fn_with_state(auth_state, require_auth))
        .with_state(state);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Layer order (bottom-to-top execution):
    // 1. TimeoutLayer - Timeout the request (innermost)
    // 2. TraceLayer - Log request details
    // 3. CorsLayer - Answer preflights, add CORS headers
    // 4. http_metrics_middleware - Record ALL responses (outermost)
    public_routes
        .merge(metrics_routes)
        .merge(protected_routes)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(cors)
        .layer(middleware::from_fn(http_metrics_middleware))
}
