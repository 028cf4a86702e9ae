//! Booking Service
//!
//! Entry point for the parking booking lifecycle service.

use bk_service::config::Config;
use bk_service::observability::metrics::init_metrics_recorder;
use bk_service::repositories::{BookingStore, PgBookingStore};
use bk_service::routes::{self, AppState};
use bk_service::services::{
    BookingCoordinator, LocationCapacity, LocationClient, NotificationClient, Notifier,
};
use bk_service::tasks::{start_expiry_sweeper, ExpirySweepConfig};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bk_service=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Booking Service");

    // Load configuration
    let config = Config::from_env().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    info!(
        bind_address = %config.bind_address,
        location_service_url = %config.location_service_url,
        notification_service_url = %config.notification_service_url,
        jwt_configured = config.jwt_secret.is_some(),
        expiry_sweep_interval_seconds = config.expiry_sweep_interval_seconds,
        compensate_failed_create = config.compensate_failed_create,
        "Configuration loaded successfully"
    );
    if config.jwt_secret.is_none() {
        warn!("JWT_SECRET is not set; authenticated requests will fail");
    }

    // Install the Prometheus recorder before anything records metrics
    let metrics_handle = init_metrics_recorder().map_err(|e| {
        error!("Failed to initialize metrics recorder: {}", e);
        e
    })?;

    // Initialize database connection pool with query timeout
    info!("Connecting to database...");
    let db_url_with_timeout = add_query_timeout(&config.database_url, 5);
    let db_pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(20)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(5))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .connect(&db_url_with_timeout)
        .await
        .map_err(|e| {
            error!("Failed to connect to database: {}", e);
            e
        })?;

    info!("Database connection established");

    sqlx::migrate!("../../migrations")
        .run(&db_pool)
        .await
        .map_err(|e| {
            error!("Failed to run migrations: {}", e);
            e
        })?;

    // Collaborators
    let upstream_timeout = Duration::from_secs(config.upstream_timeout_seconds);
    let store: Arc<dyn BookingStore> = Arc::new(PgBookingStore::new(db_pool));
    let location: Arc<dyn LocationCapacity> = Arc::new(LocationClient::new(
        &config.location_service_url,
        config.admin_token.clone(),
        upstream_timeout,
    )?);
    let notifier: Arc<dyn Notifier> = Arc::new(NotificationClient::new(
        &config.notification_service_url,
        upstream_timeout,
    )?);

    let coordinator = Arc::new(BookingCoordinator::new(
        store.clone(),
        location.clone(),
        notifier.clone(),
        config.compensate_failed_create,
    ));

    // Expiry sweeper
    let cancel_token = CancellationToken::new();
    let sweeper_handle = tokio::spawn(start_expiry_sweeper(
        store.clone(),
        location,
        notifier,
        ExpirySweepConfig {
            check_interval_seconds: config.expiry_sweep_interval_seconds,
        },
        cancel_token.clone(),
    ));

    // Parse bind address before moving config
    let bind_address = config.bind_address.clone();

    let state = Arc::new(AppState {
        config,
        store,
        coordinator,
    });

    let app = routes::build_routes(state, metrics_handle);

    let addr: SocketAddr = bind_address.parse().map_err(|e| {
        error!("Invalid bind address: {}", e);
        e
    })?;

    info!("Booking Service listening on {}", addr);

    // Start server with graceful shutdown support
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    // Stop the sweeper; an in-flight pass finishes first
    cancel_token.cancel();
    if let Err(e) = sweeper_handle.await {
        error!("Expiry sweeper task failed: {}", e);
    }

    info!("Booking Service shutdown complete");

    Ok(())
}

/// Listens for shutdown signals (SIGTERM, SIGINT).
/// Returns when a shutdown signal is received and drain period is complete.
async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received SIGINT, starting graceful shutdown..."),
            Err(e) => error!("Failed to listen for SIGINT: {}", e),
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received SIGTERM, starting graceful shutdown...");
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    let drain_secs: u64 = std::env::var("BK_DRAIN_SECONDS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(0);

    if drain_secs > 0 {
        warn!("Draining connections for {} seconds...", drain_secs);
        tokio::time::sleep(Duration::from_secs(drain_secs)).await;
        info!("Drain period complete");
    } else {
        info!("Skipping drain period (BK_DRAIN_SECONDS=0)");
    }
}

/// Adds statement_timeout to the database URL.
fn add_query_timeout(url: &str, timeout_secs: u32) -> String {
    let separator = if url.contains('?') { '&' } else { '?' };
    format!(
        "{}{}options=-c%20statement_timeout%3D{}s",
        url, separator, timeout_secs
    )
}
