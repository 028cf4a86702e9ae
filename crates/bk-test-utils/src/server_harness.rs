//! Test server harness for E2E testing
//!
//! Provides `TestBookingServer` for spawning real booking service instances in
//! tests. The server uses the real router, the real HTTP clients pointed at
//! caller-supplied location/notification URLs (typically `wiremock` servers),
//! and an in-memory booking store.

use bk_service::config::Config;
use bk_service::repositories::InMemoryBookingStore;
use bk_service::routes::{self, AppState};
use bk_service::services::{
    BookingCoordinator, LocationCapacity, LocationClient, NotificationClient, Notifier,
};
use bk_service::tasks::{run_sweep, SweepReport};
use chrono::Utc;
use common::jwt::{issue_hs512, UserClaims};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Signing secret configured on every test server.
pub const TEST_JWT_SECRET: &str = "bk-test-signing-secret";

/// Admin token presented to the location service by test servers.
pub const TEST_ADMIN_TOKEN: &str = "bk-test-admin-token";

/// Test harness for spawning the booking service in E2E tests.
///
/// # Example
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_list_flow_e2e() -> Result<()> {
///     let location = MockServer::start().await;
///     let notification = MockServer::start().await;
///     let server = TestBookingServer::spawn(&location.uri(), &notification.uri()).await?;
///
///     let response = reqwest::Client::new()
///         .get(format!("{}/bookings/getAllBookings", server.url()))
///         .bearer_auth(server.token_for("user-1"))
///         .send()
///         .await?;
///
///     assert_eq!(response.status(), 200);
///     Ok(())
/// }
/// ```
pub struct TestBookingServer {
    addr: SocketAddr,
    config: Config,
    store: Arc<InMemoryBookingStore>,
    location: Arc<dyn LocationCapacity>,
    notifier: Arc<dyn Notifier>,
    _handle: JoinHandle<()>,
}

impl TestBookingServer {
    /// Spawn a server with default test configuration.
    ///
    /// # Arguments
    /// * `location_url` - Base URL of the location service
    /// * `notification_url` - Base URL of the notification service
    pub async fn spawn(
        location_url: &str,
        notification_url: &str,
    ) -> Result<Self, anyhow::Error> {
        Self::spawn_with_vars(location_url, notification_url, &[]).await
    }

    /// Spawn a server with extra environment overrides.
    ///
    /// `overrides` are applied last; an empty value for `JWT_SECRET` leaves the
    /// signing secret unconfigured.
    pub async fn spawn_with_vars(
        location_url: &str,
        notification_url: &str,
        overrides: &[(&str, &str)],
    ) -> Result<Self, anyhow::Error> {
        let mut vars = HashMap::from([
            (
                "DATABASE_URL".to_string(),
                "postgresql://test/test".to_string(),
            ),
            ("BIND_ADDRESS".to_string(), "127.0.0.1:0".to_string()),
            ("JWT_SECRET".to_string(), TEST_JWT_SECRET.to_string()),
            ("ADMIN_TOKEN".to_string(), TEST_ADMIN_TOKEN.to_string()),
            (
                "LOCATION_SERVICE_ENDPOINT".to_string(),
                location_url.to_string(),
            ),
            (
                "NOTIFICATION_SERVICE_ENDPOINT".to_string(),
                notification_url.to_string(),
            ),
            ("UPSTREAM_TIMEOUT_SECONDS".to_string(), "2".to_string()),
        ]);
        for (key, value) in overrides {
            vars.insert((*key).to_string(), (*value).to_string());
        }

        let config = Config::from_vars(&vars)
            .map_err(|e| anyhow::anyhow!("Failed to create config: {}", e))?;

        let timeout = Duration::from_secs(config.upstream_timeout_seconds);
        let store = Arc::new(InMemoryBookingStore::new());
        let location: Arc<dyn LocationCapacity> = Arc::new(
            LocationClient::new(
                &config.location_service_url,
                config.admin_token.clone(),
                timeout,
            )
            .map_err(|e| anyhow::anyhow!("Failed to create location client: {}", e))?,
        );
        let notifier: Arc<dyn Notifier> = Arc::new(
            NotificationClient::new(&config.notification_service_url, timeout)
                .map_err(|e| anyhow::anyhow!("Failed to create notification client: {}", e))?,
        );

        let coordinator = Arc::new(BookingCoordinator::new(
            store.clone(),
            location.clone(),
            notifier.clone(),
            config.compensate_failed_create,
        ));
        let state = Arc::new(AppState {
            config: config.clone(),
            store: store.clone(),
            coordinator,
        });

        // Non-global recorder so parallel test servers don't collide
        let metrics_handle = PrometheusBuilder::new().build_recorder().handle();
        let app = routes::build_routes(state, metrics_handle);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind test server: {}", e))?;

        let addr = listener
            .local_addr()
            .map_err(|e| anyhow::anyhow!("Failed to get local address: {}", e))?;

        let handle = tokio::spawn(async move {
            let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
            if let Err(e) = axum::serve(listener, make_service).await {
                eprintln!("Test server error: {}", e);
            }
        });

        Ok(Self {
            addr,
            config,
            store,
            location,
            notifier,
            _handle: handle,
        })
    }

    /// Get the in-memory booking store backing the server.
    pub fn store(&self) -> &InMemoryBookingStore {
        &self.store
    }

    /// Get the base URL of the test server.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Get the socket address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Get reference to the server configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Issue a bearer token for `user_id` signed with [`TEST_JWT_SECRET`].
    pub fn token_for(&self, user_id: &str) -> String {
        issue_hs512(&UserClaims::new(user_id), TEST_JWT_SECRET.as_bytes())
            .expect("HS512 signing with a static secret cannot fail")
    }

    /// Run one expiry sweep now, using the server's store and clients.
    pub async fn sweep_now(&self) -> SweepReport {
        run_sweep(
            self.store.as_ref(),
            self.location.as_ref(),
            self.notifier.as_ref(),
            Utc::now(),
        )
        .await
    }
}

impl Drop for TestBookingServer {
    fn drop(&mut self) {
        // Abort the server task so the port is released when the test ends
        self._handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::jwt::verify_hs512;

    const UNREACHABLE: &str = "http://127.0.0.1:1";

    #[tokio::test]
    async fn test_server_spawns_successfully() -> Result<(), anyhow::Error> {
        let server = TestBookingServer::spawn(UNREACHABLE, UNREACHABLE).await?;

        assert!(server.url().starts_with("http://127.0.0.1:"));

        let response = reqwest::get(format!("{}/health", server.url())).await?;
        assert_eq!(response.status(), 200);

        let body: serde_json::Value = response.json().await?;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["database"], "healthy");

        Ok(())
    }

    #[tokio::test]
    async fn test_server_provides_addr() -> Result<(), anyhow::Error> {
        let server = TestBookingServer::spawn(UNREACHABLE, UNREACHABLE).await?;

        let addr = server.addr();
        assert!(addr.ip().is_loopback());
        assert!(addr.port() > 0);
        assert_eq!(server.url(), format!("http://{}", addr));

        Ok(())
    }

    #[tokio::test]
    async fn test_server_applies_overrides() -> Result<(), anyhow::Error> {
        let server = TestBookingServer::spawn_with_vars(
            UNREACHABLE,
            UNREACHABLE,
            &[("COMPENSATE_FAILED_CREATE", "false")],
        )
        .await?;

        assert!(!server.config().compensate_failed_create);
        assert_eq!(server.config().location_service_url, UNREACHABLE);

        Ok(())
    }

    #[tokio::test]
    async fn test_token_for_verifies_with_test_secret() -> Result<(), anyhow::Error> {
        let server = TestBookingServer::spawn(UNREACHABLE, UNREACHABLE).await?;

        let token = server.token_for("user-7");
        let claims = verify_hs512(
            &token,
            TEST_JWT_SECRET.as_bytes(),
            Duration::from_secs(300),
        )?;
        assert_eq!(claims.id, "user-7");

        Ok(())
    }

    #[tokio::test]
    async fn test_multiple_servers_different_ports() -> Result<(), anyhow::Error> {
        let server1 = TestBookingServer::spawn(UNREACHABLE, UNREACHABLE).await?;
        let server2 = TestBookingServer::spawn(UNREACHABLE, UNREACHABLE).await?;

        assert_ne!(server1.addr().port(), server2.addr().port());

        Ok(())
    }
}
