//! Location service HTTP client.
//!
//! Reads a location's free-space counter and adjusts it by one. The
//! adjustment is not atomic with the local booking write; callers own the
//! compensation.
//!
//! # Security
//!
//! - Increment/decrement carry the admin bearer credential
//! - Timeouts prevent hanging connections
//! - Errors are logged server-side with generic messages returned

use crate::errors::BkError;
use crate::models::LocationInfo;
use crate::observability::metrics::record_upstream_call;
use common::secret::{ExposeSecret, SecretString};
use reqwest::{Client, StatusCode, Url};
use std::time::{Duration, Instant};
use tracing::{error, instrument, warn};

/// Connect timeout for location requests in seconds.
const LOCATION_CONNECT_TIMEOUT_SECS: u64 = 5;

const SERVICE_LABEL: &str = "location";

/// Capacity operations against the location service.
#[async_trait::async_trait]
pub trait LocationCapacity: Send + Sync {
    /// Fetch the location's free spaces, title and address.
    async fn get_location(&self, location_id: &str) -> Result<LocationInfo, BkError>;

    /// Take one unit of capacity. A conflict surfaces as `BkError::Capacity`.
    async fn decrement(&self, location_id: &str) -> Result<(), BkError>;

    /// Return one unit of capacity.
    async fn increment(&self, location_id: &str) -> Result<(), BkError>;
}

/// HTTP client for the location service.
#[derive(Clone)]
pub struct LocationClient {
    client: Client,
    base_url: Url,
    admin_token: SecretString,
}

impl LocationClient {
    /// Create a new location client.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Location service base URL (e.g., "http://localhost:8081")
    /// * `admin_token` - Bearer credential for increment/decrement
    /// * `timeout` - Per-request timeout
    ///
    /// # Errors
    ///
    /// Returns `BkError::Internal` if the URL is invalid or the HTTP client cannot be built.
    pub fn new(base_url: &str, admin_token: SecretString, timeout: Duration) -> Result<Self, BkError> {
        let base_url = Url::parse(base_url).map_err(|e| {
            error!(target: "bk.services.location_client", error = %e, "Invalid location service URL");
            BkError::Internal
        })?;

        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(LOCATION_CONNECT_TIMEOUT_SECS))
            .build()
            .map_err(|e| {
                error!(target: "bk.services.location_client", error = %e, "Failed to build HTTP client");
                BkError::Internal
            })?;

        Ok(Self {
            client,
            base_url,
            admin_token,
        })
    }

    /// Build `{base}/location/parking-location/{segments...}` with each
    /// segment percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, BkError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| {
                error!(target: "bk.services.location_client", "Location service URL cannot be a base");
                BkError::Internal
            })?
            .pop_if_empty()
            .extend(["location", "parking-location"])
            .extend(segments);
        Ok(url)
    }

    async fn adjust(&self, operation: &'static str, location_id: &str) -> Result<(), BkError> {
        let url = self.endpoint(&[operation, location_id])?;
        let start = Instant::now();

        let response = self
            .client
            .post(url)
            .bearer_auth(self.admin_token.expose_secret())
            .send()
            .await
            .map_err(|e| {
                record_upstream_call(SERVICE_LABEL, operation, "error", start.elapsed());
                warn!(target: "bk.services.location_client", error = %e, operation, "Location request failed");
                BkError::Upstream(format!("location {} request failed: {}", operation, e))
            })?;

        let status = response.status();
        if status.is_success() {
            record_upstream_call(SERVICE_LABEL, operation, "success", start.elapsed());
            return Ok(());
        }

        if status == StatusCode::CONFLICT && operation == "decrement" {
            record_upstream_call(SERVICE_LABEL, operation, "conflict", start.elapsed());
            return Err(BkError::Capacity(format!(
                "location {} has no free spaces left",
                location_id
            )));
        }

        record_upstream_call(SERVICE_LABEL, operation, "error", start.elapsed());
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            error!(target: "bk.services.location_client", status = %status, "Admin token rejected by location service");
        } else {
            warn!(target: "bk.services.location_client", status = %status, operation, "Location service returned an error");
        }
        Err(BkError::Upstream(format!(
            "location {} returned {}",
            operation, status
        )))
    }
}

#[async_trait::async_trait]
impl LocationCapacity for LocationClient {
    #[instrument(skip_all, fields(location_id = %location_id))]
    async fn get_location(&self, location_id: &str) -> Result<LocationInfo, BkError> {
        let url = self.endpoint(&[location_id])?;
        let start = Instant::now();

        let response = self.client.get(url).send().await.map_err(|e| {
            record_upstream_call(SERVICE_LABEL, "get", "error", start.elapsed());
            warn!(target: "bk.services.location_client", error = %e, "Location lookup failed");
            BkError::Upstream(format!("location lookup failed: {}", e))
        })?;

        let status = response.status();
        if !status.is_success() {
            record_upstream_call(SERVICE_LABEL, "get", "error", start.elapsed());
            warn!(target: "bk.services.location_client", status = %status, "Location lookup returned an error");
            return Err(BkError::Upstream(format!("location lookup returned {}", status)));
        }

        let info = response.json::<LocationInfo>().await.map_err(|e| {
            record_upstream_call(SERVICE_LABEL, "get", "error", start.elapsed());
            error!(target: "bk.services.location_client", error = %e, "Failed to parse location response");
            BkError::Upstream(format!("invalid location response: {}", e))
        })?;

        record_upstream_call(SERVICE_LABEL, "get", "success", start.elapsed());
        Ok(info)
    }

    #[instrument(skip_all, fields(location_id = %location_id))]
    async fn decrement(&self, location_id: &str) -> Result<(), BkError> {
        self.adjust("decrement", location_id).await
    }

    #[instrument(skip_all, fields(location_id = %location_id))]
    async fn increment(&self, location_id: &str) -> Result<(), BkError> {
        self.adjust("increment", location_id).await
    }
}

/// Mock location service for unit tests.
pub mod mock {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use tokio::sync::Mutex;

    /// In-memory capacity counters with call recording and failure injection.
    ///
    /// Decrementing a counter at zero returns `BkError::Capacity`, matching the
    /// conflict contract of the real service.
    #[derive(Default)]
    pub struct MockLocationClient {
        locations: Mutex<HashMap<String, LocationInfo>>,
        increments: Mutex<Vec<String>>,
        decrements: Mutex<Vec<String>>,
        get_calls: AtomicUsize,
        fail_get: AtomicBool,
        fail_decrement: AtomicBool,
        fail_increment: AtomicBool,
    }

    impl MockLocationClient {
        pub fn new() -> Self {
            Self::default()
        }

        /// Register a location with the given free spaces.
        pub fn with_location(self, location_id: &str, free_spaces: i64) -> Self {
            self.with_location_details(location_id, free_spaces, None, None)
        }

        /// Register a location with title and address.
        pub fn with_location_details(
            mut self,
            location_id: &str,
            free_spaces: i64,
            title: Option<&str>,
            street_address: Option<&str>,
        ) -> Self {
            self.locations.get_mut().insert(
                location_id.to_string(),
                LocationInfo {
                    free_spaces,
                    title: title.map(str::to_string),
                    street_address: street_address.map(str::to_string),
                },
            );
            self
        }

        pub fn set_fail_get(&self, fail: bool) {
            self.fail_get.store(fail, Ordering::SeqCst);
        }

        pub fn set_fail_decrement(&self, fail: bool) {
            self.fail_decrement.store(fail, Ordering::SeqCst);
        }

        pub fn set_fail_increment(&self, fail: bool) {
            self.fail_increment.store(fail, Ordering::SeqCst);
        }

        /// Current free spaces for a location.
        pub async fn free_spaces(&self, location_id: &str) -> Option<i64> {
            self.locations
                .lock()
                .await
                .get(location_id)
                .map(|l| l.free_spaces)
        }

        /// Location ids passed to successful and failed `increment` calls, in order.
        pub async fn increments(&self) -> Vec<String> {
            self.increments.lock().await.clone()
        }

        /// Location ids passed to successful and failed `decrement` calls, in order.
        pub async fn decrements(&self) -> Vec<String> {
            self.decrements.lock().await.clone()
        }

        pub fn get_calls(&self) -> usize {
            self.get_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl LocationCapacity for MockLocationClient {
        async fn get_location(&self, location_id: &str) -> Result<LocationInfo, BkError> {
            self.get_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_get.load(Ordering::SeqCst) {
                return Err(BkError::Upstream("Mock location lookup error".to_string()));
            }
            self.locations
                .lock()
                .await
                .get(location_id)
                .cloned()
                .ok_or_else(|| BkError::Upstream("location lookup returned 404".to_string()))
        }

        async fn decrement(&self, location_id: &str) -> Result<(), BkError> {
            self.decrements.lock().await.push(location_id.to_string());
            if self.fail_decrement.load(Ordering::SeqCst) {
                return Err(BkError::Upstream("Mock location decrement error".to_string()));
            }

            let mut locations = self.locations.lock().await;
            let location = locations
                .get_mut(location_id)
                .ok_or_else(|| BkError::Upstream("location decrement returned 404".to_string()))?;
            if location.free_spaces <= 0 {
                return Err(BkError::Capacity(format!(
                    "location {} has no free spaces left",
                    location_id
                )));
            }
            location.free_spaces -= 1;
            Ok(())
        }

        async fn increment(&self, location_id: &str) -> Result<(), BkError> {
            self.increments.lock().await.push(location_id.to_string());
            if self.fail_increment.load(Ordering::SeqCst) {
                return Err(BkError::Upstream("Mock location increment error".to_string()));
            }

            let mut locations = self.locations.lock().await;
            let location = locations
                .get_mut(location_id)
                .ok_or_else(|| BkError::Upstream("location increment returned 404".to_string()))?;
            location.free_spaces += 1;
            Ok(())
        }
    }
}
