//! Notification service HTTP client.
//!
//! Creates user-facing notifications. Delivery is a single POST with no
//! retry; callers decide whether a failure matters.

use crate::errors::BkError;
use crate::models::Notification;
use crate::observability::metrics::record_upstream_call;
use reqwest::{Client, Url};
use std::time::{Duration, Instant};
use tracing::{error, instrument, warn};

/// Connect timeout for notification requests in seconds.
const NOTIFICATION_CONNECT_TIMEOUT_SECS: u64 = 5;

const SERVICE_LABEL: &str = "notification";

/// Sends notifications to users.
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: &Notification) -> Result<(), BkError>;
}

/// HTTP client for the notification service.
#[derive(Clone)]
pub struct NotificationClient {
    client: Client,
    create_url: Url,
}

impl NotificationClient {
    /// Create a new notification client.
    ///
    /// # Errors
    ///
    /// Returns `BkError::Internal` if the URL is invalid or the HTTP client cannot be built.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, BkError> {
        let mut create_url = Url::parse(base_url).map_err(|e| {
            error!(target: "bk.services.notification_client", error = %e, "Invalid notification service URL");
            BkError::Internal
        })?;
        create_url
            .path_segments_mut()
            .map_err(|()| {
                error!(target: "bk.services.notification_client", "Notification service URL cannot be a base");
                BkError::Internal
            })?
            .pop_if_empty()
            .extend(["notification", "create"]);

        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(NOTIFICATION_CONNECT_TIMEOUT_SECS))
            .build()
            .map_err(|e| {
                error!(target: "bk.services.notification_client", error = %e, "Failed to build HTTP client");
                BkError::Internal
            })?;

        Ok(Self { client, create_url })
    }
}

#[async_trait::async_trait]
impl Notifier for NotificationClient {
    #[instrument(skip_all, fields(title = %notification.title))]
    async fn notify(&self, notification: &Notification) -> Result<(), BkError> {
        let start = Instant::now();

        let response = self
            .client
            .post(self.create_url.clone())
            .json(notification)
            .send()
            .await
            .map_err(|e| {
                record_upstream_call(SERVICE_LABEL, "create", "error", start.elapsed());
                warn!(target: "bk.services.notification_client", error = %e, "Notification request failed");
                BkError::Upstream(format!("notification request failed: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            record_upstream_call(SERVICE_LABEL, "create", "error", start.elapsed());
            warn!(target: "bk.services.notification_client", status = %status, "Notification service returned an error");
            return Err(BkError::Upstream(format!(
                "notification service returned {}",
                status
            )));
        }

        record_upstream_call(SERVICE_LABEL, "create", "success", start.elapsed());
        Ok(())
    }
}

/// Mock notifier for unit tests.
pub mod mock {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tokio::sync::Mutex;

    /// Records every notification it is asked to send.
    #[derive(Default)]
    pub struct MockNotifier {
        sent: Mutex<Vec<Notification>>,
        fail: AtomicBool,
    }

    impl MockNotifier {
        pub fn new() -> Self {
            Self::default()
        }

        /// A notifier whose every call fails.
        pub fn failing() -> Self {
            let notifier = Self::default();
            notifier.set_fail(true);
            notifier
        }

        pub fn set_fail(&self, fail: bool) {
            self.fail.store(fail, Ordering::SeqCst);
        }

        /// Notifications accepted so far (failed attempts are not recorded).
        pub async fn sent(&self) -> Vec<Notification> {
            self.sent.lock().await.clone()
        }
    }

    #[async_trait::async_trait]
    impl Notifier for MockNotifier {
        async fn notify(&self, notification: &Notification) -> Result<(), BkError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(BkError::Upstream("Mock notification error".to_string()));
            }
            self.sent.lock().await.push(notification.clone());
            Ok(())
        }
    }
}
