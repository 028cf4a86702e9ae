//! Expiry sweeper background task.
//!
//! Periodically removes bookings whose end time has passed:
//! 1. Snapshot every booking with `end_time < now`
//! 2. Delete the snapshot in one batch
//! 3. For each booking the batch actually removed, notify the owner and
//!    release one unit of capacity at the booking's own location
//!
//! The batch delete re-applies `end_time < now`. Bookings that were cancelled
//! or extended between the snapshot and the delete are not removed and are
//! skipped: a cancel already released their capacity, an extend keeps them
//! live.
//!
//! # Graceful Shutdown
//!
//! The task supports graceful shutdown via a cancellation token. When the token
//! is cancelled, the task completes its current iteration and exits cleanly.

use crate::models::Notification;
use crate::observability::metrics::record_expiry_sweep;
use crate::repositories::BookingStore;
use crate::services::location_client::LocationCapacity;
use crate::services::notification_client::Notifier;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

/// Default sweep interval in seconds (1 hour).
pub const DEFAULT_CHECK_INTERVAL_SECONDS: u64 = 3600;

/// Configuration for the expiry sweeper.
#[derive(Debug, Clone)]
pub struct ExpirySweepConfig {
    /// Seconds between sweeps.
    pub check_interval_seconds: u64,
}

impl Default for ExpirySweepConfig {
    fn default() -> Self {
        Self {
            check_interval_seconds: DEFAULT_CHECK_INTERVAL_SECONDS,
        }
    }
}

/// Outcome of one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Bookings removed by the batch delete.
    pub expired: u64,
    /// Capacity increments that succeeded.
    pub released: u64,
    /// Expiry notifications that succeeded.
    pub notified: u64,
    /// Per-booking steps that failed, plus one for a failed query or delete.
    pub failed: u64,
}

/// Start the expiry sweeper background task.
///
/// The first sweep runs immediately, then every `check_interval_seconds`.
/// Returns when the cancellation token is triggered.
#[instrument(skip_all, name = "bk.task.expiry_sweeper")]
pub async fn start_expiry_sweeper(
    store: Arc<dyn BookingStore>,
    location: Arc<dyn LocationCapacity>,
    notifier: Arc<dyn Notifier>,
    config: ExpirySweepConfig,
    cancel_token: CancellationToken,
) {
    info!(
        target: "bk.task.expiry_sweeper",
        check_interval_seconds = config.check_interval_seconds,
        "Starting expiry sweeper task"
    );

    let mut interval = tokio::time::interval(Duration::from_secs(config.check_interval_seconds));

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let report = run_sweep(
                    store.as_ref(),
                    location.as_ref(),
                    notifier.as_ref(),
                    Utc::now(),
                )
                .await;
                record_expiry_sweep(report.expired, report.failed);
            }
            _ = cancel_token.cancelled() => {
                info!(
                    target: "bk.task.expiry_sweeper",
                    "Expiry sweeper received shutdown signal, exiting"
                );
                break;
            }
        }
    }

    info!(target: "bk.task.expiry_sweeper", "Expiry sweeper stopped");
}

/// Run a single sweep against `now`.
///
/// Never fails; every failure is logged and counted in the report.
pub async fn run_sweep(
    store: &dyn BookingStore,
    location: &dyn LocationCapacity,
    notifier: &dyn Notifier,
    now: DateTime<Utc>,
) -> SweepReport {
    let mut report = SweepReport::default();

    let snapshot = match store.find_expired(now).await {
        Ok(bookings) => bookings,
        Err(e) => {
            error!(
                target: "bk.task.expiry_sweeper",
                error = %e,
                "Failed to query expired bookings"
            );
            report.failed += 1;
            return report;
        }
    };

    if snapshot.is_empty() {
        return report;
    }

    let ids: Vec<_> = snapshot.iter().map(|b| b.id).collect();
    let removed: HashSet<_> = match store.delete_by_ids(&ids, now).await {
        Ok(removed) => removed.into_iter().collect(),
        Err(e) => {
            error!(
                target: "bk.task.expiry_sweeper",
                error = %e,
                expired_count = snapshot.len(),
                "Failed to delete expired bookings"
            );
            report.failed += 1;
            return report;
        }
    };

    for booking in snapshot.iter().filter(|b| removed.contains(&b.id)) {
        report.expired += 1;

        match notifier.notify(&Notification::booking_expired(booking)).await {
            Ok(()) => report.notified += 1,
            Err(e) => {
                report.failed += 1;
                warn!(
                    target: "bk.task.expiry_sweeper",
                    error = %e,
                    booking_id = %booking.id,
                    "Failed to send expiry notification"
                );
            }
        }

        match location.increment(&booking.location_id).await {
            Ok(()) => report.released += 1,
            Err(e) => {
                report.failed += 1;
                error!(
                    target: "bk.task.expiry_sweeper",
                    error = %e,
                    booking_id = %booking.id,
                    location_id = %booking.location_id,
                    "Failed to release capacity for expired booking"
                );
            }
        }
    }

    let skipped = snapshot.len().saturating_sub(removed.len());
    if skipped > 0 {
        info!(
            target: "bk.task.expiry_sweeper",
            skipped_count = skipped,
            "Expired bookings removed concurrently were skipped"
        );
    }

    info!(
        target: "bk.task.expiry_sweeper",
        expired = report.expired,
        released = report.released,
        notified = report.notified,
        failed = report.failed,
        "Expiry sweep complete"
    );

    report
}
