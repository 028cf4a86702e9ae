//! Bookings repository.
//!
//! # Security
//!
//! - All queries use parameterized statements (SQL injection safe)
//! - Owner-scoped operations filter on `(id, owner_id)` in the same statement,
//!   so another user's booking is indistinguishable from a missing one
//!
//! # Concurrency
//!
//! Every mutation is a single statement evaluated against the current row.
//! An extend or delete that races the expiry sweep simply affects no row,
//! and the sweep's batch delete re-checks expiry so it never removes a
//! booking extended after the snapshot.

use crate::errors::BkError;
use crate::models::{Booking, NewBooking};
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::instrument;
use uuid::Uuid;

/// Persistence seam for booking records.
#[async_trait::async_trait]
pub trait BookingStore: Send + Sync {
    /// Insert a new booking and return the stored row.
    async fn insert(&self, booking: NewBooking) -> Result<Booking, BkError>;

    /// Fetch a booking by id, only if owned by `owner_id`.
    async fn find_for_owner(&self, id: Uuid, owner_id: &str) -> Result<Option<Booking>, BkError>;

    /// All bookings of `owner_id`, ordered by start time.
    async fn list_for_owner(&self, owner_id: &str) -> Result<Vec<Booking>, BkError>;

    /// Atomically add `hours` to the end time. `None` if no owned row matched.
    async fn extend_end_time(
        &self,
        id: Uuid,
        owner_id: &str,
        hours: i32,
    ) -> Result<Option<Booking>, BkError>;

    /// Delete an owned booking. Returns whether a row was removed.
    async fn delete_for_owner(&self, id: Uuid, owner_id: &str) -> Result<bool, BkError>;

    /// All bookings whose end time is strictly before `now`.
    async fn find_expired(&self, now: DateTime<Utc>) -> Result<Vec<Booking>, BkError>;

    /// Delete the given ids that are still expired at `now`, in one statement.
    /// Returns the ids actually removed.
    async fn delete_by_ids(
        &self,
        ids: &[Uuid],
        now: DateTime<Utc>,
    ) -> Result<Vec<Uuid>, BkError>;

    /// Connectivity check for health probes.
    async fn ping(&self) -> Result<(), BkError>;
}

const BOOKING_COLUMNS: &str =
    "id, owner_id, location_id, start_time, end_time, street_address, created_at";

/// PostgreSQL-backed [`BookingStore`].
#[derive(Clone)]
pub struct PgBookingStore {
    pool: PgPool,
}

impl PgBookingStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait::async_trait]
impl BookingStore for PgBookingStore {
    #[instrument(skip_all, fields(location_id = %booking.location_id))]
    async fn insert(&self, booking: NewBooking) -> Result<Booking, BkError> {
        let row: Booking = sqlx::query_as(&format!(
            r#"
            INSERT INTO bookings (owner_id, location_id, start_time, end_time, street_address)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {BOOKING_COLUMNS}
            "#
        ))
        .bind(&booking.owner_id)
        .bind(&booking.location_id)
        .bind(booking.start_time)
        .bind(booking.end_time)
        .bind(&booking.street_address)
        .fetch_one(&self.pool)
        .await?;

        tracing::debug!(
            target: "bk.repository.bookings",
            booking_id = %row.id,
            "Inserted booking"
        );

        Ok(row)
    }

    #[instrument(skip_all, fields(booking_id = %id))]
    async fn find_for_owner(&self, id: Uuid, owner_id: &str) -> Result<Option<Booking>, BkError> {
        let row: Option<Booking> = sqlx::query_as(&format!(
            r#"
            SELECT {BOOKING_COLUMNS}
            FROM bookings
            WHERE id = $1 AND owner_id = $2
            "#
        ))
        .bind(id)
        .bind(owner_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    #[instrument(skip_all)]
    async fn list_for_owner(&self, owner_id: &str) -> Result<Vec<Booking>, BkError> {
        let rows: Vec<Booking> = sqlx::query_as(&format!(
            r#"
            SELECT {BOOKING_COLUMNS}
            FROM bookings
            WHERE owner_id = $1
            ORDER BY start_time ASC, id ASC
            "#
        ))
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    #[instrument(skip_all, fields(booking_id = %id, hours = hours))]
    async fn extend_end_time(
        &self,
        id: Uuid,
        owner_id: &str,
        hours: i32,
    ) -> Result<Option<Booking>, BkError> {
        let row: Option<Booking> = sqlx::query_as(&format!(
            r#"
            UPDATE bookings
            SET end_time = end_time + make_interval(hours => $3)
            WHERE id = $1 AND owner_id = $2
            RETURNING {BOOKING_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(owner_id)
        .bind(hours)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    #[instrument(skip_all, fields(booking_id = %id))]
    async fn delete_for_owner(&self, id: Uuid, owner_id: &str) -> Result<bool, BkError> {
        let result = sqlx::query(
            r#"
            DELETE FROM bookings
            WHERE id = $1 AND owner_id = $2
            "#,
        )
        .bind(id)
        .bind(owner_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip_all)]
    async fn find_expired(&self, now: DateTime<Utc>) -> Result<Vec<Booking>, BkError> {
        let rows: Vec<Booking> = sqlx::query_as(&format!(
            r#"
            SELECT {BOOKING_COLUMNS}
            FROM bookings
            WHERE end_time < $1
            ORDER BY end_time ASC
            "#
        ))
        .bind(now)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    #[instrument(skip_all, fields(count = ids.len()))]
    async fn delete_by_ids(
        &self,
        ids: &[Uuid],
        now: DateTime<Utc>,
    ) -> Result<Vec<Uuid>, BkError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let deleted: Vec<(Uuid,)> = sqlx::query_as(
            r#"
            DELETE FROM bookings
            WHERE id = ANY($1) AND end_time < $2
            RETURNING id
            "#,
        )
        .bind(ids)
        .bind(now)
        .fetch_all(&self.pool)
        .await?;

        let deleted: Vec<Uuid> = deleted.into_iter().map(|(id,)| id).collect();

        if !deleted.is_empty() {
            tracing::info!(
                target: "bk.repository.bookings",
                requested = ids.len(),
                deleted = deleted.len(),
                "Deleted bookings by id"
            );
        }

        Ok(deleted)
    }

    async fn ping(&self) -> Result<(), BkError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// In-memory store for unit tests and the server harness.
pub mod mock {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use tokio::sync::Mutex;

    /// In-memory [`BookingStore`] with failure injection.
    #[derive(Default)]
    pub struct InMemoryBookingStore {
        bookings: Mutex<Vec<Booking>>,
        fail_inserts: AtomicBool,
        fail_updates: AtomicBool,
        fail_deletes: AtomicBool,
        fail_reads: AtomicBool,
        insert_calls: AtomicUsize,
        delete_calls: AtomicUsize,
    }

    impl InMemoryBookingStore {
        pub fn new() -> Self {
            Self::default()
        }

        /// Create a store pre-populated with `bookings`.
        pub fn with_bookings(bookings: Vec<Booking>) -> Self {
            Self {
                bookings: Mutex::new(bookings),
                ..Self::default()
            }
        }

        /// Make `insert` fail with a persistence error.
        pub fn set_fail_inserts(&self, fail: bool) {
            self.fail_inserts.store(fail, Ordering::SeqCst);
        }

        /// Make `extend_end_time` fail with a persistence error.
        pub fn set_fail_updates(&self, fail: bool) {
            self.fail_updates.store(fail, Ordering::SeqCst);
        }

        /// Make owner-scoped and batch deletes fail with a persistence error.
        pub fn set_fail_deletes(&self, fail: bool) {
            self.fail_deletes.store(fail, Ordering::SeqCst);
        }

        /// Make reads (lookups, listings, expiry queries, ping) fail.
        pub fn set_fail_reads(&self, fail: bool) {
            self.fail_reads.store(fail, Ordering::SeqCst);
        }

        /// Number of `insert` calls, including failed ones.
        pub fn insert_calls(&self) -> usize {
            self.insert_calls.load(Ordering::SeqCst)
        }

        /// Number of delete calls (owner-scoped and batch), including failed ones.
        pub fn delete_calls(&self) -> usize {
            self.delete_calls.load(Ordering::SeqCst)
        }

        /// Copy of every stored booking.
        pub async fn snapshot(&self) -> Vec<Booking> {
            self.bookings.lock().await.clone()
        }

        /// Look up a booking regardless of owner.
        pub async fn get(&self, id: Uuid) -> Option<Booking> {
            self.bookings
                .lock()
                .await
                .iter()
                .find(|b| b.id == id)
                .cloned()
        }

        fn check(flag: &AtomicBool, what: &str) -> Result<(), BkError> {
            if flag.load(Ordering::SeqCst) {
                return Err(BkError::Persistence(format!("Injected {} failure", what)));
            }
            Ok(())
        }
    }

    #[async_trait::async_trait]
    impl BookingStore for InMemoryBookingStore {
        async fn insert(&self, booking: NewBooking) -> Result<Booking, BkError> {
            self.insert_calls.fetch_add(1, Ordering::SeqCst);
            Self::check(&self.fail_inserts, "insert")?;

            let row = Booking {
                id: Uuid::new_v4(),
                owner_id: booking.owner_id,
                location_id: booking.location_id,
                start_time: booking.start_time,
                end_time: booking.end_time,
                street_address: booking.street_address,
                created_at: Utc::now(),
            };
            self.bookings.lock().await.push(row.clone());
            Ok(row)
        }

        async fn find_for_owner(
            &self,
            id: Uuid,
            owner_id: &str,
        ) -> Result<Option<Booking>, BkError> {
            Self::check(&self.fail_reads, "read")?;
            Ok(self
                .bookings
                .lock()
                .await
                .iter()
                .find(|b| b.id == id && b.owner_id == owner_id)
                .cloned())
        }

        async fn list_for_owner(&self, owner_id: &str) -> Result<Vec<Booking>, BkError> {
            Self::check(&self.fail_reads, "read")?;
            let mut rows: Vec<Booking> = self
                .bookings
                .lock()
                .await
                .iter()
                .filter(|b| b.owner_id == owner_id)
                .cloned()
                .collect();
            rows.sort_by(|a, b| a.start_time.cmp(&b.start_time).then(a.id.cmp(&b.id)));
            Ok(rows)
        }

        async fn extend_end_time(
            &self,
            id: Uuid,
            owner_id: &str,
            hours: i32,
        ) -> Result<Option<Booking>, BkError> {
            Self::check(&self.fail_updates, "update")?;
            let delta = chrono::TimeDelta::try_hours(i64::from(hours))
                .ok_or_else(|| BkError::Persistence("interval out of range".to_string()))?;

            let mut bookings = self.bookings.lock().await;
            let Some(row) = bookings
                .iter_mut()
                .find(|b| b.id == id && b.owner_id == owner_id)
            else {
                return Ok(None);
            };

            row.end_time = row
                .end_time
                .checked_add_signed(delta)
                .ok_or_else(|| BkError::Persistence("timestamp out of range".to_string()))?;
            Ok(Some(row.clone()))
        }

        async fn delete_for_owner(&self, id: Uuid, owner_id: &str) -> Result<bool, BkError> {
            self.delete_calls.fetch_add(1, Ordering::SeqCst);
            Self::check(&self.fail_deletes, "delete")?;

            let mut bookings = self.bookings.lock().await;
            let before = bookings.len();
            bookings.retain(|b| !(b.id == id && b.owner_id == owner_id));
            Ok(bookings.len() < before)
        }

        async fn find_expired(&self, now: DateTime<Utc>) -> Result<Vec<Booking>, BkError> {
            Self::check(&self.fail_reads, "read")?;
            let mut rows: Vec<Booking> = self
                .bookings
                .lock()
                .await
                .iter()
                .filter(|b| b.end_time < now)
                .cloned()
                .collect();
            rows.sort_by_key(|b| b.end_time);
            Ok(rows)
        }

        async fn delete_by_ids(
            &self,
            ids: &[Uuid],
            now: DateTime<Utc>,
        ) -> Result<Vec<Uuid>, BkError> {
            self.delete_calls.fetch_add(1, Ordering::SeqCst);
            Self::check(&self.fail_deletes, "delete")?;

            let mut bookings = self.bookings.lock().await;
            let mut deleted = Vec::new();
            bookings.retain(|b| {
                if ids.contains(&b.id) && b.end_time < now {
                    deleted.push(b.id);
                    false
                } else {
                    true
                }
            });
            Ok(deleted)
        }

        async fn ping(&self) -> Result<(), BkError> {
            Self::check(&self.fail_reads, "ping")
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::mock::InMemoryBookingStore;
    use super::*;
    use chrono::{TimeDelta, TimeZone};

    fn new_booking(owner: &str, start_hour: u32, hours: i64) -> NewBooking {
        let start = Utc.with_ymd_and_hms(2026, 10, 16, start_hour, 0, 0).unwrap();
        NewBooking {
            owner_id: owner.to_string(),
            location_id: "loc-1".to_string(),
            start_time: start,
            end_time: start + TimeDelta::hours(hours),
            street_address: None,
        }
    }

    #[tokio::test]
    async fn test_in_memory_scopes_by_owner() {
        let store = InMemoryBookingStore::new();
        let booking = store.insert(new_booking("alice", 10, 2)).await.unwrap();

        assert!(store
            .find_for_owner(booking.id, "alice")
            .await
            .unwrap()
            .is_some());
        assert!(store
            .find_for_owner(booking.id, "bob")
            .await
            .unwrap()
            .is_none());
        assert!(!store.delete_for_owner(booking.id, "bob").await.unwrap());
        assert!(store
            .extend_end_time(booking.id, "bob", 1)
            .await
            .unwrap()
            .is_none());
        assert!(store.delete_for_owner(booking.id, "alice").await.unwrap());
    }

    #[tokio::test]
    async fn test_in_memory_lists_by_start_time() {
        let store = InMemoryBookingStore::new();
        store.insert(new_booking("alice", 14, 1)).await.unwrap();
        store.insert(new_booking("alice", 9, 1)).await.unwrap();
        store.insert(new_booking("bob", 8, 1)).await.unwrap();

        let rows = store.list_for_owner("alice").await.unwrap();
        let hours: Vec<u32> = rows
            .iter()
            .map(|b| chrono::Timelike::hour(&b.start_time))
            .collect();
        assert_eq!(hours, vec![9, 14]);
    }

    #[tokio::test]
    async fn test_in_memory_extend_accumulates() {
        let store = InMemoryBookingStore::new();
        let booking = store.insert(new_booking("alice", 10, 2)).await.unwrap();

        store.extend_end_time(booking.id, "alice", 1).await.unwrap();
        let extended = store
            .extend_end_time(booking.id, "alice", 1)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(extended.end_time, booking.end_time + TimeDelta::hours(2));
    }

    #[tokio::test]
    async fn test_in_memory_expiry_and_batch_delete() {
        let store = InMemoryBookingStore::new();
        let early = store.insert(new_booking("alice", 1, 1)).await.unwrap();
        let late = store.insert(new_booking("alice", 20, 1)).await.unwrap();

        let now = Utc.with_ymd_and_hms(2026, 10, 16, 12, 0, 0).unwrap();
        let expired = store.find_expired(now).await.unwrap();
        assert_eq!(expired, vec![early.clone()]);

        let deleted = store
            .delete_by_ids(&[early.id, Uuid::new_v4()], now)
            .await
            .unwrap();
        assert_eq!(deleted, vec![early.id]);
        assert_eq!(store.snapshot().await, vec![late]);
    }

    #[tokio::test]
    async fn test_in_memory_batch_delete_skips_rows_no_longer_expired() {
        let store = InMemoryBookingStore::new();
        let booking = store.insert(new_booking("alice", 1, 1)).await.unwrap();
        let now = Utc.with_ymd_and_hms(2026, 10, 16, 12, 0, 0).unwrap();

        store.extend_end_time(booking.id, "alice", 48).await.unwrap();
        let deleted = store.delete_by_ids(&[booking.id], now).await.unwrap();

        assert!(deleted.is_empty());
        assert_eq!(store.snapshot().await.len(), 1);
    }

    #[tokio::test]
    async fn test_in_memory_end_time_equal_to_now_is_not_expired() {
        let store = InMemoryBookingStore::new();
        let booking = store.insert(new_booking("alice", 10, 2)).await.unwrap();

        assert!(store
            .find_expired(booking.end_time)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_in_memory_failure_injection() {
        let store = InMemoryBookingStore::new();

        store.set_fail_inserts(true);
        assert!(matches!(
            store.insert(new_booking("alice", 10, 1)).await,
            Err(BkError::Persistence(_))
        ));
        assert_eq!(store.insert_calls(), 1);

        store.set_fail_reads(true);
        assert!(store.ping().await.is_err());
    }
}
