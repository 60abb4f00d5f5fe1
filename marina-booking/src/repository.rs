use async_trait::async_trait;
use chrono::{DateTime, Utc};
use marina_core::CoreError;
use uuid::Uuid;

use crate::models::{Booking, BookingStatus, CrewRating, TimeWindow};

/// Data access for bookings. Every transition method is a compare-and-set
/// against the stored status: the write happens only if the record is
/// still in the expected pre-state, otherwise the typed stale-state error
/// carries the actual current status. `create` evaluates the overlap check
/// and the insert as one atomic unit.
#[async_trait]
pub trait BookingRepository: Send + Sync {
    /// Insert a new pending booking; fails with `OverlapConflict` if an
    /// active booking for the same boat intersects the window.
    async fn create(&self, booking: Booking) -> Result<Booking, CoreError>;

    async fn get(&self, id: Uuid) -> Result<Option<Booking>, CoreError>;

    /// Pending -> Confirmed, assigning the crew member and stamping
    /// `confirmed_at`.
    async fn confirm(
        &self,
        id: Uuid,
        crew_id: Uuid,
        notes: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Booking, CoreError>;

    /// Transition to Cancelled from any of `expected`; returns the updated
    /// booking and the status it left.
    async fn cancel(
        &self,
        id: Uuid,
        expected: &[BookingStatus],
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<(Booking, BookingStatus), CoreError>;

    /// Confirmed -> Completed, stamping `completed_at`.
    async fn complete(&self, id: Uuid, now: DateTime<Utc>) -> Result<Booking, CoreError>;

    /// Ids of Pending bookings created at or before `cutoff`, oldest
    /// first; the sweep cancels each independently.
    async fn expired_pending(&self, cutoff: DateTime<Utc>) -> Result<Vec<Uuid>, CoreError>;

    /// Does any active booking for this boat intersect the window?
    async fn boat_has_conflict(
        &self,
        boat_id: Uuid,
        window: TimeWindow,
        exclude: Option<Uuid>,
    ) -> Result<bool, CoreError>;

    /// Is this crew member already assigned to a confirmed booking
    /// intersecting the window?
    async fn crew_has_conflict(
        &self,
        crew_id: Uuid,
        window: TimeWindow,
        exclude: Option<Uuid>,
    ) -> Result<bool, CoreError>;

    async fn list_for_user(
        &self,
        user_id: Uuid,
        status: Option<BookingStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Booking>, CoreError>;

    async fn list_for_merchant(
        &self,
        merchant_id: Uuid,
        status: Option<BookingStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Booking>, CoreError>;

    /// One rating per booking; a duplicate insert is rejected.
    async fn insert_rating(&self, rating: CrewRating) -> Result<CrewRating, CoreError>;

    async fn rating_for_booking(&self, booking_id: Uuid) -> Result<Option<CrewRating>, CoreError>;

    async fn ratings_for_crew(&self, crew_id: Uuid) -> Result<Vec<CrewRating>, CoreError>;
}
