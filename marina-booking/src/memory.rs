use async_trait::async_trait;
use chrono::{DateTime, Utc};
use marina_core::CoreError;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::{Booking, BookingStatus, CrewRating, TimeWindow};
use crate::repository::BookingRepository;

/// In-memory booking repository for tests and local development. The
/// write lock makes each method one atomic unit, matching the transaction
/// scope the Postgres implementation uses.
#[derive(Default, Clone)]
pub struct InMemoryBookingRepository {
    bookings: Arc<RwLock<HashMap<Uuid, Booking>>>,
    ratings: Arc<RwLock<HashMap<Uuid, CrewRating>>>,
}

impl InMemoryBookingRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rewrite a booking's creation time; sweep tests age bookings with
    /// this instead of sleeping.
    pub async fn backdate_created(&self, id: Uuid, created_at: DateTime<Utc>) {
        if let Some(booking) = self.bookings.write().await.get_mut(&id) {
            booking.created_at = created_at;
        }
    }
}

fn stale(event: &'static str, actual: BookingStatus) -> CoreError {
    CoreError::stale("booking", event, actual.as_str())
}

#[async_trait]
impl BookingRepository for InMemoryBookingRepository {
    async fn create(&self, booking: Booking) -> Result<Booking, CoreError> {
        let mut bookings = self.bookings.write().await;
        let window = booking.window();
        let conflict = bookings
            .values()
            .any(|b| b.boat_id == booking.boat_id && b.status.is_active() && b.window().overlaps(&window));
        if conflict {
            return Err(CoreError::OverlapConflict);
        }
        bookings.insert(booking.id, booking.clone());
        Ok(booking)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Booking>, CoreError> {
        Ok(self.bookings.read().await.get(&id).cloned())
    }

    async fn confirm(
        &self,
        id: Uuid,
        crew_id: Uuid,
        notes: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Booking, CoreError> {
        let mut bookings = self.bookings.write().await;
        let booking = bookings.get_mut(&id).ok_or_else(|| CoreError::not_found("booking"))?;
        if booking.status != BookingStatus::Pending {
            return Err(stale("confirm", booking.status));
        }
        booking.status = BookingStatus::Confirmed;
        booking.assigned_crew_id = Some(crew_id);
        if let Some(notes) = notes {
            booking.merchant_notes = Some(notes.to_string());
        }
        booking.confirmed_at = Some(now);
        booking.updated_at = now;
        Ok(booking.clone())
    }

    async fn cancel(
        &self,
        id: Uuid,
        expected: &[BookingStatus],
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<(Booking, BookingStatus), CoreError> {
        let mut bookings = self.bookings.write().await;
        let booking = bookings.get_mut(&id).ok_or_else(|| CoreError::not_found("booking"))?;
        if !expected.contains(&booking.status) {
            return Err(stale("cancel", booking.status));
        }
        let previous = booking.status;
        booking.status = BookingStatus::Cancelled;
        booking.cancel_reason = Some(reason.to_string());
        booking.cancelled_at = Some(now);
        booking.updated_at = now;
        Ok((booking.clone(), previous))
    }

    async fn complete(&self, id: Uuid, now: DateTime<Utc>) -> Result<Booking, CoreError> {
        let mut bookings = self.bookings.write().await;
        let booking = bookings.get_mut(&id).ok_or_else(|| CoreError::not_found("booking"))?;
        if booking.status != BookingStatus::Confirmed {
            return Err(stale("complete", booking.status));
        }
        booking.status = BookingStatus::Completed;
        booking.completed_at = Some(now);
        booking.updated_at = now;
        Ok(booking.clone())
    }

    async fn expired_pending(&self, cutoff: DateTime<Utc>) -> Result<Vec<Uuid>, CoreError> {
        let bookings = self.bookings.read().await;
        let mut expired: Vec<&Booking> = bookings
            .values()
            .filter(|b| b.status == BookingStatus::Pending && b.created_at <= cutoff)
            .collect();
        expired.sort_by_key(|b| b.created_at);
        Ok(expired.into_iter().map(|b| b.id).collect())
    }

    async fn boat_has_conflict(
        &self,
        boat_id: Uuid,
        window: TimeWindow,
        exclude: Option<Uuid>,
    ) -> Result<bool, CoreError> {
        Ok(self.bookings.read().await.values().any(|b| {
            b.boat_id == boat_id
                && Some(b.id) != exclude
                && b.status.is_active()
                && b.window().overlaps(&window)
        }))
    }

    async fn crew_has_conflict(
        &self,
        crew_id: Uuid,
        window: TimeWindow,
        exclude: Option<Uuid>,
    ) -> Result<bool, CoreError> {
        Ok(self.bookings.read().await.values().any(|b| {
            b.assigned_crew_id == Some(crew_id)
                && Some(b.id) != exclude
                && b.status == BookingStatus::Confirmed
                && b.window().overlaps(&window)
        }))
    }

    async fn list_for_user(
        &self,
        user_id: Uuid,
        status: Option<BookingStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Booking>, CoreError> {
        let bookings = self.bookings.read().await;
        let mut matching: Vec<Booking> = bookings
            .values()
            .filter(|b| b.user_id == user_id)
            .filter(|b| status.map_or(true, |s| b.status == s))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(matching
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn list_for_merchant(
        &self,
        merchant_id: Uuid,
        status: Option<BookingStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Booking>, CoreError> {
        let bookings = self.bookings.read().await;
        let mut matching: Vec<Booking> = bookings
            .values()
            .filter(|b| b.merchant_id == merchant_id)
            .filter(|b| status.map_or(true, |s| b.status == s))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(matching
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn insert_rating(&self, rating: CrewRating) -> Result<CrewRating, CoreError> {
        let mut ratings = self.ratings.write().await;
        if ratings.contains_key(&rating.booking_id) {
            return Err(CoreError::Validation("booking has already been rated".into()));
        }
        ratings.insert(rating.booking_id, rating.clone());
        Ok(rating)
    }

    async fn rating_for_booking(&self, booking_id: Uuid) -> Result<Option<CrewRating>, CoreError> {
        Ok(self.ratings.read().await.get(&booking_id).cloned())
    }

    async fn ratings_for_crew(&self, crew_id: Uuid) -> Result<Vec<CrewRating>, CoreError> {
        Ok(self
            .ratings
            .read()
            .await
            .values()
            .filter(|r| r.crew_id == crew_id)
            .cloned()
            .collect())
    }
}
