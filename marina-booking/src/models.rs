use chrono::{DateTime, Utc};
use marina_core::CoreError;
use marina_shared::{reference, Cents};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

/// Booking lifecycle. Transitions are monotonic along a fixed graph:
/// Pending -> Confirmed -> Completed, with Cancelled reachable from
/// Pending and Confirmed. Completed and Cancelled are terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Completed => "completed",
            BookingStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, BookingStatus::Completed | BookingStatus::Cancelled)
    }

    /// Active bookings hold the boat's window; terminal ones never
    /// conflict.
    pub fn is_active(&self) -> bool {
        matches!(self, BookingStatus::Pending | BookingStatus::Confirmed)
    }
}

impl FromStr for BookingStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(BookingStatus::Pending),
            "confirmed" => Ok(BookingStatus::Confirmed),
            "completed" => Ok(BookingStatus::Completed),
            "cancelled" => Ok(BookingStatus::Cancelled),
            other => Err(CoreError::Validation(format!("unknown booking status: {other}"))),
        }
    }
}

/// Half-open interval `[start, end)`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, CoreError> {
        if end <= start {
            return Err(CoreError::Validation("window end must be after its start".into()));
        }
        Ok(Self { start, end })
    }

    /// Half-open overlap: `start_a < end_b && start_b < end_a`. Windows
    /// that merely touch do not conflict.
    pub fn overlaps(&self, other: &TimeWindow) -> bool {
        self.start < other.end && other.start < self.end
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub booking_number: String,
    pub user_id: Uuid,
    pub boat_id: Uuid,
    pub merchant_id: Uuid,
    pub assigned_crew_id: Option<Uuid>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub passenger_count: i32,
    pub hourly_rate_cents: Cents,
    pub total_cents: Cents,
    pub status: BookingStatus,
    pub contact_name: String,
    pub contact_phone: String,
    pub user_notes: Option<String>,
    pub merchant_notes: Option<String>,
    pub cancel_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl Booking {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        user_id: Uuid,
        boat_id: Uuid,
        merchant_id: Uuid,
        window: TimeWindow,
        passenger_count: i32,
        hourly_rate_cents: Cents,
        total_cents: Cents,
        contact_name: String,
        contact_phone: String,
        user_notes: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            booking_number: reference::booking_number(),
            user_id,
            boat_id,
            merchant_id,
            assigned_crew_id: None,
            start_time: window.start,
            end_time: window.end,
            passenger_count,
            hourly_rate_cents,
            total_cents,
            status: BookingStatus::Pending,
            contact_name,
            contact_phone,
            user_notes,
            merchant_notes: None,
            cancel_reason: None,
            created_at: now,
            updated_at: now,
            confirmed_at: None,
            completed_at: None,
            cancelled_at: None,
        }
    }

    pub fn window(&self) -> TimeWindow {
        TimeWindow {
            start: self.start_time,
            end: self.end_time,
        }
    }
}

/// Post-completion crew feedback, one per booking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrewRating {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub user_id: Uuid,
    pub crew_id: Uuid,
    pub rating: i32,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Tunable thresholds for the booking lifecycle.
#[derive(Debug, Clone, Copy)]
pub struct BookingPolicy {
    /// Pending bookings older than this are auto-cancelled by the sweep.
    pub confirm_timeout_minutes: i64,
    /// Requesters may not cancel within this many hours of the start.
    pub cancel_cutoff_hours: i64,
}

impl Default for BookingPolicy {
    fn default() -> Self {
        Self {
            confirm_timeout_minutes: 20,
            cancel_cutoff_hours: 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn half_open_windows_touching_do_not_overlap() {
        let base = Utc::now();
        let first = TimeWindow::new(base, base + Duration::hours(1)).unwrap();
        let second = TimeWindow::new(base + Duration::hours(1), base + Duration::hours(2)).unwrap();
        assert!(!first.overlaps(&second));
        assert!(!second.overlaps(&first));
    }

    #[test]
    fn partially_intersecting_windows_overlap() {
        let base = Utc::now();
        let first = TimeWindow::new(base, base + Duration::hours(2)).unwrap();
        let second = TimeWindow::new(base + Duration::hours(1), base + Duration::hours(3)).unwrap();
        assert!(first.overlaps(&second));
        assert!(second.overlaps(&first));
    }

    #[test]
    fn inverted_window_rejected() {
        let base = Utc::now();
        assert!(TimeWindow::new(base, base).is_err());
        assert!(TimeWindow::new(base, base - Duration::minutes(1)).is_err());
    }

    #[test]
    fn terminal_statuses_are_not_active() {
        assert!(BookingStatus::Pending.is_active());
        assert!(BookingStatus::Confirmed.is_active());
        assert!(!BookingStatus::Completed.is_active());
        assert!(!BookingStatus::Cancelled.is_active());
        assert!(BookingStatus::Completed.is_terminal());
        assert!(BookingStatus::Cancelled.is_terminal());
    }
}
