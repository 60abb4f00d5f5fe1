use chrono::{Duration, Utc};
use marina_core::CoreError;
use marina_shared::events::NotificationKind;
use serde::Serialize;

use crate::engine::BookingEngine;
use crate::models::BookingStatus;

/// Result of one sweep pass over stale pending bookings.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct SweepOutcome {
    /// Pending bookings past the confirmation timeout at scan time.
    pub expired: usize,
    /// Successfully auto-cancelled this pass.
    pub cancelled: usize,
    /// Left the pending state between scan and cancel; nothing to do.
    pub skipped: usize,
    /// Storage failures; the affected bookings are retried next pass.
    pub failed: usize,
}

pub const AUTO_CANCEL_REASON: &str = "auto-cancelled: merchant did not confirm within the timeout";

impl BookingEngine {
    /// Cancel every Pending booking older than the confirmation timeout.
    /// Each match is handled independently; one failure never aborts the
    /// rest of the pass. Re-running with no newly aged bookings is a
    /// no-op.
    pub async fn sweep(&self) -> Result<SweepOutcome, CoreError> {
        let now = Utc::now();
        let cutoff = now - Duration::minutes(self.policy.confirm_timeout_minutes);
        let expired = self.repo().expired_pending(cutoff).await?;

        let mut outcome = SweepOutcome {
            expired: expired.len(),
            ..Default::default()
        };

        for booking_id in expired {
            match self
                .repo()
                .cancel(booking_id, &[BookingStatus::Pending], AUTO_CANCEL_REASON, now)
                .await
            {
                Ok((booking, _)) => {
                    outcome.cancelled += 1;
                    let waited = (now - booking.created_at).num_minutes();
                    tracing::info!(
                        booking_number = %booking.booking_number,
                        waited_minutes = waited,
                        "auto-cancelled unconfirmed booking"
                    );
                    self.notify(booking.user_id, NotificationKind::BookingCancelled, booking.id)
                        .await;
                }
                // Confirmed or cancelled since the scan; not a failure.
                Err(CoreError::InvalidStateTransition { .. }) | Err(CoreError::NotFound(_)) => {
                    outcome.skipped += 1;
                }
                Err(err) => {
                    outcome.failed += 1;
                    tracing::error!(%booking_id, %err, "failed to auto-cancel booking");
                }
            }
        }

        if outcome.cancelled > 0 {
            tracing::info!(cancelled = outcome.cancelled, "sweep pass complete");
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::tests::{harness, request};
    use crate::repository::BookingRepository;

    #[tokio::test]
    async fn sweep_cancels_only_bookings_past_the_timeout() {
        let h = harness().await;

        let stale = h.engine.create(&h.user, request(h.boat_id, 3, 2)).await.unwrap();
        let fresh = h.engine.create(&h.user, request(h.boat_id, 6, 2)).await.unwrap();
        h.repo
            .backdate_created(stale.id, Utc::now() - Duration::minutes(25))
            .await;

        let outcome = h.engine.sweep().await.unwrap();
        assert_eq!(outcome.expired, 1);
        assert_eq!(outcome.cancelled, 1);
        assert_eq!(outcome.failed, 0);

        let stale = h.repo.get(stale.id).await.unwrap().unwrap();
        assert_eq!(stale.status, BookingStatus::Cancelled);
        assert_eq!(stale.cancel_reason.as_deref(), Some(AUTO_CANCEL_REASON));

        let fresh = h.repo.get(fresh.id).await.unwrap().unwrap();
        assert_eq!(fresh.status, BookingStatus::Pending);
    }

    #[tokio::test]
    async fn sweep_twice_is_a_noop_the_second_time() {
        let h = harness().await;

        let booking = h.engine.create(&h.user, request(h.boat_id, 3, 2)).await.unwrap();
        h.repo
            .backdate_created(booking.id, Utc::now() - Duration::minutes(30))
            .await;

        let first = h.engine.sweep().await.unwrap();
        assert_eq!(first.cancelled, 1);

        let second = h.engine.sweep().await.unwrap();
        assert_eq!(second.expired, 0);
        assert_eq!(second.cancelled, 0);
    }

    #[tokio::test]
    async fn confirmed_bookings_are_never_swept() {
        let h = harness().await;

        let booking = h.engine.create(&h.user, request(h.boat_id, 3, 2)).await.unwrap();
        h.engine
            .confirm(&h.merchant_actor, booking.id, h.crew_id, None)
            .await
            .unwrap();
        h.repo
            .backdate_created(booking.id, Utc::now() - Duration::minutes(45))
            .await;

        let outcome = h.engine.sweep().await.unwrap();
        assert_eq!(outcome.expired, 0);
        assert_eq!(outcome.cancelled, 0);
    }

    #[tokio::test]
    async fn swept_booking_rejects_a_late_confirm() {
        let h = harness().await;

        let booking = h.engine.create(&h.user, request(h.boat_id, 3, 2)).await.unwrap();
        h.repo
            .backdate_created(booking.id, Utc::now() - Duration::minutes(25))
            .await;
        h.engine.sweep().await.unwrap();

        let err = h
            .engine
            .confirm(&h.merchant_actor, booking.id, h.crew_id, None)
            .await
            .unwrap_err();
        match err {
            CoreError::InvalidStateTransition { actual, .. } => assert_eq!(actual, "cancelled"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn boundary_booking_younger_than_timeout_survives() {
        let h = harness().await;

        let booking = h.engine.create(&h.user, request(h.boat_id, 3, 2)).await.unwrap();
        h.repo
            .backdate_created(booking.id, Utc::now() - Duration::minutes(19))
            .await;

        let outcome = h.engine.sweep().await.unwrap();
        assert_eq!(outcome.cancelled, 0);
        assert_eq!(
            h.repo.get(booking.id).await.unwrap().unwrap().status,
            BookingStatus::Pending
        );
    }
}
