use chrono::{DateTime, Duration, Utc};
use marina_catalog::{pricing, BoatDirectory};
use marina_core::{AccountDirectory, Actor, CoreError, NotificationPublisher, PaymentAdapter};
use marina_ledger::{SettlementLedger, SplitKind};
use marina_shared::events::{NotificationEvent, NotificationKind};
use std::sync::Arc;
use uuid::Uuid;

use crate::access;
use crate::models::{Booking, BookingPolicy, BookingStatus, CrewRating, TimeWindow};
use crate::repository::BookingRepository;

#[derive(Debug, Clone)]
pub struct CreateBooking {
    pub boat_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub passenger_count: i32,
    pub contact_name: String,
    pub contact_phone: String,
    pub user_notes: Option<String>,
}

/// The Booking Engine: drives the lifecycle state machine over the
/// repository, with the guard check and the write applied as one atomic
/// unit against the record's current status.
pub struct BookingEngine {
    repo: Arc<dyn BookingRepository>,
    boats: Arc<dyn BoatDirectory>,
    accounts: Arc<dyn AccountDirectory>,
    ledger: Arc<SettlementLedger>,
    payments: Arc<dyn PaymentAdapter>,
    notifier: Arc<dyn NotificationPublisher>,
    pub(crate) policy: BookingPolicy,
}

impl BookingEngine {
    pub fn new(
        repo: Arc<dyn BookingRepository>,
        boats: Arc<dyn BoatDirectory>,
        accounts: Arc<dyn AccountDirectory>,
        ledger: Arc<SettlementLedger>,
        payments: Arc<dyn PaymentAdapter>,
        notifier: Arc<dyn NotificationPublisher>,
        policy: BookingPolicy,
    ) -> Self {
        Self {
            repo,
            boats,
            accounts,
            ledger,
            payments,
            notifier,
            policy,
        }
    }

    pub fn repo(&self) -> &Arc<dyn BookingRepository> {
        &self.repo
    }

    pub async fn create(&self, actor: &Actor, req: CreateBooking) -> Result<Booking, CoreError> {
        let window = TimeWindow::new(req.start_time, req.end_time)?;
        if window.start <= Utc::now() {
            return Err(CoreError::Validation("booking window must start in the future".into()));
        }

        let boat = self
            .boats
            .boat(req.boat_id)
            .await?
            .ok_or_else(|| CoreError::not_found("boat"))?;
        if !boat.is_bookable() {
            return Err(CoreError::Validation(format!(
                "boat is {} and cannot be booked",
                boat.status.as_str()
            )));
        }

        let merchant = self
            .accounts
            .merchant(boat.merchant_id)
            .await?
            .ok_or_else(|| CoreError::not_found("merchant"))?;
        if !merchant.is_active() {
            return Err(CoreError::Validation("the boat's merchant has not been approved".into()));
        }

        if req.passenger_count < 1 || req.passenger_count > boat.capacity {
            return Err(CoreError::Validation(format!(
                "passenger count must be between 1 and {}",
                boat.capacity
            )));
        }

        let total_cents = pricing::charter_amount_cents(boat.hourly_rate_cents, window.start, window.end);
        let booking = Booking::new(
            actor.user_id,
            boat.id,
            boat.merchant_id,
            window,
            req.passenger_count,
            boat.hourly_rate_cents,
            total_cents,
            req.contact_name,
            req.contact_phone,
            req.user_notes,
        );

        // Overlap is re-checked inside the repository's atomic unit; two
        // concurrent creates for intersecting windows cannot both land.
        let booking = self.repo.create(booking).await?;
        tracing::info!(booking_number = %booking.booking_number, boat_id = %booking.boat_id, "booking created");

        self.notify(merchant.user_id, NotificationKind::BookingCreated, booking.id).await;
        Ok(booking)
    }

    pub async fn confirm(
        &self,
        actor: &Actor,
        booking_id: Uuid,
        crew_id: Uuid,
        notes: Option<String>,
    ) -> Result<Booking, CoreError> {
        let booking = self.must_get(booking_id).await?;

        let merchant = self.accounts.merchant_of_user(actor.user_id).await?;
        if !access::can_confirm(merchant.as_ref(), &booking) {
            return Err(CoreError::Authorization("only the boat's merchant may confirm".into()));
        }

        let crew = self
            .accounts
            .crew(crew_id)
            .await?
            .ok_or_else(|| CoreError::not_found("crew"))?;
        if crew.merchant_id != booking.merchant_id || !crew.is_active() {
            return Err(CoreError::Validation(
                "crew member must be active and belong to this merchant".into(),
            ));
        }
        if self
            .repo
            .crew_has_conflict(crew.id, booking.window(), Some(booking.id))
            .await?
        {
            return Err(CoreError::Validation(
                "crew member already has an assignment in this window".into(),
            ));
        }

        let booking = self
            .repo
            .confirm(booking_id, crew.id, notes.as_deref(), Utc::now())
            .await?;
        tracing::info!(booking_number = %booking.booking_number, crew_id = %crew.id, "booking confirmed");

        self.notify(booking.user_id, NotificationKind::BookingConfirmed, booking.id).await;
        self.notify(booking.user_id, NotificationKind::CrewAssigned, booking.id).await;
        self.notify(crew.user_id, NotificationKind::CrewAssigned, booking.id).await;
        Ok(booking)
    }

    pub async fn cancel(&self, actor: &Actor, booking_id: Uuid, reason: Option<String>) -> Result<Booking, CoreError> {
        let booking = self.must_get(booking_id).await?;

        let merchant = self.accounts.merchant_of_user(actor.user_id).await?;
        if !access::can_cancel(actor, merchant.as_ref(), &booking) {
            return Err(CoreError::Authorization(
                "only the requester or the boat's merchant may cancel".into(),
            ));
        }

        let actor_is_requester = booking.user_id == actor.user_id;
        if actor_is_requester && !actor.is_admin() {
            let cutoff = Utc::now() + Duration::hours(self.policy.cancel_cutoff_hours);
            if booking.start_time <= cutoff {
                return Err(CoreError::Validation(format!(
                    "bookings cannot be cancelled within {} hours of the start",
                    self.policy.cancel_cutoff_hours
                )));
            }
        }

        let reason = reason.unwrap_or_else(|| {
            if actor_is_requester {
                "cancelled by requester".to_string()
            } else {
                "cancelled by merchant".to_string()
            }
        });

        let (booking, previous) = self
            .repo
            .cancel(
                booking_id,
                &[BookingStatus::Pending, BookingStatus::Confirmed],
                &reason,
                Utc::now(),
            )
            .await?;
        tracing::info!(booking_number = %booking.booking_number, from = previous.as_str(), "booking cancelled");

        // Confirmed charters may have captured payment; the refund is a
        // side-channel signal and its failure never blocks the cancel.
        if previous == BookingStatus::Confirmed {
            if let Err(err) = self
                .payments
                .refund(booking.id, booking.total_cents, &booking.booking_number)
                .await
            {
                tracing::warn!(booking_number = %booking.booking_number, %err, "refund signal failed");
            }
        }

        let counterpart = if actor_is_requester {
            self.accounts
                .merchant(booking.merchant_id)
                .await?
                .map(|m| m.user_id)
                .unwrap_or(booking.user_id)
        } else {
            booking.user_id
        };
        self.notify(counterpart, NotificationKind::BookingCancelled, booking.id).await;
        Ok(booking)
    }

    pub async fn complete(&self, actor: &Actor, booking_id: Uuid) -> Result<Booking, CoreError> {
        let booking = self.must_get(booking_id).await?;

        let crew = self.accounts.crew_of_user(actor.user_id).await?;
        if !access::can_complete(crew.as_ref(), &booking) {
            return Err(CoreError::Authorization(
                "only the assigned crew member may complete the charter".into(),
            ));
        }

        let booking = self.repo.complete(booking_id, Utc::now()).await?;
        tracing::info!(booking_number = %booking.booking_number, "booking completed");

        // Settlement failure is logged and left for manual reconciliation;
        // the completed transition is already committed and stays.
        match self
            .ledger
            .settle(
                SplitKind::BookingService,
                booking.id,
                booking.total_cents,
                booking.merchant_id,
                booking.assigned_crew_id,
            )
            .await
        {
            Ok(_) => {
                if let Ok(Some(merchant)) = self.accounts.merchant(booking.merchant_id).await {
                    self.notify(merchant.user_id, NotificationKind::SettlementRecorded, booking.id)
                        .await;
                }
            }
            Err(err) => {
                tracing::error!(booking_number = %booking.booking_number, %err, "booking settlement failed");
            }
        }

        self.notify(booking.user_id, NotificationKind::BookingCompleted, booking.id).await;
        Ok(booking)
    }

    pub async fn rate_crew(
        &self,
        actor: &Actor,
        booking_id: Uuid,
        rating: i32,
        comment: Option<String>,
    ) -> Result<CrewRating, CoreError> {
        if !(1..=5).contains(&rating) {
            return Err(CoreError::Validation("rating must be between 1 and 5".into()));
        }

        let booking = self.must_get(booking_id).await?;
        if !access::can_rate(actor, &booking) {
            return Err(CoreError::Authorization("only the requester may rate the crew".into()));
        }
        if booking.status != BookingStatus::Completed {
            return Err(CoreError::stale("booking", "rate", booking.status.as_str()));
        }
        let crew_id = booking
            .assigned_crew_id
            .ok_or_else(|| CoreError::Validation("booking has no assigned crew to rate".into()))?;

        let rating = self
            .repo
            .insert_rating(CrewRating {
                id: Uuid::new_v4(),
                booking_id,
                user_id: actor.user_id,
                crew_id,
                rating,
                comment,
                created_at: Utc::now(),
            })
            .await?;

        // Recompute the crew's running average; a directory failure here
        // loses nothing durable.
        let ratings = self.repo.ratings_for_crew(crew_id).await?;
        if !ratings.is_empty() {
            let average = ratings.iter().map(|r| r.rating as f64).sum::<f64>() / ratings.len() as f64;
            if let Err(err) = self.accounts.update_crew_rating(crew_id, average).await {
                tracing::warn!(%crew_id, %err, "failed to update crew average rating");
            }
        }
        Ok(rating)
    }

    /// Advisory availability probe for the storefront; the authoritative
    /// check runs inside `create`'s atomic unit.
    pub async fn check_availability(
        &self,
        boat_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<bool, CoreError> {
        let window = TimeWindow::new(start, end)?;
        let boat = self
            .boats
            .boat(boat_id)
            .await?
            .ok_or_else(|| CoreError::not_found("boat"))?;
        if !boat.is_bookable() {
            return Ok(false);
        }
        Ok(!self.repo.boat_has_conflict(boat_id, window, None).await?)
    }

    pub async fn get(&self, actor: &Actor, booking_id: Uuid) -> Result<Booking, CoreError> {
        let booking = self.must_get(booking_id).await?;
        let merchant = self.accounts.merchant_of_user(actor.user_id).await?;
        let crew = self.accounts.crew_of_user(actor.user_id).await?;
        let is_assigned_crew = crew
            .as_ref()
            .map_or(false, |c| booking.assigned_crew_id == Some(c.id));
        if !access::can_cancel(actor, merchant.as_ref(), &booking) && !is_assigned_crew {
            return Err(CoreError::Authorization("no access to this booking".into()));
        }
        Ok(booking)
    }

    pub async fn list_for_user(
        &self,
        actor: &Actor,
        status: Option<BookingStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Booking>, CoreError> {
        self.repo.list_for_user(actor.user_id, status, limit, offset).await
    }

    pub async fn list_for_merchant(
        &self,
        actor: &Actor,
        status: Option<BookingStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Booking>, CoreError> {
        let merchant = self
            .accounts
            .merchant_of_user(actor.user_id)
            .await?
            .ok_or_else(|| CoreError::Authorization("actor is not a merchant".into()))?;
        self.repo.list_for_merchant(merchant.id, status, limit, offset).await
    }

    pub(crate) async fn notify(&self, user_id: Uuid, kind: NotificationKind, related: Uuid) {
        self.notifier
            .publish(NotificationEvent::templated(
                user_id,
                kind,
                Some(related),
                Utc::now().timestamp(),
            ))
            .await;
    }

    async fn must_get(&self, booking_id: Uuid) -> Result<Booking, CoreError> {
        self.repo
            .get(booking_id)
            .await?
            .ok_or_else(|| CoreError::not_found("booking"))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use marina_catalog::{Boat, InMemoryBoatDirectory};
    use marina_core::identity::InMemoryAccountDirectory;
    use marina_core::notify::RecordingPublisher;
    use marina_core::payment::MockPaymentAdapter;
    use marina_core::{CrewStatus, MerchantStatus, Role};
    use marina_ledger::InMemoryLedgerRepository;
    use crate::InMemoryBookingRepository;

    pub(crate) struct Harness {
        pub engine: BookingEngine,
        pub repo: InMemoryBookingRepository,
        pub ledger: Arc<SettlementLedger>,
        pub events: Arc<RecordingPublisher>,
        pub user: Actor,
        pub merchant_actor: Actor,
        pub crew_actor: Actor,
        pub boat_id: Uuid,
        pub crew_id: Uuid,
    }

    pub(crate) async fn harness() -> Harness {
        let accounts = Arc::new(InMemoryAccountDirectory::new());
        let boats = InMemoryBoatDirectory::new();
        let repo = InMemoryBookingRepository::new();
        let ledger_repo = InMemoryLedgerRepository::with_default_rules().await;
        let ledger = Arc::new(SettlementLedger::new(Arc::new(ledger_repo)));
        let events = Arc::new(RecordingPublisher::new());

        let merchant_user = Uuid::new_v4();
        let merchant = accounts.apply_merchant(merchant_user, "Blue Bay Charters").await.unwrap();
        accounts
            .set_merchant_status(merchant.id, MerchantStatus::Active)
            .await
            .unwrap();

        let crew_user = Uuid::new_v4();
        let crew = accounts.add_crew(merchant.id, crew_user, "Skipper Lee").await.unwrap();
        accounts.set_crew_status(crew.id, CrewStatus::Active).await.unwrap();

        let boat = Boat::new(merchant.id, "Halcyon", 8, 10000);
        let boat_id = boat.id;
        boats.upsert(boat).await.unwrap();

        let engine = BookingEngine::new(
            Arc::new(repo.clone()),
            Arc::new(boats),
            accounts.clone(),
            ledger.clone(),
            Arc::new(MockPaymentAdapter),
            events.clone(),
            BookingPolicy::default(),
        );

        Harness {
            engine,
            repo,
            ledger,
            events,
            user: Actor::new(Uuid::new_v4(), Role::User),
            merchant_actor: Actor::new(merchant_user, Role::Merchant),
            crew_actor: Actor::new(crew_user, Role::Crew),
            boat_id,
            crew_id: crew.id,
        }
    }

    pub(crate) fn request(boat_id: Uuid, hours_from_now: i64, duration_hours: i64) -> CreateBooking {
        let start = Utc::now() + Duration::hours(hours_from_now);
        CreateBooking {
            boat_id,
            start_time: start,
            end_time: start + Duration::hours(duration_hours),
            passenger_count: 4,
            contact_name: "Ada".into(),
            contact_phone: "555-0100".into(),
            user_notes: None,
        }
    }

    #[tokio::test]
    async fn full_lifecycle_settles_five_thirtyfive_sixty() {
        let h = harness().await;

        let booking = h.engine.create(&h.user, request(h.boat_id, 3, 2)).await.unwrap();
        assert_eq!(booking.status, BookingStatus::Pending);
        assert_eq!(booking.total_cents, 20000);

        let booking = h
            .engine
            .confirm(&h.merchant_actor, booking.id, h.crew_id, None)
            .await
            .unwrap();
        assert_eq!(booking.status, BookingStatus::Confirmed);
        assert!(booking.confirmed_at.is_some());
        assert_eq!(booking.assigned_crew_id, Some(h.crew_id));

        let booking = h.engine.complete(&h.crew_actor, booking.id).await.unwrap();
        assert_eq!(booking.status, BookingStatus::Completed);

        let record = h
            .ledger
            .record_for(SplitKind::BookingService, booking.id)
            .await
            .unwrap()
            .expect("settlement recorded");
        assert_eq!(record.platform_cents, 1000);
        assert_eq!(record.merchant_cents, 7000);
        assert_eq!(record.crew_cents, 12000);
        assert_eq!(
            record.platform_cents + record.merchant_cents + record.crew_cents,
            booking.total_cents
        );
    }

    #[tokio::test]
    async fn overlapping_active_windows_conflict() {
        let h = harness().await;

        h.engine.create(&h.user, request(h.boat_id, 3, 2)).await.unwrap();
        let err = h
            .engine
            .create(&h.user, request(h.boat_id, 4, 2))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::OverlapConflict));
    }

    #[tokio::test]
    async fn cancelled_booking_frees_the_window() {
        let h = harness().await;

        let first = h.engine.create(&h.user, request(h.boat_id, 3, 2)).await.unwrap();
        h.engine.cancel(&h.user, first.id, None).await.unwrap();
        // Same window books fine once the first is cancelled.
        h.engine.create(&h.user, request(h.boat_id, 3, 2)).await.unwrap();
    }

    #[tokio::test]
    async fn adjacent_windows_do_not_conflict() {
        let h = harness().await;

        h.engine.create(&h.user, request(h.boat_id, 3, 2)).await.unwrap();
        // [t+5h, t+7h) touches [t+3h, t+5h) only at the boundary.
        h.engine.create(&h.user, request(h.boat_id, 5, 2)).await.unwrap();
    }

    #[tokio::test]
    async fn window_must_start_in_the_future() {
        let h = harness().await;
        let err = h
            .engine
            .create(&h.user, request(h.boat_id, -1, 2))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[tokio::test]
    async fn passenger_count_bounded_by_capacity() {
        let h = harness().await;
        let mut req = request(h.boat_id, 3, 2);
        req.passenger_count = 9;
        let err = h.engine.create(&h.user, req).await.unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[tokio::test]
    async fn only_merchant_confirms_and_crew_must_match() {
        let h = harness().await;
        let booking = h.engine.create(&h.user, request(h.boat_id, 3, 2)).await.unwrap();

        let err = h
            .engine
            .confirm(&h.user, booking.id, h.crew_id, None)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Authorization(_)));

        let err = h
            .engine
            .confirm(&h.merchant_actor, booking.id, Uuid::new_v4(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn crew_cannot_hold_two_confirmed_overlapping_assignments() {
        let h = harness().await;

        // Second boat for the same merchant so the boat overlap rule does
        // not interfere with the crew conflict under test.
        let merchant_id = {
            let booking = h.engine.create(&h.user, request(h.boat_id, 3, 2)).await.unwrap();
            h.engine
                .confirm(&h.merchant_actor, booking.id, h.crew_id, None)
                .await
                .unwrap();
            booking.merchant_id
        };

        let second_boat = Boat::new(merchant_id, "Second Wind", 6, 8000);
        let second_boat_id = second_boat.id;
        h.engine.boats.upsert(second_boat).await.unwrap();

        let other = h
            .engine
            .create(&h.user, request(second_boat_id, 3, 2))
            .await
            .unwrap();
        let err = h
            .engine
            .confirm(&h.merchant_actor, other.id, h.crew_id, None)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[tokio::test]
    async fn terminal_states_reject_every_transition() {
        let h = harness().await;
        let booking = h.engine.create(&h.user, request(h.boat_id, 3, 2)).await.unwrap();
        h.engine.cancel(&h.user, booking.id, None).await.unwrap();

        let err = h
            .engine
            .confirm(&h.merchant_actor, booking.id, h.crew_id, None)
            .await
            .unwrap_err();
        match err {
            CoreError::InvalidStateTransition { actual, .. } => assert_eq!(actual, "cancelled"),
            other => panic!("unexpected error: {other:?}"),
        }

        let err = h.engine.cancel(&h.merchant_actor, booking.id, None).await.unwrap_err();
        assert!(matches!(err, CoreError::InvalidStateTransition { .. }));
    }

    #[tokio::test]
    async fn requester_cancel_respects_two_hour_cutoff() {
        let h = harness().await;
        let booking = h.engine.create(&h.user, request(h.boat_id, 1, 2)).await.unwrap();

        let err = h.engine.cancel(&h.user, booking.id, None).await.unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));

        // The merchant is not subject to the cutoff.
        h.engine.cancel(&h.merchant_actor, booking.id, None).await.unwrap();
    }

    #[tokio::test]
    async fn completion_requires_the_assigned_crew() {
        let h = harness().await;
        let booking = h.engine.create(&h.user, request(h.boat_id, 3, 2)).await.unwrap();
        h.engine
            .confirm(&h.merchant_actor, booking.id, h.crew_id, None)
            .await
            .unwrap();

        let err = h.engine.complete(&h.user, booking.id).await.unwrap_err();
        assert!(matches!(err, CoreError::Authorization(_)));

        h.engine.complete(&h.crew_actor, booking.id).await.unwrap();
    }

    #[tokio::test]
    async fn rating_only_after_completion_and_only_once() {
        let h = harness().await;
        let booking = h.engine.create(&h.user, request(h.boat_id, 3, 2)).await.unwrap();
        h.engine
            .confirm(&h.merchant_actor, booking.id, h.crew_id, None)
            .await
            .unwrap();

        let err = h.engine.rate_crew(&h.user, booking.id, 5, None).await.unwrap_err();
        assert!(matches!(err, CoreError::InvalidStateTransition { .. }));

        h.engine.complete(&h.crew_actor, booking.id).await.unwrap();
        let rating = h
            .engine
            .rate_crew(&h.user, booking.id, 4, Some("smooth sailing".into()))
            .await
            .unwrap();
        assert_eq!(rating.rating, 4);

        let err = h.engine.rate_crew(&h.user, booking.id, 5, None).await.unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[tokio::test]
    async fn availability_probe_reflects_active_bookings() {
        let h = harness().await;
        let req = request(h.boat_id, 3, 2);
        assert!(h
            .engine
            .check_availability(h.boat_id, req.start_time, req.end_time)
            .await
            .unwrap());

        h.engine.create(&h.user, req.clone()).await.unwrap();
        assert!(!h
            .engine
            .check_availability(h.boat_id, req.start_time, req.end_time)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn lifecycle_publishes_notifications() {
        let h = harness().await;
        let booking = h.engine.create(&h.user, request(h.boat_id, 3, 2)).await.unwrap();
        h.engine
            .confirm(&h.merchant_actor, booking.id, h.crew_id, None)
            .await
            .unwrap();

        let events = h.events.events().await;
        assert!(events.iter().any(|e| e.kind == NotificationKind::BookingCreated));
        assert!(events
            .iter()
            .any(|e| e.kind == NotificationKind::BookingConfirmed && e.user_id == h.user.user_id));
    }
}
