use std::sync::Arc;

use chrono::{Duration, Utc};
use marina_booking::{BookingEngine, BookingPolicy, BookingStatus, CreateBooking, InMemoryBookingRepository};
use marina_catalog::{Boat, BoatDirectory, InMemoryBoatDirectory, InMemoryProductDirectory, Product, ProductDirectory};
use marina_core::identity::InMemoryAccountDirectory;
use marina_core::notify::InMemoryNotificationRepository;
use marina_core::payment::MockPaymentAdapter;
use marina_core::{AccountDirectory, Actor, CoreError, CrewStatus, MerchantStatus, NotificationRepository, Role};
use marina_ledger::{InMemoryLedgerRepository, SettlementLedger, SplitKind};
use marina_order::{InMemoryCartRepository, InMemoryOrderRepository, OrderEngine, OrderPolicy, ShippingDetails};
use marina_store::{InboxPublisher, NotificationHub};
use uuid::Uuid;

struct World {
    bookings: BookingEngine,
    orders: OrderEngine,
    booking_repo: InMemoryBookingRepository,
    ledger: Arc<SettlementLedger>,
    inbox: Arc<InMemoryNotificationRepository>,
    user: Actor,
    merchant_actor: Actor,
    crew_actor: Actor,
    boat_id: Uuid,
    crew_id: Uuid,
    oil_id: Uuid,
    honey_id: Uuid,
}

async fn world() -> World {
    let accounts = Arc::new(InMemoryAccountDirectory::new());
    let boats = InMemoryBoatDirectory::new();
    let products = InMemoryProductDirectory::new();
    let booking_repo = InMemoryBookingRepository::new();
    let order_repo = InMemoryOrderRepository::new(products.clone());
    let cart = InMemoryCartRepository::new();
    let ledger = Arc::new(SettlementLedger::new(Arc::new(
        InMemoryLedgerRepository::with_default_rules().await,
    )));

    let inbox = Arc::new(InMemoryNotificationRepository::new());
    let notifier = Arc::new(InboxPublisher::new(inbox.clone(), NotificationHub::default()));
    let payments = Arc::new(MockPaymentAdapter);

    let merchant_user = Uuid::new_v4();
    let merchant = accounts.apply_merchant(merchant_user, "Blue Bay Charters").await.unwrap();
    accounts
        .set_merchant_status(merchant.id, MerchantStatus::Active)
        .await
        .unwrap();

    let crew_user = Uuid::new_v4();
    let crew = accounts.add_crew(merchant.id, crew_user, "Skipper Lee").await.unwrap();
    accounts.set_crew_status(crew.id, CrewStatus::Active).await.unwrap();

    let boat = Boat::new(merchant.id, "Halcyon", 8, 20000);
    let boat_id = boat.id;
    boats.upsert(boat).await.unwrap();

    let oil = Product::new(merchant.id, "Olive oil", "bottle", 10000, 10);
    let honey = Product::new(merchant.id, "Honey", "jar", 5000, 5);
    let oil_id = oil.id;
    let honey_id = honey.id;
    products.upsert(oil).await.unwrap();
    products.upsert(honey).await.unwrap();

    let bookings = BookingEngine::new(
        Arc::new(booking_repo.clone()),
        Arc::new(boats),
        accounts.clone(),
        ledger.clone(),
        payments.clone(),
        notifier.clone(),
        BookingPolicy::default(),
    );

    let orders = OrderEngine::new(
        Arc::new(order_repo),
        Arc::new(cart),
        Arc::new(products),
        accounts.clone(),
        ledger.clone(),
        payments,
        notifier,
        OrderPolicy::default(),
    );

    World {
        bookings,
        orders,
        booking_repo,
        ledger,
        inbox,
        user: Actor::new(Uuid::new_v4(), Role::User),
        merchant_actor: Actor::new(merchant_user, Role::Merchant),
        crew_actor: Actor::new(crew_user, Role::Crew),
        boat_id,
        crew_id: crew.id,
        oil_id,
        honey_id,
    }
}

fn shipping() -> ShippingDetails {
    ShippingDetails {
        receiver_name: "Ada".into(),
        receiver_phone: "555-0100".into(),
        receiver_address: "1 Harbor Rd".into(),
        user_notes: None,
    }
}

#[tokio::test]
async fn booking_lifecycle_settles_exactly() {
    let w = world().await;

    // One-hour charter at 200.00/h.
    let start = Utc::now() + Duration::hours(10);
    let booking = w
        .bookings
        .create(
            &w.user,
            CreateBooking {
                boat_id: w.boat_id,
                start_time: start,
                end_time: start + Duration::hours(1),
                passenger_count: 4,
                contact_name: "Ada".into(),
                contact_phone: "555-0100".into(),
                user_notes: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(booking.total_cents, 20000);

    let booking = w
        .bookings
        .confirm(&w.merchant_actor, booking.id, w.crew_id, None)
        .await
        .unwrap();
    assert_eq!(booking.status, BookingStatus::Confirmed);

    let booking = w.bookings.complete(&w.crew_actor, booking.id).await.unwrap();
    assert_eq!(booking.status, BookingStatus::Completed);

    let record = w
        .ledger
        .record_for(SplitKind::BookingService, booking.id)
        .await
        .unwrap()
        .expect("booking settled");
    assert_eq!(record.platform_cents, 1000);
    assert_eq!(record.merchant_cents, 7000);
    assert_eq!(record.crew_cents, 12000);
    assert_eq!(
        record.platform_cents + record.merchant_cents + record.crew_cents,
        record.gross_cents
    );

    // The requester's inbox saw the confirmation and the completion.
    let inbox = w.inbox.list_for_user(w.user.user_id, false, 50, 0).await.unwrap();
    assert!(inbox.iter().any(|n| n.kind == "booking_confirmed"));
    assert!(inbox.iter().any(|n| n.kind == "booking_completed"));
}

#[tokio::test]
async fn order_payment_settles_ten_ninety() {
    let w = world().await;

    w.orders.add_to_cart(&w.user, w.oil_id, 1).await.unwrap();
    w.orders.add_to_cart(&w.user, w.honey_id, 1).await.unwrap();
    let item_ids: Vec<Uuid> = w
        .orders
        .cart_items(&w.user)
        .await
        .unwrap()
        .into_iter()
        .map(|i| i.id)
        .collect();

    let order = w.orders.create_from_cart(&w.user, item_ids, shipping()).await.unwrap();
    assert_eq!(order.total_cents, 15000);

    let order = w.orders.pay(&w.user, order.id).await.unwrap();

    let record = w
        .ledger
        .record_for(SplitKind::ProductOrder, order.id)
        .await
        .unwrap()
        .expect("order settled");
    assert_eq!(record.platform_cents, 1500);
    assert_eq!(record.merchant_cents, 13500);
    assert_eq!(record.crew_cents, 0);

    // Paying again is rejected with the precise current state.
    let err = w.orders.pay(&w.user, order.id).await.unwrap_err();
    match err {
        CoreError::InvalidStateTransition { actual, .. } => assert_eq!(actual, "paid"),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn stale_pending_booking_is_swept_and_stays_cancelled() {
    let w = world().await;

    let start = Utc::now() + Duration::hours(10);
    let booking = w
        .bookings
        .create(
            &w.user,
            CreateBooking {
                boat_id: w.boat_id,
                start_time: start,
                end_time: start + Duration::hours(2),
                passenger_count: 2,
                contact_name: "Ada".into(),
                contact_phone: "555-0100".into(),
                user_notes: None,
            },
        )
        .await
        .unwrap();

    // Twenty-five minutes with no merchant confirmation.
    w.booking_repo
        .backdate_created(booking.id, Utc::now() - Duration::minutes(25))
        .await;

    let outcome = w.bookings.sweep().await.unwrap();
    assert_eq!(outcome.cancelled, 1);

    let err = w
        .bookings
        .confirm(&w.merchant_actor, booking.id, w.crew_id, None)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::InvalidStateTransition { .. }));

    // Second pass has nothing left to do.
    let outcome = w.bookings.sweep().await.unwrap();
    assert_eq!(outcome.expired, 0);
    assert_eq!(outcome.cancelled, 0);
}

#[tokio::test]
async fn settlement_is_idempotent_across_manual_retry() {
    let w = world().await;

    let order = w.orders.create_direct(&w.user, w.oil_id, 1, shipping()).await.unwrap();
    let order = w.orders.pay(&w.user, order.id).await.unwrap();

    let first = w
        .ledger
        .record_for(SplitKind::ProductOrder, order.id)
        .await
        .unwrap()
        .unwrap();

    // Administrative re-settle after the fact returns the same record.
    let second = w
        .ledger
        .settle(
            SplitKind::ProductOrder,
            order.id,
            order.total_cents,
            order.merchant_id,
            None,
        )
        .await
        .unwrap();
    assert_eq!(first.id, second.id);
    assert_eq!(w.ledger.list(None, None, 100, 0).await.unwrap().len(), 1);
}
