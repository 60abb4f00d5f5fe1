use std::net::SocketAddr;
use std::sync::Arc;

use marina_api::{app, worker, AppState, AuthConfig};
use marina_booking::BookingEngine;
use marina_core::payment::MockPaymentAdapter;
use marina_ledger::SettlementLedger;
use marina_order::OrderEngine;
use marina_store::{
    DbClient, InboxPublisher, NotificationHub, PgAccountDirectory, PgBoatDirectory, PgBookingRepository,
    PgCartRepository, PgLedgerRepository, PgNotificationRepository, PgOrderRepository, PgProductDirectory,
    RedisClient,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "marina_api=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = marina_store::Config::load().expect("Failed to load config");
    tracing::info!("Starting Marina API on port {}", config.server.port);

    let db = DbClient::new(&config.database.url)
        .await
        .expect("Failed to connect to Postgres");
    db.migrate().await.expect("Failed to run migrations");

    let redis = Arc::new(
        RedisClient::new(&config.redis.url)
            .await
            .expect("Failed to connect to Redis"),
    );

    let accounts = Arc::new(PgAccountDirectory::new(db.pool.clone()));
    let boats = Arc::new(PgBoatDirectory::new(db.pool.clone()));
    let products = Arc::new(PgProductDirectory::new(db.pool.clone()));
    let notifications = Arc::new(PgNotificationRepository::new(db.pool.clone()));

    let hub = NotificationHub::default();
    let notifier = Arc::new(InboxPublisher::new(notifications.clone(), hub.clone()));
    let payments = Arc::new(MockPaymentAdapter);

    let ledger = Arc::new(SettlementLedger::new(Arc::new(PgLedgerRepository::new(db.pool.clone()))));

    let bookings = Arc::new(BookingEngine::new(
        Arc::new(PgBookingRepository::new(db.pool.clone())),
        boats.clone(),
        accounts.clone(),
        ledger.clone(),
        payments.clone(),
        notifier.clone(),
        config.business_rules.booking_policy(),
    ));

    let orders = Arc::new(OrderEngine::new(
        Arc::new(PgOrderRepository::new(db.pool.clone())),
        Arc::new(PgCartRepository::new(db.pool.clone())),
        products.clone(),
        accounts.clone(),
        ledger.clone(),
        payments,
        notifier.clone(),
        config.business_rules.order_policy(),
    ));

    // Independent background task; shares nothing with request handling
    // but the engine.
    tokio::spawn(worker::start_booking_sweeper(
        bookings.clone(),
        config.business_rules.booking_sweep_interval_minutes,
    ));

    let state = AppState {
        redis,
        bookings,
        orders,
        ledger,
        accounts,
        boats,
        products,
        notifications,
        notifier,
        hub,
        auth: AuthConfig {
            secret: config.auth.jwt_secret.clone(),
            expiration: config.auth.jwt_expiration_seconds,
        },
        rules: config.business_rules.clone(),
    };

    let app = app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.expect("Failed to bind");
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .await
        .expect("Server error");
}
