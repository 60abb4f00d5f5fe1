use marina_booking::BookingEngine;
use marina_catalog::{BoatDirectory, ProductDirectory};
use marina_core::{AccountDirectory, NotificationPublisher, NotificationRepository};
use marina_ledger::SettlementLedger;
use marina_order::OrderEngine;
use marina_store::{BusinessRules, NotificationHub, RedisClient};
use std::sync::Arc;

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
    pub expiration: u64,
}

#[derive(Clone)]
pub struct AppState {
    pub redis: Arc<RedisClient>,
    pub bookings: Arc<BookingEngine>,
    pub orders: Arc<OrderEngine>,
    pub ledger: Arc<SettlementLedger>,
    pub accounts: Arc<dyn AccountDirectory>,
    pub boats: Arc<dyn BoatDirectory>,
    pub products: Arc<dyn ProductDirectory>,
    pub notifications: Arc<dyn NotificationRepository>,
    pub notifier: Arc<dyn NotificationPublisher>,
    pub hub: NotificationHub,
    pub auth: AuthConfig,
    pub rules: BusinessRules,
}
