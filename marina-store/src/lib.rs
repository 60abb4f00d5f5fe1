pub mod account_repo;
pub mod app_config;
pub mod booking_repo;
pub mod catalog_repo;
pub mod database;
pub mod ledger_repo;
pub mod notification_repo;
pub mod order_repo;
pub mod redis_repo;

pub use account_repo::PgAccountDirectory;
pub use app_config::{BusinessRules, Config};
pub use booking_repo::PgBookingRepository;
pub use catalog_repo::{PgBoatDirectory, PgProductDirectory};
pub use database::DbClient;
pub use ledger_repo::PgLedgerRepository;
pub use notification_repo::{InboxPublisher, NotificationHub, PgNotificationRepository};
pub use order_repo::{PgCartRepository, PgOrderRepository};
pub use redis_repo::RedisClient;
