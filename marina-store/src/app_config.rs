use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub auth: AuthConfig,
    pub business_rules: BusinessRules,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BusinessRules {
    /// Pending bookings older than this are auto-cancelled by the sweep.
    #[serde(default = "default_confirm_timeout")]
    pub booking_confirm_timeout_minutes: i64,
    /// Fixed cadence of the background sweep.
    #[serde(default = "default_sweep_interval")]
    pub booking_sweep_interval_minutes: u64,
    /// Requesters may not cancel within this many hours of the start.
    #[serde(default = "default_cancel_cutoff")]
    pub booking_cancel_cutoff_hours: i64,
    #[serde(default = "default_shipping_fee")]
    pub shipping_fee_cents: i64,
    #[serde(default = "default_free_shipping_threshold")]
    pub free_shipping_threshold_cents: i64,
    #[serde(default = "default_rate_limit")]
    pub rate_limit_per_minute: i64,
}

fn default_confirm_timeout() -> i64 {
    20
}

fn default_sweep_interval() -> u64 {
    5
}

fn default_cancel_cutoff() -> i64 {
    2
}

fn default_shipping_fee() -> i64 {
    1000
}

fn default_free_shipping_threshold() -> i64 {
    10000
}

fn default_rate_limit() -> i64 {
    100
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_expiration_seconds: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RedisConfig {
    pub url: String,
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Local overrides, not checked in.
            .add_source(config::File::with_name("config/local").required(false))
            // MARINA__SERVER__PORT=9000 style environment overrides.
            .add_source(config::Environment::with_prefix("MARINA").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}

impl BusinessRules {
    pub fn booking_policy(&self) -> marina_booking::BookingPolicy {
        marina_booking::BookingPolicy {
            confirm_timeout_minutes: self.booking_confirm_timeout_minutes,
            cancel_cutoff_hours: self.booking_cancel_cutoff_hours,
        }
    }

    pub fn order_policy(&self) -> marina_order::OrderPolicy {
        marina_order::OrderPolicy {
            shipping_fee_cents: self.shipping_fee_cents,
            free_shipping_threshold_cents: self.free_shipping_threshold_cents,
        }
    }
}
