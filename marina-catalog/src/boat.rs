use async_trait::async_trait;
use chrono::{DateTime, Utc};
use marina_core::CoreError;
use marina_shared::Cents;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BoatStatus {
    Available,
    Maintenance,
    Retired,
}

impl BoatStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BoatStatus::Available => "available",
            BoatStatus::Maintenance => "maintenance",
            BoatStatus::Retired => "retired",
        }
    }
}

impl FromStr for BoatStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "available" => Ok(BoatStatus::Available),
            "maintenance" => Ok(BoatStatus::Maintenance),
            "retired" => Ok(BoatStatus::Retired),
            other => Err(CoreError::Validation(format!("unknown boat status: {other}"))),
        }
    }
}

/// A charterable boat. Bookings may only be created against `Available`
/// boats whose merchant has been approved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Boat {
    pub id: Uuid,
    pub merchant_id: Uuid,
    pub name: String,
    pub capacity: i32,
    pub hourly_rate_cents: Cents,
    pub status: BoatStatus,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Boat {
    pub fn new(merchant_id: Uuid, name: &str, capacity: i32, hourly_rate_cents: Cents) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            merchant_id,
            name: name.to_string(),
            capacity,
            hourly_rate_cents,
            status: BoatStatus::Available,
            description: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_bookable(&self) -> bool {
        self.status == BoatStatus::Available
    }
}

#[async_trait]
pub trait BoatDirectory: Send + Sync {
    async fn boat(&self, id: Uuid) -> Result<Option<Boat>, CoreError>;
    async fn upsert(&self, boat: Boat) -> Result<Boat, CoreError>;
    async fn list_for_merchant(&self, merchant_id: Uuid) -> Result<Vec<Boat>, CoreError>;
    async fn set_status(&self, id: Uuid, status: BoatStatus) -> Result<Boat, CoreError>;
}
