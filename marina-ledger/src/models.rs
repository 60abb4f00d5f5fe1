use chrono::{DateTime, Utc};
use marina_core::CoreError;
use marina_shared::Cents;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

/// Which kind of transaction a rule or record applies to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SplitKind {
    BookingService,
    ProductOrder,
}

impl SplitKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SplitKind::BookingService => "booking_service",
            SplitKind::ProductOrder => "product_order",
        }
    }
}

impl FromStr for SplitKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "booking_service" => Ok(SplitKind::BookingService),
            "product_order" => Ok(SplitKind::ProductOrder),
            other => Err(CoreError::Validation(format!("unknown split kind: {other}"))),
        }
    }
}

/// Named split policy: whole-percentage shares that must sum to exactly
/// 100. Exactly one rule per kind is active at a time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitRule {
    pub id: Uuid,
    pub kind: SplitKind,
    pub platform_pct: i32,
    pub merchant_pct: i32,
    pub crew_pct: i32,
    pub description: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl SplitRule {
    pub fn new(kind: SplitKind, platform_pct: i32, merchant_pct: i32, crew_pct: i32) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            platform_pct,
            merchant_pct,
            crew_pct,
            description: None,
            is_active: true,
            created_at: Utc::now(),
        }
    }

    /// Default policy for charter completions: 5% platform, 35% merchant,
    /// 60% crew.
    pub fn booking_default() -> Self {
        Self::new(SplitKind::BookingService, 5, 35, 60)
    }

    /// Default policy for product orders: 10% platform, 90% merchant.
    pub fn order_default() -> Self {
        Self::new(SplitKind::ProductOrder, 10, 90, 0)
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        for (name, pct) in [
            ("platform", self.platform_pct),
            ("merchant", self.merchant_pct),
            ("crew", self.crew_pct),
        ] {
            if !(0..=100).contains(&pct) {
                return Err(CoreError::Validation(format!(
                    "{name} percentage must be between 0 and 100, got {pct}"
                )));
            }
        }
        let total = self.platform_pct + self.merchant_pct + self.crew_pct;
        if total != 100 {
            return Err(CoreError::Validation(format!(
                "split percentages must sum to 100, got {total}"
            )));
        }
        Ok(())
    }
}

/// Immutable settlement record, created exactly once per completed booking
/// or paid order. The three shares always reconcile exactly against the
/// gross amount.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitRecord {
    pub id: Uuid,
    pub split_number: String,
    pub kind: SplitKind,
    pub transaction_id: Uuid,
    pub rule_id: Uuid,
    pub gross_cents: Cents,
    pub platform_cents: Cents,
    pub merchant_cents: Cents,
    pub crew_cents: Cents,
    pub merchant_id: Uuid,
    pub crew_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_rules_are_valid() {
        SplitRule::booking_default().validate().unwrap();
        SplitRule::order_default().validate().unwrap();
    }

    #[test]
    fn percentages_must_sum_to_one_hundred() {
        let rule = SplitRule::new(SplitKind::BookingService, 5, 35, 61);
        assert!(rule.validate().is_err());
    }

    #[test]
    fn negative_percentage_rejected() {
        let rule = SplitRule::new(SplitKind::ProductOrder, -10, 110, 0);
        assert!(rule.validate().is_err());
    }

    #[test]
    fn kind_round_trips_through_str() {
        assert_eq!(
            "booking_service".parse::<SplitKind>().unwrap(),
            SplitKind::BookingService
        );
        assert_eq!(SplitKind::ProductOrder.as_str(), "product_order");
    }
}
