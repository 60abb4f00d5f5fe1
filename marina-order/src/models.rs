use chrono::{DateTime, Utc};
use marina_core::CoreError;
use marina_shared::{reference, Cents};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

/// Order lifecycle: PendingPayment -> Paid -> Shipped -> Completed, with
/// Cancelled reachable from PendingPayment and Paid. Completed and
/// Cancelled are terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    PendingPayment,
    Paid,
    Shipped,
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::PendingPayment => "pending_payment",
            OrderStatus::Paid => "paid",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Cancelled)
    }
}

impl FromStr for OrderStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending_payment" => Ok(OrderStatus::PendingPayment),
            "paid" => Ok(OrderStatus::Paid),
            "shipped" => Ok(OrderStatus::Shipped),
            "completed" => Ok(OrderStatus::Completed),
            "cancelled" => Ok(OrderStatus::Cancelled),
            other => Err(CoreError::Validation(format!("unknown order status: {other}"))),
        }
    }
}

/// A storefront order for exactly one merchant. Line items snapshot the
/// unit price and product name at creation time and are never recomputed
/// from the live catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub order_number: String,
    pub user_id: Uuid,
    pub merchant_id: Uuid,
    pub status: OrderStatus,
    pub items: Vec<OrderItem>,
    pub subtotal_cents: Cents,
    pub shipping_fee_cents: Cents,
    pub total_cents: Cents,
    pub receiver_name: String,
    pub receiver_phone: String,
    pub receiver_address: String,
    pub user_notes: Option<String>,
    pub merchant_notes: Option<String>,
    pub cancel_reason: Option<String>,
    pub payment_reference: Option<String>,
    pub carrier: Option<String>,
    pub tracking_number: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl Order {
    pub fn new(user_id: Uuid, merchant_id: Uuid, shipping_fee_cents: Cents, shipping: ShippingDetails) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            order_number: reference::order_number(),
            user_id,
            merchant_id,
            status: OrderStatus::PendingPayment,
            items: Vec::new(),
            subtotal_cents: 0,
            shipping_fee_cents,
            total_cents: shipping_fee_cents,
            receiver_name: shipping.receiver_name,
            receiver_phone: shipping.receiver_phone,
            receiver_address: shipping.receiver_address,
            user_notes: shipping.user_notes,
            merchant_notes: None,
            cancel_reason: None,
            payment_reference: None,
            carrier: None,
            tracking_number: None,
            created_at: now,
            updated_at: now,
            paid_at: None,
            shipped_at: None,
            completed_at: None,
            cancelled_at: None,
        }
    }

    pub fn push_item(&mut self, item: OrderItem) {
        self.subtotal_cents += item.total_cents;
        self.total_cents = self.subtotal_cents + self.shipping_fee_cents;
        self.items.push(item);
    }
}

#[derive(Debug, Clone)]
pub struct ShippingDetails {
    pub receiver_name: String,
    pub receiver_phone: String,
    pub receiver_address: String,
    pub user_notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub unit: String,
    pub quantity: i32,
    pub unit_price_cents: Cents,
    pub total_cents: Cents,
}

impl OrderItem {
    pub fn snapshot(order_id: Uuid, product_id: Uuid, name: &str, unit: &str, quantity: i32, unit_price_cents: Cents) -> Self {
        Self {
            id: Uuid::new_v4(),
            order_id,
            product_id,
            product_name: name.to_string(),
            unit: unit.to_string(),
            quantity,
            unit_price_cents,
            total_cents: unit_price_cents * quantity as i64,
        }
    }
}

/// One user's saved cart line; repeated adds merge quantity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartItem {
    pub id: Uuid,
    pub user_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    pub created_at: DateTime<Utc>,
}

/// Post-completion product feedback, once per (order, product) by the
/// buyer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductReview {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub user_id: Uuid,
    pub rating: i32,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Storefront pricing rules: a flat shipping fee waived at the
/// free-shipping threshold.
#[derive(Debug, Clone, Copy)]
pub struct OrderPolicy {
    pub shipping_fee_cents: Cents,
    pub free_shipping_threshold_cents: Cents,
}

impl Default for OrderPolicy {
    fn default() -> Self {
        Self {
            shipping_fee_cents: 1000,
            free_shipping_threshold_cents: 10000,
        }
    }
}

impl OrderPolicy {
    pub fn shipping_fee_for(&self, subtotal_cents: Cents) -> Cents {
        if subtotal_cents >= self.free_shipping_threshold_cents {
            0
        } else {
            self.shipping_fee_cents
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shipping_fee_waived_at_threshold() {
        let policy = OrderPolicy::default();
        assert_eq!(policy.shipping_fee_for(9999), 1000);
        assert_eq!(policy.shipping_fee_for(10000), 0);
        assert_eq!(policy.shipping_fee_for(25000), 0);
    }

    #[test]
    fn order_totals_track_items() {
        let mut order = Order::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            1000,
            ShippingDetails {
                receiver_name: "Ada".into(),
                receiver_phone: "555-0100".into(),
                receiver_address: "1 Harbor Rd".into(),
                user_notes: None,
            },
        );
        order.push_item(OrderItem::snapshot(order.id, Uuid::new_v4(), "Olive oil", "bottle", 2, 1500));
        order.push_item(OrderItem::snapshot(order.id, Uuid::new_v4(), "Honey", "jar", 1, 800));
        assert_eq!(order.subtotal_cents, 3800);
        assert_eq!(order.total_cents, 4800);
        assert!(order.order_number.starts_with("OD"));
    }
}
