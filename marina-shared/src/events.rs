use uuid::Uuid;

/// Lifecycle events fanned out to a single recipient's inbox and the
/// live stream. One event per recipient; publishing is fire-and-forget.
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct NotificationEvent {
    pub user_id: Uuid,
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
    pub related_id: Option<Uuid>,
    pub timestamp: i64,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    BookingCreated,
    BookingConfirmed,
    BookingCancelled,
    BookingCompleted,
    CrewAssigned,
    OrderCreated,
    OrderPaid,
    OrderShipped,
    OrderCancelled,
    OrderCompleted,
    SettlementRecorded,
    MerchantApproved,
    MerchantRejected,
    CrewApproved,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::BookingCreated => "booking_created",
            NotificationKind::BookingConfirmed => "booking_confirmed",
            NotificationKind::BookingCancelled => "booking_cancelled",
            NotificationKind::BookingCompleted => "booking_completed",
            NotificationKind::CrewAssigned => "crew_assigned",
            NotificationKind::OrderCreated => "order_created",
            NotificationKind::OrderPaid => "order_paid",
            NotificationKind::OrderShipped => "order_shipped",
            NotificationKind::OrderCancelled => "order_cancelled",
            NotificationKind::OrderCompleted => "order_completed",
            NotificationKind::SettlementRecorded => "settlement_recorded",
            NotificationKind::MerchantApproved => "merchant_approved",
            NotificationKind::MerchantRejected => "merchant_rejected",
            NotificationKind::CrewApproved => "crew_approved",
        }
    }

    /// Default inbox copy for each lifecycle event.
    pub fn template(&self) -> (&'static str, &'static str) {
        match self {
            NotificationKind::BookingCreated => (
                "Booking received",
                "A new charter booking is waiting for your confirmation",
            ),
            NotificationKind::BookingConfirmed => (
                "Booking confirmed",
                "The merchant confirmed your booking, see you on board",
            ),
            NotificationKind::BookingCancelled => ("Booking cancelled", "Your booking has been cancelled"),
            NotificationKind::BookingCompleted => (
                "Charter completed",
                "Your charter is complete, we would love to hear your feedback",
            ),
            NotificationKind::CrewAssigned => ("Crew assigned", "A crew member has been assigned to your booking"),
            NotificationKind::OrderCreated => ("Order placed", "Your order was created, complete payment to proceed"),
            NotificationKind::OrderPaid => ("Payment received", "The order has been paid and is ready to ship"),
            NotificationKind::OrderShipped => ("Order shipped", "Your order is on its way"),
            NotificationKind::OrderCancelled => ("Order cancelled", "The order has been cancelled"),
            NotificationKind::OrderCompleted => ("Order completed", "The buyer confirmed delivery of the order"),
            NotificationKind::SettlementRecorded => ("Settlement recorded", "A revenue split has been recorded"),
            NotificationKind::MerchantApproved => ("Application approved", "Your merchant application was approved"),
            NotificationKind::MerchantRejected => ("Application rejected", "Your merchant application was rejected"),
            NotificationKind::CrewApproved => ("Crew activated", "Your crew profile is now active"),
        }
    }
}

impl NotificationEvent {
    /// Build an event from the kind's stock template.
    pub fn templated(user_id: Uuid, kind: NotificationKind, related_id: Option<Uuid>, timestamp: i64) -> Self {
        let (title, body) = kind.template();
        Self {
            user_id,
            kind,
            title: title.to_string(),
            body: body.to_string(),
            related_id,
            timestamp,
        }
    }
}
