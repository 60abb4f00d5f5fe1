pub mod error;
pub mod identity;
pub mod notify;
pub mod payment;

pub use error::CoreError;
pub use identity::{AccountDirectory, Actor, CrewProfile, CrewStatus, MerchantProfile, MerchantStatus, Role};
pub use notify::{Notification, NotificationPublisher, NotificationRepository};
pub use payment::{PaymentAdapter, PaymentReceipt, PaymentStatus};
