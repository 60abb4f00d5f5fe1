pub mod events;
pub mod pii;
pub mod reference;

/// Monetary amounts are integer minor units (cents). No floats touch money.
pub type Cents = i64;

pub use events::{NotificationEvent, NotificationKind};
pub use pii::Masked;
