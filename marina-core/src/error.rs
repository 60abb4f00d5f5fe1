use uuid::Uuid;

/// Discriminated error for every core operation. The routing layer maps
/// variants to HTTP status codes; nothing in the engines returns a bare
/// string failure.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("not allowed: {0}")]
    Authorization(String),

    /// Guard failed or the stored status no longer matches the expected
    /// pre-state. Carries the actual status so clients get a precise
    /// "already in state X" message and can retry idempotently.
    #[error("{entity} is already {actual}, cannot {event}")]
    InvalidStateTransition {
        entity: &'static str,
        event: &'static str,
        actual: String,
    },

    #[error("requested window overlaps an active booking for this boat")]
    OverlapConflict,

    #[error("insufficient stock for product {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: Uuid,
        requested: i32,
        available: i32,
    },

    #[error("no active split rule for {0}")]
    NoActiveRule(String),

    #[error("{0}")]
    Validation(String),

    #[error("storage failure: {0}")]
    Storage(String),
}

impl CoreError {
    pub fn not_found(entity: impl Into<String>) -> Self {
        CoreError::NotFound(entity.into())
    }

    pub fn storage(err: impl std::fmt::Display) -> Self {
        CoreError::Storage(err.to_string())
    }

    pub fn stale(entity: &'static str, event: &'static str, actual: impl Into<String>) -> Self {
        CoreError::InvalidStateTransition {
            entity,
            event,
            actual: actual.into(),
        }
    }
}
