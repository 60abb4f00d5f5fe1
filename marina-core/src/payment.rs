use async_trait::async_trait;
use chrono::{DateTime, Utc};
use marina_shared::{reference, Cents};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CoreError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentReceipt {
    pub reference: String,
    pub transaction_id: Uuid,
    pub amount_cents: Cents,
    pub status: PaymentStatus,
    pub created_at: DateTime<Utc>,
}

/// Payment processor seam. Charges back order payments; refunds are a
/// side-channel signal on cancellation of captured transactions, and a
/// refund failure never blocks the state transition that triggered it.
#[async_trait]
pub trait PaymentAdapter: Send + Sync {
    async fn charge(&self, transaction_id: Uuid, amount_cents: Cents) -> Result<PaymentReceipt, CoreError>;

    async fn refund(&self, transaction_id: Uuid, amount_cents: Cents, reference: &str) -> Result<(), CoreError>;
}

/// Adapter that always succeeds, for tests and local development.
pub struct MockPaymentAdapter;

#[async_trait]
impl PaymentAdapter for MockPaymentAdapter {
    async fn charge(&self, transaction_id: Uuid, amount_cents: Cents) -> Result<PaymentReceipt, CoreError> {
        Ok(PaymentReceipt {
            reference: reference::payment_number(),
            transaction_id,
            amount_cents,
            status: PaymentStatus::Succeeded,
            created_at: Utc::now(),
        })
    }

    async fn refund(&self, transaction_id: Uuid, amount_cents: Cents, reference: &str) -> Result<(), CoreError> {
        tracing::info!(%transaction_id, amount_cents, reference, "mock refund issued");
        Ok(())
    }
}
