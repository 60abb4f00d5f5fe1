use async_trait::async_trait;
use marina_core::CoreError;
use marina_shared::Cents;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{SplitKind, SplitRecord, SplitRule};

/// Running totals over completed settlements, for the finance dashboard.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SplitTotals {
    pub count: i64,
    pub platform_cents: Cents,
    pub merchant_cents: Cents,
    pub crew_cents: Cents,
}

#[async_trait]
pub trait LedgerRepository: Send + Sync {
    async fn active_rule(&self, kind: SplitKind) -> Result<Option<SplitRule>, CoreError>;

    /// Install a rule as the active policy for its kind, deactivating any
    /// previously active rule for that kind.
    async fn install_rule(&self, rule: &SplitRule) -> Result<SplitRule, CoreError>;

    async fn record_for(&self, kind: SplitKind, transaction_id: Uuid) -> Result<Option<SplitRecord>, CoreError>;

    /// Insert a record; uniqueness on `(kind, transaction_id)` makes this
    /// idempotent. If a record already exists for the pair, the existing
    /// one is returned unchanged.
    async fn insert_record(&self, record: SplitRecord) -> Result<SplitRecord, CoreError>;

    async fn list(
        &self,
        kind: Option<SplitKind>,
        merchant_id: Option<Uuid>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<SplitRecord>, CoreError>;

    async fn totals(&self, merchant_id: Option<Uuid>, crew_id: Option<Uuid>) -> Result<SplitTotals, CoreError>;
}
