use chrono::Utc;
use marina_core::CoreError;
use marina_shared::{reference, Cents};
use std::sync::Arc;
use uuid::Uuid;

use crate::models::{SplitKind, SplitRecord, SplitRule};
use crate::repository::{LedgerRepository, SplitTotals};
use crate::rules::split_amounts;

/// The Split-Payment Ledger. `settle` is idempotent per
/// `(kind, transaction_id)` and is never retried automatically: callers
/// log a failure and leave the record for manual reconciliation via a
/// later re-invocation.
pub struct SettlementLedger {
    repo: Arc<dyn LedgerRepository>,
}

impl SettlementLedger {
    pub fn new(repo: Arc<dyn LedgerRepository>) -> Self {
        Self { repo }
    }

    pub async fn settle(
        &self,
        kind: SplitKind,
        transaction_id: Uuid,
        gross_cents: Cents,
        merchant_id: Uuid,
        crew_id: Option<Uuid>,
    ) -> Result<SplitRecord, CoreError> {
        if gross_cents < 0 {
            return Err(CoreError::Validation(format!(
                "gross amount must not be negative, got {gross_cents}"
            )));
        }

        // A second call for the same transaction returns the existing
        // record rather than creating a duplicate.
        if let Some(existing) = self.repo.record_for(kind, transaction_id).await? {
            tracing::debug!(kind = kind.as_str(), %transaction_id, "settlement already recorded");
            return Ok(existing);
        }

        let rule = self
            .repo
            .active_rule(kind)
            .await?
            .ok_or_else(|| CoreError::NoActiveRule(kind.as_str().to_string()))?;

        let (platform_cents, merchant_cents, crew_cents) = split_amounts(gross_cents, &rule, crew_id.is_some());

        let record = SplitRecord {
            id: Uuid::new_v4(),
            split_number: reference::split_number(),
            kind,
            transaction_id,
            rule_id: rule.id,
            gross_cents,
            platform_cents,
            merchant_cents,
            crew_cents,
            merchant_id,
            crew_id,
            created_at: Utc::now(),
        };

        // The unique (kind, transaction_id) constraint resolves the race
        // between two concurrent settles: the loser gets the winner's row.
        let stored = self.repo.insert_record(record).await?;
        tracing::info!(
            split_number = %stored.split_number,
            kind = kind.as_str(),
            %transaction_id,
            gross_cents,
            "settlement recorded"
        );
        Ok(stored)
    }

    pub async fn record_for(&self, kind: SplitKind, transaction_id: Uuid) -> Result<Option<SplitRecord>, CoreError> {
        self.repo.record_for(kind, transaction_id).await
    }

    pub async fn install_rule(&self, rule: &SplitRule) -> Result<SplitRule, CoreError> {
        self.repo.install_rule(rule).await
    }

    pub async fn list(
        &self,
        kind: Option<SplitKind>,
        merchant_id: Option<Uuid>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<SplitRecord>, CoreError> {
        self.repo.list(kind, merchant_id, limit, offset).await
    }

    pub async fn totals(&self, merchant_id: Option<Uuid>, crew_id: Option<Uuid>) -> Result<SplitTotals, CoreError> {
        self.repo.totals(merchant_id, crew_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryLedgerRepository;
    use crate::models::SplitRule;

    async fn ledger_with_defaults() -> SettlementLedger {
        let repo = InMemoryLedgerRepository::new();
        repo.install_rule(&SplitRule::booking_default()).await.unwrap();
        repo.install_rule(&SplitRule::order_default()).await.unwrap();
        SettlementLedger::new(Arc::new(repo))
    }

    #[tokio::test]
    async fn booking_settlement_splits_exactly() {
        let ledger = ledger_with_defaults().await;
        let merchant = Uuid::new_v4();
        let crew = Uuid::new_v4();

        let record = ledger
            .settle(SplitKind::BookingService, Uuid::new_v4(), 20000, merchant, Some(crew))
            .await
            .unwrap();

        assert_eq!(record.platform_cents, 1000);
        assert_eq!(record.merchant_cents, 7000);
        assert_eq!(record.crew_cents, 12000);
        assert_eq!(
            record.platform_cents + record.merchant_cents + record.crew_cents,
            record.gross_cents
        );
        assert!(record.split_number.starts_with("SP"));
    }

    #[tokio::test]
    async fn settle_is_idempotent_per_transaction() {
        let ledger = ledger_with_defaults().await;
        let transaction_id = Uuid::new_v4();
        let merchant = Uuid::new_v4();

        let first = ledger
            .settle(SplitKind::ProductOrder, transaction_id, 15000, merchant, None)
            .await
            .unwrap();
        let second = ledger
            .settle(SplitKind::ProductOrder, transaction_id, 15000, merchant, None)
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(first.split_number, second.split_number);
        assert_eq!(ledger.list(None, None, 100, 0).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn missing_rule_surfaces_typed_error() {
        let repo = InMemoryLedgerRepository::new();
        let ledger = SettlementLedger::new(Arc::new(repo));

        let err = ledger
            .settle(SplitKind::BookingService, Uuid::new_v4(), 1000, Uuid::new_v4(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::NoActiveRule(_)));
    }

    #[tokio::test]
    async fn totals_accumulate_per_merchant() {
        let ledger = ledger_with_defaults().await;
        let merchant_a = Uuid::new_v4();
        let merchant_b = Uuid::new_v4();

        ledger
            .settle(SplitKind::ProductOrder, Uuid::new_v4(), 10000, merchant_a, None)
            .await
            .unwrap();
        ledger
            .settle(SplitKind::ProductOrder, Uuid::new_v4(), 5000, merchant_a, None)
            .await
            .unwrap();
        ledger
            .settle(SplitKind::ProductOrder, Uuid::new_v4(), 7000, merchant_b, None)
            .await
            .unwrap();

        let totals = ledger.totals(Some(merchant_a), None).await.unwrap();
        assert_eq!(totals.count, 2);
        assert_eq!(totals.platform_cents, 1500);
        assert_eq!(totals.merchant_cents, 13500);

        let all = ledger.totals(None, None).await.unwrap();
        assert_eq!(all.count, 3);
    }

    #[tokio::test]
    async fn negative_gross_rejected() {
        let ledger = ledger_with_defaults().await;
        let err = ledger
            .settle(SplitKind::ProductOrder, Uuid::new_v4(), -1, Uuid::new_v4(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }
}
