use async_trait::async_trait;
use marina_core::CoreError;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::{SplitKind, SplitRecord, SplitRule};
use crate::repository::{LedgerRepository, SplitTotals};

/// In-memory ledger repository for tests and local development.
#[derive(Default, Clone)]
pub struct InMemoryLedgerRepository {
    rules: Arc<RwLock<Vec<SplitRule>>>,
    records: Arc<RwLock<HashMap<(SplitKind, Uuid), SplitRecord>>>,
}

impl InMemoryLedgerRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Repository pre-seeded with the default booking and order policies.
    pub async fn with_default_rules() -> Self {
        let repo = Self::new();
        repo.install_rule(&SplitRule::booking_default()).await.expect("seed booking rule");
        repo.install_rule(&SplitRule::order_default()).await.expect("seed order rule");
        repo
    }
}

#[async_trait]
impl LedgerRepository for InMemoryLedgerRepository {
    async fn active_rule(&self, kind: SplitKind) -> Result<Option<SplitRule>, CoreError> {
        Ok(self
            .rules
            .read()
            .await
            .iter()
            .find(|r| r.kind == kind && r.is_active)
            .cloned())
    }

    async fn install_rule(&self, rule: &SplitRule) -> Result<SplitRule, CoreError> {
        rule.validate()?;
        let mut rules = self.rules.write().await;
        for existing in rules.iter_mut().filter(|r| r.kind == rule.kind) {
            existing.is_active = false;
        }
        let mut rule = rule.clone();
        rule.is_active = true;
        rules.push(rule.clone());
        Ok(rule)
    }

    async fn record_for(&self, kind: SplitKind, transaction_id: Uuid) -> Result<Option<SplitRecord>, CoreError> {
        Ok(self.records.read().await.get(&(kind, transaction_id)).cloned())
    }

    async fn insert_record(&self, record: SplitRecord) -> Result<SplitRecord, CoreError> {
        let mut records = self.records.write().await;
        let key = (record.kind, record.transaction_id);
        if let Some(existing) = records.get(&key) {
            return Ok(existing.clone());
        }
        records.insert(key, record.clone());
        Ok(record)
    }

    async fn list(
        &self,
        kind: Option<SplitKind>,
        merchant_id: Option<Uuid>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<SplitRecord>, CoreError> {
        let records = self.records.read().await;
        let mut matching: Vec<SplitRecord> = records
            .values()
            .filter(|r| kind.map_or(true, |k| r.kind == k))
            .filter(|r| merchant_id.map_or(true, |m| r.merchant_id == m))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(matching
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn totals(&self, merchant_id: Option<Uuid>, crew_id: Option<Uuid>) -> Result<SplitTotals, CoreError> {
        let records = self.records.read().await;
        let mut totals = SplitTotals::default();
        for record in records
            .values()
            .filter(|r| merchant_id.map_or(true, |m| r.merchant_id == m))
            .filter(|r| crew_id.map_or(true, |c| r.crew_id == Some(c)))
        {
            totals.count += 1;
            totals.platform_cents += record.platform_cents;
            totals.merchant_cents += record.merchant_cents;
            totals.crew_cents += record.crew_cents;
        }
        Ok(totals)
    }
}
