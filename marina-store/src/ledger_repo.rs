use async_trait::async_trait;
use chrono::{DateTime, Utc};
use marina_core::CoreError;
use marina_ledger::{LedgerRepository, SplitKind, SplitRecord, SplitRule, SplitTotals};
use sqlx::PgPool;
use std::str::FromStr;
use uuid::Uuid;

pub struct PgLedgerRepository {
    pool: PgPool,
}

impl PgLedgerRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const RULE_COLUMNS: &str = "id, kind, platform_pct, merchant_pct, crew_pct, description, is_active, created_at";
const RECORD_COLUMNS: &str = "id, split_number, kind, transaction_id, rule_id, gross_cents, \
     platform_cents, merchant_cents, crew_cents, merchant_id, crew_id, created_at";

#[derive(sqlx::FromRow)]
struct RuleRow {
    id: Uuid,
    kind: String,
    platform_pct: i32,
    merchant_pct: i32,
    crew_pct: i32,
    description: Option<String>,
    is_active: bool,
    created_at: DateTime<Utc>,
}

impl RuleRow {
    fn into_rule(self) -> Result<SplitRule, CoreError> {
        Ok(SplitRule {
            id: self.id,
            kind: SplitKind::from_str(&self.kind)?,
            platform_pct: self.platform_pct,
            merchant_pct: self.merchant_pct,
            crew_pct: self.crew_pct,
            description: self.description,
            is_active: self.is_active,
            created_at: self.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct RecordRow {
    id: Uuid,
    split_number: String,
    kind: String,
    transaction_id: Uuid,
    rule_id: Uuid,
    gross_cents: i64,
    platform_cents: i64,
    merchant_cents: i64,
    crew_cents: i64,
    merchant_id: Uuid,
    crew_id: Option<Uuid>,
    created_at: DateTime<Utc>,
}

impl RecordRow {
    fn into_record(self) -> Result<SplitRecord, CoreError> {
        Ok(SplitRecord {
            id: self.id,
            split_number: self.split_number,
            kind: SplitKind::from_str(&self.kind)?,
            transaction_id: self.transaction_id,
            rule_id: self.rule_id,
            gross_cents: self.gross_cents,
            platform_cents: self.platform_cents,
            merchant_cents: self.merchant_cents,
            crew_cents: self.crew_cents,
            merchant_id: self.merchant_id,
            crew_id: self.crew_id,
            created_at: self.created_at,
        })
    }
}

#[async_trait]
impl LedgerRepository for PgLedgerRepository {
    async fn active_rule(&self, kind: SplitKind) -> Result<Option<SplitRule>, CoreError> {
        let row: Option<RuleRow> = sqlx::query_as(&format!(
            "SELECT {RULE_COLUMNS} FROM split_rules \
             WHERE kind = $1 AND is_active ORDER BY created_at DESC LIMIT 1"
        ))
        .bind(kind.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(CoreError::storage)?;
        row.map(RuleRow::into_rule).transpose()
    }

    async fn install_rule(&self, rule: &SplitRule) -> Result<SplitRule, CoreError> {
        rule.validate()?;
        let mut tx = self.pool.begin().await.map_err(CoreError::storage)?;

        sqlx::query("UPDATE split_rules SET is_active = FALSE WHERE kind = $1 AND is_active")
            .bind(rule.kind.as_str())
            .execute(&mut *tx)
            .await
            .map_err(CoreError::storage)?;

        let row: RuleRow = sqlx::query_as(&format!(
            "INSERT INTO split_rules (id, kind, platform_pct, merchant_pct, crew_pct, description, is_active, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, TRUE, $7) \
             RETURNING {RULE_COLUMNS}"
        ))
        .bind(rule.id)
        .bind(rule.kind.as_str())
        .bind(rule.platform_pct)
        .bind(rule.merchant_pct)
        .bind(rule.crew_pct)
        .bind(&rule.description)
        .bind(rule.created_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(CoreError::storage)?;

        tx.commit().await.map_err(CoreError::storage)?;
        row.into_rule()
    }

    async fn record_for(&self, kind: SplitKind, transaction_id: Uuid) -> Result<Option<SplitRecord>, CoreError> {
        let row: Option<RecordRow> = sqlx::query_as(&format!(
            "SELECT {RECORD_COLUMNS} FROM split_records WHERE kind = $1 AND transaction_id = $2"
        ))
        .bind(kind.as_str())
        .bind(transaction_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(CoreError::storage)?;
        row.map(RecordRow::into_record).transpose()
    }

    async fn insert_record(&self, record: SplitRecord) -> Result<SplitRecord, CoreError> {
        // The unique (kind, transaction_id) index makes a duplicate a
        // no-op; the loser of a race reads back the winner's row.
        let row: Option<RecordRow> = sqlx::query_as(&format!(
            "INSERT INTO split_records ( \
                 id, split_number, kind, transaction_id, rule_id, gross_cents, \
                 platform_cents, merchant_cents, crew_cents, merchant_id, crew_id, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) \
             ON CONFLICT (kind, transaction_id) DO NOTHING \
             RETURNING {RECORD_COLUMNS}"
        ))
        .bind(record.id)
        .bind(&record.split_number)
        .bind(record.kind.as_str())
        .bind(record.transaction_id)
        .bind(record.rule_id)
        .bind(record.gross_cents)
        .bind(record.platform_cents)
        .bind(record.merchant_cents)
        .bind(record.crew_cents)
        .bind(record.merchant_id)
        .bind(record.crew_id)
        .bind(record.created_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(CoreError::storage)?;

        match row {
            Some(row) => row.into_record(),
            None => self
                .record_for(record.kind, record.transaction_id)
                .await?
                .ok_or_else(|| CoreError::Storage("settlement record vanished after conflict".into())),
        }
    }

    async fn list(
        &self,
        kind: Option<SplitKind>,
        merchant_id: Option<Uuid>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<SplitRecord>, CoreError> {
        let rows: Vec<RecordRow> = sqlx::query_as(&format!(
            "SELECT {RECORD_COLUMNS} FROM split_records \
             WHERE ($1::text IS NULL OR kind = $1) \
               AND ($2::uuid IS NULL OR merchant_id = $2) \
             ORDER BY created_at DESC LIMIT $3 OFFSET $4"
        ))
        .bind(kind.map(|k| k.as_str().to_string()))
        .bind(merchant_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(CoreError::storage)?;
        rows.into_iter().map(RecordRow::into_record).collect()
    }

    async fn totals(&self, merchant_id: Option<Uuid>, crew_id: Option<Uuid>) -> Result<SplitTotals, CoreError> {
        let row: (i64, Option<i64>, Option<i64>, Option<i64>) = sqlx::query_as(
            "SELECT COUNT(*), SUM(platform_cents), SUM(merchant_cents), SUM(crew_cents) \
             FROM split_records \
             WHERE ($1::uuid IS NULL OR merchant_id = $1) \
               AND ($2::uuid IS NULL OR crew_id = $2)",
        )
        .bind(merchant_id)
        .bind(crew_id)
        .fetch_one(&self.pool)
        .await
        .map_err(CoreError::storage)?;

        Ok(SplitTotals {
            count: row.0,
            platform_cents: row.1.unwrap_or(0),
            merchant_cents: row.2.unwrap_or(0),
            crew_cents: row.3.unwrap_or(0),
        })
    }
}
