use axum::{
    extract::{Query, State},
    routing::{get, post},
    Extension, Json, Router,
};
use marina_core::{Actor, CoreError};
use marina_ledger::{SplitKind, SplitRecord, SplitRule, SplitTotals};
use marina_shared::Cents;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
struct ListQuery {
    kind: Option<SplitKind>,
    merchant_id: Option<Uuid>,
    #[serde(default = "default_page")]
    page: i64,
    #[serde(default = "default_page_size")]
    page_size: i64,
}

fn default_page() -> i64 {
    1
}

fn default_page_size() -> i64 {
    20
}

#[derive(Debug, Deserialize)]
struct TotalsQuery {
    merchant_id: Option<Uuid>,
    crew_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
struct InstallRuleRequest {
    kind: SplitKind,
    platform_pct: i32,
    merchant_pct: i32,
    crew_pct: i32,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SettleRequest {
    kind: SplitKind,
    transaction_id: Uuid,
    gross_cents: Cents,
    merchant_id: Uuid,
    crew_id: Option<Uuid>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/finance/splits", get(list_splits))
        .route("/v1/finance/totals", get(split_totals))
        .route("/v1/admin/finance/rules", post(install_rule))
        .route("/v1/admin/finance/settle", post(resettle))
}

async fn list_splits(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<SplitRecord>>, AppError> {
    // Merchants see their own settlements; admins see everything.
    let merchant_filter = if actor.is_admin() {
        query.merchant_id
    } else {
        let merchant = state
            .accounts
            .merchant_of_user(actor.user_id)
            .await?
            .ok_or_else(|| CoreError::Authorization("actor is not a merchant".into()))?;
        Some(merchant.id)
    };

    let offset = (query.page.max(1) - 1) * query.page_size;
    let records = state
        .ledger
        .list(query.kind, merchant_filter, query.page_size, offset)
        .await?;
    Ok(Json(records))
}

async fn split_totals(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Query(query): Query<TotalsQuery>,
) -> Result<Json<SplitTotals>, AppError> {
    let (merchant_id, crew_id) = if actor.is_admin() {
        (query.merchant_id, query.crew_id)
    } else if let Some(merchant) = state.accounts.merchant_of_user(actor.user_id).await? {
        (Some(merchant.id), None)
    } else if let Some(crew) = state.accounts.crew_of_user(actor.user_id).await? {
        (None, Some(crew.id))
    } else {
        return Err(CoreError::Authorization("no settlement visibility for this account".into()).into());
    };

    Ok(Json(state.ledger.totals(merchant_id, crew_id).await?))
}

async fn install_rule(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(req): Json<InstallRuleRequest>,
) -> Result<Json<SplitRule>, AppError> {
    if !actor.is_admin() {
        return Err(CoreError::Authorization("only admins may change split rules".into()).into());
    }
    let mut rule = SplitRule::new(req.kind, req.platform_pct, req.merchant_pct, req.crew_pct);
    rule.description = req.description;
    rule.validate()?;
    Ok(Json(state.ledger.install_rule(&rule).await?))
}

/// Manual reconciliation path: settlement is never retried automatically,
/// so a failed settle is re-invoked here once the cause is fixed.
/// Idempotent, like `settle` itself.
async fn resettle(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(req): Json<SettleRequest>,
) -> Result<Json<SplitRecord>, AppError> {
    if !actor.is_admin() {
        return Err(CoreError::Authorization("only admins may trigger settlement".into()).into());
    }
    let record = state
        .ledger
        .settle(req.kind, req.transaction_id, req.gross_cents, req.merchant_id, req.crew_id)
        .await?;
    Ok(Json(record))
}
