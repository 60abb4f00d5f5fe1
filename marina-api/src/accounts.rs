use axum::{
    extract::{Path, State},
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::Utc;
use marina_core::{Actor, CoreError, CrewProfile, CrewStatus, MerchantProfile, MerchantStatus};
use marina_shared::events::{NotificationEvent, NotificationKind};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
struct ApplyMerchantRequest {
    display_name: String,
}

#[derive(Debug, Deserialize)]
struct MerchantStatusRequest {
    status: MerchantStatus,
}

#[derive(Debug, Deserialize)]
struct AddCrewRequest {
    user_id: Uuid,
    display_name: String,
}

#[derive(Debug, Deserialize)]
struct CrewStatusRequest {
    status: CrewStatus,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/merchants/apply", post(apply_merchant))
        .route("/v1/merchant/profile", get(my_merchant_profile))
        .route("/v1/merchant/crews", post(add_crew).get(my_crews))
        .route("/v1/merchant/crews/{id}/status", post(set_crew_status))
        .route("/v1/admin/merchants/{id}/status", post(set_merchant_status))
}

/// Onboarding: any user may apply; the profile stays Pending until an
/// admin approves it.
async fn apply_merchant(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(req): Json<ApplyMerchantRequest>,
) -> Result<Json<MerchantProfile>, AppError> {
    Ok(Json(state.accounts.apply_merchant(actor.user_id, &req.display_name).await?))
}

async fn my_merchant_profile(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<MerchantProfile>, AppError> {
    let profile = state
        .accounts
        .merchant_of_user(actor.user_id)
        .await?
        .ok_or_else(|| CoreError::not_found("merchant profile"))?;
    Ok(Json(profile))
}

async fn set_merchant_status(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
    Json(req): Json<MerchantStatusRequest>,
) -> Result<Json<MerchantProfile>, AppError> {
    if !actor.is_admin() {
        return Err(CoreError::Authorization("only admins may review merchant applications".into()).into());
    }
    let profile = state.accounts.set_merchant_status(id, req.status).await?;

    let decision = match profile.status {
        MerchantStatus::Active => Some(NotificationKind::MerchantApproved),
        MerchantStatus::Rejected => Some(NotificationKind::MerchantRejected),
        _ => None,
    };
    if let Some(kind) = decision {
        state
            .notifier
            .publish(NotificationEvent::templated(
                profile.user_id,
                kind,
                Some(profile.id),
                Utc::now().timestamp(),
            ))
            .await;
    }
    Ok(Json(profile))
}

async fn add_crew(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(req): Json<AddCrewRequest>,
) -> Result<Json<CrewProfile>, AppError> {
    let merchant = require_merchant(&state, &actor).await?;
    Ok(Json(
        state
            .accounts
            .add_crew(merchant.id, req.user_id, &req.display_name)
            .await?,
    ))
}

async fn my_crews(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<Vec<CrewProfile>>, AppError> {
    let merchant = require_merchant(&state, &actor).await?;
    Ok(Json(state.accounts.crews_of_merchant(merchant.id).await?))
}

async fn set_crew_status(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
    Json(req): Json<CrewStatusRequest>,
) -> Result<Json<CrewProfile>, AppError> {
    let merchant = require_merchant(&state, &actor).await?;
    let crew = state.accounts.crew(id).await?.ok_or_else(|| CoreError::not_found("crew"))?;
    if crew.merchant_id != merchant.id {
        return Err(CoreError::Authorization("crew belongs to another merchant".into()).into());
    }
    let profile = state.accounts.set_crew_status(id, req.status).await?;

    if profile.status == CrewStatus::Active {
        state
            .notifier
            .publish(NotificationEvent::templated(
                profile.user_id,
                NotificationKind::CrewApproved,
                Some(profile.id),
                Utc::now().timestamp(),
            ))
            .await;
    }
    Ok(Json(profile))
}

async fn require_merchant(state: &AppState, actor: &Actor) -> Result<MerchantProfile, AppError> {
    state
        .accounts
        .merchant_of_user(actor.user_id)
        .await?
        .ok_or_else(|| CoreError::Authorization("actor is not a merchant".into()).into())
}
