use axum::{extract::State, routing::post, Json, Router};
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::auth::Claims;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
struct TokenRequest {
    user_id: Uuid,
}

#[derive(Debug, Serialize)]
struct AuthResponse {
    token: String,
    role: String,
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/v1/auth/token", post(issue_token))
}

/// Mint a bearer token for a known account. Credential verification lives
/// with the identity provider in front of this service; the directory is
/// only consulted for the account's current role.
async fn issue_token(State(state): State<AppState>, Json(req): Json<TokenRequest>) -> Result<Json<AuthResponse>, AppError> {
    let role = state.accounts.role_of(req.user_id).await?;

    let claims = Claims {
        sub: req.user_id,
        role: role.as_str().to_string(),
        exp: (Utc::now() + Duration::seconds(state.auth.expiration as i64)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(state.auth.secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(anyhow::anyhow!("token encoding failed: {e}")))?;

    Ok(Json(AuthResponse {
        token,
        role: role.as_str().to_string(),
    }))
}
