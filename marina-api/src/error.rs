use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use marina_core::CoreError;
use serde_json::json;

/// API-boundary error: typed core errors map to status codes, anything
/// else collapses to a logged 500.
#[derive(Debug)]
pub enum AppError {
    Core(CoreError),
    Internal(anyhow::Error),
}

impl From<CoreError> for AppError {
    fn from(err: CoreError) -> Self {
        AppError::Core(err)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::Core(err) => {
                let status = match &err {
                    CoreError::NotFound(_) => StatusCode::NOT_FOUND,
                    CoreError::Authorization(_) => StatusCode::FORBIDDEN,
                    // "already in state X" supports idempotent client
                    // retries.
                    CoreError::InvalidStateTransition { .. } => StatusCode::CONFLICT,
                    CoreError::OverlapConflict => StatusCode::CONFLICT,
                    CoreError::InsufficientStock { .. } => StatusCode::CONFLICT,
                    CoreError::NoActiveRule(_) => StatusCode::UNPROCESSABLE_ENTITY,
                    CoreError::Validation(_) => StatusCode::BAD_REQUEST,
                    CoreError::Storage(detail) => {
                        tracing::error!("storage failure: {detail}");
                        return (
                            StatusCode::INTERNAL_SERVER_ERROR,
                            Json(json!({"error": "internal server error"})),
                        )
                            .into_response();
                    }
                };
                (status, err.to_string())
            }
            AppError::Internal(err) => {
                tracing::error!("internal error: {err:?}");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal server error".to_string())
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
