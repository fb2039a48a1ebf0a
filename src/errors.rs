use axum::http::{HeaderMap, HeaderValue};
use axum::response::IntoResponse;
use axum::Json;
use reqwest::StatusCode;
use serde_json::json;
use thiserror::Error;

/// Errors that can escape a component and reach the HTTP boundary.
///
/// Several variants (UpstreamRateLimited, UpstreamFailure, MissingPrice,
/// InsufficientCash/Shares, AgentFailure) are mostly caught internally by
/// the Worker/DayExecutor/Ledger and folded into a warning or a JobDetail
/// failure; they only reach here if surfaced directly by a route.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("unprocessable: {0}")]
    UnprocessableEntity(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("upstream rate limited")]
    UpstreamRateLimited,
    #[error("upstream failure: {0}")]
    UpstreamFailure(String),
    #[error("missing price for {0}")]
    MissingPrice(String),
    #[error("insufficient cash: need {required}, have {available}")]
    InsufficientCash { required: f64, available: f64 },
    #[error("insufficient shares of {symbol}: have {have}, want {want}")]
    InsufficientShares { symbol: String, have: i64, want: i64 },
    #[error("agent failure: {0}")]
    AgentFailure(String),
    #[error("store error: {0}")]
    Store(#[from] sqlx::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        match &self {
            AppError::Validation(msg) => {
                tracing::warn!(%msg, "validation error");
                (StatusCode::BAD_REQUEST, Json(json!({ "error": msg }))).into_response()
            }
            AppError::UnprocessableEntity(msg) => {
                tracing::warn!(%msg, "unprocessable request");
                (StatusCode::UNPROCESSABLE_ENTITY, Json(json!({ "error": msg }))).into_response()
            }
            AppError::Conflict(msg) => {
                tracing::warn!(%msg, "conflict");
                (StatusCode::BAD_REQUEST, Json(json!({ "error": msg }))).into_response()
            }
            AppError::NotFound(msg) => {
                tracing::warn!(%msg, "not found");
                (StatusCode::NOT_FOUND, Json(json!({ "error": msg }))).into_response()
            }
            AppError::UpstreamRateLimited => {
                tracing::warn!("upstream rate limited");
                let mut headers = HeaderMap::new();
                headers.insert("Retry-After", HeaderValue::from_static("60"));
                (
                    StatusCode::TOO_MANY_REQUESTS,
                    headers,
                    Json(json!({ "error": "upstream rate limited" })),
                )
                    .into_response()
            }
            AppError::UpstreamFailure(msg) => {
                tracing::error!(%msg, "upstream failure");
                (StatusCode::BAD_GATEWAY, Json(json!({ "error": msg }))).into_response()
            }
            AppError::MissingPrice(symbol) => {
                tracing::error!(%symbol, "missing price");
                (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    Json(json!({ "error": self.to_string() })),
                )
                    .into_response()
            }
            AppError::InsufficientCash { .. } | AppError::InsufficientShares { .. } => {
                tracing::debug!(error = %self, "trade rejected");
                (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    Json(json!({ "error": self.to_string() })),
                )
                    .into_response()
            }
            AppError::AgentFailure(msg) => {
                tracing::error!(%msg, "agent failure");
                (StatusCode::BAD_GATEWAY, Json(json!({ "error": msg }))).into_response()
            }
            AppError::Store(err) => {
                tracing::error!(error = %err, "store error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": "internal error" })),
                )
                    .into_response()
            }
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;
