
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use crate::query::QueryError;

// ─── Unified error type ──────────────────────────────────────────

#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    Query(QueryError),
    Internal(String),
}

impl From<QueryError> for AppError {
    fn from(e: QueryError) -> Self {
        Self::Query(e)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::Query(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
            Self::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = serde_json::json!({ "error": message });

        (status, Json(body)).into_response()
    }
}

// ─── GET /healthz ────────────────────────────────────────────────

pub async fn healthz() -> &'static str {
    "ok"
}
