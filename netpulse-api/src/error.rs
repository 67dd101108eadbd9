// ---------------------------------------------------------------------------
// API error types
// ---------------------------------------------------------------------------

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use netpulse_db::DbError;
use netpulse_engine::EngineError;

use crate::state::now_ms;

#[derive(Debug)]
pub enum ApiError {
    /// 400 Bad Request — missing/blank field, malformed CIDR or UUID.
    BadRequest(String),
    /// 401 Unauthorized — missing or malformed caller identity.
    Unauthorized(String),
    /// 404 Not Found — entity missing or owned by someone else.
    NotFound(String),
    /// 409 Conflict — operation not valid against current state.
    Conflict(String),
    /// 500 Internal Server Error.
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_key, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "Bad Request", msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "Unauthorized", msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "Not Found", msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "Conflict", msg),
            ApiError::Internal(msg) => {
                // Log the real error server-side, return a generic message
                // so internals never leak to clients.
                tracing::error!(details = %msg, "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error",
                    "an unexpected error occurred".to_string(),
                )
            }
        };

        let body = json!({
            "success": false,
            "timestamp": now_ms(),
            "error": error_key,
            "message": message,
        });
        (status, Json(body)).into_response()
    }
}

impl From<EngineError> for ApiError {
    fn from(e: EngineError) -> Self {
        match e {
            EngineError::InvalidArgument(msg) => ApiError::BadRequest(msg),
            EngineError::NotFound(what) => ApiError::NotFound(what),
            // Secret, transport and internal failures are all opaque 500s.
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<DbError> for ApiError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::NotFound(what) => ApiError::NotFound(what),
            DbError::Conflict(msg) => ApiError::Conflict(msg),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_error_mapping() {
        assert!(matches!(
            ApiError::from(EngineError::InvalidArgument("x".into())),
            ApiError::BadRequest(_)
        ));
        assert!(matches!(
            ApiError::from(EngineError::NotFound("x".into())),
            ApiError::NotFound(_)
        ));
        assert!(matches!(
            ApiError::from(EngineError::SecretCorrupt),
            ApiError::Internal(_)
        ));
        assert!(matches!(
            ApiError::from(EngineError::Transport("x".into())),
            ApiError::Internal(_)
        ));
    }

    #[test]
    fn db_error_mapping() {
        assert!(matches!(
            ApiError::from(DbError::NotFound("x".into())),
            ApiError::NotFound(_)
        ));
        assert!(matches!(
            ApiError::from(DbError::Conflict("x".into())),
            ApiError::Conflict(_)
        ));
    }
}
