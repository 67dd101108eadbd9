// ---------------------------------------------------------------------------
// Caller identity
// ---------------------------------------------------------------------------
//
// Token issuance and validation belong to the front end in front of this
// service; by the time a request arrives here, the authenticated user id
// travels in the `X-User-Id` header. This extractor is the only place that
// reads it, so every handler takes an `Owner` and forgets about headers.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use uuid::Uuid;

use crate::error::ApiError;

pub const USER_ID_HEADER: &str = "x-user-id";

/// The authenticated caller, extracted from `X-User-Id`.
#[derive(Debug, Clone, Copy)]
pub struct Owner(pub Uuid);

impl<S> FromRequestParts<S> for Owner
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| ApiError::Unauthorized("user not authenticated".into()))?;

        let id = Uuid::parse_str(raw.trim())
            .map_err(|_| ApiError::Unauthorized("malformed user id".into()))?;
        Ok(Owner(id))
    }
}
