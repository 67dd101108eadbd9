// ---------------------------------------------------------------------------
// Credential profile routes
// ---------------------------------------------------------------------------
//
// Secrets are write-only here: requests carry plaintext in (to be sealed
// immediately), responses never carry plaintext or ciphertext out; the
// profile type skips those fields at serialization.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};
use uuid::Uuid;

use netpulse_db::{EncryptedDraft, EncryptedPatch};
use netpulse_types::{ProfileDraft, ProfilePatch, DEFAULT_SSH_PORT};

use crate::auth::Owner;
use crate::error::ApiError;
use crate::response::ok;
use crate::state::AppState;

fn parse_profile_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::BadRequest("invalid profile ID format".into()))
}

/// GET /api/credentials
pub async fn list_profiles(
    State(state): State<Arc<AppState>>,
    Owner(owner): Owner,
) -> Result<Json<Value>, ApiError> {
    let profiles = state.store.lock().await.profiles_for_owner(owner)?;
    Ok(ok(json!({ "count": profiles.len(), "profiles": profiles })))
}

/// POST /api/credentials
pub async fn create_profile(
    State(state): State<Arc<AppState>>,
    Owner(owner): Owner,
    Json(draft): Json<ProfileDraft>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    for (value, field) in [
        (&draft.name, "name"),
        (&draft.username, "username"),
        (&draft.password, "password"),
    ] {
        if value.trim().is_empty() {
            return Err(ApiError::BadRequest(format!("field '{field}' is required")));
        }
    }

    let sealed = EncryptedDraft {
        name: draft.name.trim().to_string(),
        username: draft.username.trim().to_string(),
        password_enc: state
            .secrets
            .encrypt(&draft.password)
            .map_err(|e| ApiError::Internal(e.to_string()))?,
        private_key_enc: draft
            .private_key
            .as_deref()
            .map(|key| state.secrets.encrypt(key))
            .transpose()
            .map_err(|e| ApiError::Internal(e.to_string()))?,
        port: draft.port.unwrap_or(DEFAULT_SSH_PORT),
    };

    let profile = state.store.lock().await.create_profile(sealed, owner)?;
    Ok((StatusCode::CREATED, ok(json!({ "profile": profile }))))
}

/// GET /api/credentials/{id}
pub async fn get_profile(
    State(state): State<Arc<AppState>>,
    Owner(owner): Owner,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let id = parse_profile_id(&id)?;
    let profile = state.store.lock().await.profile_for_owner(id, owner)?;
    Ok(ok(json!({ "profile": profile })))
}

/// PUT /api/credentials/{id}
pub async fn update_profile(
    State(state): State<Arc<AppState>>,
    Owner(owner): Owner,
    Path(id): Path<String>,
    Json(patch): Json<ProfilePatch>,
) -> Result<Json<Value>, ApiError> {
    let id = parse_profile_id(&id)?;
    if patch.is_empty() {
        return Err(ApiError::BadRequest("no fields to update".into()));
    }

    let sealed = EncryptedPatch {
        name: patch.name,
        username: patch.username,
        password_enc: patch
            .password
            .as_deref()
            .map(|password| state.secrets.encrypt(password))
            .transpose()
            .map_err(|e| ApiError::Internal(e.to_string()))?,
        private_key_enc: patch
            .private_key
            .as_deref()
            .map(|key| state.secrets.encrypt(key))
            .transpose()
            .map_err(|e| ApiError::Internal(e.to_string()))?,
        port: patch.port,
    };

    let profile = state.store.lock().await.update_profile(id, owner, sealed)?;
    Ok(ok(json!({ "profile": profile })))
}

/// DELETE /api/credentials/{id}
pub async fn delete_profile(
    State(state): State<Arc<AppState>>,
    Owner(owner): Owner,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let id = parse_profile_id(&id)?;
    state.store.lock().await.delete_profile(id, owner)?;
    Ok(ok(json!({ "message": "credential profile deleted" })))
}
