// ---------------------------------------------------------------------------
// Discovery control routes
// ---------------------------------------------------------------------------
//
// These four endpoints proxy to the discovery engine over the control
// plane; the handlers only validate shape and translate errors. Fields are
// pulled from raw JSON by hand so a missing field produces a precise 400
// instead of a deserializer rejection.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use netpulse_types::DiscoveryRequest;

use crate::auth::Owner;
use crate::error::ApiError;
use crate::response::ok;
use crate::state::AppState;

fn required_str<'a>(body: &'a Value, field: &str) -> Result<&'a str, ApiError> {
    body[field]
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::BadRequest(format!("field '{field}' is required")))
}

fn parse_job_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::BadRequest("invalid job ID format".into()))
}

/// POST /api/discovery/start
pub async fn start_discovery(
    State(state): State<Arc<AppState>>,
    Owner(owner): Owner,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let name = required_str(&body, "name")?;
    let target_range = required_str(&body, "targetRange")?;
    let profile_raw = required_str(&body, "credentialProfileId")?;
    let credential_profile_id = Uuid::parse_str(profile_raw)
        .map_err(|_| ApiError::BadRequest("invalid credentialProfileId format".into()))?;

    let request = DiscoveryRequest {
        name: name.to_string(),
        target_range: target_range.to_string(),
        credential_profile_id,
    };

    let job_id = state.discovery.start_discovery(request, owner).await?;
    info!(job_id = %job_id, "discovery job started");

    Ok((
        StatusCode::CREATED,
        ok(json!({
            "message": "discovery job started successfully",
            "jobId": job_id,
        })),
    ))
}

/// GET /api/discovery/status/{jobId}
pub async fn discovery_status(
    State(state): State<Arc<AppState>>,
    Owner(owner): Owner,
    Path(job_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let job_id = parse_job_id(&job_id)?;
    let job = state.discovery.discovery_status(job_id, owner).await?;

    Ok(ok(json!({ "job": job })))
}

/// GET /api/discovery/results/{jobId}
pub async fn discovery_results(
    State(state): State<Arc<AppState>>,
    Owner(owner): Owner,
    Path(job_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let job_id = parse_job_id(&job_id)?;
    let devices = state.discovery.discovery_results(job_id, owner).await?;

    Ok(ok(json!({
        "count": devices.len(),
        "devices": devices,
    })))
}

/// DELETE /api/discovery/job/{jobId}
pub async fn cancel_discovery(
    State(state): State<Arc<AppState>>,
    Owner(owner): Owner,
    Path(job_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let job_id = parse_job_id(&job_id)?;
    state.discovery.cancel_discovery(job_id, owner).await?;

    Ok(ok(json!({
        "message": "discovery job cancelled successfully",
    })))
}
