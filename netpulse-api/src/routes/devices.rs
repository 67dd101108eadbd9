// ---------------------------------------------------------------------------
// Device CRUD routes
// ---------------------------------------------------------------------------

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use netpulse_types::{DevicePatch, DeviceStatus, NewDevice};

use crate::auth::Owner;
use crate::error::ApiError;
use crate::response::ok;
use crate::state::AppState;

fn parse_device_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::BadRequest("invalid device ID format".into()))
}

fn parse_status(raw: &str) -> Result<DeviceStatus, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::BadRequest(format!("unknown device status: {raw}")))
}

/// GET /api/devices
pub async fn list_devices(
    State(state): State<Arc<AppState>>,
    Owner(owner): Owner,
) -> Result<Json<Value>, ApiError> {
    let devices = state.store.lock().await.devices_for_owner(owner)?;
    Ok(ok(json!({ "count": devices.len(), "devices": devices })))
}

/// POST /api/devices
pub async fn create_device(
    State(state): State<Arc<AppState>>,
    Owner(owner): Owner,
    Json(new): Json<NewDevice>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    if new.hostname.trim().is_empty() {
        return Err(ApiError::BadRequest("field 'hostname' is required".into()));
    }
    let device = state.store.lock().await.create_device(&new, owner)?;
    Ok((StatusCode::CREATED, ok(json!({ "device": device }))))
}

/// GET /api/devices/{id}
pub async fn get_device(
    State(state): State<Arc<AppState>>,
    Owner(owner): Owner,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let id = parse_device_id(&id)?;
    let device = state.store.lock().await.device_for_owner(id, owner)?;
    Ok(ok(json!({ "device": device })))
}

/// PUT /api/devices/{id}
pub async fn update_device(
    State(state): State<Arc<AppState>>,
    Owner(owner): Owner,
    Path(id): Path<String>,
    Json(patch): Json<DevicePatch>,
) -> Result<Json<Value>, ApiError> {
    let id = parse_device_id(&id)?;
    if patch.is_empty() {
        return Err(ApiError::BadRequest("no fields to update".into()));
    }
    let device = state.store.lock().await.update_device(id, owner, patch)?;
    Ok(ok(json!({ "device": device })))
}

/// DELETE /api/devices/{id}
pub async fn delete_device(
    State(state): State<Arc<AppState>>,
    Owner(owner): Owner,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let id = parse_device_id(&id)?;
    state.store.lock().await.delete_device(id, owner)?;
    Ok(ok(json!({ "message": "device deleted" })))
}

#[derive(Debug, Deserialize)]
pub struct StatusBody {
    pub status: String,
}

/// PUT /api/devices/{id}/status
pub async fn set_device_status(
    State(state): State<Arc<AppState>>,
    Owner(owner): Owner,
    Path(id): Path<String>,
    Json(body): Json<StatusBody>,
) -> Result<Json<Value>, ApiError> {
    let id = parse_device_id(&id)?;
    let status = parse_status(&body.status)?;
    state.store.lock().await.set_device_status(id, status, owner)?;
    Ok(ok(json!({ "message": "device status updated" })))
}

/// GET /api/devices/status/{status}
pub async fn devices_by_status(
    State(state): State<Arc<AppState>>,
    Owner(owner): Owner,
    Path(status): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let status = parse_status(&status)?;
    let devices = state.store.lock().await.devices_by_status(status, owner)?;
    Ok(ok(json!({ "count": devices.len(), "devices": devices })))
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: String,
}

/// GET /api/devices/search?q=…
pub async fn search_devices(
    State(state): State<Arc<AppState>>,
    Owner(owner): Owner,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Value>, ApiError> {
    if query.q.trim().is_empty() {
        return Err(ApiError::BadRequest("query parameter 'q' is required".into()));
    }
    let devices = state.store.lock().await.search_devices(&query.q, owner)?;
    Ok(ok(json!({ "count": devices.len(), "devices": devices })))
}
