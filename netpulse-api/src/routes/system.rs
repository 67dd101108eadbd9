// ---------------------------------------------------------------------------
// System routes
// ---------------------------------------------------------------------------

use axum::Json;
use serde_json::{json, Value};

use crate::response::ok;

/// GET /api/system/health
pub async fn health_check() -> Json<Value> {
    ok(json!({ "status": "healthy" }))
}
