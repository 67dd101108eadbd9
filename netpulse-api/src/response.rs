// ---------------------------------------------------------------------------
// Response envelope
// ---------------------------------------------------------------------------

use axum::Json;
use serde_json::Value;

use crate::state::now_ms;

/// Wrap a domain payload in the success envelope every endpoint speaks:
/// `success: true` plus an epoch-millisecond `timestamp`, with the payload
/// fields merged alongside.
pub fn ok(payload: Value) -> Json<Value> {
    let mut body = serde_json::Map::new();
    body.insert("success".into(), Value::Bool(true));
    body.insert("timestamp".into(), now_ms().into());
    if let Value::Object(fields) = payload {
        body.extend(fields);
    }
    Json(Value::Object(body))
}
