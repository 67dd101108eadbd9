// ---------------------------------------------------------------------------
// Application state
// ---------------------------------------------------------------------------

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::sync::Mutex;

use netpulse_db::Store;
use netpulse_engine::Discovery;
use netpulse_secrets::SecretBox;

/// Request-domain state.
///
/// `discovery` is the engine contract behind whichever implementation was
/// assembled: the transport proxy in production, the direct service in
/// tests. `store` is this domain's own connection; discovery workers never
/// share it.
pub struct AppState {
    pub discovery: Arc<dyn Discovery>,
    pub store: Arc<Mutex<Store>>,
    pub secrets: SecretBox,
}

impl AppState {
    pub fn new(
        discovery: Arc<dyn Discovery>,
        store: Arc<Mutex<Store>>,
        secrets: SecretBox,
    ) -> Self {
        Self {
            discovery,
            store,
            secrets,
        }
    }
}

/// Current timestamp in milliseconds since the UNIX epoch, for the
/// response envelope.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
