// ---------------------------------------------------------------------------
// Transport-backed discovery proxy
// ---------------------------------------------------------------------------

use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use uuid::Uuid;

use netpulse_types::{Device, DiscoveryJob, DiscoveryRequest};

use crate::contract::Discovery;
use crate::error::EngineError;
use crate::transport::{Channel, DiscoveryBus};

/// Request-domain implementation of the discovery contract.
///
/// Serializes each call onto the control-plane bus and awaits exactly one
/// reply under a deadline; the request domain therefore suspends on the
/// transport only, never on scan I/O. Behaviorally identical to the direct
/// service; the two are swapped at assembly time.
pub struct DiscoveryProxy {
    bus: DiscoveryBus,
    reply_timeout: Duration,
}

/// Generous ceiling: replies are quick (start only persists a row before
/// answering), so hitting this means the worker pool is gone or wedged.
const DEFAULT_REPLY_TIMEOUT: Duration = Duration::from_secs(30);

impl DiscoveryProxy {
    pub fn new(bus: DiscoveryBus) -> Self {
        Self {
            bus,
            reply_timeout: DEFAULT_REPLY_TIMEOUT,
        }
    }

    pub fn with_reply_timeout(bus: DiscoveryBus, reply_timeout: Duration) -> Self {
        Self { bus, reply_timeout }
    }
}

#[async_trait]
impl Discovery for DiscoveryProxy {
    async fn start_discovery(
        &self,
        request: DiscoveryRequest,
        owner: Uuid,
    ) -> Result<Uuid, EngineError> {
        let payload = json!({
            "name": request.name,
            "targetRange": request.target_range,
            "credentialProfileId": request.credential_profile_id,
            "userId": owner,
        });

        let reply = self
            .bus
            .request(Channel::Start, payload, self.reply_timeout)
            .await?;

        reply["jobId"]
            .as_str()
            .and_then(|raw| Uuid::parse_str(raw).ok())
            .ok_or_else(|| EngineError::Transport("malformed start reply: missing jobId".into()))
    }

    async fn discovery_status(
        &self,
        job_id: Uuid,
        owner: Uuid,
    ) -> Result<DiscoveryJob, EngineError> {
        let payload = json!({ "jobId": job_id, "userId": owner });
        let reply = self
            .bus
            .request(Channel::Status, payload, self.reply_timeout)
            .await?;

        serde_json::from_value(reply["job"].clone())
            .map_err(|e| EngineError::Transport(format!("malformed status reply: {e}")))
    }

    async fn discovery_results(
        &self,
        job_id: Uuid,
        owner: Uuid,
    ) -> Result<Vec<Device>, EngineError> {
        let payload = json!({ "jobId": job_id, "userId": owner });
        let reply = self
            .bus
            .request(Channel::Results, payload, self.reply_timeout)
            .await?;

        serde_json::from_value(reply["devices"].clone())
            .map_err(|e| EngineError::Transport(format!("malformed results reply: {e}")))
    }

    async fn cancel_discovery(&self, job_id: Uuid, owner: Uuid) -> Result<(), EngineError> {
        let payload = json!({ "jobId": job_id, "userId": owner });
        self.bus
            .request(Channel::Cancel, payload, self.reply_timeout)
            .await?;
        Ok(())
    }
}
