use async_trait::async_trait;
use uuid::Uuid;

use netpulse_types::{Device, DiscoveryJob, DiscoveryRequest};

use crate::error::EngineError;

/// The discovery engine's public capability set.
///
/// Two behaviorally identical implementations exist: the in-process
/// [`DiscoveryService`](crate::DiscoveryService) used inside discovery
/// workers, and the transport-backed
/// [`DiscoveryProxy`](crate::DiscoveryProxy) used by the request domain.
/// Which one a component holds is an assembly-time decision, never a
/// per-call one.
#[async_trait]
pub trait Discovery: Send + Sync {
    /// Validate the request, persist a `pending` job, kick off the
    /// asynchronous pipeline, and return the job id.
    async fn start_discovery(
        &self,
        request: DiscoveryRequest,
        owner: Uuid,
    ) -> Result<Uuid, EngineError>;

    /// Current job row, owner-gated.
    async fn discovery_status(&self, job_id: Uuid, owner: Uuid)
        -> Result<DiscoveryJob, EngineError>;

    /// Devices associated with the job's credential profile, owner-gated.
    async fn discovery_results(
        &self,
        job_id: Uuid,
        owner: Uuid,
    ) -> Result<Vec<Device>, EngineError>;

    /// Advisory cancellation: flips the row terminal immediately, lets
    /// in-flight probes drain under their own timeouts.
    async fn cancel_discovery(&self, job_id: Uuid, owner: Uuid) -> Result<(), EngineError>;
}
