// ---------------------------------------------------------------------------
// Direct discovery service
// ---------------------------------------------------------------------------

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::info;
use uuid::Uuid;

use netpulse_db::Store;
use netpulse_scan::cidr;
use netpulse_secrets::SecretBox;
use netpulse_types::{Device, DiscoveryJob, DiscoveryRequest};

use crate::contract::Discovery;
use crate::error::EngineError;
use crate::pipeline::{self, ScanSettings};

/// In-process implementation of the discovery contract. Lives inside a
/// discovery worker; everything that blocks (probes, SSH) happens on the
/// worker instance's own runtime, never the request domain's.
pub struct DiscoveryService {
    store: Arc<Mutex<Store>>,
    secrets: SecretBox,
    settings: ScanSettings,
}

impl DiscoveryService {
    pub fn new(store: Arc<Mutex<Store>>, secrets: SecretBox, settings: ScanSettings) -> Self {
        Self {
            store,
            secrets,
            settings,
        }
    }
}

#[async_trait]
impl Discovery for DiscoveryService {
    async fn start_discovery(
        &self,
        request: DiscoveryRequest,
        owner: Uuid,
    ) -> Result<Uuid, EngineError> {
        if request.name.trim().is_empty() {
            return Err(EngineError::InvalidArgument(
                "discovery job name is required".into(),
            ));
        }
        if request.target_range.trim().is_empty() {
            return Err(EngineError::InvalidArgument(
                "target range is required".into(),
            ));
        }

        let network = cidr::parse(&request.target_range).map_err(|_| {
            EngineError::InvalidArgument(format!(
                "invalid CIDR format: {}",
                request.target_range.trim()
            ))
        })?;

        if network.prefix() < self.settings.min_prefix && !self.settings.allow_large_ranges {
            return Err(EngineError::InvalidArgument(format!(
                "target range /{} is too large; shortest allowed prefix is /{}",
                network.prefix(),
                self.settings.min_prefix
            )));
        }

        let job = {
            let store = self.store.lock().await;
            // NotFound here covers both "no such profile" and "not yours".
            store.profile_for_owner(request.credential_profile_id, owner)?;
            store.create_job(
                &request.name,
                &request.target_range,
                request.credential_profile_id,
                owner,
            )?
        };

        info!(job_id = %job.id, range = %network, "discovery job accepted");

        tokio::spawn(pipeline::run(
            self.store.clone(),
            self.secrets.clone(),
            self.settings.clone(),
            job.id,
            network,
            request.credential_profile_id,
        ));

        Ok(job.id)
    }

    async fn discovery_status(
        &self,
        job_id: Uuid,
        owner: Uuid,
    ) -> Result<DiscoveryJob, EngineError> {
        Ok(self.store.lock().await.job_for_owner(job_id, owner)?)
    }

    async fn discovery_results(
        &self,
        job_id: Uuid,
        owner: Uuid,
    ) -> Result<Vec<Device>, EngineError> {
        let store = self.store.lock().await;
        let job = store.job_for_owner(job_id, owner)?;
        Ok(store.devices_for_profile(job.credential_profile_id, owner)?)
    }

    async fn cancel_discovery(&self, job_id: Uuid, owner: Uuid) -> Result<(), EngineError> {
        self.store.lock().await.cancel_job(job_id, owner)?;
        info!(job_id = %job_id, "discovery job cancelled");
        Ok(())
    }
}
