// ---------------------------------------------------------------------------
// Discovery worker pool
// ---------------------------------------------------------------------------
//
// The blocking half of the control plane. Each worker instance is an OS
// thread running its own multi-thread tokio runtime and owning its own
// store connection; `instances × pool_size` threads may block on sockets
// and SSH sessions without ever touching the request domain's scheduler.

use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{debug, error, info};
use uuid::Uuid;

use netpulse_types::DiscoveryRequest;

use crate::contract::Discovery;
use crate::error::EngineError;
use crate::service::DiscoveryService;
use crate::transport::{Channel, Envelope, Fault, SharedReceiver};

/// Sizing of the discovery domain.
#[derive(Debug, Clone, Copy)]
pub struct WorkerSettings {
    /// Independent worker groups, each with its own runtime and store.
    pub instances: usize,
    /// Scheduler threads per instance.
    pub pool_size: usize,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            instances: 2,
            pool_size: 4,
        }
    }
}

/// Handle to the spawned worker threads. Dropping the sending half of the
/// bus drains and stops every worker; `join` then reaps the threads.
pub struct WorkerPool {
    threads: Vec<std::thread::JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn the worker instances. `make_service` runs once per instance
    /// on its own thread, so each instance gets a private service (and
    /// with it, a private store connection).
    pub fn spawn<F>(
        settings: WorkerSettings,
        receiver: SharedReceiver,
        make_service: F,
    ) -> Result<Self, EngineError>
    where
        F: Fn() -> Result<DiscoveryService, EngineError> + Send + Sync + 'static,
    {
        let make_service = Arc::new(make_service);
        let mut threads = Vec::with_capacity(settings.instances.max(1));

        for instance in 0..settings.instances.max(1) {
            let receiver = receiver.clone();
            let make_service = make_service.clone();
            let pool_size = settings.pool_size.max(1);

            let handle = std::thread::Builder::new()
                .name(format!("discovery-{instance}"))
                .spawn(move || {
                    let runtime = match tokio::runtime::Builder::new_multi_thread()
                        .worker_threads(pool_size)
                        .thread_name(format!("discovery-{instance}-worker"))
                        .enable_all()
                        .build()
                    {
                        Ok(rt) => rt,
                        Err(e) => {
                            error!(instance, error = %e, "failed to build worker runtime");
                            return;
                        }
                    };

                    runtime.block_on(async move {
                        let service = match make_service() {
                            Ok(service) => Arc::new(service),
                            Err(e) => {
                                error!(instance, error = %e, "failed to build discovery service");
                                return;
                            }
                        };

                        info!(instance, pool_size, "discovery worker instance up");

                        let mut consumers = Vec::with_capacity(pool_size);
                        for slot in 0..pool_size {
                            let receiver = receiver.clone();
                            let service = service.clone();
                            consumers.push(tokio::spawn(consume(receiver, service, instance, slot)));
                        }
                        for consumer in consumers {
                            let _ = consumer.await;
                        }
                    });

                    debug!(instance, "discovery worker instance stopped");
                })
                .map_err(|e| EngineError::Internal(format!("failed to spawn worker: {e}")))?;

            threads.push(handle);
        }

        Ok(Self { threads })
    }

    pub fn thread_count(&self) -> usize {
        self.threads.len()
    }

    /// Block until every worker thread exits. Only returns once the bus
    /// has been dropped by all senders.
    pub fn join(self) {
        for handle in self.threads {
            let _ = handle.join();
        }
    }
}

/// One consumer slot: take the next envelope off the shared queue, serve
/// it, reply. Holding the receiver lock only while waiting means the
/// first idle slot, across all instances, gets the next request.
async fn consume(
    receiver: SharedReceiver,
    service: Arc<DiscoveryService>,
    instance: usize,
    slot: usize,
) {
    loop {
        let envelope = { receiver.lock().await.recv().await };
        let Some(envelope) = envelope else {
            debug!(instance, slot, "control-plane bus closed");
            return;
        };

        debug!(
            instance,
            slot,
            address = envelope.channel.address(),
            "request picked up"
        );

        let outcome = dispatch(&service, envelope.channel, envelope.payload).await;
        if envelope.reply.send(outcome).is_err() {
            // Caller stopped waiting (request-domain timeout); the work is
            // already done, nothing more to do with the reply.
            debug!(instance, slot, "caller dropped before reply");
        }
    }
}

/// Decode a payload, run the matching service operation, encode the reply.
async fn dispatch(
    service: &DiscoveryService,
    channel: Channel,
    payload: Value,
) -> Result<Value, Fault> {
    let result = match channel {
        Channel::Start => start(service, &payload).await,
        Channel::Status => status(service, &payload).await,
        Channel::Results => results(service, &payload).await,
        Channel::Cancel => cancel(service, &payload).await,
    };
    result.map_err(|e| Fault::from(&e))
}

fn field<'a>(payload: &'a Value, name: &str) -> Result<&'a str, EngineError> {
    payload[name]
        .as_str()
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| EngineError::InvalidArgument(format!("field '{name}' is required")))
}

fn uuid_field(payload: &Value, name: &str) -> Result<Uuid, EngineError> {
    let raw = field(payload, name)?;
    Uuid::parse_str(raw)
        .map_err(|_| EngineError::InvalidArgument(format!("invalid {name} format")))
}

async fn start(service: &DiscoveryService, payload: &Value) -> Result<Value, EngineError> {
    let owner = uuid_field(payload, "userId")?;
    let request = DiscoveryRequest {
        name: field(payload, "name")?.to_string(),
        target_range: field(payload, "targetRange")?.to_string(),
        credential_profile_id: uuid_field(payload, "credentialProfileId")?,
    };

    let job_id = service.start_discovery(request, owner).await?;
    Ok(json!({ "jobId": job_id }))
}

async fn status(service: &DiscoveryService, payload: &Value) -> Result<Value, EngineError> {
    let owner = uuid_field(payload, "userId")?;
    let job_id = uuid_field(payload, "jobId")?;

    let job = service.discovery_status(job_id, owner).await?;
    let encoded = serde_json::to_value(&job)
        .map_err(|e| EngineError::Internal(format!("failed to encode job: {e}")))?;
    Ok(json!({ "job": encoded }))
}

async fn results(service: &DiscoveryService, payload: &Value) -> Result<Value, EngineError> {
    let owner = uuid_field(payload, "userId")?;
    let job_id = uuid_field(payload, "jobId")?;

    let devices = service.discovery_results(job_id, owner).await?;
    let count = devices.len();
    let encoded = serde_json::to_value(&devices)
        .map_err(|e| EngineError::Internal(format!("failed to encode devices: {e}")))?;
    Ok(json!({ "devices": encoded, "count": count }))
}

async fn cancel(service: &DiscoveryService, payload: &Value) -> Result<Value, EngineError> {
    let owner = uuid_field(payload, "userId")?;
    let job_id = uuid_field(payload, "jobId")?;

    service.cancel_discovery(job_id, owner).await?;
    Ok(json!({ "message": "discovery job cancelled" }))
}
