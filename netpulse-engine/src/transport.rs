// ---------------------------------------------------------------------------
// Control-plane transport
// ---------------------------------------------------------------------------
//
// Request/reply messaging between the request domain and the discovery
// workers. Four logical channels are multiplexed over one queue; every
// envelope carries a JSON payload (including the caller's owner id) and a
// oneshot reply slot that receives exactly one success payload or fault.
// Receivers are shared behind an async mutex, so the first idle worker
// picks up the next request, which is the only load balancing this needs.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::debug;

use crate::error::EngineError;

/// Logical control-plane channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Start,
    Status,
    Results,
    Cancel,
}

impl Channel {
    pub fn address(&self) -> &'static str {
        match self {
            Channel::Start => "discovery.start",
            Channel::Status => "discovery.status",
            Channel::Results => "discovery.results",
            Channel::Cancel => "discovery.cancel",
        }
    }
}

/// Failure reply carried across the transport.
#[derive(Debug, Clone)]
pub struct Fault {
    pub code: String,
    pub message: String,
}

impl From<&EngineError> for Fault {
    fn from(e: &EngineError) -> Self {
        Fault {
            code: e.code().to_string(),
            message: e.to_string(),
        }
    }
}

impl From<Fault> for EngineError {
    fn from(fault: Fault) -> Self {
        EngineError::from_code(&fault.code, fault.message)
    }
}

/// One in-flight request.
pub struct Envelope {
    pub channel: Channel,
    pub payload: Value,
    pub reply: oneshot::Sender<Result<Value, Fault>>,
}

/// Sender half, held by the request domain. Cheap to clone.
#[derive(Clone)]
pub struct DiscoveryBus {
    tx: mpsc::Sender<Envelope>,
}

/// Receiver half, shared by every discovery worker.
pub type SharedReceiver = Arc<Mutex<mpsc::Receiver<Envelope>>>;

/// Build a connected bus. `capacity` bounds queued-but-unclaimed requests;
/// senders get backpressure beyond it.
pub fn bus(capacity: usize) -> (DiscoveryBus, SharedReceiver) {
    let (tx, rx) = mpsc::channel(capacity);
    (DiscoveryBus { tx }, Arc::new(Mutex::new(rx)))
}

impl DiscoveryBus {
    /// Send one request and await its single reply.
    ///
    /// Every failure mode of the transport itself (workers gone, reply
    /// slot dropped, deadline passed) surfaces as `Transport`; faults
    /// from the worker come back as their original error kind.
    pub async fn request(
        &self,
        channel: Channel,
        payload: Value,
        timeout: Duration,
    ) -> Result<Value, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        debug!(address = channel.address(), "control-plane request");

        self.tx
            .send(Envelope {
                channel,
                payload,
                reply: reply_tx,
            })
            .await
            .map_err(|_| {
                EngineError::Transport(format!(
                    "no discovery worker is consuming {}",
                    channel.address()
                ))
            })?;

        match tokio::time::timeout(timeout, reply_rx).await {
            Ok(Ok(result)) => result.map_err(EngineError::from),
            Ok(Err(_)) => Err(EngineError::Transport(format!(
                "discovery worker dropped the reply for {}",
                channel.address()
            ))),
            Err(_) => Err(EngineError::Transport(format!(
                "timed out waiting for a reply on {}",
                channel.address()
            ))),
        }
    }
}
