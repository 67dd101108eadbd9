// ---------------------------------------------------------------------------
// Discovery engine
// ---------------------------------------------------------------------------
//
// Owns the staged scan pipeline, the job state machine, and the control
// plane that keeps the blocking discovery domain isolated from the request
// domain. The public contract is the `Discovery` trait; the request domain
// holds the transport-backed proxy, workers hold the direct service.

mod contract;
mod error;
mod pipeline;
mod proxy;
mod service;
mod transport;
mod worker;

pub use contract::Discovery;
pub use error::EngineError;
pub use pipeline::ScanSettings;
pub use proxy::DiscoveryProxy;
pub use service::DiscoveryService;
pub use transport::{bus, Channel, DiscoveryBus, Envelope, Fault, SharedReceiver};
pub use worker::{WorkerPool, WorkerSettings};
