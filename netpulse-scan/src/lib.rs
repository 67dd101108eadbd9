// ---------------------------------------------------------------------------
// Staged network probing
// ---------------------------------------------------------------------------
//
// The three scan stages the discovery engine runs over a CIDR range, in
// cost order: liveness sweep (ICMP or TCP-connect fallback), TCP port
// pre-filter, and the authenticated SSH fact probe. Each stage takes a
// candidate list and returns the surviving subset; per-host failures are
// never fatal to a stage.

pub mod cidr;
mod liveness;
mod port;
mod ssh;

pub use liveness::LivenessProber;
pub use port::PortProber;
pub use ssh::SshProber;

/// Lower bound for the per-stage in-flight probe window.
pub const MIN_PROBE_CONCURRENCY: usize = 64;

/// Default per-stage in-flight probe window.
pub const DEFAULT_PROBE_CONCURRENCY: usize = 128;

#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("invalid CIDR notation: {0}")]
    InvalidCidr(String),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("ssh error: {0}")]
    Ssh(#[from] ssh2::Error),
    #[error("ssh authentication rejected")]
    AuthRejected,
}
