// ---------------------------------------------------------------------------
// TCP port pre-filter
// ---------------------------------------------------------------------------

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use futures::stream::{FuturesUnordered, StreamExt};
use tokio::net::TcpStream;
use tracing::{debug, info};

use crate::{DEFAULT_PROBE_CONCURRENCY, MIN_PROBE_CONCURRENCY};

/// Parallel single-port TCP connect prober.
///
/// Runs ahead of the SSH stage so only hosts that actually accept on the
/// service port pay the cost of a handshake. A host is open only when the
/// connect completes inside the timeout; refusal, reset and timeout all
/// mean closed/filtered here.
pub struct PortProber {
    timeout: Duration,
    concurrency: usize,
}

impl PortProber {
    pub fn new(timeout: Duration, concurrency: usize) -> Self {
        Self {
            timeout,
            concurrency: concurrency.max(MIN_PROBE_CONCURRENCY),
        }
    }

    /// Return the subset of candidates with `port` open, ascending.
    pub async fn probe(&self, targets: &[Ipv4Addr], port: u16) -> Vec<Ipv4Addr> {
        if targets.is_empty() {
            return Vec::new();
        }

        let mut candidates = targets.iter().copied();
        let mut window = FuturesUnordered::new();
        let mut open = Vec::new();

        for ip in candidates.by_ref().take(self.concurrency) {
            window.push(connect_check(ip, port, self.timeout));
        }

        while let Some((ip, is_open)) = window.next().await {
            if is_open {
                open.push(ip);
            }
            if let Some(next) = candidates.next() {
                window.push(connect_check(next, port, self.timeout));
            }
        }

        open.sort_unstable_by_key(|ip| u32::from(*ip));
        info!(
            open = open.len(),
            scanned = targets.len(),
            port,
            "port sweep complete"
        );
        open
    }
}

impl Default for PortProber {
    fn default() -> Self {
        Self::new(Duration::from_secs(3), DEFAULT_PROBE_CONCURRENCY)
    }
}

async fn connect_check(ip: Ipv4Addr, port: u16, timeout: Duration) -> (Ipv4Addr, bool) {
    let addr = SocketAddr::new(IpAddr::V4(ip), port);
    match tokio::time::timeout(timeout, TcpStream::connect(addr)).await {
        Ok(Ok(_)) => {
            debug!(ip = %ip, port, "port open");
            (ip, true)
        }
        Ok(Err(e)) => {
            debug!(ip = %ip, port, error = %e, "port closed");
            (ip, false)
        }
        Err(_) => {
            debug!(ip = %ip, port, "port filtered (timeout)");
            (ip, false)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn empty_input_is_empty_output() {
        let prober = PortProber::default();
        assert!(prober.probe(&[], 22).await.is_empty());
    }

    #[tokio::test]
    async fn detects_local_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let prober = PortProber::default();
        let open = prober.probe(&[Ipv4Addr::LOCALHOST], port).await;
        assert_eq!(open, vec![Ipv4Addr::LOCALHOST]);
    }

    #[tokio::test]
    async fn refused_port_is_closed() {
        // Bind then drop to find a port that actively refuses.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let prober = PortProber::default();
        let open = prober.probe(&[Ipv4Addr::LOCALHOST], port).await;
        assert!(open.is_empty());
    }

    #[tokio::test]
    async fn result_is_ascending() {
        let listener = TcpListener::bind("0.0.0.0:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        // Loopback aliases all reach the same wildcard listener on Linux.
        let targets = [
            Ipv4Addr::new(127, 0, 0, 3),
            Ipv4Addr::new(127, 0, 0, 1),
            Ipv4Addr::new(127, 0, 0, 2),
        ];
        let prober = PortProber::default();
        let open = prober.probe(&targets, port).await;
        assert_eq!(
            open,
            vec![
                Ipv4Addr::new(127, 0, 0, 1),
                Ipv4Addr::new(127, 0, 0, 2),
                Ipv4Addr::new(127, 0, 0, 3),
            ]
        );
    }
}
