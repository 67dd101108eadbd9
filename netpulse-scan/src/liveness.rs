// ---------------------------------------------------------------------------
// Liveness sweep
// ---------------------------------------------------------------------------

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use futures::stream::{FuturesUnordered, StreamExt};
use surge_ping::{Client, Config, PingIdentifier, PingSequence};
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

use crate::{DEFAULT_PROBE_CONCURRENCY, MIN_PROBE_CONCURRENCY};

/// Ports tried by the TCP-connect fallback when raw ICMP is unavailable.
/// A completed connect or an active refusal both prove the host is there.
const FALLBACK_PORTS: [u16; 3] = [22, 80, 443];

/// Best-effort reachability prober.
///
/// Prefers ICMP echo; when the process lacks the privilege to open a raw
/// ICMP socket, falls back to short TCP connects against a small port set.
pub struct LivenessProber {
    timeout: Duration,
    concurrency: usize,
}

impl LivenessProber {
    pub fn new(timeout: Duration, concurrency: usize) -> Self {
        Self {
            timeout,
            concurrency: concurrency.max(MIN_PROBE_CONCURRENCY),
        }
    }

    /// Probe every candidate concurrently and return the subset that
    /// responded within the timeout, ascending. Per-host failures only
    /// shrink the result.
    pub async fn probe(&self, targets: &[Ipv4Addr]) -> Vec<Ipv4Addr> {
        if targets.is_empty() {
            return Vec::new();
        }

        let mut alive = match Client::new(&Config::default()) {
            Ok(client) => self.icmp_sweep(&client, targets).await,
            Err(e) => {
                warn!(error = %e, "ICMP socket unavailable, falling back to TCP connect liveness");
                self.connect_sweep(targets).await
            }
        };

        alive.sort_unstable_by_key(|ip| u32::from(*ip));
        info!(
            alive = alive.len(),
            scanned = targets.len(),
            "liveness sweep complete"
        );
        alive
    }

    async fn icmp_sweep(&self, client: &Client, targets: &[Ipv4Addr]) -> Vec<Ipv4Addr> {
        let ident = ping_identifier();
        let mut candidates = targets.iter().copied().enumerate();
        let mut window = FuturesUnordered::new();
        let mut alive = Vec::new();

        for (seq, ip) in candidates.by_ref().take(self.concurrency) {
            window.push(icmp_probe(client, ip, ident, seq as u16, self.timeout));
        }

        while let Some((ip, up)) = window.next().await {
            if up {
                alive.push(ip);
            }
            if let Some((seq, next)) = candidates.next() {
                window.push(icmp_probe(client, next, ident, seq as u16, self.timeout));
            }
        }

        alive
    }

    async fn connect_sweep(&self, targets: &[Ipv4Addr]) -> Vec<Ipv4Addr> {
        let mut candidates = targets.iter().copied();
        let mut window = FuturesUnordered::new();
        let mut alive = Vec::new();

        for ip in candidates.by_ref().take(self.concurrency) {
            window.push(connect_probe(ip, self.timeout));
        }

        while let Some((ip, up)) = window.next().await {
            if up {
                alive.push(ip);
            }
            if let Some(next) = candidates.next() {
                window.push(connect_probe(next, self.timeout));
            }
        }

        alive
    }
}

impl Default for LivenessProber {
    fn default() -> Self {
        Self::new(Duration::from_secs(1), DEFAULT_PROBE_CONCURRENCY)
    }
}

async fn icmp_probe(
    client: &Client,
    ip: Ipv4Addr,
    ident: u16,
    seq: u16,
    timeout: Duration,
) -> (Ipv4Addr, bool) {
    let payload = [0u8; 56];
    let mut pinger = client.pinger(IpAddr::V4(ip), PingIdentifier(ident)).await;
    pinger.timeout(timeout);

    match pinger.ping(PingSequence(seq), &payload).await {
        Ok((_packet, rtt)) => {
            debug!(ip = %ip, rtt_ms = rtt.as_millis() as u64, "host responded to echo");
            (ip, true)
        }
        Err(_) => (ip, false),
    }
}

/// TCP-connect liveness check. Connection refused/reset still means a
/// host answered, so both count as alive.
async fn connect_probe(ip: Ipv4Addr, timeout: Duration) -> (Ipv4Addr, bool) {
    for port in FALLBACK_PORTS {
        let addr = SocketAddr::new(IpAddr::V4(ip), port);
        match tokio::time::timeout(timeout, TcpStream::connect(addr)).await {
            Ok(Ok(_)) => return (ip, true),
            Ok(Err(e))
                if e.kind() == std::io::ErrorKind::ConnectionRefused
                    || e.kind() == std::io::ErrorKind::ConnectionReset =>
            {
                return (ip, true);
            }
            _ => {}
        }
    }
    (ip, false)
}

fn ping_identifier() -> u16 {
    std::process::id() as u16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_input_is_empty_output() {
        let prober = LivenessProber::default();
        assert!(prober.probe(&[]).await.is_empty());
    }

    #[tokio::test]
    async fn loopback_connect_probe_is_alive() {
        // A connect to loopback either succeeds (something listens) or is
        // refused; both prove liveness without touching the network.
        let (ip, up) =
            connect_probe(Ipv4Addr::LOCALHOST, Duration::from_millis(500)).await;
        assert_eq!(ip, Ipv4Addr::LOCALHOST);
        assert!(up);
    }

    #[test]
    fn concurrency_floor_is_enforced() {
        let prober = LivenessProber::new(Duration::from_secs(1), 4);
        assert!(prober.concurrency >= MIN_PROBE_CONCURRENCY);
    }
}
