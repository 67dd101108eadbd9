// ---------------------------------------------------------------------------
// Discovery pipeline
// ---------------------------------------------------------------------------
//
// The staged scan one job runs through: liveness sweep over the expanded
// range, TCP port pre-filter over the survivors, SSH fact probe over what
// is left. Per-host failures only shrink survivor sets; orchestration
// failures land the job in `failed` with an error summary.

use std::sync::Arc;
use std::time::Duration;

use chrono::{SecondsFormat, Utc};
use futures::stream::{FuturesUnordered, StreamExt};
use ipnetwork::Ipv4Network;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use netpulse_db::Store;
use netpulse_scan::{
    cidr, LivenessProber, PortProber, SshProber, DEFAULT_PROBE_CONCURRENCY,
    MIN_PROBE_CONCURRENCY,
};
use netpulse_secrets::SecretBox;
use netpulse_types::{DeviceStatus, NewDevice, SshCredentials};

use crate::error::EngineError;

/// Scan tuning shared by every job an engine instance runs.
#[derive(Debug, Clone)]
pub struct ScanSettings {
    /// Per-host liveness timeout.
    pub ping_timeout: Duration,
    /// Per-host TCP connect timeout.
    pub port_timeout: Duration,
    /// SSH connect-and-I/O timeout per host.
    pub ssh_timeout: Duration,
    /// In-flight probe window per stage.
    pub probe_concurrency: usize,
    /// Shortest allowed prefix unless large ranges are explicitly enabled.
    pub min_prefix: u8,
    pub allow_large_ranges: bool,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            ping_timeout: Duration::from_secs(1),
            port_timeout: Duration::from_secs(3),
            ssh_timeout: Duration::from_secs(5),
            probe_concurrency: DEFAULT_PROBE_CONCURRENCY,
            min_prefix: 16,
            allow_large_ranges: false,
        }
    }
}

fn iso_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Drive one job to a terminal state. Never returns an error: every
/// failure path ends in the job row, not in the caller.
pub(crate) async fn run(
    store: Arc<Mutex<Store>>,
    secrets: SecretBox,
    settings: ScanSettings,
    job_id: Uuid,
    network: Ipv4Network,
    profile_id: Uuid,
) {
    match execute(&store, &secrets, &settings, job_id, network, profile_id).await {
        Ok(()) => {}
        Err(e) => {
            warn!(job_id = %job_id, error = %e, "discovery pipeline failed");
            let summary = serde_json::json!({
                "error": e.to_string(),
                "failedAt": iso_now(),
            });
            let failed = { store.lock().await.fail_job(job_id, &summary) };
            match failed {
                Ok(true) => {}
                Ok(false) => {
                    debug!(job_id = %job_id, "job already terminal, failure summary dropped")
                }
                Err(db) => warn!(job_id = %job_id, error = %db, "could not record job failure"),
            }
        }
    }
}

async fn execute(
    store: &Arc<Mutex<Store>>,
    secrets: &SecretBox,
    settings: &ScanSettings,
    job_id: Uuid,
    network: Ipv4Network,
    profile_id: Uuid,
) -> Result<(), EngineError> {
    if !{ store.lock().await.set_job_running(job_id)? } {
        // Cancelled before a worker picked it up.
        info!(job_id = %job_id, "job left pending state before start, skipping");
        return Ok(());
    }

    let credentials = load_credentials(store, secrets, profile_id).await?;

    let candidates = cidr::expand(&network);
    info!(
        job_id = %job_id,
        range = %network,
        candidates = candidates.len(),
        "discovery pipeline started"
    );

    let alive = LivenessProber::new(settings.ping_timeout, settings.probe_concurrency)
        .probe(&candidates)
        .await;

    let open = PortProber::new(settings.port_timeout, settings.probe_concurrency)
        .probe(&alive, credentials.port)
        .await;

    let hostnames = ssh_stage(store, settings, job_id, profile_id, &credentials, &open).await;

    let summary = serde_json::json!({
        "totalIpsScanned": candidates.len(),
        "devicesDiscovered": hostnames.len(),
        "devices": hostnames,
    });

    let completed = { store.lock().await.complete_job(job_id, &summary)? };
    if completed {
        info!(
            job_id = %job_id,
            devices = summary["devicesDiscovered"].as_u64().unwrap_or(0),
            "discovery job completed"
        );
    } else {
        // Lost the race against a cancellation; the marker stays.
        info!(job_id = %job_id, "job was cancelled mid-run, completion dropped");
    }
    Ok(())
}

async fn load_credentials(
    store: &Arc<Mutex<Store>>,
    secrets: &SecretBox,
    profile_id: Uuid,
) -> Result<SshCredentials, EngineError> {
    let sealed = { store.lock().await.credential_secrets(profile_id)? };

    let password = secrets.decrypt(&sealed.password_enc)?;
    let private_key = sealed
        .private_key_enc
        .as_deref()
        .map(|key| secrets.decrypt(key))
        .transpose()?;

    Ok(SshCredentials {
        username: sealed.username,
        password,
        private_key,
        port: sealed.port,
    })
}

/// Probe every open-port host and upsert a device per successful probe.
/// Returns the discovered hostnames. Probe and insert failures are
/// per-host: logged and skipped, never propagated.
async fn ssh_stage(
    store: &Arc<Mutex<Store>>,
    settings: &ScanSettings,
    job_id: Uuid,
    profile_id: Uuid,
    credentials: &SshCredentials,
    targets: &[std::net::Ipv4Addr],
) -> Vec<String> {
    let prober = Arc::new(SshProber::new(settings.ssh_timeout));
    let mut hostnames = Vec::new();

    let spawn_probe = |ip: std::net::Ipv4Addr| {
        let prober = prober.clone();
        let creds = credentials.clone();
        tokio::task::spawn_blocking(move || (ip, prober.probe(ip, &creds)))
    };

    let mut pending = targets.iter().copied();
    let mut window = FuturesUnordered::new();
    let in_flight = settings.probe_concurrency.max(MIN_PROBE_CONCURRENCY);
    for ip in pending.by_ref().take(in_flight) {
        window.push(spawn_probe(ip));
    }

    while let Some(joined) = window.next().await {
        if let Some(next) = pending.next() {
            window.push(spawn_probe(next));
        }

        let (ip, outcome) = match joined {
            Ok(pair) => pair,
            Err(e) => {
                warn!(job_id = %job_id, error = %e, "ssh probe task panicked");
                continue;
            }
        };

        let facts = match outcome {
            Ok(facts) => facts,
            Err(e) => {
                debug!(job_id = %job_id, ip = %ip, error = %e, "ssh probe failed, host skipped");
                continue;
            }
        };

        let device = NewDevice {
            hostname: facts.hostname.clone(),
            ip_address: ip,
            device_type: facts.device_type(),
            os_info: facts.to_os_info(),
            credential_profile_id: profile_id,
            status: DeviceStatus::Online,
        };

        let inserted = { store.lock().await.insert_discovered(&device) };
        match inserted {
            Ok(stored) => {
                info!(job_id = %job_id, ip = %ip, hostname = %stored.hostname, "device discovered");
                hostnames.push(stored.hostname);
            }
            Err(e) => {
                warn!(job_id = %job_id, ip = %ip, error = %e, "failed to store discovered device");
            }
        }
    }

    hostnames
}
