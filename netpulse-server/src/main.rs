// ---------------------------------------------------------------------------
// netpulse server
// ---------------------------------------------------------------------------
//
// Assembly point for the two execution domains. The discovery domain is a
// pool of dedicated runtimes spawned first; the request domain is a
// current-thread runtime serving HTTP, holding only the transport proxy.
// Each domain opens its own database connection, so blocking probe work can
// never starve the request path of connections or scheduler time.

mod config;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::sync::Mutex;
use tracing::info;

use netpulse_api::state::AppState;
use netpulse_api::ApiConfig;
use netpulse_db::Store;
use netpulse_engine::{
    bus, DiscoveryProxy, DiscoveryService, EngineError, ScanSettings, WorkerPool, WorkerSettings,
};
use netpulse_secrets::SecretBox;

use config::Config;

/// Queued-but-unclaimed control-plane requests before senders see
/// backpressure.
const BUS_CAPACITY: usize = 256;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "netpulse=info,netpulse_engine=info".into()),
        )
        .init();

    let cfg = Config::load()?;

    if cfg.encryption.key.trim().is_empty() {
        anyhow::bail!(
            "encryption.key is required; generate one with a 256-bit random key, e.g.: {}",
            SecretBox::generate_key_b64()
        );
    }
    let secrets =
        SecretBox::from_key_b64(&cfg.encryption.key).context("invalid encryption.key")?;

    let scan_settings = ScanSettings {
        ping_timeout: Duration::from_millis(cfg.scan.ping_timeout_ms),
        port_timeout: Duration::from_millis(cfg.scan.port_timeout_ms),
        ssh_timeout: Duration::from_millis(cfg.scan.ssh_timeout_ms),
        probe_concurrency: cfg.scan.probe_concurrency,
        min_prefix: cfg.scan.min_prefix,
        allow_large_ranges: cfg.scan.allow_large_ranges,
    };

    // Discovery domain: instances × pool_size dedicated threads, each
    // instance with its own store connection.
    let (control_bus, receiver) = bus(BUS_CAPACITY);
    let worker_settings = WorkerSettings {
        instances: cfg.discovery.worker.instances,
        pool_size: cfg.discovery.worker.pool_size,
    };
    info!(
        instances = worker_settings.instances,
        pool_size = worker_settings.pool_size,
        "spawning discovery workers"
    );

    let worker_db = PathBuf::from(&cfg.database.path);
    let worker_secrets = secrets.clone();
    let worker_scan = scan_settings.clone();
    let pool = WorkerPool::spawn(worker_settings, receiver, move || {
        let store = Store::open(&worker_db).map_err(|e| EngineError::Internal(e.to_string()))?;
        Ok(DiscoveryService::new(
            Arc::new(Mutex::new(store)),
            worker_secrets.clone(),
            worker_scan.clone(),
        ))
    })
    .context("failed to spawn discovery worker pool")?;

    // Request domain: single-threaded cooperative scheduling; nothing here
    // is allowed to block.
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build request-domain runtime")?;

    runtime.block_on(async {
        let store = Store::open(&PathBuf::from(&cfg.database.path))
            .map_err(|e| anyhow::anyhow!("failed to open database: {e}"))?;

        let state = Arc::new(AppState::new(
            Arc::new(DiscoveryProxy::new(control_bus)),
            Arc::new(Mutex::new(store)),
            secrets,
        ));

        let listen_addr: SocketAddr = format!("{}:{}", cfg.server.host, cfg.server.port)
            .parse()
            .context("invalid server.host/server.port")?;

        netpulse_api::start_server(ApiConfig { listen_addr }, state)
            .await
            .context("API server failed")
    })?;

    // The proxy (and with it the bus) is gone once the server returns;
    // workers drain their queue and exit.
    info!("waiting for discovery workers to drain");
    pool.join();
    Ok(())
}
