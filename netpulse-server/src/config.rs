// ---------------------------------------------------------------------------
// Process configuration
// ---------------------------------------------------------------------------
//
// JSON config file (path from NETPULSE_CONFIG, default ./config.json) with
// per-field environment overrides. Every field has a default except the
// encryption key, which must be supplied explicitly.

use std::{env, fs};

use anyhow::Context;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub discovery: DiscoverySection,
    pub encryption: EncryptionConfig,
    pub database: DatabaseConfig,
    pub scan: ScanConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoverySection {
    pub worker: WorkerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    pub instances: usize,
    pub pool_size: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EncryptionConfig {
    /// Base64-encoded 256-bit AEAD key. Required; standard and URL-safe
    /// alphabets both accepted.
    pub key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    pub ping_timeout_ms: u64,
    pub port_timeout_ms: u64,
    pub ssh_timeout_ms: u64,
    pub probe_concurrency: usize,
    /// Shortest prefix a discovery job may target.
    pub min_prefix: u8,
    pub allow_large_ranges: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            instances: 2,
            pool_size: 4,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "netpulse.db".to_string(),
            max_connections: 20,
        }
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            ping_timeout_ms: 1000,
            port_timeout_ms: 3000,
            ssh_timeout_ms: 5000,
            probe_concurrency: 128,
            min_prefix: 16,
            allow_large_ranges: false,
        }
    }
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let path = env::var("NETPULSE_CONFIG").unwrap_or_else(|_| "config.json".to_string());
        let file_cfg: Option<Config> = fs::read_to_string(&path)
            .ok()
            .map(|raw| serde_json::from_str(&raw))
            .transpose()
            .with_context(|| format!("failed to parse {path}"))?;

        let mut cfg = file_cfg.unwrap_or_default();

        if let Ok(v) = env::var("NETPULSE_HOST") {
            cfg.server.host = v;
        }
        if let Ok(v) = env::var("NETPULSE_PORT") {
            cfg.server.port = v.parse().unwrap_or(cfg.server.port);
        }
        if let Ok(v) = env::var("NETPULSE_ENCRYPTION_KEY") {
            cfg.encryption.key = v;
        }
        if let Ok(v) = env::var("NETPULSE_DB_PATH") {
            cfg.database.path = v;
        }
        if let Ok(v) = env::var("NETPULSE_WORKER_INSTANCES") {
            cfg.discovery.worker.instances = v.parse().unwrap_or(cfg.discovery.worker.instances);
        }
        if let Ok(v) = env::var("NETPULSE_WORKER_POOL_SIZE") {
            cfg.discovery.worker.pool_size = v.parse().unwrap_or(cfg.discovery.worker.pool_size);
        }

        Ok(cfg)
    }
}
