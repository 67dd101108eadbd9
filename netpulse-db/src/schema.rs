use rusqlite::Connection;

use crate::error::DbError;

const SCHEMA_SQL: &str = r#"
-- Users are consumed, not owned, by this service: the auth front end
-- writes them, we only record ids as owners.
CREATE TABLE IF NOT EXISTS users (
    id         TEXT PRIMARY KEY,
    username   TEXT NOT NULL UNIQUE,
    created_at TEXT NOT NULL
);

-- SSH credential bundles. Secret columns hold AEAD ciphertext only.
CREATE TABLE IF NOT EXISTS credential_profiles (
    id              TEXT PRIMARY KEY,
    name            TEXT NOT NULL,
    username        TEXT NOT NULL,
    password_enc    TEXT NOT NULL,
    private_key_enc TEXT,
    port            INTEGER NOT NULL DEFAULT 22,
    created_by      TEXT NOT NULL,
    created_at      TEXT NOT NULL,
    updated_at      TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_profiles_owner ON credential_profiles(created_by);

-- Hosts known to the system. One row per (profile, address): discovery
-- re-runs refresh facts instead of accumulating duplicates.
CREATE TABLE IF NOT EXISTS devices (
    id                    TEXT PRIMARY KEY,
    hostname              TEXT NOT NULL,
    ip_address            TEXT NOT NULL,
    device_type           TEXT NOT NULL,
    os_info               TEXT NOT NULL,
    credential_profile_id TEXT NOT NULL REFERENCES credential_profiles(id) ON DELETE RESTRICT,
    status                TEXT NOT NULL,
    last_seen             TEXT,
    created_at            TEXT NOT NULL,
    updated_at            TEXT NOT NULL,
    UNIQUE (credential_profile_id, ip_address)
);
CREATE INDEX IF NOT EXISTS idx_devices_profile ON devices(credential_profile_id);
CREATE INDEX IF NOT EXISTS idx_devices_status ON devices(status);

-- Discovery jobs. The profile link is a plain column, not a foreign key:
-- jobs are historical records and must survive profile deletion.
CREATE TABLE IF NOT EXISTS discovery_jobs (
    id                    TEXT PRIMARY KEY,
    name                  TEXT NOT NULL,
    status                TEXT NOT NULL,
    target_range          TEXT NOT NULL,
    credential_profile_id TEXT NOT NULL,
    results               TEXT,
    created_by            TEXT NOT NULL,
    created_at            TEXT NOT NULL,
    started_at            TEXT,
    completed_at          TEXT
);
CREATE INDEX IF NOT EXISTS idx_jobs_owner ON discovery_jobs(created_by);
CREATE INDEX IF NOT EXISTS idx_jobs_status ON discovery_jobs(status);
"#;

pub fn initialize(conn: &Connection) -> Result<(), DbError> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
