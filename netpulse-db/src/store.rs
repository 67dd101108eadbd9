use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::Connection;
use tracing::debug;
use uuid::Uuid;

use crate::error::DbError;
use crate::schema;

/// Persistent store backed by SQLite.
///
/// Each execution domain opens its own `Store` (and with it, its own
/// connection): the request domain and every discovery worker instance.
/// WAL mode lets those connections cooperate on one database file without
/// the blocking domain starving the request domain.
pub struct Store {
    pub(crate) conn: Connection,
}

impl Store {
    /// Open (or create) the database at `path`.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    DbError::Other(format!(
                        "failed to create db directory {}: {e}",
                        parent.display()
                    ))
                })?;
            }
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA busy_timeout = 5000;")?;
        schema::initialize(&conn)?;
        debug!(path = %path.display(), "store opened");
        Ok(Self { conn })
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        schema::initialize(&conn)?;
        Ok(Self { conn })
    }
}

// ---------------------------------------------------------------------------
// Column codec helpers shared by the store modules
// ---------------------------------------------------------------------------

pub(crate) fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Fixed-width RFC 3339 so timestamp columns sort lexicographically.
pub(crate) fn encode_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn decode_ts(raw: &str) -> Result<DateTime<Utc>, DbError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| DbError::Corrupt(format!("bad timestamp: {raw}")))
}

pub(crate) fn decode_opt_ts(raw: Option<String>) -> Result<Option<DateTime<Utc>>, DbError> {
    raw.as_deref().map(decode_ts).transpose()
}

pub(crate) fn decode_uuid(raw: &str) -> Result<Uuid, DbError> {
    Uuid::parse_str(raw).map_err(|_| DbError::Corrupt(format!("bad uuid: {raw}")))
}

pub(crate) fn decode_json(raw: &str) -> Result<serde_json::Value, DbError> {
    serde_json::from_str(raw).map_err(|_| DbError::Corrupt("bad json column".into()))
}
