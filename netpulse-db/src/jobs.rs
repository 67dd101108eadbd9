// ---------------------------------------------------------------------------
// Discovery job store
// ---------------------------------------------------------------------------
//
// Status writes encode the job state machine as SQL guards: every UPDATE
// names the states it may move from, so concurrent writers can race freely
// and the row still only ever takes legal transitions.

use rusqlite::{params, OptionalExtension};
use tracing::debug;
use uuid::Uuid;

use netpulse_types::{DiscoveryJob, JobStatus};

use crate::error::DbError;
use crate::store::{decode_json, decode_opt_ts, decode_ts, decode_uuid, encode_ts, now, Store};

const JOB_COLUMNS: &str = "id, name, status, target_range, credential_profile_id, results, \
                           created_by, created_at, started_at, completed_at";

struct RawJob {
    id: String,
    name: String,
    status: String,
    target_range: String,
    credential_profile_id: String,
    results: Option<String>,
    created_by: String,
    created_at: String,
    started_at: Option<String>,
    completed_at: Option<String>,
}

fn read_job(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawJob> {
    Ok(RawJob {
        id: row.get(0)?,
        name: row.get(1)?,
        status: row.get(2)?,
        target_range: row.get(3)?,
        credential_profile_id: row.get(4)?,
        results: row.get(5)?,
        created_by: row.get(6)?,
        created_at: row.get(7)?,
        started_at: row.get(8)?,
        completed_at: row.get(9)?,
    })
}

impl TryFrom<RawJob> for DiscoveryJob {
    type Error = DbError;

    fn try_from(raw: RawJob) -> Result<Self, DbError> {
        let status: JobStatus = raw
            .status
            .parse()
            .map_err(|_| DbError::Corrupt(format!("bad job status: {}", raw.status)))?;
        Ok(DiscoveryJob {
            id: decode_uuid(&raw.id)?,
            name: raw.name,
            status,
            target_range: raw.target_range,
            credential_profile_id: decode_uuid(&raw.credential_profile_id)?,
            results: raw.results.as_deref().map(decode_json).transpose()?,
            created_by: decode_uuid(&raw.created_by)?,
            created_at: decode_ts(&raw.created_at)?,
            started_at: decode_opt_ts(raw.started_at)?,
            completed_at: decode_opt_ts(raw.completed_at)?,
        })
    }
}

impl Store {
    /// Persist a new job in `pending`.
    pub fn create_job(
        &self,
        name: &str,
        target_range: &str,
        profile_id: Uuid,
        owner: Uuid,
    ) -> Result<DiscoveryJob, DbError> {
        let id = Uuid::new_v4();

        self.conn.execute(
            "INSERT INTO discovery_jobs \
             (id, name, status, target_range, credential_profile_id, created_by, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                id.to_string(),
                name.trim(),
                JobStatus::Pending.as_str(),
                target_range.trim(),
                profile_id.to_string(),
                owner.to_string(),
                encode_ts(now()),
            ],
        )?;

        debug!(job_id = %id, "discovery job created");
        self.job_for_owner(id, owner)
    }

    pub fn job_for_owner(&self, id: Uuid, owner: Uuid) -> Result<DiscoveryJob, DbError> {
        let raw = self
            .conn
            .query_row(
                &format!(
                    "SELECT {JOB_COLUMNS} FROM discovery_jobs \
                     WHERE id = ?1 AND created_by = ?2"
                ),
                params![id.to_string(), owner.to_string()],
                read_job,
            )
            .optional()?
            .ok_or_else(|| DbError::NotFound(format!("discovery job {id}")))?;
        raw.try_into()
    }

    pub fn jobs_for_owner(&self, owner: Uuid) -> Result<Vec<DiscoveryJob>, DbError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {JOB_COLUMNS} FROM discovery_jobs \
             WHERE created_by = ?1 ORDER BY created_at DESC"
        ))?;
        let rows = stmt
            .query_map(params![owner.to_string()], read_job)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// `pending → running`, stamping `started_at`. Returns false when the
    /// job already left `pending` (e.g. cancelled before pickup).
    pub fn set_job_running(&self, id: Uuid) -> Result<bool, DbError> {
        let updated = self.conn.execute(
            "UPDATE discovery_jobs SET status = 'running', started_at = ?1 \
             WHERE id = ?2 AND status = 'pending'",
            params![encode_ts(now()), id.to_string()],
        )?;
        Ok(updated > 0)
    }

    /// `running → completed`, writing the summary and `completed_at`.
    ///
    /// Compare-and-set on `running`: a job cancelled mid-pipeline stays
    /// `failed` with its cancellation marker, and the completion write is
    /// reported as lost (false).
    pub fn complete_job(&self, id: Uuid, summary: &serde_json::Value) -> Result<bool, DbError> {
        let updated = self.conn.execute(
            "UPDATE discovery_jobs \
             SET status = 'completed', results = ?1, completed_at = ?2 \
             WHERE id = ?3 AND status = 'running'",
            params![summary.to_string(), encode_ts(now()), id.to_string()],
        )?;
        Ok(updated > 0)
    }

    /// `{pending, running} → failed`, writing the error summary. A job
    /// already terminal is left untouched.
    pub fn fail_job(&self, id: Uuid, summary: &serde_json::Value) -> Result<bool, DbError> {
        let updated = self.conn.execute(
            "UPDATE discovery_jobs \
             SET status = 'failed', results = ?1, completed_at = ?2 \
             WHERE id = ?3 AND status IN ('pending', 'running')",
            params![summary.to_string(), encode_ts(now()), id.to_string()],
        )?;
        Ok(updated > 0)
    }

    /// Advisory cancellation: `{pending, running} → failed` with a
    /// cancellation marker merged into the results JSON. A job that is
    /// already terminal (including one cancelled a moment earlier) is
    /// `NotFound`: cancel has nothing left to act on.
    pub fn cancel_job(&self, id: Uuid, owner: Uuid) -> Result<(), DbError> {
        let ts = encode_ts(now());
        let marker = serde_json::json!({ "cancelled": true, "cancelled_at": ts });

        let updated = self.conn.execute(
            "UPDATE discovery_jobs \
             SET status = 'failed', \
                 completed_at = ?1, \
                 results = json_patch(COALESCE(results, '{}'), ?2) \
             WHERE id = ?3 AND created_by = ?4 AND status IN ('pending', 'running')",
            params![ts, marker.to_string(), id.to_string(), owner.to_string()],
        )?;

        if updated == 0 {
            return Err(DbError::NotFound(format!(
                "discovery job {id} not cancellable"
            )));
        }
        debug!(job_id = %id, "discovery job cancelled");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded_job(store: &Store, owner: Uuid) -> DiscoveryJob {
        store
            .create_job("sweep", "10.0.0.0/30", Uuid::new_v4(), owner)
            .unwrap()
    }

    #[test]
    fn create_starts_pending() {
        let store = Store::open_in_memory().unwrap();
        let owner = Uuid::new_v4();
        let job = seeded_job(&store, owner);

        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.target_range, "10.0.0.0/30");
        assert_eq!(job.created_by, owner);
        assert!(job.started_at.is_none());
        assert!(job.completed_at.is_none());
        assert!(job.results.is_none());
    }

    #[test]
    fn happy_path_transition_stamps() {
        let store = Store::open_in_memory().unwrap();
        let owner = Uuid::new_v4();
        let job = seeded_job(&store, owner);

        assert!(store.set_job_running(job.id).unwrap());
        let running = store.job_for_owner(job.id, owner).unwrap();
        assert_eq!(running.status, JobStatus::Running);
        assert!(running.started_at.is_some());
        assert!(running.completed_at.is_none());

        let summary = serde_json::json!({
            "totalIpsScanned": 2, "devicesDiscovered": 0, "devices": []
        });
        assert!(store.complete_job(job.id, &summary).unwrap());
        let done = store.job_for_owner(job.id, owner).unwrap();
        assert_eq!(done.status, JobStatus::Completed);
        assert!(done.completed_at.is_some());
        assert_eq!(done.results.unwrap()["totalIpsScanned"], 2);
    }

    #[test]
    fn running_guard_blocks_double_start() {
        let store = Store::open_in_memory().unwrap();
        let owner = Uuid::new_v4();
        let job = seeded_job(&store, owner);

        assert!(store.set_job_running(job.id).unwrap());
        assert!(!store.set_job_running(job.id).unwrap());
    }

    #[test]
    fn completion_cannot_reach_pending_job() {
        let store = Store::open_in_memory().unwrap();
        let owner = Uuid::new_v4();
        let job = seeded_job(&store, owner);

        let summary = serde_json::json!({"devicesDiscovered": 0});
        assert!(!store.complete_job(job.id, &summary).unwrap());
        assert_eq!(
            store.job_for_owner(job.id, owner).unwrap().status,
            JobStatus::Pending
        );
    }

    #[test]
    fn cancel_writes_marker_and_fails_job() {
        let store = Store::open_in_memory().unwrap();
        let owner = Uuid::new_v4();
        let job = seeded_job(&store, owner);
        store.set_job_running(job.id).unwrap();

        store.cancel_job(job.id, owner).unwrap();
        let cancelled = store.job_for_owner(job.id, owner).unwrap();
        assert_eq!(cancelled.status, JobStatus::Failed);
        assert!(cancelled.completed_at.is_some());
        let results = cancelled.results.unwrap();
        assert_eq!(results["cancelled"], true);
        assert!(results["cancelled_at"].is_string());
    }

    #[test]
    fn cancel_is_not_repeatable() {
        let store = Store::open_in_memory().unwrap();
        let owner = Uuid::new_v4();
        let job = seeded_job(&store, owner);

        store.cancel_job(job.id, owner).unwrap();
        // Terminal now; a second cancel has nothing to act on.
        assert!(matches!(
            store.cancel_job(job.id, owner),
            Err(DbError::NotFound(_))
        ));
        assert_eq!(
            store.job_for_owner(job.id, owner).unwrap().status,
            JobStatus::Failed
        );
    }

    #[test]
    fn completion_loses_race_against_cancel() {
        let store = Store::open_in_memory().unwrap();
        let owner = Uuid::new_v4();
        let job = seeded_job(&store, owner);
        store.set_job_running(job.id).unwrap();

        store.cancel_job(job.id, owner).unwrap();

        // Pipeline finishes afterwards; its summary must not clobber the
        // cancellation marker.
        let summary = serde_json::json!({"devicesDiscovered": 3});
        assert!(!store.complete_job(job.id, &summary).unwrap());

        let final_job = store.job_for_owner(job.id, owner).unwrap();
        assert_eq!(final_job.status, JobStatus::Failed);
        assert_eq!(final_job.results.unwrap()["cancelled"], true);
    }

    #[test]
    fn fail_preserves_cancelled_summary() {
        let store = Store::open_in_memory().unwrap();
        let owner = Uuid::new_v4();
        let job = seeded_job(&store, owner);
        store.set_job_running(job.id).unwrap();
        store.cancel_job(job.id, owner).unwrap();

        let error = serde_json::json!({"error": "boom"});
        assert!(!store.fail_job(job.id, &error).unwrap());
        let final_job = store.job_for_owner(job.id, owner).unwrap();
        assert_eq!(final_job.results.unwrap()["cancelled"], true);
    }

    #[test]
    fn owner_gate_on_reads_and_cancel() {
        let store = Store::open_in_memory().unwrap();
        let owner = Uuid::new_v4();
        let stranger = Uuid::new_v4();
        let job = seeded_job(&store, owner);

        assert!(matches!(
            store.job_for_owner(job.id, stranger),
            Err(DbError::NotFound(_))
        ));
        assert!(matches!(
            store.cancel_job(job.id, stranger),
            Err(DbError::NotFound(_))
        ));
        // The owner still sees a perfectly healthy pending job.
        assert_eq!(
            store.job_for_owner(job.id, owner).unwrap().status,
            JobStatus::Pending
        );
    }

    #[test]
    fn listing_is_newest_first_and_owner_scoped() {
        let store = Store::open_in_memory().unwrap();
        let owner = Uuid::new_v4();
        let first = seeded_job(&store, owner);
        std::thread::sleep(std::time::Duration::from_millis(2));
        let second = seeded_job(&store, owner);
        seeded_job(&store, Uuid::new_v4());

        let jobs = store.jobs_for_owner(owner).unwrap();
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].id, second.id);
        assert_eq!(jobs[1].id, first.id);
    }
}
