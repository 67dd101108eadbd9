// ---------------------------------------------------------------------------
// Credential profile store
// ---------------------------------------------------------------------------

use rusqlite::{params, OptionalExtension};
use tracing::debug;
use uuid::Uuid;

use netpulse_types::CredentialProfile;

use crate::error::DbError;
use crate::store::{decode_ts, decode_uuid, encode_ts, now, Store};

/// Profile fields as they reach the store: secrets already sealed by the
/// caller. The store never sees plaintext credentials.
#[derive(Debug, Clone)]
pub struct EncryptedDraft {
    pub name: String,
    pub username: String,
    pub password_enc: String,
    pub private_key_enc: Option<String>,
    pub port: u16,
}

/// Partial profile update, secrets sealed. Absent fields keep their value.
#[derive(Debug, Clone, Default)]
pub struct EncryptedPatch {
    pub name: Option<String>,
    pub username: Option<String>,
    pub password_enc: Option<String>,
    pub private_key_enc: Option<String>,
    pub port: Option<u16>,
}

/// Ciphertext credentials plus connection parameters, read only by
/// discovery workers that are about to decrypt them.
#[derive(Debug, Clone)]
pub struct ProfileSecrets {
    pub username: String,
    pub password_enc: String,
    pub private_key_enc: Option<String>,
    pub port: u16,
}

const PROFILE_COLUMNS: &str =
    "id, name, username, password_enc, private_key_enc, port, created_by, created_at, updated_at";

struct RawProfile {
    id: String,
    name: String,
    username: String,
    password_enc: String,
    private_key_enc: Option<String>,
    port: u16,
    created_by: String,
    created_at: String,
    updated_at: String,
}

fn read_profile(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawProfile> {
    Ok(RawProfile {
        id: row.get(0)?,
        name: row.get(1)?,
        username: row.get(2)?,
        password_enc: row.get(3)?,
        private_key_enc: row.get(4)?,
        port: row.get(5)?,
        created_by: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

impl TryFrom<RawProfile> for CredentialProfile {
    type Error = DbError;

    fn try_from(raw: RawProfile) -> Result<Self, DbError> {
        Ok(CredentialProfile {
            id: decode_uuid(&raw.id)?,
            name: raw.name,
            username: raw.username,
            password_enc: raw.password_enc,
            private_key_enc: raw.private_key_enc,
            port: raw.port,
            created_by: decode_uuid(&raw.created_by)?,
            created_at: decode_ts(&raw.created_at)?,
            updated_at: decode_ts(&raw.updated_at)?,
        })
    }
}

impl Store {
    pub fn create_profile(
        &self,
        draft: EncryptedDraft,
        owner: Uuid,
    ) -> Result<CredentialProfile, DbError> {
        let id = Uuid::new_v4();
        let ts = now();

        self.conn.execute(
            "INSERT INTO credential_profiles \
             (id, name, username, password_enc, private_key_enc, port, created_by, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                id.to_string(),
                draft.name,
                draft.username,
                draft.password_enc,
                draft.private_key_enc,
                draft.port,
                owner.to_string(),
                encode_ts(ts),
                encode_ts(ts),
            ],
        )?;

        debug!(profile_id = %id, "credential profile created");
        self.profile_for_owner(id, owner)
    }

    pub fn profile_for_owner(
        &self,
        id: Uuid,
        owner: Uuid,
    ) -> Result<CredentialProfile, DbError> {
        let raw = self
            .conn
            .query_row(
                &format!(
                    "SELECT {PROFILE_COLUMNS} FROM credential_profiles \
                     WHERE id = ?1 AND created_by = ?2"
                ),
                params![id.to_string(), owner.to_string()],
                read_profile,
            )
            .optional()?
            .ok_or_else(|| DbError::NotFound(format!("credential profile {id}")))?;
        raw.try_into()
    }

    pub fn profiles_for_owner(&self, owner: Uuid) -> Result<Vec<CredentialProfile>, DbError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {PROFILE_COLUMNS} FROM credential_profiles \
             WHERE created_by = ?1 ORDER BY created_at DESC"
        ))?;
        let rows = stmt
            .query_map(params![owner.to_string()], read_profile)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Merge a partial update into an owned profile.
    pub fn update_profile(
        &self,
        id: Uuid,
        owner: Uuid,
        patch: EncryptedPatch,
    ) -> Result<CredentialProfile, DbError> {
        let current = self.profile_for_owner(id, owner)?;

        let name = patch.name.unwrap_or(current.name);
        let username = patch.username.unwrap_or(current.username);
        let password_enc = patch.password_enc.unwrap_or(current.password_enc);
        let private_key_enc = patch.private_key_enc.or(current.private_key_enc);
        let port = patch.port.unwrap_or(current.port);

        self.conn.execute(
            "UPDATE credential_profiles \
             SET name = ?1, username = ?2, password_enc = ?3, private_key_enc = ?4, \
                 port = ?5, updated_at = ?6 \
             WHERE id = ?7 AND created_by = ?8",
            params![
                name,
                username,
                password_enc,
                private_key_enc,
                port,
                encode_ts(now()),
                id.to_string(),
                owner.to_string(),
            ],
        )?;

        self.profile_for_owner(id, owner)
    }

    /// Delete an owned profile. Fails with `Conflict` while devices still
    /// reference it (restrict, not cascade).
    pub fn delete_profile(&self, id: Uuid, owner: Uuid) -> Result<(), DbError> {
        let result = self.conn.execute(
            "DELETE FROM credential_profiles WHERE id = ?1 AND created_by = ?2",
            params![id.to_string(), owner.to_string()],
        );

        match result {
            Ok(0) => Err(DbError::NotFound(format!("credential profile {id}"))),
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(DbError::Conflict(
                    "credential profile is still referenced by devices".into(),
                ))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Ciphertext credentials for a profile, by id alone. Ownership was
    /// checked when the job referencing this profile was created; this
    /// read happens inside a discovery worker.
    pub fn credential_secrets(&self, id: Uuid) -> Result<ProfileSecrets, DbError> {
        self.conn
            .query_row(
                "SELECT username, password_enc, private_key_enc, port \
                 FROM credential_profiles WHERE id = ?1",
                params![id.to_string()],
                |row| {
                    Ok(ProfileSecrets {
                        username: row.get(0)?,
                        password_enc: row.get(1)?,
                        private_key_enc: row.get(2)?,
                        port: row.get(3)?,
                    })
                },
            )
            .optional()?
            .ok_or_else(|| DbError::NotFound(format!("credential profile {id}")))
    }
}
