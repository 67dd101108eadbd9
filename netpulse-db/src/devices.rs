// ---------------------------------------------------------------------------
// Device store
// ---------------------------------------------------------------------------
//
// Ownership is transitive: a device belongs to whoever owns the credential
// profile that discovered it. Every read joins through credential_profiles
// and every write gates on the same subquery, so a non-owned row behaves
// exactly like a missing one.

use std::net::Ipv4Addr;
use std::str::FromStr;

use rusqlite::{params, OptionalExtension};
use tracing::debug;
use uuid::Uuid;

use netpulse_types::{Device, DevicePatch, DeviceStatus, DeviceType, NewDevice};

use crate::error::DbError;
use crate::store::{decode_json, decode_opt_ts, decode_ts, decode_uuid, encode_ts, now, Store};

const DEVICE_COLUMNS: &str = "d.id, d.hostname, d.ip_address, d.device_type, d.os_info, \
                              d.credential_profile_id, d.status, d.last_seen, d.created_at, d.updated_at";

const OWNED_DEVICES: &str = "FROM devices d \
                             JOIN credential_profiles cp ON d.credential_profile_id = cp.id \
                             WHERE cp.created_by = ?1";

/// Write gate: the device ids visible to one owner.
const OWNED_IDS: &str = "SELECT d.id FROM devices d \
                         JOIN credential_profiles cp ON d.credential_profile_id = cp.id \
                         WHERE cp.created_by = ?";

struct RawDevice {
    id: String,
    hostname: String,
    ip_address: String,
    device_type: String,
    os_info: String,
    credential_profile_id: String,
    status: String,
    last_seen: Option<String>,
    created_at: String,
    updated_at: String,
}

fn read_device(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawDevice> {
    Ok(RawDevice {
        id: row.get(0)?,
        hostname: row.get(1)?,
        ip_address: row.get(2)?,
        device_type: row.get(3)?,
        os_info: row.get(4)?,
        credential_profile_id: row.get(5)?,
        status: row.get(6)?,
        last_seen: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

impl TryFrom<RawDevice> for Device {
    type Error = DbError;

    fn try_from(raw: RawDevice) -> Result<Self, DbError> {
        Ok(Device {
            id: decode_uuid(&raw.id)?,
            hostname: raw.hostname,
            ip_address: Ipv4Addr::from_str(&raw.ip_address)
                .map_err(|_| DbError::Corrupt(format!("bad ip: {}", raw.ip_address)))?,
            device_type: DeviceType::from_str(&raw.device_type)
                .map_err(|_| DbError::Corrupt(format!("bad device type: {}", raw.device_type)))?,
            os_info: decode_json(&raw.os_info)?,
            credential_profile_id: decode_uuid(&raw.credential_profile_id)?,
            status: DeviceStatus::from_str(&raw.status)
                .map_err(|_| DbError::Corrupt(format!("bad device status: {}", raw.status)))?,
            last_seen: decode_opt_ts(raw.last_seen)?,
            created_at: decode_ts(&raw.created_at)?,
            updated_at: decode_ts(&raw.updated_at)?,
        })
    }
}

impl Store {
    /// Upsert a device found by a discovery probe. One row per
    /// `(profile, address)`: a rescan refreshes facts, status and
    /// `last_seen` instead of piling up duplicates.
    pub fn insert_discovered(&self, new: &NewDevice) -> Result<Device, DbError> {
        let ts = encode_ts(now());

        self.conn.execute(
            "INSERT INTO devices \
             (id, hostname, ip_address, device_type, os_info, credential_profile_id, \
              status, last_seen, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9) \
             ON CONFLICT (credential_profile_id, ip_address) DO UPDATE SET \
                 hostname = excluded.hostname, \
                 device_type = excluded.device_type, \
                 os_info = excluded.os_info, \
                 status = excluded.status, \
                 last_seen = excluded.last_seen, \
                 updated_at = excluded.updated_at",
            params![
                Uuid::new_v4().to_string(),
                new.hostname,
                new.ip_address.to_string(),
                new.device_type.as_str(),
                new.os_info.to_string(),
                new.credential_profile_id.to_string(),
                new.status.as_str(),
                ts,
                ts,
            ],
        )?;

        debug!(ip = %new.ip_address, hostname = %new.hostname, "discovered device stored");
        self.device_by_address(new.credential_profile_id, new.ip_address)
    }

    /// Manual device registration through the API. The profile must belong
    /// to the caller; a duplicate address on the same profile is a conflict
    /// rather than a silent refresh.
    pub fn create_device(&self, new: &NewDevice, owner: Uuid) -> Result<Device, DbError> {
        // Surfaces NotFound for foreign or missing profiles.
        self.profile_for_owner(new.credential_profile_id, owner)?;

        let ts = encode_ts(now());
        let result = self.conn.execute(
            "INSERT INTO devices \
             (id, hostname, ip_address, device_type, os_info, credential_profile_id, \
              status, last_seen, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, NULL, ?8, ?8)",
            params![
                Uuid::new_v4().to_string(),
                new.hostname,
                new.ip_address.to_string(),
                new.device_type.as_str(),
                new.os_info.to_string(),
                new.credential_profile_id.to_string(),
                new.status.as_str(),
                ts,
            ],
        );

        match result {
            Ok(_) => self.device_by_address(new.credential_profile_id, new.ip_address),
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(DbError::Conflict(format!(
                    "device {} already registered for this profile",
                    new.ip_address
                )))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn device_by_address(&self, profile_id: Uuid, ip: Ipv4Addr) -> Result<Device, DbError> {
        let raw = self
            .conn
            .query_row(
                &format!(
                    "SELECT {DEVICE_COLUMNS} FROM devices d \
                     WHERE d.credential_profile_id = ?1 AND d.ip_address = ?2"
                ),
                params![profile_id.to_string(), ip.to_string()],
                read_device,
            )
            .optional()?
            .ok_or_else(|| DbError::NotFound(format!("device {ip}")))?;
        raw.try_into()
    }

    pub fn device_for_owner(&self, id: Uuid, owner: Uuid) -> Result<Device, DbError> {
        let raw = self
            .conn
            .query_row(
                &format!("SELECT {DEVICE_COLUMNS} {OWNED_DEVICES} AND d.id = ?2"),
                params![owner.to_string(), id.to_string()],
                read_device,
            )
            .optional()?
            .ok_or_else(|| DbError::NotFound(format!("device {id}")))?;
        raw.try_into()
    }

    pub fn devices_for_owner(&self, owner: Uuid) -> Result<Vec<Device>, DbError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {DEVICE_COLUMNS} {OWNED_DEVICES} ORDER BY d.created_at DESC"
        ))?;
        let rows = stmt
            .query_map(params![owner.to_string()], read_device)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    pub fn devices_by_status(
        &self,
        status: DeviceStatus,
        owner: Uuid,
    ) -> Result<Vec<Device>, DbError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {DEVICE_COLUMNS} {OWNED_DEVICES} AND d.status = ?2 \
             ORDER BY d.created_at DESC"
        ))?;
        let rows = stmt
            .query_map(params![owner.to_string(), status.as_str()], read_device)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Devices linked to one credential profile, owner-gated.
    pub fn devices_for_profile(
        &self,
        profile_id: Uuid,
        owner: Uuid,
    ) -> Result<Vec<Device>, DbError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {DEVICE_COLUMNS} {OWNED_DEVICES} AND d.credential_profile_id = ?2 \
             ORDER BY d.created_at DESC"
        ))?;
        let rows = stmt
            .query_map(
                params![owner.to_string(), profile_id.to_string()],
                read_device,
            )?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Substring match on hostname or address text.
    pub fn search_devices(&self, query: &str, owner: Uuid) -> Result<Vec<Device>, DbError> {
        let pattern = format!("%{}%", query.trim());
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {DEVICE_COLUMNS} {OWNED_DEVICES} \
             AND (d.hostname LIKE ?2 OR d.ip_address LIKE ?2) \
             ORDER BY d.created_at DESC"
        ))?;
        let rows = stmt
            .query_map(params![owner.to_string(), pattern], read_device)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Merge a partial update into an owned device.
    pub fn update_device(
        &self,
        id: Uuid,
        owner: Uuid,
        patch: DevicePatch,
    ) -> Result<Device, DbError> {
        let current = self.device_for_owner(id, owner)?;

        let hostname = patch.hostname.unwrap_or(current.hostname);
        let ip_address = patch.ip_address.unwrap_or(current.ip_address);
        let device_type = patch.device_type.unwrap_or(current.device_type);
        let os_info = patch.os_info.unwrap_or(current.os_info);
        let status = patch.status.unwrap_or(current.status);

        self.conn.execute(
            &format!(
                "UPDATE devices SET hostname = ?2, ip_address = ?3, device_type = ?4, \
                 os_info = ?5, status = ?6, updated_at = ?7 \
                 WHERE id = ?1 AND id IN ({OWNED_IDS})"
            ),
            params![
                id.to_string(),
                hostname,
                ip_address.to_string(),
                device_type.as_str(),
                os_info.to_string(),
                status.as_str(),
                encode_ts(now()),
                owner.to_string(),
            ],
        )?;

        self.device_for_owner(id, owner)
    }

    pub fn set_device_status(
        &self,
        id: Uuid,
        status: DeviceStatus,
        owner: Uuid,
    ) -> Result<(), DbError> {
        let ts = encode_ts(now());
        let updated = self.conn.execute(
            &format!(
                "UPDATE devices SET status = ?2, last_seen = ?3, updated_at = ?3 \
                 WHERE id = ?1 AND id IN ({OWNED_IDS})"
            ),
            params![id.to_string(), status.as_str(), ts, owner.to_string()],
        )?;
        if updated == 0 {
            return Err(DbError::NotFound(format!("device {id}")));
        }
        Ok(())
    }

    pub fn delete_device(&self, id: Uuid, owner: Uuid) -> Result<(), DbError> {
        let deleted = self.conn.execute(
            &format!("DELETE FROM devices WHERE id = ?1 AND id IN ({OWNED_IDS})"),
            params![id.to_string(), owner.to_string()],
        )?;
        if deleted == 0 {
            return Err(DbError::NotFound(format!("device {id}")));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profiles::EncryptedDraft;

    fn seeded_profile(store: &Store, owner: Uuid) -> Uuid {
        store
            .create_profile(
                EncryptedDraft {
                    name: "lab".into(),
                    username: "ops".into(),
                    password_enc: "sealed".into(),
                    private_key_enc: None,
                    port: 22,
                },
                owner,
            )
            .unwrap()
            .id
    }

    fn discovered(profile: Uuid, ip: [u8; 4], hostname: &str) -> NewDevice {
        NewDevice {
            hostname: hostname.into(),
            ip_address: Ipv4Addr::from(ip),
            device_type: DeviceType::Linux,
            os_info: serde_json::json!({"os": "Linux", "hostname": hostname}),
            credential_profile_id: profile,
            status: DeviceStatus::Online,
        }
    }

    #[test]
    fn discovery_insert_roundtrip() {
        let store = Store::open_in_memory().unwrap();
        let owner = Uuid::new_v4();
        let profile = seeded_profile(&store, owner);

        let device = store
            .insert_discovered(&discovered(profile, [10, 0, 0, 5], "web01"))
            .unwrap();
        assert_eq!(device.hostname, "web01");
        assert_eq!(device.status, DeviceStatus::Online);
        assert!(device.last_seen.is_some());

        let fetched = store.device_for_owner(device.id, owner).unwrap();
        assert_eq!(fetched.ip_address, Ipv4Addr::new(10, 0, 0, 5));
        assert_eq!(fetched.os_info["os"], "Linux");
    }

    #[test]
    fn rescan_refreshes_instead_of_duplicating() {
        let store = Store::open_in_memory().unwrap();
        let owner = Uuid::new_v4();
        let profile = seeded_profile(&store, owner);

        let first = store
            .insert_discovered(&discovered(profile, [10, 0, 0, 5], "web01"))
            .unwrap();
        let second = store
            .insert_discovered(&discovered(profile, [10, 0, 0, 5], "web01-renamed"))
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.hostname, "web01-renamed");
        assert_eq!(store.devices_for_owner(owner).unwrap().len(), 1);
    }

    #[test]
    fn same_address_under_two_profiles_is_two_devices() {
        let store = Store::open_in_memory().unwrap();
        let owner = Uuid::new_v4();
        let profile_a = seeded_profile(&store, owner);
        let profile_b = seeded_profile(&store, owner);

        store
            .insert_discovered(&discovered(profile_a, [10, 0, 0, 5], "a"))
            .unwrap();
        store
            .insert_discovered(&discovered(profile_b, [10, 0, 0, 5], "b"))
            .unwrap();
        assert_eq!(store.devices_for_owner(owner).unwrap().len(), 2);
    }

    #[test]
    fn ownership_is_enforced_through_profile_join() {
        let store = Store::open_in_memory().unwrap();
        let owner = Uuid::new_v4();
        let stranger = Uuid::new_v4();
        let profile = seeded_profile(&store, owner);
        let device = store
            .insert_discovered(&discovered(profile, [10, 0, 0, 5], "web01"))
            .unwrap();

        assert!(matches!(
            store.device_for_owner(device.id, stranger),
            Err(DbError::NotFound(_))
        ));
        assert!(matches!(
            store.delete_device(device.id, stranger),
            Err(DbError::NotFound(_))
        ));
        assert!(matches!(
            store.set_device_status(device.id, DeviceStatus::Offline, stranger),
            Err(DbError::NotFound(_))
        ));
        assert!(store.devices_for_owner(stranger).unwrap().is_empty());

        // Still intact for the owner.
        assert_eq!(
            store.device_for_owner(device.id, owner).unwrap().status,
            DeviceStatus::Online
        );
    }

    #[test]
    fn status_filter_and_update() {
        let store = Store::open_in_memory().unwrap();
        let owner = Uuid::new_v4();
        let profile = seeded_profile(&store, owner);
        let device = store
            .insert_discovered(&discovered(profile, [10, 0, 0, 5], "web01"))
            .unwrap();
        store
            .insert_discovered(&discovered(profile, [10, 0, 0, 6], "web02"))
            .unwrap();

        store
            .set_device_status(device.id, DeviceStatus::Offline, owner)
            .unwrap();
        let offline = store.devices_by_status(DeviceStatus::Offline, owner).unwrap();
        assert_eq!(offline.len(), 1);
        assert_eq!(offline[0].id, device.id);
        assert_eq!(
            store.devices_by_status(DeviceStatus::Online, owner).unwrap().len(),
            1
        );
    }

    #[test]
    fn search_matches_hostname_and_address() {
        let store = Store::open_in_memory().unwrap();
        let owner = Uuid::new_v4();
        let profile = seeded_profile(&store, owner);
        store
            .insert_discovered(&discovered(profile, [10, 0, 0, 5], "web01"))
            .unwrap();
        store
            .insert_discovered(&discovered(profile, [192, 168, 7, 9], "db01"))
            .unwrap();

        assert_eq!(store.search_devices("web", owner).unwrap().len(), 1);
        assert_eq!(store.search_devices("192.168", owner).unwrap().len(), 1);
        assert_eq!(store.search_devices("0", owner).unwrap().len(), 2);
        assert!(store.search_devices("nothing", owner).unwrap().is_empty());
    }

    #[test]
    fn partial_update_merges() {
        let store = Store::open_in_memory().unwrap();
        let owner = Uuid::new_v4();
        let profile = seeded_profile(&store, owner);
        let device = store
            .insert_discovered(&discovered(profile, [10, 0, 0, 5], "web01"))
            .unwrap();

        let updated = store
            .update_device(
                device.id,
                owner,
                DevicePatch {
                    hostname: Some("renamed".into()),
                    ..DevicePatch::default()
                },
            )
            .unwrap();
        assert_eq!(updated.hostname, "renamed");
        assert_eq!(updated.ip_address, device.ip_address);
        assert_eq!(updated.device_type, device.device_type);
    }

    #[test]
    fn manual_create_rejects_foreign_profile_and_duplicates() {
        let store = Store::open_in_memory().unwrap();
        let owner = Uuid::new_v4();
        let profile = seeded_profile(&store, owner);

        let new = discovered(profile, [10, 0, 0, 5], "web01");
        store.create_device(&new, owner).unwrap();

        assert!(matches!(
            store.create_device(&new, owner),
            Err(DbError::Conflict(_))
        ));
        assert!(matches!(
            store.create_device(&new, Uuid::new_v4()),
            Err(DbError::NotFound(_))
        ));
    }

    #[test]
    fn profile_delete_restricted_while_devices_remain() {
        let store = Store::open_in_memory().unwrap();
        let owner = Uuid::new_v4();
        let profile = seeded_profile(&store, owner);
        let device = store
            .insert_discovered(&discovered(profile, [10, 0, 0, 5], "web01"))
            .unwrap();

        assert!(matches!(
            store.delete_profile(profile, owner),
            Err(DbError::Conflict(_))
        ));

        store.delete_device(device.id, owner).unwrap();
        store.delete_profile(profile, owner).unwrap();
    }
}
