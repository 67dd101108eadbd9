use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ParseEnumError;

/// Rough classification of a discovered host, derived from `uname -s`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    Linux,
    Macos,
    Windows,
    Unknown,
}

impl DeviceType {
    /// Classify an OS string reported by the host itself.
    pub fn from_os_string(os: &str) -> Self {
        let os = os.to_ascii_lowercase();
        if os.contains("linux") {
            DeviceType::Linux
        } else if os.contains("darwin") {
            DeviceType::Macos
        } else if os.contains("windows") {
            DeviceType::Windows
        } else {
            DeviceType::Unknown
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceType::Linux => "linux",
            DeviceType::Macos => "macos",
            DeviceType::Windows => "windows",
            DeviceType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeviceType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "linux" => Ok(DeviceType::Linux),
            "macos" => Ok(DeviceType::Macos),
            "windows" => Ok(DeviceType::Windows),
            "unknown" => Ok(DeviceType::Unknown),
            other => Err(ParseEnumError::new("device type", other)),
        }
    }
}

/// Monitoring status of a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceStatus {
    Online,
    Offline,
    Unknown,
    Error,
}

impl DeviceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceStatus::Online => "online",
            DeviceStatus::Offline => "offline",
            DeviceStatus::Unknown => "unknown",
            DeviceStatus::Error => "error",
        }
    }
}

impl fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeviceStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "online" => Ok(DeviceStatus::Online),
            "offline" => Ok(DeviceStatus::Offline),
            "unknown" => Ok(DeviceStatus::Unknown),
            "error" => Ok(DeviceStatus::Error),
            other => Err(ParseEnumError::new("device status", other)),
        }
    }
}

/// A host known to the system, discovered or registered by hand.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    pub id: Uuid,
    pub hostname: String,
    pub ip_address: Ipv4Addr,
    pub device_type: DeviceType,
    pub os_info: serde_json::Value,
    pub credential_profile_id: Uuid,
    pub status: DeviceStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields required to register a new device.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewDevice {
    pub hostname: String,
    pub ip_address: Ipv4Addr,
    pub device_type: DeviceType,
    #[serde(default)]
    pub os_info: serde_json::Value,
    pub credential_profile_id: Uuid,
    pub status: DeviceStatus,
}

/// Partial update of a device. Absent fields keep their current value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DevicePatch {
    #[serde(default)]
    pub hostname: Option<String>,
    #[serde(default)]
    pub ip_address: Option<Ipv4Addr>,
    #[serde(default)]
    pub device_type: Option<DeviceType>,
    #[serde(default)]
    pub os_info: Option<serde_json::Value>,
    #[serde(default)]
    pub status: Option<DeviceStatus>,
}

impl DevicePatch {
    pub fn is_empty(&self) -> bool {
        self.hostname.is_none()
            && self.ip_address.is_none()
            && self.device_type.is_none()
            && self.os_info.is_none()
            && self.status.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_type_from_os_string() {
        assert_eq!(DeviceType::from_os_string("Linux"), DeviceType::Linux);
        assert_eq!(DeviceType::from_os_string("Darwin"), DeviceType::Macos);
        assert_eq!(DeviceType::from_os_string("WINDOWS_NT"), DeviceType::Windows);
        assert_eq!(DeviceType::from_os_string("FreeBSD"), DeviceType::Unknown);
        assert_eq!(DeviceType::from_os_string(""), DeviceType::Unknown);
    }

    #[test]
    fn status_string_roundtrip() {
        for status in [
            DeviceStatus::Online,
            DeviceStatus::Offline,
            DeviceStatus::Unknown,
            DeviceStatus::Error,
        ] {
            assert_eq!(status.as_str().parse::<DeviceStatus>().unwrap(), status);
        }
        assert!("bogus".parse::<DeviceStatus>().is_err());
    }

    #[test]
    fn device_serializes_camel_case() {
        let device = Device {
            id: Uuid::new_v4(),
            hostname: "web01".into(),
            ip_address: Ipv4Addr::new(10, 0, 0, 7),
            device_type: DeviceType::Linux,
            os_info: serde_json::json!({"os": "Linux"}),
            credential_profile_id: Uuid::new_v4(),
            status: DeviceStatus::Online,
            last_seen: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let json = serde_json::to_value(&device).unwrap();
        assert_eq!(json["ipAddress"], "10.0.0.7");
        assert_eq!(json["deviceType"], "linux");
        assert!(json.get("last_seen").is_none());
        assert!(json.get("lastSeen").is_none());
    }
}
