use serde::{Deserialize, Serialize};

use crate::DeviceType;

/// Placeholder for a fact a host would not or could not report.
pub const UNKNOWN_FACT: &str = "unknown";

fn unknown() -> String {
    UNKNOWN_FACT.to_string()
}

/// System facts gathered from a host over SSH.
///
/// Field names match the JSON stored in `devices.os_info`, so a probe
/// result serializes straight into the device row.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceFacts {
    #[serde(default = "unknown")]
    pub hostname: String,
    #[serde(default = "unknown")]
    pub os: String,
    #[serde(default = "unknown")]
    pub os_version: String,
    #[serde(default = "unknown")]
    pub architecture: String,
    #[serde(default = "unknown")]
    pub uptime: String,
    #[serde(default = "unknown")]
    pub cpu_info: String,
    #[serde(default = "unknown")]
    pub memory_info: String,
    #[serde(default = "unknown")]
    pub disk_info: String,
}

impl DeviceFacts {
    /// Device classification derived from the reported OS name.
    pub fn device_type(&self) -> DeviceType {
        DeviceType::from_os_string(&self.os)
    }

    /// Full fact set as the JSON blob persisted with the device,
    /// including the derived `deviceType` the way the wire format
    /// always carried it.
    pub fn to_os_info(&self) -> serde_json::Value {
        let mut value = serde_json::to_value(self).unwrap_or_default();
        if let Some(map) = value.as_object_mut() {
            map.insert(
                "deviceType".to_string(),
                serde_json::Value::String(self.device_type().as_str().to_string()),
            );
        }
        value
    }
}

impl Default for DeviceFacts {
    fn default() -> Self {
        Self {
            hostname: unknown(),
            os: unknown(),
            os_version: unknown(),
            architecture: unknown(),
            uptime: unknown(),
            cpu_info: unknown(),
            memory_info: unknown(),
            disk_info: unknown(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn os_info_includes_derived_type() {
        let facts = DeviceFacts {
            hostname: "db01".into(),
            os: "Linux".into(),
            ..DeviceFacts::default()
        };
        let info = facts.to_os_info();
        assert_eq!(info["deviceType"], "linux");
        assert_eq!(info["hostname"], "db01");
        assert_eq!(info["osVersion"], UNKNOWN_FACT);
    }

    #[test]
    fn default_is_all_unknown() {
        let facts = DeviceFacts::default();
        assert_eq!(facts.hostname, UNKNOWN_FACT);
        assert_eq!(facts.device_type(), DeviceType::Unknown);
    }
}
