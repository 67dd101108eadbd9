// ---------------------------------------------------------------------------
// Shared domain types
// ---------------------------------------------------------------------------
//
// Devices, discovery jobs and credential profiles, with their closed status
// enums. Statuses are tagged sum types inside the system; strings only exist
// at the persistence and wire edges.

mod device;
mod facts;
mod job;
mod profile;

pub use device::{Device, DevicePatch, DeviceStatus, DeviceType, NewDevice};
pub use facts::{DeviceFacts, UNKNOWN_FACT};
pub use job::{DiscoveryJob, DiscoveryRequest, JobStatus};
pub use profile::{
    CredentialProfile, ProfileDraft, ProfilePatch, SshCredentials, DEFAULT_SSH_PORT,
};

/// Failure to parse a closed enumeration from its wire/persistence string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

impl ParseEnumError {
    pub fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

impl std::fmt::Display for ParseEnumError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown {}: {}", self.kind, self.value)
    }
}

impl std::error::Error for ParseEnumError {}
