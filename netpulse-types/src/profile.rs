use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const DEFAULT_SSH_PORT: u16 = 22;

/// Owner-scoped SSH credential bundle.
///
/// The two `*_enc` fields hold AEAD ciphertext and are excluded from
/// serialization: neither ciphertext nor plaintext ever leaves the
/// process through the API surface.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialProfile {
    pub id: Uuid,
    pub name: String,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_enc: String,
    #[serde(skip_serializing)]
    pub private_key_enc: Option<String>,
    pub port: u16,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a profile. Secrets arrive in plaintext over the
/// (TLS-terminated) API and are encrypted before they touch the store.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileDraft {
    pub name: String,
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub private_key: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
}

/// Partial update of a profile. Absent fields keep their current value.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfilePatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub private_key: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
}

impl ProfilePatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.username.is_none()
            && self.password.is_none()
            && self.private_key.is_none()
            && self.port.is_none()
    }
}

/// Decrypted credentials, handed to the SSH prober inside a discovery
/// worker and nowhere else.
#[derive(Clone)]
pub struct SshCredentials {
    pub username: String,
    pub password: String,
    pub private_key: Option<String>,
    pub port: u16,
}

impl std::fmt::Debug for SshCredentials {
    // Keep plaintext secrets out of logs.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SshCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("private_key", &self.private_key.as_ref().map(|_| "<redacted>"))
            .field("port", &self.port)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_never_serializes_secrets() {
        let profile = CredentialProfile {
            id: Uuid::new_v4(),
            name: "lab".into(),
            username: "ops".into(),
            password_enc: "c2VjcmV0".into(),
            private_key_enc: Some("a2V5".into()),
            port: 22,
            created_by: Uuid::new_v4(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let json = serde_json::to_string(&profile).unwrap();
        assert!(!json.contains("password"));
        assert!(!json.contains("privateKey"));
        assert!(!json.contains("c2VjcmV0"));
    }

    #[test]
    fn debug_redacts_credentials() {
        let creds = SshCredentials {
            username: "ops".into(),
            password: "hunter2".into(),
            private_key: Some("-----BEGIN".into()),
            port: 22,
        };
        let printed = format!("{creds:?}");
        assert!(!printed.contains("hunter2"));
        assert!(!printed.contains("BEGIN"));
    }
}
