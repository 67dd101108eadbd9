use netpulse_db::DbError;
use netpulse_secrets::SecretError;

/// Error surface of the discovery engine, shared verbatim by the direct
/// service and the transport-backed proxy.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Bad caller input: blank field, malformed CIDR or UUID, gated range.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// Entity missing or not visible to this owner. Also covers "exists
    /// but foreign": existence never leaks.
    #[error("not found: {0}")]
    NotFound(String),
    /// AEAD authentication failed while decrypting stored credentials.
    /// Never carries cipher detail.
    #[error("credential decryption failed")]
    SecretCorrupt,
    /// No worker replied, or the reply was malformed.
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl EngineError {
    /// Stable code string carried across the control-plane transport.
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::InvalidArgument(_) => "invalid_argument",
            EngineError::NotFound(_) => "not_found",
            EngineError::SecretCorrupt => "secret_corrupt",
            EngineError::Transport(_) => "transport_failure",
            EngineError::Internal(_) => "internal",
        }
    }

    /// Rebuild from a transported `(code, message)` pair. Unknown codes
    /// collapse to `Internal`.
    pub fn from_code(code: &str, message: String) -> Self {
        match code {
            "invalid_argument" => EngineError::InvalidArgument(message),
            "not_found" => EngineError::NotFound(message),
            "secret_corrupt" => EngineError::SecretCorrupt,
            "transport_failure" => EngineError::Transport(message),
            _ => EngineError::Internal(message),
        }
    }
}

impl From<DbError> for EngineError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::NotFound(what) => EngineError::NotFound(what),
            other => EngineError::Internal(other.to_string()),
        }
    }
}

impl From<SecretError> for EngineError {
    fn from(_: SecretError) -> Self {
        EngineError::SecretCorrupt
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_roundtrip() {
        let errors = [
            EngineError::InvalidArgument("x".into()),
            EngineError::NotFound("x".into()),
            EngineError::SecretCorrupt,
            EngineError::Transport("x".into()),
            EngineError::Internal("x".into()),
        ];
        for e in errors {
            let rebuilt = EngineError::from_code(e.code(), "x".into());
            assert_eq!(rebuilt.code(), e.code());
        }
    }

    #[test]
    fn db_not_found_maps_to_not_found() {
        let e: EngineError = DbError::NotFound("job 1".into()).into();
        assert_eq!(e.code(), "not_found");

        let e: EngineError = DbError::Other("disk on fire".into()).into();
        assert_eq!(e.code(), "internal");
    }
}
