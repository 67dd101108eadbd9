// ---------------------------------------------------------------------------
// AEAD secret store
// ---------------------------------------------------------------------------
//
// Encrypts per-profile passwords and private keys at rest with AES-256-GCM.
// Ciphertext layout is `nonce(12) || ct || tag(16)`, base64-encoded. The key
// is a 256-bit secret supplied as base64 through process configuration;
// decoding accepts the standard, URL-safe and unpadded alphabets.

use aes_gcm::aead::rand_core::RngCore;
use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use base64::Engine as _;
use tracing::debug;

/// 96-bit GCM nonce.
const NONCE_LEN: usize = 12;
/// 256-bit AES key.
const KEY_LEN: usize = 32;

#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    /// The configured key is not decodable base64 or has the wrong length.
    #[error("encryption key is not valid base64 for a 256-bit key")]
    BadKey,
    /// Ciphertext failed authentication or is structurally impossible.
    /// The message is deliberately generic: cipher internals never reach
    /// callers or logs.
    #[error("secret ciphertext is corrupt")]
    Corrupt,
    #[error("encryption failed")]
    EncryptFailed,
}

/// Process-wide encrypt/decrypt handle. Cheap to clone.
#[derive(Clone)]
pub struct SecretBox {
    key: [u8; KEY_LEN],
}

impl SecretBox {
    /// Build from a base64-encoded 256-bit key.
    ///
    /// Decoding falls back through: standard base64, URL-safe base64, and
    /// standard base64 after normalizing the URL-safe alphabet and
    /// re-padding. Anything else fails startup.
    pub fn from_key_b64(encoded: &str) -> Result<Self, SecretError> {
        let bytes = decode_key(encoded).ok_or(SecretError::BadKey)?;
        let key: [u8; KEY_LEN] = bytes.try_into().map_err(|_| SecretError::BadKey)?;
        Ok(Self { key })
    }

    /// Generate a fresh random key, base64-encoded, for operators setting
    /// up a new deployment.
    pub fn generate_key_b64() -> String {
        let mut key = [0u8; KEY_LEN];
        OsRng.fill_bytes(&mut key);
        STANDARD.encode(key)
    }

    /// Encrypt a plaintext string. Empty input passes through unchanged.
    pub fn encrypt(&self, plaintext: &str) -> Result<String, SecretError> {
        if plaintext.is_empty() {
            return Ok(String::new());
        }

        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&self.key));
        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);

        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce_bytes), plaintext.as_bytes())
            .map_err(|_| SecretError::EncryptFailed)?;

        let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        sealed.extend_from_slice(&nonce_bytes);
        sealed.extend_from_slice(&ciphertext);
        Ok(STANDARD.encode(sealed))
    }

    /// Decrypt a sealed string produced by [`encrypt`](Self::encrypt).
    /// Empty input passes through unchanged.
    pub fn decrypt(&self, sealed: &str) -> Result<String, SecretError> {
        if sealed.is_empty() {
            return Ok(String::new());
        }

        let data = STANDARD.decode(sealed).map_err(|_| SecretError::Corrupt)?;
        if data.len() <= NONCE_LEN {
            return Err(SecretError::Corrupt);
        }
        let (nonce_bytes, ciphertext) = data.split_at(NONCE_LEN);

        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&self.key));
        let plaintext = cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|_| {
                debug!("AEAD authentication failed during decrypt");
                SecretError::Corrupt
            })?;

        String::from_utf8(plaintext).map_err(|_| SecretError::Corrupt)
    }

    /// Heuristic: does this string look like sealed output? Used to avoid
    /// double-encrypting values that are already ciphertext.
    pub fn looks_encrypted(&self, text: &str) -> bool {
        if text.is_empty() {
            return false;
        }
        match STANDARD.decode(text) {
            Ok(decoded) => decoded.len() > NONCE_LEN,
            Err(_) => false,
        }
    }
}

impl std::fmt::Debug for SecretBox {
    // Never let key material reach Debug output.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretBox").finish_non_exhaustive()
    }
}

fn decode_key(encoded: &str) -> Option<Vec<u8>> {
    let encoded = encoded.trim();
    if let Ok(bytes) = STANDARD.decode(encoded) {
        return Some(bytes);
    }
    if let Ok(bytes) = URL_SAFE.decode(encoded) {
        return Some(bytes);
    }

    // Normalize a URL-safe alphabet back to standard and re-pad.
    let mut cleaned = encoded.replace('-', "+").replace('_', "/");
    while cleaned.len() % 4 != 0 {
        cleaned.push('=');
    }
    STANDARD.decode(&cleaned).ok()
}
