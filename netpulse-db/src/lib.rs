// ---------------------------------------------------------------------------
// Persistence
// ---------------------------------------------------------------------------
//
// SQLite-backed stores for credential profiles, discovery jobs and devices.
// One `Store` per execution domain; ownership gating lives in the SQL so a
// row the caller does not own is indistinguishable from a missing one.

mod devices;
mod error;
mod jobs;
mod profiles;
mod schema;
mod store;

pub use error::DbError;
pub use profiles::{EncryptedDraft, EncryptedPatch, ProfileSecrets};
pub use store::Store;
