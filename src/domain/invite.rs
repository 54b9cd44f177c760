//! Invite entity and one-time token handling.
//!
//! The server never stores an invite token in the clear: the invitee gets a
//! random 32-byte value in a URL, the row keeps only its SHA-256 hash, and
//! acceptance re-hashes the presented value for the lookup.

use chrono::{DateTime, Utc};
use rand::RngCore;
use serde::Serialize;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::config::RAW_TOKEN_BYTES;

use super::role::RoleName;

/// A pending (or consumed) invitation to join a clinic with a role.
#[derive(Debug, Clone, Serialize)]
pub struct Invite {
    pub id: Uuid,
    pub email: String,
    pub clinic_id: Uuid,
    pub role: RoleName,
    #[serde(skip_serializing)]
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    /// Set exactly once; a non-null value means the invite is spent
    pub accepted_at: Option<DateTime<Utc>>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
}

impl Invite {
    /// An invite is honored only while unaccepted and unexpired.
    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        self.accepted_at.is_none() && now <= self.expires_at
    }
}

/// Generate a random one-time token: the hex plaintext goes into the URL,
/// the hash into storage.
pub fn generate_token() -> (String, String) {
    let mut bytes = [0u8; RAW_TOKEN_BYTES];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    let plaintext: String = bytes.iter().map(|b| format!("{:02x}", b)).collect();
    let hash = hash_token(&plaintext);
    (plaintext, hash)
}

/// SHA-256 hash a presented token for storage or comparison.
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}
