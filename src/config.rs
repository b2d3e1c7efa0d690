use serde::{Deserialize, Serialize};

use crate::cache::DEFAULT_CACHE_CAPACITY;

/// What to do when a message is sent to a user with no published public key.
///
/// The decision is made here, explicitly, never inside the cipher: sending
/// in the clear must be an auditable opt-in, not a silent downgrade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlaintextPolicy {
    /// Refuse to send; the caller sees `MissingRecipientKey`.
    Deny,
    /// Store the message unencrypted and log a warning.
    AllowPlaintext,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub plaintext_fallback: PlaintextPolicy,
    pub decryption_cache_capacity: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            plaintext_fallback: PlaintextPolicy::Deny,
            decryption_cache_capacity: DEFAULT_CACHE_CAPACITY,
        }
    }
}
