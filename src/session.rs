//! Explicit per-sign-in session state.
//!
//! The unlocked private key is owned by a `Session` value created at sign-in
//! and passed into service operations, never held as ambient global state.
//! It is read-only for the session's lifetime and zeroizes when the session
//! is dropped.

use tracing::info;

use crate::cache::DecryptionCache;
use crate::crypto::{PrivateKey, PublicKey};

pub struct Session {
    username: String,
    private_key: PrivateKey,
    cache: DecryptionCache,
}

impl Session {
    pub fn new(username: String, private_key: PrivateKey, cache_capacity: usize) -> Self {
        Session {
            username,
            private_key,
            cache: DecryptionCache::new(cache_capacity),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn public_key(&self) -> PublicKey {
        self.private_key.public_key()
    }

    pub(crate) fn private_key(&self) -> &PrivateKey {
        &self.private_key
    }

    pub(crate) fn cache(&self) -> &DecryptionCache {
        &self.cache
    }

    /// End the session. Dropping the session zeroizes the private key and
    /// discards the decryption cache.
    pub fn sign_out(self) {
        info!(username = %self.username, "Signed out");
    }
}
