//! One-shot hybrid encryption of a single message.
//!
//! Every call generates a fresh random ChaCha20-Poly1305 key for the message
//! body and seals that key to the recipient's X25519 public key. The
//! symmetric key is single-use: it is never reused across messages, even to
//! the same recipient.

use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::crypto::primitives::{
    self, auth_decrypt, auth_encrypt, seal_key, unseal_key, PrivateKey, PublicKey, SealedKey,
    KEY_LEN, NONCE_LEN,
};
use crate::errors::{HavenError, Result};

/// Encoding version for envelopes on the wire and in storage.
pub const ENVELOPE_VERSION: u8 = 1;

/// The wire/storage form of one encrypted message.
#[derive(Clone, Serialize, Deserialize)]
pub struct EncryptedEnvelope {
    pub version: u8,
    /// The per-message symmetric key, sealed to the recipient.
    pub wrapped_key: SealedKey,
    /// Nonce for the message body.
    pub nonce: [u8; NONCE_LEN],
    pub ciphertext: Vec<u8>,
}

impl EncryptedEnvelope {
    /// Stable byte encoding for storage or transport.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        bincode::serialize(self)
            .map_err(|e| HavenError::Encoding(format!("Failed to encode envelope: {}", e)))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        bincode::deserialize(bytes)
            .map_err(|e| HavenError::Encoding(format!("Failed to decode envelope: {}", e)))
    }
}

/// Encrypt one message to a recipient's public key.
pub fn encrypt(plaintext: &[u8], recipient: &PublicKey) -> Result<EncryptedEnvelope> {
    let message_key = Zeroizing::new(primitives::random_array::<KEY_LEN>()?);
    let nonce = primitives::random_array::<NONCE_LEN>()?;

    let ciphertext = auth_encrypt(&message_key, &nonce, plaintext)?;
    let wrapped_key = seal_key(recipient, message_key.as_ref())?;

    Ok(EncryptedEnvelope {
        version: ENVELOPE_VERSION,
        wrapped_key,
        nonce,
        ciphertext,
    })
}

/// Decrypt one message with the local user's private key.
///
/// Fails whole: either the envelope fully decrypts, or
/// [`HavenError::DecryptionFailed`] is returned.
pub fn decrypt(envelope: &EncryptedEnvelope, private_key: &PrivateKey) -> Result<Vec<u8>> {
    if envelope.version != ENVELOPE_VERSION {
        return Err(HavenError::DecryptionFailed);
    }

    let message_key = unseal_key(private_key, &envelope.wrapped_key)?;
    let message_key: [u8; KEY_LEN] = message_key
        .as_slice()
        .try_into()
        .map_err(|_| HavenError::DecryptionFailed)?;

    auth_decrypt(&message_key, &envelope.nonce, &envelope.ciphertext)
}
