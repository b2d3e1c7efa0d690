//! Lifecycle of a user's asymmetric key material.
//!
//! The private key exists at rest only as a [`WrappedPrivateKey`]: encrypted
//! under a symmetric key derived from a human secret (the account password,
//! or separately a recovery secret) and a fresh random salt. These functions
//! are pure over their inputs; storing and publishing the results is the
//! service layer's job.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::crypto::primitives::{
    self, auth_decrypt, auth_encrypt, derive_wrapping_key, PrivateKey, PublicKey, KEY_LEN,
    NONCE_LEN, SALT_LEN,
};
use crate::errors::{HavenError, Result};

/// Encoding version for stored wrapped-key records.
pub const WRAP_VERSION: u8 = 1;

/// The only at-rest representation of a private key.
#[derive(Clone, Serialize, Deserialize)]
pub struct WrappedPrivateKey {
    pub version: u8,
    pub salt: [u8; SALT_LEN],
    pub nonce: [u8; NONCE_LEN],
    pub ciphertext: Vec<u8>,
}

/// Result of generating or restoring a key pair: the public half to publish
/// and the wrapped private half to store.
pub struct GeneratedKeys {
    pub public_key: PublicKey,
    pub wrapped: WrappedPrivateKey,
}

/// Backup bundle for out-of-band storage, wrapped under a recovery secret.
#[derive(Clone, Serialize, Deserialize)]
pub struct RecoveryBackup {
    pub wrapped: WrappedPrivateKey,
    pub public_key: PublicKey,
}

impl RecoveryBackup {
    /// Encode as a base64 string suitable for copy-paste or a printed sheet.
    pub fn to_armored(&self) -> Result<String> {
        let bytes = bincode::serialize(self)
            .map_err(|e| HavenError::Encoding(format!("Failed to encode backup: {}", e)))?;
        Ok(BASE64.encode(bytes))
    }

    /// Decode an armored backup. Any parse failure is treated the same as a
    /// tampered bundle.
    pub fn from_armored(armored: &str) -> Result<Self> {
        let bytes = BASE64
            .decode(armored.trim())
            .map_err(|_| HavenError::InvalidRecoveryData)?;
        bincode::deserialize(&bytes).map_err(|_| HavenError::InvalidRecoveryData)
    }
}

/// Create a new key pair and wrap the private half under `password`.
pub fn generate(password: &str) -> Result<GeneratedKeys> {
    let private_key = PrivateKey::generate()?;
    let public_key = private_key.public_key();
    let wrapped = wrap(&private_key, password)?;

    debug!(fingerprint = %public_key.fingerprint(), "Generated key pair");

    Ok(GeneratedKeys { public_key, wrapped })
}

/// Decrypt a stored private key with the account password.
///
/// A wrong password, a corrupted record, and an unsupported version are all
/// reported as the same [`HavenError::UnlockFailed`].
pub fn unlock(wrapped: &WrappedPrivateKey, password: &str) -> Result<PrivateKey> {
    unwrap(wrapped, password).map_err(|_| HavenError::UnlockFailed)
}

/// Re-wrap the private key under a recovery secret for out-of-band backup.
///
/// Unlocks with `password` first; the primary password-wrapped record is not
/// mutated.
pub fn rewrap_for_recovery(
    wrapped: &WrappedPrivateKey,
    password: &str,
    recovery_secret: &str,
) -> Result<RecoveryBackup> {
    let private_key = unlock(wrapped, password)?;
    let public_key = private_key.public_key();

    let secret = normalize_recovery_secret(recovery_secret);
    let backup_wrapped = wrap(&private_key, &secret)?;

    Ok(RecoveryBackup {
        wrapped: backup_wrapped,
        public_key,
    })
}

/// Recover the private key from a backup bundle and re-wrap it under a new
/// password.
///
/// Fails with [`HavenError::InvalidRecoveryData`] on a wrong recovery secret
/// or a tampered bundle.
pub fn restore_from_recovery(
    backup: &RecoveryBackup,
    recovery_secret: &str,
    new_password: &str,
) -> Result<GeneratedKeys> {
    let secret = normalize_recovery_secret(recovery_secret);
    let private_key =
        unwrap(&backup.wrapped, &secret).map_err(|_| HavenError::InvalidRecoveryData)?;

    // A bundle whose public key does not match the recovered private key has
    // been spliced together from two different backups.
    if private_key.public_key() != backup.public_key {
        return Err(HavenError::InvalidRecoveryData);
    }

    let wrapped = wrap(&private_key, new_password)?;

    Ok(GeneratedKeys {
        public_key: backup.public_key,
        wrapped,
    })
}

/// Canonicalize a user-entered recovery secret before key derivation.
///
/// Accepts the forms users paste from a backup sheet: a leading
/// "recovery key:" label, separator dashes/underscores, stray whitespace,
/// and mixed case.
pub fn normalize_recovery_secret(input: &str) -> String {
    let mut secret = input.trim();

    for label in ["recovery key:", "recovery key"] {
        if let Some(prefix) = secret.get(..label.len()) {
            if prefix.eq_ignore_ascii_case(label) {
                secret = secret[label.len()..].trim_start();
                break;
            }
        }
    }

    secret
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-' && *c != '_')
        .collect::<String>()
        .to_uppercase()
}

fn wrap(private_key: &PrivateKey, secret: &str) -> Result<WrappedPrivateKey> {
    let salt = primitives::random_array::<SALT_LEN>()?;
    let nonce = primitives::random_array::<NONCE_LEN>()?;

    let wrapping_key = derive_wrapping_key(secret, &salt);
    let key_bytes = private_key.expose_bytes();
    let ciphertext = auth_encrypt(&wrapping_key, &nonce, key_bytes.as_ref())?;

    Ok(WrappedPrivateKey {
        version: WRAP_VERSION,
        salt,
        nonce,
        ciphertext,
    })
}

fn unwrap(wrapped: &WrappedPrivateKey, secret: &str) -> Result<PrivateKey> {
    if wrapped.version != WRAP_VERSION {
        return Err(HavenError::DecryptionFailed);
    }

    let wrapping_key = derive_wrapping_key(secret, &wrapped.salt);
    let key_bytes = auth_decrypt(&wrapping_key, &wrapped.nonce, &wrapped.ciphertext)?;

    let key_bytes: [u8; KEY_LEN] = key_bytes
        .try_into()
        .map_err(|_| HavenError::DecryptionFailed)?;

    Ok(PrivateKey::from_bytes(key_bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::envelope;

    #[test]
    fn test_generate_and_unlock() {
        let keys = generate("Correct-Horse-1!").expect("Should generate");
        let private = unlock(&keys.wrapped, "Correct-Horse-1!").expect("Should unlock");

        // Functionally identical: a message sealed to the published public
        // key decrypts with the unlocked private key.
        assert_eq!(private.public_key(), keys.public_key);

        let envelope = envelope::encrypt(b"probe", &keys.public_key).expect("Should encrypt");
        let plaintext = envelope::decrypt(&envelope, &private).expect("Should decrypt");
        assert_eq!(plaintext, b"probe");
    }

    #[test]
    fn test_wrong_password_is_rejected() {
        let keys = generate("Correct-Horse-1!").expect("Should generate");

        let result = unlock(&keys.wrapped, "wrong");
        assert!(matches!(result, Err(HavenError::UnlockFailed)));
    }

    #[test]
    fn test_corrupted_record_is_indistinguishable_from_wrong_password() {
        let keys = generate("Correct-Horse-1!").expect("Should generate");

        let mut corrupted = keys.wrapped.clone();
        corrupted.ciphertext[0] ^= 0x01;
        assert!(matches!(unlock(&corrupted, "Correct-Horse-1!"), Err(HavenError::UnlockFailed)));

        let mut bad_version = keys.wrapped.clone();
        bad_version.version = 99;
        assert!(matches!(unlock(&bad_version, "Correct-Horse-1!"), Err(HavenError::UnlockFailed)));
    }

    #[test]
    fn test_wrapping_is_salted() {
        let keys1 = generate("same-password").expect("Should generate");
        let keys2 = generate("same-password").expect("Should generate");

        assert_ne!(keys1.wrapped.salt, keys2.wrapped.salt);
        assert_ne!(keys1.wrapped.ciphertext, keys2.wrapped.ciphertext);
    }

    #[test]
    fn test_recovery_roundtrip() {
        let keys = generate("old-password").expect("Should generate");
        let backup = rewrap_for_recovery(&keys.wrapped, "old-password", "ABCD-1234-EFGH")
            .expect("Should rewrap");

        let restored =
            restore_from_recovery(&backup, "abcd 1234 efgh", "new-password").expect("Should restore");

        assert_eq!(restored.public_key, keys.public_key);

        // Unlockable with the new password, functionally the same key pair
        let private = unlock(&restored.wrapped, "new-password").expect("Should unlock");
        let envelope = envelope::encrypt(b"probe", &keys.public_key).expect("Should encrypt");
        assert_eq!(envelope::decrypt(&envelope, &private).expect("Should decrypt"), b"probe");
    }

    #[test]
    fn test_rewrap_does_not_mutate_primary_record() {
        let keys = generate("password").expect("Should generate");
        let before = keys.wrapped.clone();

        rewrap_for_recovery(&keys.wrapped, "password", "RECOVERY").expect("Should rewrap");

        assert_eq!(before.ciphertext, keys.wrapped.ciphertext);
        assert_eq!(before.salt, keys.wrapped.salt);
    }

    #[test]
    fn test_wrong_recovery_secret_is_rejected() {
        let keys = generate("password").expect("Should generate");
        let backup =
            rewrap_for_recovery(&keys.wrapped, "password", "RIGHT-SECRET").expect("Should rewrap");

        let result = restore_from_recovery(&backup, "WRONG-SECRET", "new-password");
        assert!(matches!(result, Err(HavenError::InvalidRecoveryData)));
    }

    #[test]
    fn test_tampered_backup_is_rejected() {
        let keys = generate("password").expect("Should generate");
        let mut backup =
            rewrap_for_recovery(&keys.wrapped, "password", "SECRET").expect("Should rewrap");
        backup.wrapped.ciphertext[0] ^= 0x01;

        let result = restore_from_recovery(&backup, "SECRET", "new-password");
        assert!(matches!(result, Err(HavenError::InvalidRecoveryData)));
    }

    #[test]
    fn test_spliced_backup_is_rejected() {
        let keys = generate("password").expect("Should generate");
        let other = generate("password").expect("Should generate");

        let mut backup =
            rewrap_for_recovery(&keys.wrapped, "password", "SECRET").expect("Should rewrap");
        backup.public_key = other.public_key;

        let result = restore_from_recovery(&backup, "SECRET", "new-password");
        assert!(matches!(result, Err(HavenError::InvalidRecoveryData)));
    }

    #[test]
    fn test_armored_backup_roundtrip() {
        let keys = generate("password").expect("Should generate");
        let backup =
            rewrap_for_recovery(&keys.wrapped, "password", "SECRET").expect("Should rewrap");

        let armored = backup.to_armored().expect("Should armor");
        let parsed = RecoveryBackup::from_armored(&armored).expect("Should parse");

        assert_eq!(parsed.public_key, backup.public_key);
        assert_eq!(parsed.wrapped.ciphertext, backup.wrapped.ciphertext);
    }

    #[test]
    fn test_garbage_armor_is_invalid_recovery_data() {
        assert!(matches!(
            RecoveryBackup::from_armored("definitely not a backup"),
            Err(HavenError::InvalidRecoveryData)
        ));
    }

    #[test]
    fn test_recovery_secret_normalization() {
        assert_eq!(normalize_recovery_secret("Recovery Key: ab-cd ef"), "ABCDEF");
        assert_eq!(normalize_recovery_secret("  ab_cd-ef  "), "ABCDEF");
        assert_eq!(normalize_recovery_secret("ABCDEF"), "ABCDEF");
        assert_eq!(normalize_recovery_secret(""), "");
    }
}
