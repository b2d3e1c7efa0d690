//! Low-level cryptographic building blocks: X25519 key pairs, password key
//! derivation, authenticated encryption, and sealing a symmetric key to a
//! public key.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use blake3::Hasher;
use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Key, Nonce,
};
use hkdf::Hkdf;
use pbkdf2::pbkdf2_hmac;
use rand::rngs::OsRng;
use rand::RngCore;
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::fmt;
use x25519_dalek::{EphemeralSecret, PublicKey as XPublicKey, StaticSecret};
use zeroize::{Zeroize, Zeroizing};

use crate::errors::{HavenError, Result};

pub const KEY_LEN: usize = 32;
pub const SALT_LEN: usize = 16;
pub const NONCE_LEN: usize = 12;

/// PBKDF2-HMAC-SHA256 work factor for password and recovery-secret
/// derivation. Fixed so that records written by one build remain
/// decryptable by later ones.
pub const PBKDF2_ITERATIONS: u32 = 100_000;

// Domain separation for the key-wrap KDF
const SEAL_INFO: &[u8] = b"haven-v1 key-wrap";

/// X25519 public key. Exportable, safe to publish.
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKey([u8; KEY_LEN]);

/// X25519 private key. Held in memory only, zeroized on drop, never
/// serialized in cleartext.
pub struct PrivateKey(Secret<[u8; KEY_LEN]>);

/// A one-shot symmetric key sealed to a recipient's public key.
///
/// An ephemeral X25519 key pair is generated per seal; the AEAD key is
/// derived from the ephemeral-static shared secret with HKDF-SHA256.
#[derive(Clone, Serialize, Deserialize)]
pub struct SealedKey {
    pub ephemeral_public: [u8; KEY_LEN],
    pub nonce: [u8; NONCE_LEN],
    pub ciphertext: Vec<u8>,
}

impl PublicKey {
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        PublicKey(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }

    /// Encode for storage or transmission.
    pub fn to_base64(&self) -> String {
        BASE64.encode(self.0)
    }

    /// Decode a key previously exported with [`PublicKey::to_base64`].
    pub fn from_base64(encoded: &str) -> Result<Self> {
        let bytes = BASE64
            .decode(encoded)
            .map_err(|e| HavenError::Encoding(format!("Invalid public key encoding: {}", e)))?;
        let bytes: [u8; KEY_LEN] = bytes
            .try_into()
            .map_err(|_| HavenError::Encoding("Invalid public key length".to_string()))?;
        Ok(PublicKey(bytes))
    }

    /// Short fingerprint for user verification, formatted as groups of
    /// four hex digits.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Hasher::new();
        hasher.update(&self.0);
        hasher.update(b"haven_key_fingerprint");

        let hash = hasher.finalize();
        let fp = &hash.as_bytes()[..8];

        format!(
            "{:02X}{:02X} {:02X}{:02X} {:02X}{:02X} {:02X}{:02X}",
            fp[0], fp[1], fp[2], fp[3], fp[4], fp[5], fp[6], fp[7],
        )
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(&self.0[..8]))
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", hex::encode(&self.0[..8]))
    }
}

impl PrivateKey {
    /// Generate a fresh key pair, returning the private half.
    pub fn generate() -> Result<Self> {
        let mut bytes = [0u8; KEY_LEN];
        OsRng
            .try_fill_bytes(&mut bytes)
            .map_err(|e| HavenError::KeyGenerationFailed(e.to_string()))?;

        // Clamp once at generation so the stored bytes match the key
        // actually used for Diffie-Hellman.
        let secret = StaticSecret::from(bytes);
        bytes.zeroize();

        Ok(PrivateKey(Secret::new(secret.to_bytes())))
    }

    /// Reconstruct from exported bytes (used when unwrapping a stored key).
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        PrivateKey(Secret::new(StaticSecret::from(bytes).to_bytes()))
    }

    /// The paired public key.
    pub fn public_key(&self) -> PublicKey {
        let secret = StaticSecret::from(*self.0.expose_secret());
        PublicKey(XPublicKey::from(&secret).to_bytes())
    }

    /// Export the raw key for wrapping. The returned buffer zeroizes on
    /// drop; it must never reach persistent storage unencrypted.
    pub(crate) fn expose_bytes(&self) -> Zeroizing<[u8; KEY_LEN]> {
        Zeroizing::new(*self.0.expose_secret())
    }

    fn diffie_hellman(&self, peer: &[u8; KEY_LEN]) -> Zeroizing<[u8; KEY_LEN]> {
        let secret = StaticSecret::from(*self.0.expose_secret());
        let shared = secret.diffie_hellman(&XPublicKey::from(*peer));
        Zeroizing::new(shared.to_bytes())
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PrivateKey([REDACTED])")
    }
}

/// Generate a random array of the requested size.
pub fn random_array<const N: usize>() -> Result<[u8; N]> {
    let mut array = [0u8; N];
    OsRng
        .try_fill_bytes(&mut array)
        .map_err(|e| HavenError::KeyGenerationFailed(e.to_string()))?;
    Ok(array)
}

/// Derive a symmetric wrapping key from a human secret and a salt.
///
/// Deterministic and intentionally slow (PBKDF2, fixed iteration count).
pub fn derive_wrapping_key(secret: &str, salt: &[u8; SALT_LEN]) -> Zeroizing<[u8; KEY_LEN]> {
    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    pbkdf2_hmac::<Sha256>(secret.as_bytes(), salt, PBKDF2_ITERATIONS, key.as_mut());
    key
}

/// Authenticated encryption (ChaCha20-Poly1305).
pub fn auth_encrypt(key: &[u8; KEY_LEN], nonce: &[u8; NONCE_LEN], plaintext: &[u8]) -> Result<Vec<u8>> {
    let cipher = ChaCha20Poly1305::new(Key::from_slice(key));
    cipher
        .encrypt(Nonce::from_slice(nonce), plaintext)
        .map_err(|_| HavenError::EncryptionFailed)
}

/// Authenticated decryption. Fails closed on any tampering.
pub fn auth_decrypt(key: &[u8; KEY_LEN], nonce: &[u8; NONCE_LEN], ciphertext: &[u8]) -> Result<Vec<u8>> {
    let cipher = ChaCha20Poly1305::new(Key::from_slice(key));
    cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| HavenError::DecryptionFailed)
}

/// Seal a symmetric key to a recipient's public key.
pub fn seal_key(recipient: &PublicKey, key_bytes: &[u8]) -> Result<SealedKey> {
    let ephemeral = EphemeralSecret::random_from_rng(OsRng);
    let ephemeral_public = XPublicKey::from(&ephemeral);

    let shared = Zeroizing::new(ephemeral.diffie_hellman(&XPublicKey::from(recipient.0)).to_bytes());
    let seal_key = derive_seal_key(&shared)?;

    let nonce = random_array::<NONCE_LEN>()?;
    let ciphertext = auth_encrypt(&seal_key, &nonce, key_bytes)?;

    Ok(SealedKey {
        ephemeral_public: ephemeral_public.to_bytes(),
        nonce,
        ciphertext,
    })
}

/// Recover a sealed symmetric key with the recipient's private key.
pub fn unseal_key(private_key: &PrivateKey, sealed: &SealedKey) -> Result<Zeroizing<Vec<u8>>> {
    let shared = private_key.diffie_hellman(&sealed.ephemeral_public);
    let seal_key = derive_seal_key(&shared)?;

    let key_bytes = auth_decrypt(&seal_key, &sealed.nonce, &sealed.ciphertext)?;
    Ok(Zeroizing::new(key_bytes))
}

fn derive_seal_key(shared: &[u8; KEY_LEN]) -> Result<Zeroizing<[u8; KEY_LEN]>> {
    let hk = Hkdf::<Sha256>::new(None, shared);
    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    hk.expand(SEAL_INFO, key.as_mut())
        .map_err(|e| HavenError::KeyGenerationFailed(e.to_string()))?;
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_key_derivation_is_stable() {
        let private = PrivateKey::generate().expect("Should generate key");
        assert_eq!(private.public_key(), private.public_key());
    }

    #[test]
    fn test_public_key_base64_roundtrip() {
        let private = PrivateKey::generate().expect("Should generate key");
        let public = private.public_key();

        let encoded = public.to_base64();
        let decoded = PublicKey::from_base64(&encoded).expect("Should decode");

        assert_eq!(public, decoded);
    }

    #[test]
    fn test_public_key_rejects_bad_encoding() {
        assert!(PublicKey::from_base64("not base64!!!").is_err());
        // Valid base64, wrong length
        assert!(PublicKey::from_base64(&BASE64.encode([0u8; 16])).is_err());
    }

    #[test]
    fn test_wrapping_key_is_deterministic() {
        let salt = [7u8; SALT_LEN];
        let key1 = derive_wrapping_key("hunter2", &salt);
        let key2 = derive_wrapping_key("hunter2", &salt);
        assert_eq!(*key1, *key2);
    }

    #[test]
    fn test_wrapping_key_depends_on_salt_and_secret() {
        let salt = [7u8; SALT_LEN];
        let other_salt = [8u8; SALT_LEN];

        assert_ne!(*derive_wrapping_key("hunter2", &salt), *derive_wrapping_key("hunter2", &other_salt));
        assert_ne!(*derive_wrapping_key("hunter2", &salt), *derive_wrapping_key("hunter3", &salt));
    }

    #[test]
    fn test_auth_encrypt_roundtrip() {
        let key = random_array::<KEY_LEN>().expect("Should generate key");
        let nonce = random_array::<NONCE_LEN>().expect("Should generate nonce");

        let ciphertext = auth_encrypt(&key, &nonce, b"attack at dawn").expect("Should encrypt");
        let plaintext = auth_decrypt(&key, &nonce, &ciphertext).expect("Should decrypt");

        assert_eq!(plaintext, b"attack at dawn");
    }

    #[test]
    fn test_auth_decrypt_rejects_tampering() {
        let key = random_array::<KEY_LEN>().expect("Should generate key");
        let nonce = random_array::<NONCE_LEN>().expect("Should generate nonce");

        let mut ciphertext = auth_encrypt(&key, &nonce, b"attack at dawn").expect("Should encrypt");
        ciphertext[0] ^= 0x01;

        let result = auth_decrypt(&key, &nonce, &ciphertext);
        assert!(matches!(result, Err(HavenError::DecryptionFailed)));
    }

    #[test]
    fn test_seal_unseal_roundtrip() {
        let private = PrivateKey::generate().expect("Should generate key");
        let message_key = random_array::<KEY_LEN>().expect("Should generate key");

        let sealed = seal_key(&private.public_key(), &message_key).expect("Should seal");
        let unsealed = unseal_key(&private, &sealed).expect("Should unseal");

        assert_eq!(unsealed.as_slice(), &message_key[..]);
    }

    #[test]
    fn test_unseal_with_wrong_key_fails() {
        let private = PrivateKey::generate().expect("Should generate key");
        let other = PrivateKey::generate().expect("Should generate key");
        let message_key = random_array::<KEY_LEN>().expect("Should generate key");

        let sealed = seal_key(&private.public_key(), &message_key).expect("Should seal");

        let result = unseal_key(&other, &sealed);
        assert!(matches!(result, Err(HavenError::DecryptionFailed)));
    }

    #[test]
    fn test_seal_is_never_deterministic() {
        let private = PrivateKey::generate().expect("Should generate key");
        let message_key = [0x42u8; KEY_LEN];

        let sealed1 = seal_key(&private.public_key(), &message_key).expect("Should seal");
        let sealed2 = seal_key(&private.public_key(), &message_key).expect("Should seal");

        assert_ne!(sealed1.ephemeral_public, sealed2.ephemeral_public);
        assert_ne!(sealed1.ciphertext, sealed2.ciphertext);
    }

    #[test]
    fn test_fingerprint_format() {
        let private = PrivateKey::generate().expect("Should generate key");
        let fingerprint = private.public_key().fingerprint();

        assert_eq!(fingerprint.len(), 19); // "XXXX XXXX XXXX XXXX"
        assert!(fingerprint.chars().all(|c| c.is_ascii_hexdigit() || c == ' '));
    }
}
