use thiserror::Error;

/// Typed failures surfaced by the encryption and key-management core.
///
/// Cryptographic failures are never retried automatically: retrying a wrong
/// password does not change the outcome and retrying corrupted ciphertext
/// cannot repair it.
#[derive(Error, Debug)]
pub enum HavenError {
    #[error("Key generation failed: {0}")]
    KeyGenerationFailed(String),

    #[error("Encryption failed")]
    EncryptionFailed,

    /// Wrong password, missing record, or corrupted vault. Deliberately
    /// carries no detail about which: callers get no oracle.
    #[error("Could not unlock private key")]
    UnlockFailed,

    #[error("Invalid recovery key or corrupted backup")]
    InvalidRecoveryData,

    /// Tampered or corrupted envelope, or the wrong private key. The message
    /// must be reported as unreadable, never rendered as partial plaintext.
    #[error("Message could not be decrypted")]
    DecryptionFailed,

    #[error("No public key on file for {username}")]
    MissingRecipientKey { username: String },

    #[error("Invalid username: {0}")]
    InvalidUsername(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Encoding error: {0}")]
    Encoding(String),
}

pub type Result<T> = std::result::Result<T, HavenError>;
