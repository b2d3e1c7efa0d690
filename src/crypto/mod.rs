//! Cryptographic core: primitives, the key vault, and hybrid message
//! encryption.

pub mod envelope;
pub mod primitives;
pub mod vault;

pub use envelope::{EncryptedEnvelope, ENVELOPE_VERSION};
pub use primitives::{PrivateKey, PublicKey};
pub use vault::{GeneratedKeys, RecoveryBackup, WrappedPrivateKey, WRAP_VERSION};
