//! End-to-end message encryption and key management core for the Haven
//! messenger.
//!
//! Each user owns an X25519 key pair. The public half is published through
//! the persistence layer; the private half is stored only password-wrapped
//! and is unlocked into an explicit [`session::Session`] at sign-in.
//! Messages are hybrid-encrypted: a fresh ChaCha20-Poly1305 key per message,
//! sealed to the recipient's public key.
//!
//! The scheme provides confidentiality only. Envelopes are not signed, so
//! sender integrity rests on the trustworthiness of the public-key
//! directory.

pub mod cache;
pub mod config;
pub mod crypto;
pub mod errors;
pub mod logging;
pub mod messages;
pub mod retention;
pub mod service;
pub mod session;
pub mod storage;
