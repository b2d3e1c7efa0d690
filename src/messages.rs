//! Message and chat data model shared by the storage and service layers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::crypto::envelope::EncryptedEnvelope;
use crate::crypto::primitives;
use crate::errors::Result;

/// Identifier for a two-party chat: the sorted participant pair joined with
/// a separator, so both participants derive the same id.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChatId(String);

impl ChatId {
    pub fn from_participants(a: &str, b: &str) -> Self {
        let (first, second) = if a <= b { (a, b) } else { (b, a) };
        ChatId(format!("{}__{}", first, second))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChatId({})", self.0)
    }
}

/// Per-chat retention and moderation policy, mutable by either participant.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatSettings {
    pub disappearing_enabled: bool,
    pub disappearing_days: u32,
    pub muted: bool,
    pub blocked: bool,
}

impl Default for ChatSettings {
    fn default() -> Self {
        ChatSettings {
            disappearing_enabled: true,
            disappearing_days: 2,
            muted: false,
            blocked: false,
        }
    }
}

/// Stored message payload: encrypted envelope, or cleartext when the sender
/// explicitly opted into the plaintext fallback.
#[derive(Clone, Serialize, Deserialize)]
pub enum MessageBody {
    Encrypted(EncryptedEnvelope),
    Plaintext(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageKind {
    Text,
    File,
}

/// One message as held by the persistence layer.
#[derive(Clone, Serialize, Deserialize)]
pub struct MessageRecord {
    pub id: String,
    pub chat_id: ChatId,
    pub from: String,
    pub to: String,
    pub body: MessageBody,
    pub kind: MessageKind,
    pub file_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub read: bool,
}

/// Decrypted content handed to the caller. A message that fails
/// authenticated decryption is reported unreadable, never as garbled text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MessageContent {
    Text(String),
    Unreadable,
}

/// One message after retention filtering and decryption, ready to render.
#[derive(Clone, Debug)]
pub struct MessageView {
    pub id: String,
    pub from: String,
    pub to: String,
    pub content: MessageContent,
    pub kind: MessageKind,
    pub file_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub read: bool,
}

/// Generate a unique message id: creation time plus a random suffix.
pub fn new_message_id(created_at: DateTime<Utc>) -> Result<String> {
    let suffix = primitives::random_array::<4>()?;
    Ok(format!("msg_{}_{}", created_at.timestamp_millis(), hex::encode(suffix)))
}
