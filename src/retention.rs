//! Disappearing-message retention policy.
//!
//! Expiry is a property of the envelope metadata, not its content: filtering
//! runs on creation time before any decryption, independent of whether the
//! message has been read.

use chrono::{DateTime, Duration, Utc};

use crate::messages::{ChatSettings, MessageRecord};

pub const SECONDS_PER_DAY: i64 = 86_400;

/// Whether a message is still live under the chat's policy at `now`.
///
/// Live iff the policy is disabled, `days` is zero, or less than
/// `days * 86400` seconds have elapsed since creation.
pub fn is_live(created_at: DateTime<Utc>, enabled: bool, days: u32, now: DateTime<Utc>) -> bool {
    if !enabled || days == 0 {
        return true;
    }

    let expires_at = created_at + Duration::seconds(i64::from(days) * SECONDS_PER_DAY);
    now < expires_at
}

/// Drop expired messages from a batch before it is handed to the caller.
pub fn retain_live(
    messages: Vec<MessageRecord>,
    settings: &ChatSettings,
    now: DateTime<Utc>,
) -> Vec<MessageRecord> {
    messages
        .into_iter()
        .filter(|m| is_live(m.created_at, settings.disappearing_enabled, settings.disappearing_days, now))
        .collect()
}
