//! Orchestration layer: ties the key vault, message cipher, decryption
//! cache, retention filter, and persistence collaborator together behind
//! the operations the application calls.

use chrono::Utc;
use tracing::{info, warn};

use crate::config::{AppConfig, PlaintextPolicy};
use crate::crypto::{envelope, vault, PublicKey};
use crate::errors::{HavenError, Result};
use crate::messages::{
    new_message_id, ChatId, ChatSettings, MessageBody, MessageContent, MessageKind, MessageRecord,
    MessageView,
};
use crate::retention;
use crate::session::Session;
use crate::storage::Persistence;

pub struct MessengerService<S> {
    store: S,
    config: AppConfig,
}

impl<S: Persistence> MessengerService<S> {
    pub fn new(store: S) -> Self {
        MessengerService {
            store,
            config: AppConfig::default(),
        }
    }

    pub fn with_config(store: S, config: AppConfig) -> Self {
        MessengerService { store, config }
    }

    /// Create a user's key material: generate a key pair, store the
    /// password-wrapped private half, publish the public half.
    pub async fn create_account(&self, username: &str, password: &str) -> Result<PublicKey> {
        let username = validate_username(username)?;

        let keys = vault::generate(password)?;
        self.store
            .put_wrapped_private_key(username, keys.wrapped)
            .await?;
        self.store.put_public_key(username, keys.public_key).await?;

        info!(username, fingerprint = %keys.public_key.fingerprint(), "Created account keys");

        Ok(keys.public_key)
    }

    /// Unlock the stored private key into a new [`Session`].
    ///
    /// A missing record and a wrong password both surface as
    /// [`HavenError::UnlockFailed`].
    pub async fn sign_in(&self, username: &str, password: &str) -> Result<Session> {
        let username = username.trim();

        let wrapped = self
            .store
            .get_wrapped_private_key(username)
            .await?
            .ok_or(HavenError::UnlockFailed)?;
        let private_key = vault::unlock(&wrapped, password)?;

        info!(username, "Signed in");

        Ok(Session::new(
            username.to_string(),
            private_key,
            self.config.decryption_cache_capacity,
        ))
    }

    /// Whether key material exists for a user.
    pub async fn has_keys(&self, username: &str) -> Result<bool> {
        Ok(self
            .store
            .get_wrapped_private_key(username.trim())
            .await?
            .is_some())
    }

    /// Encrypt and store one outgoing text message.
    ///
    /// If the recipient has no published public key, the configured
    /// [`PlaintextPolicy`] decides: `Deny` surfaces
    /// [`HavenError::MissingRecipientKey`], `AllowPlaintext` stores the
    /// message in the clear and logs a warning.
    pub async fn send_text(&self, session: &Session, to: &str, text: &str) -> Result<MessageRecord> {
        let created_at = Utc::now();
        let id = new_message_id(created_at)?;

        let body = match self.store.get_public_key(to).await? {
            Some(recipient_key) => {
                let sealed = envelope::encrypt(text.as_bytes(), &recipient_key)?;
                // The envelope is sealed to the recipient only; cache our own
                // plaintext so the sender can render the message this session.
                session.cache().put(&id, text.to_string());
                MessageBody::Encrypted(sealed)
            }
            None => match self.config.plaintext_fallback {
                PlaintextPolicy::Deny => {
                    return Err(HavenError::MissingRecipientKey {
                        username: to.to_string(),
                    });
                }
                PlaintextPolicy::AllowPlaintext => {
                    warn!(to, "No public key on file; sending message unencrypted");
                    MessageBody::Plaintext(text.to_string())
                }
            },
        };

        let record = MessageRecord {
            id,
            chat_id: ChatId::from_participants(session.username(), to),
            from: session.username().to_string(),
            to: to.to_string(),
            body,
            kind: MessageKind::Text,
            file_name: None,
            created_at,
            read: false,
        };

        self.store.put_message(record.clone()).await?;
        Ok(record)
    }

    /// Messages of one chat, retention-filtered and decrypted for display.
    ///
    /// Expired messages are dropped on creation time before any decryption.
    /// A message that fails to decrypt becomes an `Unreadable` placeholder
    /// without affecting the rest of the batch.
    pub async fn fetch_messages(&self, session: &Session, peer: &str) -> Result<Vec<MessageView>> {
        let chat = ChatId::from_participants(session.username(), peer);
        let settings = self.chat_settings_for(&chat).await?;

        let records = self.store.get_messages(&chat).await?;
        let live = retention::retain_live(records, &settings, Utc::now());

        let views = live
            .into_iter()
            .map(|record| {
                let content = self.render_body(session, &record);
                MessageView {
                    content,
                    id: record.id,
                    from: record.from,
                    to: record.to,
                    kind: record.kind,
                    file_name: record.file_name,
                    created_at: record.created_at,
                    read: record.read,
                }
            })
            .collect();

        Ok(views)
    }

    /// Unread messages addressed to the session user, after retention
    /// filtering. Counts on metadata only; nothing is decrypted.
    pub async fn unread_count(&self, session: &Session, peer: &str) -> Result<usize> {
        let chat = ChatId::from_participants(session.username(), peer);
        let settings = self.chat_settings_for(&chat).await?;

        let records = self.store.get_messages(&chat).await?;
        let live = retention::retain_live(records, &settings, Utc::now());

        Ok(live
            .iter()
            .filter(|r| r.to == session.username() && !r.read)
            .count())
    }

    pub async fn mark_read(&self, session: &Session, peer: &str) -> Result<()> {
        let chat = ChatId::from_participants(session.username(), peer);
        self.store.mark_read(&chat, session.username()).await
    }

    pub async fn clear_chat(&self, session: &Session, peer: &str) -> Result<()> {
        let chat = ChatId::from_participants(session.username(), peer);
        self.store.clear_chat(&chat).await
    }

    pub async fn delete_chat(&self, session: &Session, peer: &str) -> Result<()> {
        let chat = ChatId::from_participants(session.username(), peer);
        self.store.delete_chat(&chat).await
    }

    pub async fn chat_settings(&self, session: &Session, peer: &str) -> Result<ChatSettings> {
        let chat = ChatId::from_participants(session.username(), peer);
        self.chat_settings_for(&chat).await
    }

    pub async fn update_chat_settings(
        &self,
        session: &Session,
        peer: &str,
        settings: ChatSettings,
    ) -> Result<()> {
        let chat = ChatId::from_participants(session.username(), peer);
        self.store.put_chat_settings(&chat, settings).await
    }

    /// Wrap the private key under a recovery secret and return the armored
    /// backup bundle for out-of-band storage. The primary record is not
    /// changed.
    pub async fn export_recovery_backup(
        &self,
        username: &str,
        password: &str,
        recovery_secret: &str,
    ) -> Result<String> {
        let username = username.trim();

        let wrapped = self
            .store
            .get_wrapped_private_key(username)
            .await?
            .ok_or(HavenError::UnlockFailed)?;
        let backup = vault::rewrap_for_recovery(&wrapped, password, recovery_secret)?;

        info!(username, "Exported recovery backup");

        backup.to_armored()
    }

    /// Restore key material from an armored backup, re-wrapped under a new
    /// password. Replaces the stored record and re-publishes the public key.
    pub async fn restore_from_recovery(
        &self,
        username: &str,
        new_password: &str,
        recovery_secret: &str,
        armored_backup: &str,
    ) -> Result<PublicKey> {
        let username = validate_username(username)?;

        let backup = vault::RecoveryBackup::from_armored(armored_backup)?;
        let keys = vault::restore_from_recovery(&backup, recovery_secret, new_password)?;

        self.store
            .put_wrapped_private_key(username, keys.wrapped)
            .await?;
        self.store.put_public_key(username, keys.public_key).await?;

        info!(username, "Restored keys from recovery backup");

        Ok(keys.public_key)
    }

    async fn chat_settings_for(&self, chat: &ChatId) -> Result<ChatSettings> {
        Ok(self
            .store
            .get_chat_settings(chat)
            .await?
            .unwrap_or_default())
    }

    fn render_body(&self, session: &Session, record: &MessageRecord) -> MessageContent {
        match &record.body {
            MessageBody::Plaintext(text) => MessageContent::Text(text.clone()),
            MessageBody::Encrypted(sealed) => {
                if let Some(cached) = session.cache().get(&record.id) {
                    return MessageContent::Text(cached);
                }

                match envelope::decrypt(sealed, session.private_key())
                    .and_then(|bytes| String::from_utf8(bytes).map_err(|_| HavenError::DecryptionFailed))
                {
                    Ok(text) => {
                        session.cache().put(&record.id, text.clone());
                        MessageContent::Text(text)
                    }
                    Err(_) => {
                        warn!(message_id = %record.id, "Message could not be decrypted");
                        MessageContent::Unreadable
                    }
                }
            }
        }
    }
}

fn validate_username(username: &str) -> Result<&str> {
    let username = username.trim();

    if username.len() < 3 || username.len() > 30 {
        return Err(HavenError::InvalidUsername(
            "must be between 3 and 30 characters".to_string(),
        ));
    }

    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(HavenError::InvalidUsername(
            "only letters, digits, underscores, and hyphens are allowed".to_string(),
        ));
    }

    Ok(username)
}
