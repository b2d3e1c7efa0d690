//! Persistence collaborator contract and the in-memory reference store.
//!
//! The core is agnostic to whether records live in a remote service or a
//! local file; it only requires read-after-write consistency within one
//! session.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::crypto::{PublicKey, WrappedPrivateKey};
use crate::errors::Result;
use crate::messages::{ChatId, ChatSettings, MessageRecord};

pub mod file;

pub use file::FileStore;

/// Account and message store consumed by the service layer.
#[async_trait]
pub trait Persistence: Send + Sync {
    async fn get_wrapped_private_key(&self, username: &str) -> Result<Option<WrappedPrivateKey>>;
    async fn put_wrapped_private_key(&self, username: &str, wrapped: WrappedPrivateKey) -> Result<()>;

    async fn get_public_key(&self, username: &str) -> Result<Option<PublicKey>>;
    async fn put_public_key(&self, username: &str, public_key: PublicKey) -> Result<()>;

    /// Messages for a chat, ordered by creation time ascending.
    async fn get_messages(&self, chat: &ChatId) -> Result<Vec<MessageRecord>>;
    async fn put_message(&self, record: MessageRecord) -> Result<()>;

    /// Mark every message addressed to `recipient` in this chat as read.
    async fn mark_read(&self, chat: &ChatId, recipient: &str) -> Result<()>;

    /// Remove all messages in a chat, keeping its settings.
    async fn clear_chat(&self, chat: &ChatId) -> Result<()>;

    /// Remove a chat entirely, including its settings.
    async fn delete_chat(&self, chat: &ChatId) -> Result<()>;

    async fn get_chat_settings(&self, chat: &ChatId) -> Result<Option<ChatSettings>>;
    async fn put_chat_settings(&self, chat: &ChatId, settings: ChatSettings) -> Result<()>;
}

/// Serializable snapshot shared by the in-memory and file-backed stores.
#[derive(Default, Serialize, Deserialize)]
pub(crate) struct StoreState {
    wrapped_keys: HashMap<String, WrappedPrivateKey>,
    public_keys: HashMap<String, PublicKey>,
    messages: HashMap<String, Vec<MessageRecord>>,
    settings: HashMap<String, ChatSettings>,
}

impl StoreState {
    pub(crate) fn messages_sorted(&self, chat: &ChatId) -> Vec<MessageRecord> {
        let mut records = self.messages.get(chat.as_str()).cloned().unwrap_or_default();
        records.sort_by_key(|r| r.created_at);
        records
    }

    pub(crate) fn push_message(&mut self, record: MessageRecord) {
        self.messages
            .entry(record.chat_id.as_str().to_string())
            .or_default()
            .push(record);
    }

    pub(crate) fn mark_read(&mut self, chat: &ChatId, recipient: &str) {
        if let Some(records) = self.messages.get_mut(chat.as_str()) {
            for record in records.iter_mut() {
                if record.to == recipient {
                    record.read = true;
                }
            }
        }
    }

    pub(crate) fn clear_chat(&mut self, chat: &ChatId) {
        self.messages.remove(chat.as_str());
    }

    pub(crate) fn delete_chat(&mut self, chat: &ChatId) {
        self.messages.remove(chat.as_str());
        self.settings.remove(chat.as_str());
    }

    pub(crate) fn wrapped_keys(&self) -> &HashMap<String, WrappedPrivateKey> {
        &self.wrapped_keys
    }

    pub(crate) fn wrapped_keys_mut(&mut self) -> &mut HashMap<String, WrappedPrivateKey> {
        &mut self.wrapped_keys
    }

    pub(crate) fn public_keys(&self) -> &HashMap<String, PublicKey> {
        &self.public_keys
    }

    pub(crate) fn public_keys_mut(&mut self) -> &mut HashMap<String, PublicKey> {
        &mut self.public_keys
    }

    pub(crate) fn settings(&self) -> &HashMap<String, ChatSettings> {
        &self.settings
    }

    pub(crate) fn settings_mut(&mut self) -> &mut HashMap<String, ChatSettings> {
        &mut self.settings
    }
}

/// Volatile store for tests and local single-process use.
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<StoreState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }
}

#[async_trait]
impl Persistence for MemoryStore {
    async fn get_wrapped_private_key(&self, username: &str) -> Result<Option<WrappedPrivateKey>> {
        Ok(self.state.read().await.wrapped_keys().get(username).cloned())
    }

    async fn put_wrapped_private_key(&self, username: &str, wrapped: WrappedPrivateKey) -> Result<()> {
        self.state
            .write()
            .await
            .wrapped_keys_mut()
            .insert(username.to_string(), wrapped);
        Ok(())
    }

    async fn get_public_key(&self, username: &str) -> Result<Option<PublicKey>> {
        Ok(self.state.read().await.public_keys().get(username).copied())
    }

    async fn put_public_key(&self, username: &str, public_key: PublicKey) -> Result<()> {
        self.state
            .write()
            .await
            .public_keys_mut()
            .insert(username.to_string(), public_key);
        Ok(())
    }

    async fn get_messages(&self, chat: &ChatId) -> Result<Vec<MessageRecord>> {
        Ok(self.state.read().await.messages_sorted(chat))
    }

    async fn put_message(&self, record: MessageRecord) -> Result<()> {
        self.state.write().await.push_message(record);
        Ok(())
    }

    async fn mark_read(&self, chat: &ChatId, recipient: &str) -> Result<()> {
        self.state.write().await.mark_read(chat, recipient);
        Ok(())
    }

    async fn clear_chat(&self, chat: &ChatId) -> Result<()> {
        self.state.write().await.clear_chat(chat);
        Ok(())
    }

    async fn delete_chat(&self, chat: &ChatId) -> Result<()> {
        self.state.write().await.delete_chat(chat);
        Ok(())
    }

    async fn get_chat_settings(&self, chat: &ChatId) -> Result<Option<ChatSettings>> {
        Ok(self.state.read().await.settings().get(chat.as_str()).cloned())
    }

    async fn put_chat_settings(&self, chat: &ChatId, settings: ChatSettings) -> Result<()> {
        self.state
            .write()
            .await
            .settings_mut()
            .insert(chat.as_str().to_string(), settings);
        Ok(())
    }
}
