//! File-backed store: the local fallback when no remote account store is
//! configured.
//!
//! The whole state is held in memory and snapshotted to a single bincode
//! file after every mutation, so a crash loses at most the operation in
//! flight.

use async_trait::async_trait;
use std::fs;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::debug;

use super::{Persistence, StoreState};
use crate::crypto::{PublicKey, WrappedPrivateKey};
use crate::errors::{HavenError, Result};
use crate::messages::{ChatId, ChatSettings, MessageRecord};

pub struct FileStore {
    path: PathBuf,
    state: RwLock<StoreState>,
}

impl FileStore {
    /// Open a store file, creating parent directories as needed. A missing
    /// file starts empty; an unreadable one is a storage error.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| HavenError::Storage(format!("Failed to create store directory: {}", e)))?;
        }

        let state = if path.exists() {
            let data = fs::read(&path)
                .map_err(|e| HavenError::Storage(format!("Failed to read store file: {}", e)))?;
            if data.is_empty() {
                StoreState::default()
            } else {
                bincode::deserialize(&data)
                    .map_err(|e| HavenError::Storage(format!("Failed to parse store file: {}", e)))?
            }
        } else {
            StoreState::default()
        };

        debug!(path = %path.display(), "Opened file store");

        Ok(FileStore {
            path,
            state: RwLock::new(state),
        })
    }

    fn persist(&self, state: &StoreState) -> Result<()> {
        let data = bincode::serialize(state)
            .map_err(|e| HavenError::Storage(format!("Failed to serialize store: {}", e)))?;
        fs::write(&self.path, data)
            .map_err(|e| HavenError::Storage(format!("Failed to write store file: {}", e)))
    }
}

#[async_trait]
impl Persistence for FileStore {
    async fn get_wrapped_private_key(&self, username: &str) -> Result<Option<WrappedPrivateKey>> {
        Ok(self.state.read().await.wrapped_keys().get(username).cloned())
    }

    async fn put_wrapped_private_key(&self, username: &str, wrapped: WrappedPrivateKey) -> Result<()> {
        let mut state = self.state.write().await;
        state.wrapped_keys_mut().insert(username.to_string(), wrapped);
        self.persist(&state)
    }

    async fn get_public_key(&self, username: &str) -> Result<Option<PublicKey>> {
        Ok(self.state.read().await.public_keys().get(username).copied())
    }

    async fn put_public_key(&self, username: &str, public_key: PublicKey) -> Result<()> {
        let mut state = self.state.write().await;
        state.public_keys_mut().insert(username.to_string(), public_key);
        self.persist(&state)
    }

    async fn get_messages(&self, chat: &ChatId) -> Result<Vec<MessageRecord>> {
        Ok(self.state.read().await.messages_sorted(chat))
    }

    async fn put_message(&self, record: MessageRecord) -> Result<()> {
        let mut state = self.state.write().await;
        state.push_message(record);
        self.persist(&state)
    }

    async fn mark_read(&self, chat: &ChatId, recipient: &str) -> Result<()> {
        let mut state = self.state.write().await;
        state.mark_read(chat, recipient);
        self.persist(&state)
    }

    async fn clear_chat(&self, chat: &ChatId) -> Result<()> {
        let mut state = self.state.write().await;
        state.clear_chat(chat);
        self.persist(&state)
    }

    async fn delete_chat(&self, chat: &ChatId) -> Result<()> {
        let mut state = self.state.write().await;
        state.delete_chat(chat);
        self.persist(&state)
    }

    async fn get_chat_settings(&self, chat: &ChatId) -> Result<Option<ChatSettings>> {
        Ok(self.state.read().await.settings().get(chat.as_str()).cloned())
    }

    async fn put_chat_settings(&self, chat: &ChatId, settings: ChatSettings) -> Result<()> {
        let mut state = self.state.write().await;
        state.settings_mut().insert(chat.as_str().to_string(), settings);
        self.persist(&state)
    }
}
