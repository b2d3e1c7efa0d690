//! Session-scoped cache of decrypted message bodies.
//!
//! Avoids repeating the asymmetric unwrap for messages already shown. Purely
//! a performance layer: entries are reconstructible by re-decrypting, so the
//! system stays correct if the cache is empty or disabled. Never persisted.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, PoisonError};

pub const DEFAULT_CACHE_CAPACITY: usize = 1024;

/// In-memory map from message id to previously decrypted plaintext, with
/// FIFO eviction at a fixed capacity.
pub struct DecryptionCache {
    inner: Mutex<Inner>,
    capacity: usize,
}

struct Inner {
    entries: HashMap<String, String>,
    order: VecDeque<String>,
}

impl DecryptionCache {
    pub fn new(capacity: usize) -> Self {
        DecryptionCache {
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                order: VecDeque::new(),
            }),
            capacity: capacity.max(1),
        }
    }

    pub fn get(&self, message_id: &str) -> Option<String> {
        let inner = self.lock();
        inner.entries.get(message_id).cloned()
    }

    /// Idempotent: a given message id always decrypts to the same plaintext,
    /// so last-write-wins is equivalent to any ordering.
    pub fn put(&self, message_id: &str, plaintext: String) {
        let mut inner = self.lock();

        if inner.entries.insert(message_id.to_string(), plaintext).is_none() {
            inner.order.push_back(message_id.to_string());
        }

        while inner.order.len() > self.capacity {
            if let Some(oldest) = inner.order.pop_front() {
                inner.entries.remove(&oldest);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    /// Drop all entries (session end).
    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.entries.clear();
        inner.order.clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // All writers for a given id compute the same value, so a poisoned
        // lock holds consistent data and can be recovered.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for DecryptionCache {
    fn default() -> Self {
        DecryptionCache::new(DEFAULT_CACHE_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_absent_returns_none() {
        let cache = DecryptionCache::default();
        assert_eq!(cache.get("msg_1"), None);
    }

    #[test]
    fn test_put_then_get() {
        let cache = DecryptionCache::default();
        cache.put("msg_1", "hello".to_string());

        assert_eq!(cache.get("msg_1"), Some("hello".to_string()));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_put_is_idempotent() {
        let cache = DecryptionCache::default();
        cache.put("msg_1", "hello".to_string());
        cache.put("msg_1", "hello".to_string());

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("msg_1"), Some("hello".to_string()));
    }

    #[test]
    fn test_fifo_eviction() {
        let cache = DecryptionCache::new(2);
        cache.put("msg_1", "a".to_string());
        cache.put("msg_2", "b".to_string());
        cache.put("msg_3", "c".to_string());

        assert_eq!(cache.get("msg_1"), None);
        assert_eq!(cache.get("msg_2"), Some("b".to_string()));
        assert_eq!(cache.get("msg_3"), Some("c".to_string()));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_clear() {
        let cache = DecryptionCache::default();
        cache.put("msg_1", "a".to_string());
        cache.clear();

        assert!(cache.is_empty());
        assert_eq!(cache.get("msg_1"), None);
    }
}
