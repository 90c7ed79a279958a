//! In-memory store: the default backend and the one used in tests.
//!
//! Expiry is lazy: an expired key reads as absent and is dropped on the next
//! access. Deadlines use `tokio::time::Instant`, so paused-clock tests can
//! advance past a TTL without sleeping.

use async_trait::async_trait;
use chatbuffer_core::error::StoreError;
use chatbuffer_core::store::BackingStore;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

struct StoredValue {
    bytes: Vec<u8>,
    expires_at: Instant,
}

impl StoredValue {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// A key-value store held in process memory.
#[derive(Clone)]
pub struct InMemoryStore {
    entries: Arc<RwLock<HashMap<String, StoredValue>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Number of live keys.
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .read()
            .await
            .values()
            .filter(|v| v.is_live(now))
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Remaining life of a key, if it is live.
    pub async fn ttl(&self, key: &str) -> Option<Duration> {
        let now = Instant::now();
        self.entries
            .read()
            .await
            .get(key)
            .filter(|v| v.is_live(now))
            .map(|v| v.expires_at - now)
    }

    /// Drop every expired key. Returns how many were removed.
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, v| v.is_live(now));
        before - entries.len()
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BackingStore for InMemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let now = Instant::now();
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                Some(v) if v.is_live(now) => return Ok(Some(v.bytes.clone())),
                None => return Ok(None),
                Some(_) => {}
            }
        }
        // Expired: drop it unless a writer refreshed it in between
        let mut entries = self.entries.write().await;
        if entries.get(key).is_some_and(|v| !v.is_live(now)) {
            entries.remove(key);
        }
        Ok(None)
    }

    async fn set_with_ttl(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), StoreError> {
        let expires_at = Instant::now() + ttl;
        self.entries.write().await.insert(
            key.to_string(),
            StoredValue {
                bytes: value,
                expires_at,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        let now = Instant::now();
        let removed = self.entries.write().await.remove(key);
        Ok(removed.is_some_and(|v| v.is_live(now)))
    }
}
