//! Backing store trait: key-value storage with TTL.
//!
//! Buffers are persisted as opaque bytes under namespaced keys. Expiry is
//! the store's job: every `set_with_ttl` resets the remaining life (sliding
//! TTL), and an expired key reads as absent.

use crate::error::StoreError;
use async_trait::async_trait;
use std::time::Duration;

/// Key prefix for conversation buffers.
pub const BUFFER_KEY_PREFIX: &str = "buffer:";

/// The store key for a conversation's buffer.
pub fn buffer_key(conversation_id: &str) -> String {
    format!("{BUFFER_KEY_PREFIX}{conversation_id}")
}

/// The core BackingStore trait.
///
/// Implementations: in-memory (default, tests), SQLite.
#[async_trait]
pub trait BackingStore: Send + Sync {
    /// The backend name (e.g., "memory", "sqlite").
    fn name(&self) -> &str;

    /// Read a live value.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Write a value and (re)set its time-to-live.
    async fn set_with_ttl(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), StoreError>;

    /// Delete a key. Returns whether a live value existed.
    async fn delete(&self, key: &str) -> Result<bool, StoreError>;

    /// Cheap liveness check.
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
