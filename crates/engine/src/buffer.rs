//! Per-conversation buffer lifecycle over a [`BackingStore`].
//!
//! Every store call goes through the store circuit breaker. Operations on
//! one conversation are serialized by an async mutex looked up in a
//! `DashMap`; different conversations never share a lock. The map entry is
//! removed as soon as nobody holds or waits on it.
//!
//! Cancellation: each conversation slot carries an epoch. `cancel` bumps it
//! before queueing for the lock, and an append whose [`Ticket`] was taken
//! under an older epoch drops its write with [`BufferError::Cancelled`].

use crate::circuit_breaker::{CircuitBreaker, CircuitError, CircuitSnapshot};
use crate::error::BufferError;
use chatbuffer_config::EngineConfig;
use chatbuffer_core::{
    BackingStore, BufferEntry, ClassificationResult, ConversationBuffer, FlushReason, StoreError,
    buffer_key,
};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, warn};

/// Size and lifetime limits for one buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferLimits {
    pub max_entries: usize,
    pub max_bytes: usize,
    pub ttl: Duration,
    /// Reset the TTL on every append instead of counting from creation.
    pub sliding_ttl: bool,
}

impl BufferLimits {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            max_entries: config.effective_max_entries(),
            max_bytes: config.buffer.max_bytes(),
            ttl: Duration::from_secs(config.buffer.ttl_secs),
            sliding_ttl: config.buffer.sliding_ttl,
        }
    }
}

/// The buffer after an append.
#[derive(Debug, Clone)]
pub struct BufferState {
    pub buffer: ConversationBuffer,
    /// Set when a bound was reached or the message completed the thought.
    pub flush_reason: Option<FlushReason>,
    /// Whether the store currently holds a key for this conversation.
    pub stored: bool,
}

impl BufferState {
    pub fn should_flush(&self) -> bool {
        self.flush_reason.is_some()
    }

    pub fn entries(&self) -> usize {
        self.buffer.len()
    }
}

struct Slot {
    lock: Arc<Mutex<()>>,
    cancel_epoch: AtomicU64,
}

pub struct BufferManager {
    store: Arc<dyn BackingStore>,
    breaker: CircuitBreaker,
    limits: BufferLimits,
    slots: DashMap<String, Arc<Slot>>,
}

impl BufferManager {
    pub fn new(store: Arc<dyn BackingStore>, breaker: CircuitBreaker, limits: BufferLimits) -> Self {
        Self {
            store,
            breaker,
            limits,
            slots: DashMap::new(),
        }
    }

    pub fn limits(&self) -> &BufferLimits {
        &self.limits
    }

    pub fn store_name(&self) -> &str {
        self.store.name()
    }

    pub fn circuit(&self) -> CircuitSnapshot {
        self.breaker.snapshot()
    }

    /// Conversations with a live lock slot.
    pub fn active_conversations(&self) -> usize {
        self.slots.len()
    }

    /// Register interest in a conversation, recording the current cancel epoch.
    pub fn ticket(&self, conversation_id: &str) -> Ticket<'_> {
        let slot = self
            .slots
            .entry(conversation_id.to_string())
            .or_insert_with(|| {
                Arc::new(Slot {
                    lock: Arc::new(Mutex::new(())),
                    cancel_epoch: AtomicU64::new(0),
                })
            })
            .clone();
        let epoch = slot.cancel_epoch.load(Ordering::Acquire);
        Ticket {
            slot: SlotRef {
                manager: self,
                conversation_id: conversation_id.to_string(),
                slot,
            },
            epoch,
        }
    }

    pub async fn lock(&self, conversation_id: &str) -> ConversationGuard<'_> {
        self.ticket(conversation_id).lock().await
    }

    pub async fn append(
        &self,
        conversation_id: &str,
        text: &str,
        received_at: DateTime<Utc>,
        classification: &ClassificationResult,
    ) -> Result<BufferState, BufferError> {
        self.lock(conversation_id)
            .await
            .append(text, received_at, classification)
            .await
    }

    /// Remove and return the buffer.
    pub async fn flush(&self, conversation_id: &str) -> Result<Option<ConversationBuffer>, BufferError> {
        self.lock(conversation_id).await.take().await
    }

    /// Delete the buffer. Appends already in flight are discarded.
    pub async fn cancel(&self, conversation_id: &str) -> Result<bool, BufferError> {
        let mut ticket = self.ticket(conversation_id);
        ticket.epoch = ticket.slot.slot.cancel_epoch.fetch_add(1, Ordering::AcqRel) + 1;
        ticket.lock().await.clear().await
    }

    fn flush_reason(&self, buffer: &ConversationBuffer, complete: bool) -> Option<FlushReason> {
        if complete {
            Some(FlushReason::Complete)
        } else if buffer.len() >= self.limits.max_entries {
            Some(FlushReason::MaxEntries)
        } else if buffer.size_bytes >= self.limits.max_bytes {
            Some(FlushReason::MaxBytes)
        } else {
            None
        }
    }

    fn ttl_for(&self, buffer: &ConversationBuffer) -> Duration {
        if self.limits.sliding_ttl {
            return self.limits.ttl;
        }
        // Age in message time: arrival of the latest entry minus the first.
        let age = (buffer.last_updated_at - buffer.created_at)
            .to_std()
            .unwrap_or_default();
        self.limits
            .ttl
            .saturating_sub(age)
            .max(Duration::from_millis(1))
    }

    async fn load(&self, key: &str) -> Result<Option<ConversationBuffer>, BufferError> {
        let bytes = self
            .breaker
            .call(|| self.store.get(key))
            .await
            .map_err(unavailable)?;

        let Some(bytes) = bytes else {
            return Ok(None);
        };
        match ConversationBuffer::from_bytes(&bytes) {
            Ok(buffer) if !buffer.is_empty() => Ok(Some(buffer)),
            Ok(_) => Ok(None),
            Err(e) => {
                let error = StoreError::Corrupt {
                    key: key.to_string(),
                    reason: e.to_string(),
                };
                warn!(%error, "Discarding unreadable buffer");
                Ok(None)
            }
        }
    }

    async fn save(&self, key: &str, buffer: &ConversationBuffer) -> Result<(), BufferError> {
        let bytes = buffer
            .to_bytes()
            .map_err(|e| BufferError::StoreUnavailable(format!("encode failed: {e}")))?;
        let ttl = self.ttl_for(buffer);
        self.breaker
            .call(|| self.store.set_with_ttl(key, bytes, ttl))
            .await
            .map_err(unavailable)
    }

    async fn delete(&self, key: &str) -> Result<bool, BufferError> {
        self.breaker
            .call(|| self.store.delete(key))
            .await
            .map_err(unavailable)
    }
}

fn unavailable(e: CircuitError<StoreError>) -> BufferError {
    BufferError::StoreUnavailable(e.to_string())
}

/// Holds a conversation slot and drops it from the map once unused.
struct SlotRef<'a> {
    manager: &'a BufferManager,
    conversation_id: String,
    slot: Arc<Slot>,
}

impl Drop for SlotRef<'_> {
    fn drop(&mut self) {
        // Two references left: the map's and this one.
        self.manager.slots.remove_if(&self.conversation_id, |_, slot| {
            Arc::ptr_eq(slot, &self.slot) && Arc::strong_count(slot) == 2
        });
    }
}

/// A place in line for a conversation, taken before any slow work so that a
/// later cancel can still invalidate it.
pub struct Ticket<'a> {
    slot: SlotRef<'a>,
    epoch: u64,
}

impl<'a> Ticket<'a> {
    pub async fn lock(self) -> ConversationGuard<'a> {
        let held = self.slot.slot.lock.clone().lock_owned().await;
        ConversationGuard {
            _held: held,
            key: buffer_key(&self.slot.conversation_id),
            slot: self.slot,
            epoch: self.epoch,
        }
    }
}

/// Exclusive access to one conversation's buffer.
pub struct ConversationGuard<'a> {
    _held: OwnedMutexGuard<()>,
    key: String,
    slot: SlotRef<'a>,
    epoch: u64,
}

impl ConversationGuard<'_> {
    pub fn conversation_id(&self) -> &str {
        &self.slot.conversation_id
    }

    /// A cancel was issued after this guard's ticket was taken.
    pub fn is_cancelled(&self) -> bool {
        self.slot.slot.cancel_epoch.load(Ordering::Acquire) != self.epoch
    }

    pub async fn load(&self) -> Result<Option<ConversationBuffer>, BufferError> {
        self.slot.manager.load(&self.key).await
    }

    /// Load or create the buffer and append one entry.
    ///
    /// The buffer is written back only while it stays under every bound; a
    /// buffer that must flush is handed to the caller instead.
    pub async fn append(
        &self,
        text: &str,
        received_at: DateTime<Utc>,
        classification: &ClassificationResult,
    ) -> Result<BufferState, BufferError> {
        if self.is_cancelled() {
            debug!(conversation_id = %self.conversation_id(), "Dropping append after cancel");
            return Err(BufferError::Cancelled);
        }

        let manager = self.slot.manager;
        let entry = BufferEntry::new(text, received_at)
            .with_entities(classification.entities.clone())
            .with_urgency(classification.urgency);

        let existing = manager.load(&self.key).await?;
        let existed = existing.is_some();
        let buffer = match existing {
            Some(mut buffer) => {
                buffer.push(entry);
                buffer
            }
            None => ConversationBuffer::new(self.conversation_id(), entry),
        };

        let flush_reason =
            manager.flush_reason(&buffer, classification.completeness.is_complete());
        if flush_reason.is_none() {
            manager.save(&self.key, &buffer).await?;
        }

        debug!(
            conversation_id = %self.conversation_id(),
            entries = buffer.len(),
            size_bytes = buffer.size_bytes,
            revision = buffer.revision,
            flush = ?flush_reason,
            "Appended to buffer"
        );

        Ok(BufferState {
            stored: existed || flush_reason.is_none(),
            buffer,
            flush_reason,
        })
    }

    pub async fn clear(&self) -> Result<bool, BufferError> {
        self.slot.manager.delete(&self.key).await
    }

    /// Remove and return the buffer.
    pub async fn take(&self) -> Result<Option<ConversationBuffer>, BufferError> {
        let buffer = self.load().await?;
        if buffer.is_some() {
            self.clear().await?;
        }
        Ok(buffer)
    }
}
