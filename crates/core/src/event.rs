//! Domain event system: decoupled observation of engine activity.
//!
//! Events are published when a buffer changes state or a dependency circuit
//! flips. Observers (logging sinks, the gateway, tests) subscribe without
//! coupling to the engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Why a buffer was drained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlushReason {
    /// The latest message was classified COMPLETE.
    Complete,
    /// Entry count reached the maximum.
    MaxEntries,
    /// Byte size reached the maximum.
    MaxBytes,
    /// The wait window elapsed with no newer message.
    WaitElapsed,
    /// An explicit flush request.
    Forced,
}

/// All domain events in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DomainEvent {
    /// A fragment was appended and the engine is waiting for more
    MessageBuffered {
        conversation_id: String,
        entries: usize,
        revision: u64,
        wait_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// A buffer was drained into an aggregate
    BufferFlushed {
        conversation_id: String,
        entries: usize,
        reason: FlushReason,
        timestamp: DateTime<Utc>,
    },

    /// A buffer was cancelled
    BufferCancelled {
        conversation_id: String,
        existed: bool,
        timestamp: DateTime<Utc>,
    },

    /// A dependency failure was absorbed by a fallback path
    FallbackUsed {
        conversation_id: String,
        dependency: String,
        reason: String,
        timestamp: DateTime<Utc>,
    },

    /// A circuit breaker changed state
    CircuitStateChanged {
        dependency: String,
        from: String,
        to: String,
        timestamp: DateTime<Utc>,
    },
}

/// A broadcast-based event bus for domain events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub.
pub struct EventBus {
    sender: broadcast::Sender<Arc<DomainEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: DomainEvent) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DomainEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
