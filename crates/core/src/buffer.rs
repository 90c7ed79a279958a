//! Per-conversation buffer state.
//!
//! A [`ConversationBuffer`] lives in the backing store under
//! `buffer:<conversation_id>` and holds the fragments received since the
//! last flush, in arrival order.

use crate::classification::{Entities, UrgencyClass};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One buffered chat turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BufferEntry {
    pub text: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub entities: Entities,
    #[serde(default)]
    pub urgency: UrgencyClass,
}

impl BufferEntry {
    pub fn new(text: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            text: text.into(),
            timestamp,
            entities: Entities::new(),
            urgency: UrgencyClass::default(),
        }
    }

    pub fn with_entities(mut self, entities: Entities) -> Self {
        self.entities = entities;
        self
    }

    pub fn with_urgency(mut self, urgency: UrgencyClass) -> Self {
        self.urgency = urgency;
        self
    }

    /// UTF-8 byte length counted against the buffer size limit.
    pub fn size_bytes(&self) -> usize {
        self.text.len()
    }
}

/// Fragments accumulated for one conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationBuffer {
    pub conversation_id: String,
    pub entries: Vec<BufferEntry>,
    /// Arrival time of the first entry.
    pub created_at: DateTime<Utc>,
    /// Latest arrival time seen.
    pub last_updated_at: DateTime<Utc>,
    pub size_bytes: usize,
    /// Incremented on every append; used as the resume token.
    pub revision: u64,
}

impl ConversationBuffer {
    /// Start a buffer with its first entry.
    pub fn new(conversation_id: impl Into<String>, first: BufferEntry) -> Self {
        let size_bytes = first.size_bytes();
        let arrived = first.timestamp;
        Self {
            conversation_id: conversation_id.into(),
            entries: vec![first],
            created_at: arrived,
            last_updated_at: arrived,
            size_bytes,
            revision: 1,
        }
    }

    /// Append an entry, keeping `size_bytes` and `revision` current.
    pub fn push(&mut self, entry: BufferEntry) {
        self.size_bytes += entry.size_bytes();
        self.last_updated_at = self.last_updated_at.max(entry.timestamp);
        self.entries.push(entry);
        self.revision += 1;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Recompute the byte total from scratch.
    pub fn computed_size(&self) -> usize {
        self.entries.iter().map(BufferEntry::size_bytes).sum()
    }

    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.text.as_str())
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Decode a stored buffer, repairing a drifted `size_bytes`.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        let mut buffer: Self = serde_json::from_slice(bytes)?;
        buffer.size_bytes = buffer.computed_size();
        Ok(buffer)
    }
}
