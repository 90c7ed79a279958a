//! Inbound message and outbound decision types.
//!
//! These are the value objects crossing the engine boundary:
//! chat platform → [`InboundMessage`] → engine → [`Decision`] → AI pipeline.

use crate::classification::{Entities, Intent, UrgencyClass};
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A chat turn as delivered by the messaging platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundMessage {
    /// The raw text typed by the user
    #[serde(default)]
    pub text: String,

    /// Stable conversation identifier (chat or user id)
    #[serde(default, alias = "chat_id")]
    pub chat_id: String,

    /// Arrival time, epoch milliseconds
    #[serde(default)]
    pub timestamp: i64,
}

impl InboundMessage {
    pub fn new(chat_id: impl Into<String>, text: impl Into<String>, timestamp: i64) -> Self {
        Self {
            text: text.into(),
            chat_id: chat_id.into(),
            timestamp,
        }
    }

    /// Create a message stamped with the current time.
    pub fn now(chat_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(chat_id, text, Utc::now().timestamp_millis())
    }

    /// Reject messages the engine cannot buffer.
    pub fn validate(&self) -> Result<()> {
        if self.chat_id.trim().is_empty() {
            return Err(Error::InvalidMessage("chatId is required".into()));
        }
        if self.text.trim().is_empty() {
            return Err(Error::InvalidMessage("text must not be empty".into()));
        }
        Ok(())
    }

    /// The arrival time as a UTC timestamp. Out-of-range values map to now.
    pub fn received_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.timestamp).unwrap_or_else(Utc::now)
    }
}

/// The AI-ready payload emitted when a buffer is released.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadyMessage {
    pub conversation_id: String,
    pub final_text: String,
    pub intent: Intent,
    pub entities: Entities,
    pub urgency: UrgencyClass,
    pub ready_for_ai: bool,
    /// True when the store was unavailable and buffering was bypassed.
    pub fallback_used: bool,
    pub message_count: usize,
    /// Stable key for downstream de-duplication.
    pub aggregation_key: String,
}

/// Why a call produced no payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// No buffer exists (already flushed, cancelled, or expired).
    Empty,
    /// A newer message re-armed the wait window.
    Superseded,
    /// A cancel issued while this message was in flight won.
    Cancelled,
    /// The store could not be reached; any buffer is left for a later call.
    Unavailable,
}

/// The engine's answer for one inbound message or resume call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Decision {
    /// Keep buffering; the caller re-invokes `resume` after `wait_ms`.
    Wait {
        conversation_id: String,
        wait_ms: u64,
        /// Resume token: the buffer revision this wait applies to.
        revision: u64,
        buffered: usize,
        urgency: UrgencyClass,
    },
    /// Forward the aggregated message downstream.
    Ready(ReadyMessage),
    /// Nothing to forward.
    Skipped {
        conversation_id: String,
        reason: SkipReason,
    },
}

impl Decision {
    pub fn conversation_id(&self) -> &str {
        match self {
            Self::Wait { conversation_id, .. } | Self::Skipped { conversation_id, .. } => {
                conversation_id
            }
            Self::Ready(ready) => &ready.conversation_id,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }

    pub fn as_ready(&self) -> Option<&ReadyMessage> {
        match self {
            Self::Ready(ready) => Some(ready),
            _ => None,
        }
    }
}
