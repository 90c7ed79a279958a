//! Merges a drained buffer into one AI-ready message.

use crate::classifier::HybridClassifier;
use chatbuffer_core::{ClassificationResult, ConversationBuffer};
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::sync::Arc;

/// The merged text of a buffer and its fresh classification.
#[derive(Debug, Clone)]
pub struct Aggregate {
    pub final_text: String,
    pub classification: ClassificationResult,
    pub message_count: usize,
    pub aggregation_key: String,
}

pub struct MessageAggregator {
    classifier: Arc<HybridClassifier>,
    separator: String,
}

impl MessageAggregator {
    pub fn new(classifier: Arc<HybridClassifier>, separator: impl Into<String>) -> Self {
        Self {
            classifier,
            separator: separator.into(),
        }
    }

    /// Join entry texts in arrival order. Blank entries are skipped.
    pub fn join(&self, buffer: &ConversationBuffer) -> String {
        buffer
            .texts()
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .collect::<Vec<_>>()
            .join(&self.separator)
    }

    /// Concatenate and classify the joined text as a whole.
    pub async fn aggregate(&self, buffer: &ConversationBuffer) -> Aggregate {
        let final_text = self.join(buffer);
        let classification = self.classifier.classify(&final_text, None).await;
        Aggregate {
            final_text,
            classification,
            message_count: buffer.len(),
            aggregation_key: aggregation_key(
                &buffer.conversation_id,
                buffer.created_at,
                buffer.entries.iter().map(|e| e.timestamp),
            ),
        }
    }
}

/// Hex SHA-256 over the conversation id, buffer creation time and entry
/// timestamps. Re-delivering the same buffer yields the same key.
pub fn aggregation_key(
    conversation_id: &str,
    created_at: DateTime<Utc>,
    timestamps: impl IntoIterator<Item = DateTime<Utc>>,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(conversation_id.as_bytes());
    hasher.update(b"\0");
    hasher.update(created_at.timestamp_millis().to_be_bytes());
    for ts in timestamps {
        hasher.update(ts.timestamp_millis().to_be_bytes());
    }
    hex::encode(hasher.finalize())
}
