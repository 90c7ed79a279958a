//! The top-level decision loop.
//!
//! For each inbound message: classify, append under the conversation lock,
//! consult the timing policy, and either answer WAIT or drain the buffer and
//! answer READY. The engine runs no timers; after a WAIT the caller invokes
//! [`Orchestrator::resume`] with the returned revision.

use crate::aggregator::{MessageAggregator, aggregation_key};
use crate::buffer::{BufferLimits, BufferManager, ConversationGuard};
use crate::circuit_breaker::{CircuitBreaker, CircuitSnapshot, CircuitStatus};
use crate::classifier::HybridClassifier;
use crate::error::{BufferError, BuildError};
use crate::timing::{TimingAction, TimingPolicy};
use chatbuffer_config::{EngineConfig, StoreConfig};
use chatbuffer_core::{
    BackingStore, ClassificationResult, ConversationBuffer, Decision, DomainEvent, EventBus,
    FlushReason, InboundMessage, MlClassifier, ReadyMessage, Result, SkipReason,
};
use chatbuffer_semantic::{HttpMlClassifier, SemanticAnalyzer};
use chatbuffer_store::InMemoryStore;
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Dependency health for the `/health` endpoint and `check` command.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    /// `ok` when every circuit is closed, otherwise `degraded`.
    pub status: &'static str,
    pub store_backend: String,
    pub store: CircuitSnapshot,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ml: Option<CircuitSnapshot>,
    pub active_conversations: usize,
}

pub struct Orchestrator {
    classifier: Arc<HybridClassifier>,
    buffers: BufferManager,
    timing: TimingPolicy,
    aggregator: MessageAggregator,
    events: Arc<EventBus>,
}

impl Orchestrator {
    /// Assemble an engine over an explicit store and optional ML service.
    pub fn new(
        config: &EngineConfig,
        store: Arc<dyn BackingStore>,
        ml: Option<Arc<dyn MlClassifier>>,
    ) -> std::result::Result<Self, BuildError> {
        let events = Arc::new(EventBus::default());
        let analyzer = SemanticAnalyzer::new(&config.semantic)?;

        let classifier = Arc::new(match ml {
            Some(service) => HybridClassifier::with_ml(
                analyzer,
                service,
                config.circuit_breaker.ml,
                config.ml.confidence,
                events.clone(),
            ),
            None => HybridClassifier::regex_only(analyzer),
        });

        let breaker =
            CircuitBreaker::new("store", config.circuit_breaker.store).with_events(events.clone());
        let buffers = BufferManager::new(store, breaker, BufferLimits::from_config(config));

        Ok(Self {
            aggregator: MessageAggregator::new(classifier.clone(), config.buffer.separator.clone()),
            timing: TimingPolicy::new(*config.timing.active()),
            classifier,
            buffers,
            events,
        })
    }

    /// Assemble an engine from configuration alone: opens the configured
    /// store and, when enabled, the HTTP ML client.
    pub async fn from_config(config: &EngineConfig) -> std::result::Result<Self, BuildError> {
        let store = open_store(&config.store).await?;

        let ml: Option<Arc<dyn MlClassifier>> = match (config.ml.enabled, &config.ml.endpoint) {
            (true, Some(endpoint)) => Some(Arc::new(HttpMlClassifier::new(
                endpoint.clone(),
                Duration::from_millis(config.ml.timeout_ms),
            )?)),
            (true, None) => {
                return Err(BuildError::Config("ml.enabled requires ml.endpoint".into()));
            }
            (false, _) => None,
        };

        let orchestrator = Self::new(config, store, ml)?;
        info!(
            industry = %config.industry,
            profile = ?config.timing.profile,
            store = orchestrator.buffers.store_name(),
            ml = orchestrator.classifier.ml_enabled(),
            "Buffering engine ready"
        );
        Ok(orchestrator)
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DomainEvent>> {
        self.events.subscribe()
    }

    pub fn buffers(&self) -> &BufferManager {
        &self.buffers
    }

    /// Process one inbound message.
    ///
    /// Only malformed input is an error. Store trouble degrades to
    /// forwarding the message on its own with `fallback_used` set.
    pub async fn handle(&self, message: InboundMessage) -> Result<Decision> {
        message.validate()?;
        let conversation_id = normalize_id(&message.chat_id).to_string();

        let ticket = self.buffers.ticket(&conversation_id);
        let classification = self.classifier.classify(&message.text, None).await;
        let guard = ticket.lock().await;

        let state = match guard
            .append(&message.text, message.received_at(), &classification)
            .await
        {
            Ok(state) => state,
            Err(BufferError::Cancelled) => {
                return Ok(Decision::Skipped {
                    conversation_id,
                    reason: SkipReason::Cancelled,
                });
            }
            Err(BufferError::StoreUnavailable(reason)) => {
                drop(guard);
                return Ok(Decision::Ready(self.bypass(
                    conversation_id,
                    &message,
                    classification,
                    reason,
                )));
            }
        };

        let timing = self.timing.decide(classification.urgency, &state);
        match timing.action {
            TimingAction::Wait => {
                drop(guard);
                debug!(
                    conversation_id = %conversation_id,
                    entries = state.entries(),
                    wait_ms = timing.wait_ms,
                    urgency = %classification.urgency,
                    "Waiting for more fragments"
                );
                self.events.publish(DomainEvent::MessageBuffered {
                    conversation_id: conversation_id.clone(),
                    entries: state.entries(),
                    revision: state.buffer.revision,
                    wait_ms: timing.wait_ms,
                    timestamp: Utc::now(),
                });
                Ok(Decision::Wait {
                    conversation_id,
                    wait_ms: timing.wait_ms,
                    revision: state.buffer.revision,
                    buffered: state.entries(),
                    urgency: classification.urgency,
                })
            }
            TimingAction::FlushNow => {
                let reason = state.flush_reason.unwrap_or(FlushReason::Forced);
                if state.stored {
                    self.drain(guard, state.buffer, reason).await
                } else {
                    drop(guard);
                    Ok(Decision::Ready(self.release(state.buffer, reason).await))
                }
            }
        }
    }

    /// Called after a WAIT window. Flushes only if no newer message arrived.
    pub async fn resume(&self, conversation_id: &str, revision: u64) -> Result<Decision> {
        let conversation_id = normalize_id(conversation_id);
        let guard = self.buffers.lock(conversation_id).await;
        let buffer = match self.load_or_skip(&guard).await {
            Ok(buffer) => buffer,
            Err(skipped) => return Ok(skipped),
        };

        if buffer.revision != revision {
            debug!(
                conversation_id,
                expected = revision,
                current = buffer.revision,
                "Resume superseded by a newer message"
            );
            return Ok(skipped(conversation_id, SkipReason::Superseded));
        }

        self.drain(guard, buffer, FlushReason::WaitElapsed).await
    }

    /// Drain the buffer now, regardless of timing.
    pub async fn flush(&self, conversation_id: &str) -> Result<Decision> {
        let conversation_id = normalize_id(conversation_id);
        let guard = self.buffers.lock(conversation_id).await;
        match self.load_or_skip(&guard).await {
            Ok(buffer) => self.drain(guard, buffer, FlushReason::Forced).await,
            Err(skipped) => Ok(skipped),
        }
    }

    /// Drop the buffer. Returns whether one existed.
    pub async fn cancel(&self, conversation_id: &str) -> bool {
        let conversation_id = normalize_id(conversation_id);
        match self.buffers.cancel(conversation_id).await {
            Ok(existed) => {
                info!(conversation_id, existed, "Buffer cancelled");
                self.events.publish(DomainEvent::BufferCancelled {
                    conversation_id: conversation_id.to_string(),
                    existed,
                    timestamp: Utc::now(),
                });
                existed
            }
            Err(e) => {
                warn!(conversation_id, error = %e, "Cancel could not reach the store");
                false
            }
        }
    }

    /// Classify text without touching any buffer.
    pub async fn classify(&self, text: &str) -> ClassificationResult {
        self.classifier.classify(text, None).await
    }

    pub fn health(&self) -> HealthReport {
        let store = self.buffers.circuit();
        let ml = self.classifier.ml_circuit();
        let degraded = store.status != CircuitStatus::Closed
            || ml.as_ref().is_some_and(|m| m.status != CircuitStatus::Closed);
        HealthReport {
            status: if degraded { "degraded" } else { "ok" },
            store_backend: self.buffers.store_name().to_string(),
            store,
            ml,
            active_conversations: self.buffers.active_conversations(),
        }
    }

    async fn load_or_skip(
        &self,
        guard: &ConversationGuard<'_>,
    ) -> std::result::Result<ConversationBuffer, Decision> {
        let conversation_id = guard.conversation_id();
        match guard.load().await {
            Ok(Some(buffer)) => Ok(buffer),
            Ok(None) => Err(skipped(conversation_id, SkipReason::Empty)),
            Err(e) => {
                warn!(conversation_id, error = %e, "Buffer unreadable, leaving it for a later call");
                Err(skipped(conversation_id, SkipReason::Unavailable))
            }
        }
    }

    /// Delete the stored buffer, release the lock, then aggregate.
    ///
    /// A failed delete does not block the READY: the stale copy expires with
    /// its TTL and the aggregation key lets downstream drop the duplicate.
    async fn drain(
        &self,
        guard: ConversationGuard<'_>,
        buffer: ConversationBuffer,
        reason: FlushReason,
    ) -> Result<Decision> {
        if let Err(e) = guard.clear().await {
            warn!(
                conversation_id = %buffer.conversation_id,
                error = %e,
                "Failed to delete flushed buffer, emitting anyway"
            );
        }
        drop(guard);
        Ok(Decision::Ready(self.release(buffer, reason).await))
    }

    async fn release(&self, buffer: ConversationBuffer, reason: FlushReason) -> ReadyMessage {
        let aggregate = self.aggregator.aggregate(&buffer).await;

        info!(
            conversation_id = %buffer.conversation_id,
            entries = aggregate.message_count,
            ?reason,
            intent = %aggregate.classification.intent,
            "Buffer flushed"
        );
        self.events.publish(DomainEvent::BufferFlushed {
            conversation_id: buffer.conversation_id.clone(),
            entries: aggregate.message_count,
            reason,
            timestamp: Utc::now(),
        });

        ReadyMessage {
            conversation_id: buffer.conversation_id,
            final_text: aggregate.final_text,
            intent: aggregate.classification.intent,
            entities: aggregate.classification.entities,
            urgency: aggregate.classification.urgency,
            ready_for_ai: true,
            fallback_used: false,
            message_count: aggregate.message_count,
            aggregation_key: aggregate.aggregation_key,
        }
    }

    /// Forward the current message alone. Nothing is queued for later.
    fn bypass(
        &self,
        conversation_id: String,
        message: &InboundMessage,
        classification: ClassificationResult,
        reason: String,
    ) -> ReadyMessage {
        warn!(
            conversation_id = %conversation_id,
            reason = %reason,
            "Store unavailable, forwarding message unbuffered"
        );
        self.events.publish(DomainEvent::FallbackUsed {
            conversation_id: conversation_id.clone(),
            dependency: "store".into(),
            reason,
            timestamp: Utc::now(),
        });

        let received_at = message.received_at();
        ReadyMessage {
            aggregation_key: aggregation_key(&conversation_id, received_at, [received_at]),
            conversation_id,
            final_text: message.text.trim().to_string(),
            intent: classification.intent,
            entities: classification.entities,
            urgency: classification.urgency,
            ready_for_ai: true,
            fallback_used: true,
            message_count: 1,
        }
    }
}

/// Conversation ids are compared without surrounding whitespace.
fn normalize_id(conversation_id: &str) -> &str {
    conversation_id.trim()
}

fn skipped(conversation_id: &str, reason: SkipReason) -> Decision {
    Decision::Skipped {
        conversation_id: conversation_id.to_string(),
        reason,
    }
}

/// Open the backing store selected by `store.backend`.
pub async fn open_store(
    config: &StoreConfig,
) -> std::result::Result<Arc<dyn BackingStore>, BuildError> {
    match config.backend.as_str() {
        "memory" => Ok(Arc::new(InMemoryStore::new())),
        "sqlite" => open_sqlite(config).await,
        other => Err(BuildError::Config(format!("unknown store backend '{other}'"))),
    }
}

#[cfg(feature = "sqlite")]
async fn open_sqlite(
    config: &StoreConfig,
) -> std::result::Result<Arc<dyn BackingStore>, BuildError> {
    let path = match &config.path {
        Some(path) if path == ":memory:" || path.starts_with("sqlite:") => path.clone(),
        Some(path) => format!("sqlite://{path}"),
        None => {
            let path = EngineConfig::default_store_path();
            if let Some(dir) = path.parent() {
                std::fs::create_dir_all(dir).map_err(|e| {
                    BuildError::Config(format!("cannot create {}: {e}", dir.display()))
                })?;
            }
            format!("sqlite://{}", path.display())
        }
    };
    Ok(Arc::new(chatbuffer_store::SqliteStore::new(&path).await?))
}

#[cfg(not(feature = "sqlite"))]
async fn open_sqlite(
    _config: &StoreConfig,
) -> std::result::Result<Arc<dyn BackingStore>, BuildError> {
    Err(BuildError::Config(
        "store.backend = \"sqlite\" requires the `sqlite` feature".into(),
    ))
}
