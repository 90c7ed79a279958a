//! End-to-end scenarios for the buffering engine.
//!
//! These drive the full decision loop (classification, buffering, timing,
//! aggregation and store fallback) through the public `Orchestrator` API.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chatbuffer_config::EngineConfig;
use chatbuffer_core::{
    BackingStore, ClassifierError, Decision, DomainEvent, InboundMessage, MlClassifier,
    MlPrediction, SkipReason, StoreError, UrgencyClass,
};
use chatbuffer_engine::{CircuitStatus, Orchestrator};
use chatbuffer_store::InMemoryStore;
use tokio::sync::Notify;

// ── Mock Store ───────────────────────────────────────────────────────────

/// An in-memory store that can be switched off, or told to refuse deletes.
#[derive(Default)]
struct FlakyStore {
    inner: InMemoryStore,
    down: AtomicBool,
    refuse_deletes: AtomicBool,
    calls: AtomicUsize,
}

impl FlakyStore {
    fn check(&self) -> Result<(), StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.down.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("connection refused".into()));
        }
        Ok(())
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BackingStore for FlakyStore {
    fn name(&self) -> &str {
        "flaky"
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        self.check()?;
        self.inner.get(key).await
    }

    async fn set_with_ttl(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), StoreError> {
        self.check()?;
        self.inner.set_with_ttl(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        self.check()?;
        if self.refuse_deletes.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("delete refused".into()));
        }
        self.inner.delete(key).await
    }
}

// ── Mock ML Service ──────────────────────────────────────────────────────

/// Holds every prediction until released, then answers with low confidence.
struct GatedMl {
    entered: Notify,
    release: Notify,
}

#[async_trait]
impl MlClassifier for GatedMl {
    fn name(&self) -> &str {
        "gated"
    }

    async fn predict(&self, _text: &str) -> Result<MlPrediction, ClassifierError> {
        self.entered.notify_one();
        self.release.notified().await;
        Ok(MlPrediction {
            intent: "information".into(),
            confidence: 0.1,
            entities: Default::default(),
        })
    }
}

struct DownMl;

#[async_trait]
impl MlClassifier for DownMl {
    fn name(&self) -> &str {
        "down"
    }

    async fn predict(&self, _text: &str) -> Result<MlPrediction, ClassifierError> {
        Err(ClassifierError::Unavailable("no route to host".into()))
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────

fn engine_with(config: &EngineConfig, store: Arc<FlakyStore>) -> Orchestrator {
    Orchestrator::new(config, store, None).unwrap()
}

fn engine() -> (Orchestrator, Arc<FlakyStore>) {
    let store = Arc::new(FlakyStore::default());
    (engine_with(&EngineConfig::default(), store.clone()), store)
}

async fn send(engine: &Orchestrator, chat: &str, text: &str) -> Decision {
    engine.handle(InboundMessage::now(chat, text)).await.unwrap()
}

fn expect_wait(decision: &Decision) -> u64 {
    match decision {
        Decision::Wait { revision, .. } => *revision,
        other => panic!("expected WAIT, got {other:?}"),
    }
}

// ── Scenarios ────────────────────────────────────────────────────────────

#[tokio::test]
async fn fragment_then_completion_is_merged() {
    let (engine, _) = engine();

    let first = send(&engine, "5491100", "quiero un turno").await;
    expect_wait(&first);

    let second = send(&engine, "5491100", "para mañana en la mañana").await;
    let ready = second.as_ready().expect("READY after completion");
    assert_eq!(ready.final_text, "quiero un turno para mañana en la mañana");
    assert_eq!(ready.intent, "appointment");
    assert!(ready.entities.contains("date", "mañana"));
    assert_eq!(ready.message_count, 2);
    assert!(ready.ready_for_ai);
    assert!(!ready.fallback_used);
}

#[tokio::test]
async fn complete_greeting_is_released_immediately() {
    let (engine, _) = engine();
    let decision = send(&engine, "chat-b", "Hola doctor").await;
    let ready = decision.as_ready().unwrap();
    assert_eq!(ready.final_text, "Hola doctor");
    assert_eq!(ready.intent, "greeting");
    assert_eq!(ready.urgency, UrgencyClass::Simple);
    assert_eq!(ready.message_count, 1);
}

#[tokio::test]
async fn open_store_circuit_forwards_current_message_only() {
    let (engine, store) = engine();
    let mut events = engine.subscribe();

    expect_wait(&send(&engine, "chat-c", "quiero un turno").await);
    store.down.store(true, Ordering::SeqCst);

    let threshold = EngineConfig::default().circuit_breaker.store.threshold;
    for _ in 0..threshold {
        let decision = send(&engine, "chat-c", "para mañana en la mañana").await;
        let ready = decision.as_ready().unwrap();
        assert!(ready.fallback_used);
        assert_eq!(ready.final_text, "para mañana en la mañana");
        assert_eq!(ready.message_count, 1);
    }
    assert_eq!(engine.health().store.status, CircuitStatus::Open);
    assert_eq!(engine.health().status, "degraded");

    // Open circuit: the store is no longer touched.
    let calls = store.calls();
    let decision = send(&engine, "chat-c", "Hola doctor").await;
    assert!(decision.as_ready().unwrap().fallback_used);
    assert_eq!(store.calls(), calls);

    let mut saw_fallback = false;
    while let Ok(event) = events.try_recv() {
        if let DomainEvent::FallbackUsed { dependency, .. } = event.as_ref() {
            assert_eq!(dependency, "store");
            saw_fallback = true;
        }
    }
    assert!(saw_fallback);
}

#[tokio::test]
async fn entry_bound_forces_flush_in_order() {
    let mut config = EngineConfig::default();
    config.buffer.max_size = 3;
    let engine = engine_with(&config, Arc::new(FlakyStore::default()));

    expect_wait(&send(&engine, "chat-d", "quiero un").await);
    expect_wait(&send(&engine, "chat-d", "turno con la").await);
    let third = send(&engine, "chat-d", "doctora de").await;

    let ready = third.as_ready().expect("forced flush on third fragment");
    assert_eq!(ready.final_text, "quiero un turno con la doctora de");
    assert_eq!(ready.message_count, 3);
    assert!(matches!(
        engine.flush("chat-d").await.unwrap(),
        Decision::Skipped { reason: SkipReason::Empty, .. }
    ));
}

#[tokio::test]
async fn completion_flushes_regardless_of_length() {
    let (engine, _) = engine();
    expect_wait(&send(&engine, "c", "quería saber si").await);
    expect_wait(&send(&engine, "c", "atienden por").await);
    let ready = send(&engine, "c", "obra social?").await;
    let ready = ready.as_ready().unwrap();
    assert_eq!(ready.message_count, 3);
    assert_eq!(ready.intent, "information");
}

#[tokio::test]
async fn aggregated_text_reclassifies_to_same_intent() {
    let (engine, _) = engine();
    send(&engine, "c", "quiero un turno").await;
    let decision = send(&engine, "c", "para mañana en la mañana").await;
    let ready = decision.as_ready().unwrap();
    assert_eq!(engine.classify(&ready.final_text).await.intent, ready.intent);
}

#[tokio::test]
async fn resume_emits_once_and_respects_revision() {
    let (engine, _) = engine();
    let r1 = expect_wait(&send(&engine, "c", "quiero un turno").await);
    let r2 = expect_wait(&send(&engine, "c", "con la doctora de").await);
    assert_eq!(r2, r1 + 1);

    assert!(matches!(
        engine.resume("c", r1).await.unwrap(),
        Decision::Skipped { reason: SkipReason::Superseded, .. }
    ));

    let ready = engine.resume("c", r2).await.unwrap();
    let first = ready.as_ready().unwrap();
    assert_eq!(first.final_text, "quiero un turno con la doctora de");

    assert!(matches!(
        engine.resume("c", r2).await.unwrap(),
        Decision::Skipped { reason: SkipReason::Empty, .. }
    ));
}

#[tokio::test]
async fn failed_drain_still_emits_ready() {
    let (engine, store) = engine();
    expect_wait(&send(&engine, "c", "quiero un turno").await);

    store.refuse_deletes.store(true, Ordering::SeqCst);
    let decision = send(&engine, "c", "para mañana en la mañana").await;
    let ready = decision.as_ready().unwrap();
    assert_eq!(ready.message_count, 2);
    assert!(!ready.fallback_used);
    assert!(!store.inner.is_empty().await);
}

#[tokio::test]
async fn conversations_do_not_mix() {
    let (engine, _) = engine();
    send(&engine, "a", "quiero un turno").await;
    send(&engine, "b", "necesito ver a la doctora de").await;

    let a = send(&engine, "a", "para el viernes").await;
    assert_eq!(a.as_ready().unwrap().final_text, "quiero un turno para el viernes");

    let b = engine.flush("b").await.unwrap();
    assert_eq!(b.as_ready().unwrap().final_text, "necesito ver a la doctora de");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_appends_are_not_lost() {
    let engine = Arc::new(engine().0);
    let texts = ["uno y", "dos y", "tres y", "cuatro y"];

    let handles: Vec<_> = texts
        .iter()
        .map(|text| {
            let engine = engine.clone();
            let text = text.to_string();
            tokio::spawn(async move { send(&engine, "busy", &text).await })
        })
        .collect();
    for handle in handles {
        expect_wait(&handle.await.unwrap());
    }

    let decision = engine.flush("busy").await.unwrap();
    let ready = decision.as_ready().unwrap();
    assert_eq!(ready.message_count, 4);
    for text in texts {
        assert!(ready.final_text.contains(text));
    }
    assert_eq!(engine.buffers().active_conversations(), 0);
}

#[tokio::test]
async fn cancel_wins_over_in_flight_append() {
    let ml = Arc::new(GatedMl {
        entered: Notify::new(),
        release: Notify::new(),
    });
    let engine = Arc::new(
        Orchestrator::new(
            &EngineConfig::default(),
            Arc::new(FlakyStore::default()),
            Some(ml.clone()),
        )
        .unwrap(),
    );

    let in_flight = {
        let engine = engine.clone();
        tokio::spawn(async move { send(&engine, "c", "quiero un turno").await })
    };

    ml.entered.notified().await;
    assert!(!engine.cancel("c").await);
    ml.release.notify_one();

    let decision = in_flight.await.unwrap();
    assert!(matches!(
        decision,
        Decision::Skipped { reason: SkipReason::Cancelled, .. }
    ));
    assert!(matches!(
        engine.flush("c").await.unwrap(),
        Decision::Skipped { reason: SkipReason::Empty, .. }
    ));
}

#[tokio::test]
async fn ml_outage_falls_back_to_regex() {
    let engine = Orchestrator::new(
        &EngineConfig::default(),
        Arc::new(FlakyStore::default()),
        Some(Arc::new(DownMl)),
    )
    .unwrap();

    let decision = send(&engine, "c", "Hola doctor").await;
    assert_eq!(decision.as_ready().unwrap().intent, "greeting");
    assert_eq!(engine.health().ml.unwrap().failure_count, 2);
}

#[tokio::test(start_paused = true)]
async fn store_recovers_after_reset_timeout() {
    let (engine, store) = engine();
    store.down.store(true, Ordering::SeqCst);

    let breaker = EngineConfig::default().circuit_breaker.store;
    for _ in 0..breaker.threshold {
        send(&engine, "c", "quiero un turno").await;
    }
    assert_eq!(engine.health().store.status, CircuitStatus::Open);

    store.down.store(false, Ordering::SeqCst);
    tokio::time::advance(Duration::from_millis(breaker.reset_timeout_ms)).await;

    expect_wait(&send(&engine, "c", "quiero un turno").await);
    assert_eq!(engine.health().store.status, CircuitStatus::Closed);
    assert_eq!(engine.health().status, "ok");
}
