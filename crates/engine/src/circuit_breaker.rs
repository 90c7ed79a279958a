//! Three-state circuit breaker guarding the store and the ML service.
//!
//! States:
//!   Closed  : calls pass through; consecutive failures are counted
//!   Open    : calls are rejected without invoking the function
//!   HalfOpen: the reset timeout elapsed; exactly one trial call is in flight
//!
//! All state lives in atomics, so a breaker is shared by reference across
//! tasks without a lock. Time is read from `tokio::time::Instant`, which lets
//! tests drive the reset timeout with a paused clock.

use chatbuffer_config::BreakerConfig;
use chatbuffer_core::{DomainEvent, EventBus};
use chrono::Utc;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicU32, AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitStatus {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitStatus {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Open,
            2 => Self::HalfOpen,
            _ => Self::Closed,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            Self::Closed => 0,
            Self::Open => 1,
            Self::HalfOpen => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half_open",
        }
    }
}

impl std::fmt::Display for CircuitStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a guarded call did not produce a value.
#[derive(Debug, thiserror::Error)]
pub enum CircuitError<E> {
    #[error("circuit '{name}' is open")]
    Open { name: String },

    #[error("call timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("{0}")]
    Inner(E),
}

/// Point-in-time view for health reporting.
#[derive(Debug, Clone, Serialize)]
pub struct CircuitSnapshot {
    pub name: String,
    pub status: CircuitStatus,
    pub failure_count: u32,
    /// Milliseconds since the circuit last opened, while not closed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub opened_for_ms: Option<u64>,
}

pub struct CircuitBreaker {
    name: String,
    config: BreakerConfig,
    status: AtomicU8,
    failure_count: AtomicU32,
    /// Milliseconds after `epoch` at which the circuit last opened.
    opened_at_ms: AtomicU64,
    epoch: Instant,
    events: Option<Arc<EventBus>>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: BreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            status: AtomicU8::new(CircuitStatus::Closed.as_u8()),
            failure_count: AtomicU32::new(0),
            opened_at_ms: AtomicU64::new(0),
            epoch: Instant::now(),
            events: None,
        }
    }

    /// Publish state transitions on `events`.
    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn status(&self) -> CircuitStatus {
        CircuitStatus::from_u8(self.status.load(Ordering::Acquire))
    }

    pub fn failure_count(&self) -> u32 {
        self.failure_count.load(Ordering::Acquire)
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.config.timeout_ms)
    }

    pub fn snapshot(&self) -> CircuitSnapshot {
        let status = self.status();
        let opened_for_ms = (status != CircuitStatus::Closed)
            .then(|| self.now_ms().saturating_sub(self.opened_at_ms.load(Ordering::Acquire)));
        CircuitSnapshot {
            name: self.name.clone(),
            status,
            failure_count: self.failure_count(),
            opened_for_ms,
        }
    }

    /// Run `f` under the breaker.
    ///
    /// In the open state `f` is never invoked. A call that exceeds the
    /// configured timeout is abandoned and counted as a failure.
    pub async fn call<T, E, F, Fut>(&self, f: F) -> Result<T, CircuitError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let permit = self.acquire()?;
        match tokio::time::timeout(self.call_timeout(), f()).await {
            Ok(Ok(value)) => {
                permit.succeed();
                Ok(value)
            }
            Ok(Err(e)) => {
                permit.fail();
                Err(CircuitError::Inner(e))
            }
            Err(_) => {
                permit.fail();
                Err(CircuitError::Timeout {
                    timeout_ms: self.config.timeout_ms,
                })
            }
        }
    }

    fn acquire<E>(&self) -> Result<Permit<'_>, CircuitError<E>> {
        match self.status() {
            CircuitStatus::Closed => Ok(Permit::new(self, false)),
            CircuitStatus::Open => {
                let opened_at = self.opened_at_ms.load(Ordering::Acquire);
                if self.now_ms().saturating_sub(opened_at) < self.config.reset_timeout_ms {
                    return Err(self.open_error());
                }
                // Only the caller that wins the swap makes the trial call.
                let swapped = self.status.compare_exchange(
                    CircuitStatus::Open.as_u8(),
                    CircuitStatus::HalfOpen.as_u8(),
                    Ordering::AcqRel,
                    Ordering::Acquire,
                );
                match swapped {
                    Ok(_) => {
                        self.transitioned(CircuitStatus::Open, CircuitStatus::HalfOpen);
                        Ok(Permit::new(self, true))
                    }
                    Err(_) => Err(self.open_error()),
                }
            }
            CircuitStatus::HalfOpen => Err(self.open_error()),
        }
    }

    fn on_success(&self, trial: bool) {
        self.failure_count.store(0, Ordering::Release);
        if trial {
            self.status
                .store(CircuitStatus::Closed.as_u8(), Ordering::Release);
            self.transitioned(CircuitStatus::HalfOpen, CircuitStatus::Closed);
        }
    }

    fn on_failure(&self, trial: bool) {
        if trial {
            self.opened_at_ms.store(self.now_ms(), Ordering::Release);
            self.status.store(CircuitStatus::Open.as_u8(), Ordering::Release);
            self.transitioned(CircuitStatus::HalfOpen, CircuitStatus::Open);
            return;
        }

        let failures = self.failure_count.fetch_add(1, Ordering::AcqRel) + 1;
        if failures >= self.config.threshold && self.status() == CircuitStatus::Closed {
            self.opened_at_ms.store(self.now_ms(), Ordering::Release);
            let tripped = self
                .status
                .compare_exchange(
                    CircuitStatus::Closed.as_u8(),
                    CircuitStatus::Open.as_u8(),
                    Ordering::AcqRel,
                    Ordering::Acquire,
                )
                .is_ok();
            if tripped {
                warn!(
                    circuit = %self.name,
                    failures,
                    reset_timeout_ms = self.config.reset_timeout_ms,
                    "Circuit breaker tripped"
                );
                self.transitioned(CircuitStatus::Closed, CircuitStatus::Open);
            }
        }
    }

    fn transitioned(&self, from: CircuitStatus, to: CircuitStatus) {
        info!(circuit = %self.name, %from, %to, "Circuit state changed");
        if let Some(events) = &self.events {
            events.publish(DomainEvent::CircuitStateChanged {
                dependency: self.name.clone(),
                from: from.to_string(),
                to: to.to_string(),
                timestamp: Utc::now(),
            });
        }
    }

    fn open_error<E>(&self) -> CircuitError<E> {
        CircuitError::Open {
            name: self.name.clone(),
        }
    }

    fn now_ms(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }
}

/// Admission for one call. A trial call dropped without an outcome (the caller's
/// future was cancelled) counts as a failed trial so the circuit cannot stay
/// half-open forever.
struct Permit<'a> {
    breaker: &'a CircuitBreaker,
    trial: bool,
    settled: bool,
}

impl<'a> Permit<'a> {
    fn new(breaker: &'a CircuitBreaker, trial: bool) -> Self {
        Self {
            breaker,
            trial,
            settled: false,
        }
    }

    fn succeed(mut self) {
        self.settled = true;
        self.breaker.on_success(self.trial);
    }

    fn fail(mut self) {
        self.settled = true;
        self.breaker.on_failure(self.trial);
    }
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        if self.trial && !self.settled {
            self.breaker.on_failure(true);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn config(threshold: u32, timeout_ms: u64, reset_timeout_ms: u64) -> BreakerConfig {
        BreakerConfig {
            threshold,
            timeout_ms,
            reset_timeout_ms,
        }
    }

    async fn fail(cb: &CircuitBreaker) -> Result<(), CircuitError<&'static str>> {
        cb.call(|| async { Err::<(), _>("boom") }).await
    }

    async fn succeed(cb: &CircuitBreaker) -> Result<u32, CircuitError<&'static str>> {
        cb.call(|| async { Ok(7) }).await
    }

    #[tokio::test(start_paused = true)]
    async fn trips_after_threshold_consecutive_failures() {
        let cb = CircuitBreaker::new("store", config(3, 1_000, 30_000));
        for _ in 0..2 {
            assert!(matches!(fail(&cb).await, Err(CircuitError::Inner("boom"))));
        }
        assert_eq!(cb.status(), CircuitStatus::Closed);
        let _ = fail(&cb).await;
        assert_eq!(cb.status(), CircuitStatus::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn success_resets_failure_count() {
        let cb = CircuitBreaker::new("store", config(3, 1_000, 30_000));
        let _ = fail(&cb).await;
        let _ = fail(&cb).await;
        assert_eq!(succeed(&cb).await.unwrap(), 7);
        assert_eq!(cb.failure_count(), 0);
        let _ = fail(&cb).await;
        let _ = fail(&cb).await;
        assert_eq!(cb.status(), CircuitStatus::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn open_circuit_never_invokes_function() {
        let cb = CircuitBreaker::new("ml", config(1, 1_000, 60_000));
        let _ = fail(&cb).await;

        let invoked = AtomicUsize::new(0);
        let result: Result<(), CircuitError<&str>> = cb
            .call(|| async {
                invoked.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .await;
        assert!(matches!(result, Err(CircuitError::Open { .. })));
        assert_eq!(invoked.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn trial_success_closes_circuit() {
        let cb = CircuitBreaker::new("store", config(1, 1_000, 5_000));
        let _ = fail(&cb).await;

        tokio::time::advance(Duration::from_millis(4_999)).await;
        assert!(matches!(succeed(&cb).await, Err(CircuitError::Open { .. })));

        tokio::time::advance(Duration::from_millis(1)).await;
        assert_eq!(succeed(&cb).await.unwrap(), 7);
        assert_eq!(cb.status(), CircuitStatus::Closed);
        assert_eq!(cb.failure_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn trial_failure_reopens_with_fresh_timer() {
        let cb = CircuitBreaker::new("store", config(1, 1_000, 5_000));
        let _ = fail(&cb).await;
        tokio::time::advance(Duration::from_secs(5)).await;

        assert!(matches!(fail(&cb).await, Err(CircuitError::Inner(_))));
        assert_eq!(cb.status(), CircuitStatus::Open);

        tokio::time::advance(Duration::from_secs(4)).await;
        assert!(matches!(succeed(&cb).await, Err(CircuitError::Open { .. })));
        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(succeed(&cb).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn half_open_admits_exactly_one_trial() {
        let cb = Arc::new(CircuitBreaker::new("store", config(1, 10_000, 1_000)));
        let _ = fail(&cb).await;
        tokio::time::advance(Duration::from_secs(1)).await;

        let (entered_tx, entered_rx) = tokio::sync::oneshot::channel();
        let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();
        let trial = {
            let cb = cb.clone();
            tokio::spawn(async move {
                cb.call(|| async move {
                    let _ = entered_tx.send(());
                    let _ = release_rx.await;
                    Ok::<_, &str>(1)
                })
                .await
            })
        };

        entered_rx.await.unwrap();
        assert_eq!(cb.status(), CircuitStatus::HalfOpen);
        assert!(matches!(succeed(&cb).await, Err(CircuitError::Open { .. })));

        release_tx.send(()).unwrap();
        assert_eq!(trial.await.unwrap().unwrap(), 1);
        assert_eq!(cb.status(), CircuitStatus::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_counts_as_failure() {
        let cb = CircuitBreaker::new("ml", config(1, 100, 60_000));
        let result: Result<(), CircuitError<&str>> = cb
            .call(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await;
        assert!(matches!(result, Err(CircuitError::Timeout { timeout_ms: 100 })));
        assert_eq!(cb.status(), CircuitStatus::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn abandoned_trial_reopens() {
        let cb = CircuitBreaker::new("store", config(1, 10_000, 1_000));
        let _ = fail(&cb).await;
        tokio::time::advance(Duration::from_secs(1)).await;

        let pending = cb.call(|| std::future::pending::<Result<(), &str>>());
        let _ = tokio::time::timeout(Duration::from_millis(10), pending).await;
        assert_eq!(cb.status(), CircuitStatus::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn transitions_are_published() {
        let bus = Arc::new(EventBus::new(16));
        let mut rx = bus.subscribe();
        let cb = CircuitBreaker::new("store", config(1, 1_000, 1_000)).with_events(bus);
        let _ = fail(&cb).await;

        let event = rx.recv().await.unwrap();
        match event.as_ref() {
            DomainEvent::CircuitStateChanged { dependency, from, to, .. } => {
                assert_eq!(dependency, "store");
                assert_eq!(from, "closed");
                assert_eq!(to, "open");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn snapshot_reports_open_duration() {
        let cb = CircuitBreaker::new("store", config(1, 1_000, 30_000));
        assert!(cb.snapshot().opened_for_ms.is_none());
        let _ = fail(&cb).await;
        tokio::time::advance(Duration::from_millis(250)).await;
        let snapshot = cb.snapshot();
        assert_eq!(snapshot.status, CircuitStatus::Open);
        assert_eq!(snapshot.opened_for_ms, Some(250));
    }
}
