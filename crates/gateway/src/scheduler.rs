//! Optional in-process resume scheduler.
//!
//! The engine never runs timers. When `gateway.auto_resume` is on, every WAIT
//! answered by the gateway spawns a task that sleeps through the window,
//! calls `resume` with the returned revision, and POSTs any READY payload to
//! `gateway.downstream_url`. A resume that finds the store unreachable is
//! retried with exponential backoff for as long as the buffer could still be
//! alive (its TTL).

use chatbuffer_core::{Decision, ReadyMessage, SkipReason};
use chatbuffer_engine::Orchestrator;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

const DOWNSTREAM_TIMEOUT: Duration = Duration::from_secs(10);
const RETRY_INITIAL: Duration = Duration::from_millis(500);
const RETRY_MAX: Duration = Duration::from_secs(8);

#[derive(Clone)]
pub struct ResumeScheduler {
    engine: Arc<Orchestrator>,
    downstream_url: Option<String>,
    client: reqwest::Client,
}

impl ResumeScheduler {
    pub fn new(
        engine: Arc<Orchestrator>,
        downstream_url: Option<String>,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(DOWNSTREAM_TIMEOUT)
            .build()?;
        Ok(Self {
            engine,
            downstream_url,
            client,
        })
    }

    /// Arm a resume for a WAIT decision. Other decisions are ignored.
    pub fn schedule(&self, decision: &Decision) -> Option<tokio::task::JoinHandle<()>> {
        let Decision::Wait {
            conversation_id,
            wait_ms,
            revision,
            ..
        } = decision
        else {
            return None;
        };

        let scheduler = self.clone();
        let conversation_id = conversation_id.clone();
        let (wait_ms, revision) = (*wait_ms, *revision);

        Some(tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(wait_ms)).await;
            scheduler.fire(&conversation_id, revision).await;
        }))
    }

    async fn fire(&self, conversation_id: &str, revision: u64) {
        let deadline = Instant::now() + self.engine.buffers().limits().ttl;
        let mut backoff = RETRY_INITIAL;

        loop {
            let decision = match self.engine.resume(conversation_id, revision).await {
                Ok(decision) => decision,
                Err(e) => {
                    warn!(conversation_id, error = %e, "Scheduled resume failed");
                    return;
                }
            };

            match decision {
                Decision::Ready(ready) => return self.forward(&ready).await,
                Decision::Skipped {
                    reason: SkipReason::Unavailable,
                    ..
                } => {
                    if Instant::now() + backoff > deadline {
                        warn!(
                            conversation_id,
                            revision, "Store still unavailable, giving up on resume"
                        );
                        return;
                    }
                    debug!(
                        conversation_id,
                        retry_in_ms = backoff.as_millis() as u64,
                        "Store unavailable, retrying resume"
                    );
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(RETRY_MAX);
                }
                other => {
                    debug!(conversation_id, decision = ?other, "Scheduled resume skipped");
                    return;
                }
            }
        }
    }

    async fn forward(&self, ready: &ReadyMessage) {
        let Some(url) = &self.downstream_url else {
            info!(
                conversation_id = %ready.conversation_id,
                "READY produced by scheduler; no downstream_url configured"
            );
            return;
        };

        match self.client.post(url).json(ready).send().await {
            Ok(response) if response.status().is_success() => {
                debug!(conversation_id = %ready.conversation_id, "Forwarded READY downstream");
            }
            Ok(response) => warn!(
                conversation_id = %ready.conversation_id,
                status = response.status().as_u16(),
                "Downstream rejected READY payload"
            ),
            Err(e) => warn!(
                conversation_id = %ready.conversation_id,
                error = %e,
                "Failed to forward READY payload"
            ),
        }
    }
}
