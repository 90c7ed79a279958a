//! # ChatBuffer Engine
//!
//! The buffering and timing decision engine: a circuit-breaker-guarded
//! buffer manager, the hybrid regex/ML classifier, the timing policy, the
//! aggregator, and the [`Orchestrator`] that ties them together.
//!
//! ```text
//! InboundMessage → classify → append (store breaker) → timing
//!                                     │                  ├─ WAIT { wait_ms, revision }
//!                                     │                  └─ FLUSH_NOW → aggregate → READY
//!                                     └─ store unavailable → READY { fallback_used }
//! ```

pub mod aggregator;
pub mod buffer;
pub mod circuit_breaker;
pub mod classifier;
pub mod error;
pub mod orchestrator;
pub mod timing;

pub use aggregator::{Aggregate, MessageAggregator, aggregation_key};
pub use buffer::{BufferLimits, BufferManager, BufferState, ConversationGuard, Ticket};
pub use circuit_breaker::{CircuitBreaker, CircuitError, CircuitSnapshot, CircuitStatus};
pub use classifier::HybridClassifier;
pub use error::{BufferError, BuildError};
pub use orchestrator::{HealthReport, Orchestrator, open_store};
pub use timing::{TimingAction, TimingDecision, TimingPolicy};
