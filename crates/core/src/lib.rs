//! # ChatBuffer Core
//!
//! Domain types, traits, and error definitions for the ChatBuffer message
//! buffering engine. This crate has **no I/O**; it defines the domain model
//! that the store, semantic, and engine crates implement against.
//!
//! ## Design Philosophy
//!
//! Every external collaborator (backing store, ML service) is a trait here.
//! Implementations live in their respective crates. This enables:
//! - Swapping store backends via configuration
//! - Scripted mock stores and ML services in tests
//! - Clean dependency graph (all crates depend inward on core)

pub mod error;
pub mod message;
pub mod classification;
pub mod buffer;
pub mod store;
pub mod ml;
pub mod event;

// Re-export key types at crate root for ergonomics
pub use error::{ClassifierError, Error, Result, StoreError};
pub use message::{Decision, InboundMessage, ReadyMessage, SkipReason};
pub use classification::{
    ClassificationResult, ClassificationSource, Completeness, Entities, Intent, UrgencyClass,
};
pub use buffer::{BufferEntry, ConversationBuffer};
pub use store::{BackingStore, buffer_key};
pub use ml::{MlClassifier, MlPrediction};
pub use event::{DomainEvent, EventBus, FlushReason};
