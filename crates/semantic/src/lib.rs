//! Semantic analysis for ChatBuffer.
//!
//! Decides whether a chat message is a *fragment* or a *complete* thought,
//! which intent it carries, and which entities it mentions. Everything is
//! driven by ordered pattern tables from configuration:
//!
//! ```text
//! text ──▶ normalize ──▶ complete? ──yes──▶ COMPLETE
//!                           │no
//!                           ▼
//!                       fragment? ──yes──▶ FRAGMENT
//!                           │no
//!                           ▼
//!                        COMPLETE (unknown text is never held indefinitely)
//! ```
//!
//! Intent and entity extraction run independently of completeness.
//! The optional ML service client lives in [`ml`]; guarding it with a circuit
//! breaker is the engine's job.

mod analyzer;
pub mod ml;
mod patterns;

pub use analyzer::SemanticAnalyzer;
pub use ml::HttpMlClassifier;
pub use patterns::{PatternError, PatternSet};
