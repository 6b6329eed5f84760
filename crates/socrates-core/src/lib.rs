//! # socrates-core
//!
//! Deterministic building blocks for the Socrates goal-setting coach.
//!
//! This crate holds everything the response orchestrator needs that does
//! not touch the network:
//! - Conversation types handed to providers (`RequestContext`, `ChatTurn`)
//! - Result and status shapes returned to callers
//! - A transcript renderer for single-prompt backends
//! - The offline question bank behind the always-available provider
//!
//! ## Key Guarantees
//!
//! 1. **No network**: nothing in this crate performs I/O
//! 2. **Deterministic**: the question bank answers the same way for the same
//!    sequence of calls
//! 3. **Serializable**: every caller-facing type round-trips through serde
//!
//! ## Example
//!
//! ```rust
//! use socrates_core::{ChatTurn, QuestionBank, RequestContext, StepMetadata};
//!
//! let context = RequestContext::new(StepMetadata::step(3))
//!     .with_turn(ChatTurn::user("I want to get better at planning."));
//!
//! let bank = QuestionBank::default();
//! let reply = bank.next_question(context.step.number, "I want to get better at planning.");
//! assert!(!reply.is_empty());
//! ```

pub mod questions;
pub mod transcript;
pub mod types;

pub use questions::QuestionBank;
pub use transcript::{render_transcript, COACH_LABEL, STUDENT_LABEL};
pub use types::{
    ChatTurn, ContextError, HealthReport, OrchestrationResult, OrchestratorStatus,
    ProviderHealth, RequestContext, Role, StepMetadata, NO_PROVIDER,
};
