//! # socrates-runtime
//!
//! Resilient response orchestration for the Socrates coach.
//!
//! A [`ResponseOrchestrator`] holds an ordered chain of [`Provider`]s and
//! answers each prompt with the first one that can. Every provider has its
//! own circuit breaker, every call has a deadline, and the chain always ends
//! with an offline provider that never fails.
//!
//! ## Important
//!
//! The orchestrator never returns an error to its caller. Under total
//! outage it returns a normal [`OrchestrationResult`] with `success == false`
//! and a human-readable fallback message.
//!
//! ## Example
//!
//! ```rust,ignore
//! use socrates_runtime::{RequestContext, ResponseOrchestrator, RuntimeConfig, StepMetadata};
//!
//! let orchestrator = ResponseOrchestrator::from_config(RuntimeConfig::default())?;
//! let context = RequestContext::new(StepMetadata::step(2));
//!
//! let result = orchestrator.generate_response("I keep putting things off.", &context).await;
//! if result.used_fallback {
//!     eprintln!("answered in degraded mode by {}", result.provider_name);
//! }
//! println!("{}", result.text);
//! ```

pub mod config;
pub mod orchestrator;
pub mod providers;
pub mod resilience;
pub mod status;

pub use config::{
    ConfigError, ProviderSpec, RuntimeConfig, AVAILABILITY_TIMEOUT, GENERATION_TIMEOUT,
    SAFE_FALLBACK_MESSAGE,
};
pub use orchestrator::{
    AttemptError, AttemptPhase, OrchestrationError, ResponseOrchestrator,
    ResponseOrchestratorBuilder, RuntimeError,
};
pub use providers::{
    Provider, ProviderError, ProviderFactory, ProviderFactoryRegistry, StaticResponseProvider,
    STATIC_PROVIDER_NAME,
};
pub use resilience::{
    CircuitBreakerConfig, CircuitBreakerRegistry, Clock, ManualClock, RecoveryMode, SystemClock,
};
pub use status::StatusReporter;

pub use socrates_core::{
    ChatTurn, HealthReport, OrchestrationResult, OrchestratorStatus, ProviderHealth,
    RequestContext, Role, StepMetadata, NO_PROVIDER,
};
