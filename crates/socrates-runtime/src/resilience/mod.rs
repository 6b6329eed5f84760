//! Resilience patterns for socrates-runtime.
//!
//! This module provides:
//! - Per-provider circuit breakers
//! - Deadline and cancellation enforcement for provider calls
//! - An injectable clock so breaker state can be tested without waiting

mod circuit_breaker;
mod clock;
mod timeouts;

pub use circuit_breaker::{
    CircuitBreakerConfig, CircuitBreakerRegistry, CircuitSnapshot, RecoveryMode,
    DEFAULT_COOLDOWN, DEFAULT_FAILURE_THRESHOLD,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use timeouts::{run_with_timeout, Interrupted};
