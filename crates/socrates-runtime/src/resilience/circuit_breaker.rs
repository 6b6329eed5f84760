//! Per-provider circuit breakers.
//!
//! When a provider fails repeatedly, its circuit opens and the orchestrator
//! skips it without probing until the cooldown has passed.
//!
//! # Recovery
//! - `full_reset` (default): once the cooldown has elapsed since the last
//!   failure, the next check closes the circuit and zeroes the count.
//! - `half_open`: once the cooldown has elapsed, exactly one caller is let
//!   through as a trial. Success closes the circuit; failure reopens it and
//!   restarts the cooldown.

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use super::clock::{Clock, SystemClock};
use crate::config::human_duration;

/// Failures before a circuit opens.
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 3;

/// Time after the last failure before an open circuit may close.
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(5 * 60);

/// How an open circuit recovers once its cooldown has elapsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryMode {
    /// Close outright and forget the failures
    #[default]
    FullReset,

    /// Allow a single trial call before closing
    HalfOpen,
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    /// Failures before opening circuit
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    /// Time after the last failure before recovery
    #[serde(default = "default_cooldown", with = "human_duration")]
    pub cooldown: Duration,

    /// Recovery behaviour after the cooldown
    #[serde(default)]
    pub recovery: RecoveryMode,
}

fn default_failure_threshold() -> u32 {
    DEFAULT_FAILURE_THRESHOLD
}

fn default_cooldown() -> Duration {
    DEFAULT_COOLDOWN
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            cooldown: DEFAULT_COOLDOWN,
            recovery: RecoveryMode::FullReset,
        }
    }
}

/// Bookkeeping for one provider.
#[derive(Debug, Clone, Copy, Default)]
struct CircuitEntry {
    failures: u32,
    last_failure: Option<Instant>,
    /// Set while a half-open trial call is outstanding
    trial_started: Option<Instant>,
}

/// Point-in-time view of a provider's circuit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitSnapshot {
    /// Failures currently recorded
    pub failures: u32,

    /// Whether the circuit is open right now
    pub open: bool,

    /// Time since the last recorded failure
    pub since_last_failure: Option<Duration>,
}

/// Registry of circuits keyed by provider name.
///
/// Shared by every request handled by one orchestrator. Each provider has
/// its own lock, so updates for one provider never contend with another.
pub struct CircuitBreakerRegistry {
    entries: RwLock<HashMap<String, Arc<Mutex<CircuitEntry>>>>,
    config: CircuitBreakerConfig,
    clock: Arc<dyn Clock>,
}

impl CircuitBreakerRegistry {
    /// Create a registry on the system clock.
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: CircuitBreakerConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            config,
            clock,
        }
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Check if the circuit is open for a provider.
    ///
    /// Returns true if the provider should be skipped. Closing a circuit
    /// whose cooldown has elapsed resets its failure count; in half-open
    /// mode the first caller after the cooldown is granted the trial.
    pub fn is_open(&self, provider: &str) -> bool {
        let Some(entry) = self.entry(provider) else {
            return false;
        };

        let now = self.clock.now();
        let mut state = entry.lock();

        if !self.cooldown_elapsed(&state, now) {
            return state.failures >= self.config.failure_threshold;
        }

        let was_open = state.failures >= self.config.failure_threshold;
        match self.config.recovery {
            RecoveryMode::HalfOpen if was_open => {
                if self.trial_outstanding(&state, now) {
                    return true;
                }
                state.trial_started = Some(now);
                tracing::info!(provider, "Circuit half-open, allowing one trial call");
                false
            }
            _ => {
                if was_open {
                    tracing::info!(provider, "Circuit closed after cooldown");
                }
                state.failures = 0;
                state.trial_started = None;
                false
            }
        }
    }

    /// Whether the circuit is open, without any side effects.
    ///
    /// Agrees with [`is_open`](Self::is_open) except that it never resets
    /// counts or claims a half-open trial.
    pub fn peek_open(&self, provider: &str) -> bool {
        let Some(entry) = self.entry(provider) else {
            return false;
        };

        let now = self.clock.now();
        let state = entry.lock();

        if !self.cooldown_elapsed(&state, now) {
            return state.failures >= self.config.failure_threshold;
        }

        self.config.recovery == RecoveryMode::HalfOpen
            && state.failures >= self.config.failure_threshold
            && self.trial_outstanding(&state, now)
    }

    /// Record a failed attempt.
    pub fn record_failure(&self, provider: &str) {
        let entry = self.entry_or_insert(provider);
        let now = self.clock.now();
        let mut state = entry.lock();

        let reopened = state.trial_started.take().is_some();
        state.failures = state.failures.saturating_add(1);
        state.last_failure = Some(now);

        if reopened {
            tracing::warn!(provider, "Circuit reopened after failed trial call");
        } else if state.failures == self.config.failure_threshold {
            tracing::warn!(
                provider,
                failures = state.failures,
                "Circuit opened after repeated failures"
            );
        }
    }

    /// Record a successful attempt.
    pub fn record_success(&self, provider: &str) {
        let Some(entry) = self.entry(provider) else {
            return;
        };

        let mut state = entry.lock();
        if state.trial_started.take().is_some() {
            tracing::info!(provider, "Circuit closed after successful trial call");
        }
        state.failures = 0;
    }

    /// Give back a half-open trial that ended without an outcome.
    pub fn abandon_trial(&self, provider: &str) {
        if let Some(entry) = self.entry(provider) {
            entry.lock().trial_started = None;
        }
    }

    /// Failures currently recorded for a provider.
    pub fn failure_count(&self, provider: &str) -> u32 {
        self.entry(provider).map_or(0, |e| e.lock().failures)
    }

    /// Point-in-time view of a provider's circuit, without side effects.
    pub fn snapshot(&self, provider: &str) -> CircuitSnapshot {
        let now = self.clock.now();
        let (failures, since_last_failure) = match self.entry(provider) {
            Some(entry) => {
                let state = entry.lock();
                (
                    state.failures,
                    state.last_failure.map(|t| now.saturating_duration_since(t)),
                )
            }
            None => (0, None),
        };

        CircuitSnapshot {
            failures,
            open: self.peek_open(provider),
            since_last_failure,
        }
    }

    /// Close every circuit.
    pub fn reset(&self) {
        self.entries.write().clear();
    }

    fn cooldown_elapsed(&self, state: &CircuitEntry, now: Instant) -> bool {
        match state.last_failure {
            Some(at) => now.saturating_duration_since(at) >= self.config.cooldown,
            None => true,
        }
    }

    /// A trial older than one cooldown is treated as lost.
    fn trial_outstanding(&self, state: &CircuitEntry, now: Instant) -> bool {
        state
            .trial_started
            .is_some_and(|at| now.saturating_duration_since(at) < self.config.cooldown)
    }

    fn entry(&self, provider: &str) -> Option<Arc<Mutex<CircuitEntry>>> {
        self.entries.read().get(provider).cloned()
    }

    fn entry_or_insert(&self, provider: &str) -> Arc<Mutex<CircuitEntry>> {
        if let Some(entry) = self.entry(provider) {
            return entry;
        }
        self.entries
            .write()
            .entry(provider.to_string())
            .or_default()
            .clone()
    }
}

impl Default for CircuitBreakerRegistry {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}

impl std::fmt::Debug for CircuitBreakerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreakerRegistry")
            .field("config", &self.config)
            .field("tracked", &self.entries.read().len())
            .finish()
    }
}
