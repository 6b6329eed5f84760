//! Response orchestrator.
//!
//! Walks an ordered provider chain for every request:
//! - Skips providers whose circuit is open without probing them
//! - Probes availability, then generates, each under its own deadline
//! - Records every outcome against the provider's circuit
//! - Returns the safe fallback message when nobody could answer
//!
//! Providers are tried strictly one at a time so that a single request
//! never pays for more than one working backend.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use socrates_core::{HealthReport, OrchestrationResult, OrchestratorStatus, RequestContext};

use crate::config::{ConfigError, RuntimeConfig};
use crate::providers::{Provider, ProviderError, ProviderFactoryRegistry};
use crate::resilience::{run_with_timeout, CircuitBreakerRegistry, Clock, Interrupted};
use crate::status::StatusReporter;

/// Errors from building an orchestrator.
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("No providers registered")]
    NoProviders,

    #[error("Provider '{0}' registered more than once")]
    DuplicateProvider(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Which call of an attempt ran out of time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptPhase {
    Availability,
    Generation,
}

impl fmt::Display for AttemptPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttemptPhase::Availability => f.write_str("availability check"),
            AttemptPhase::Generation => f.write_str("generation"),
        }
    }
}

/// Why a single provider attempt failed.
///
/// These never reach the caller directly: they are recorded against the
/// provider's circuit and the walk moves on.
#[derive(Error, Debug)]
pub enum AttemptError {
    #[error("{provider} is unavailable")]
    Unavailable {
        provider: String,
        #[source]
        source: Option<ProviderError>,
    },

    #[error("{provider} timed out during {phase} after {after:?}")]
    Timeout {
        provider: String,
        phase: AttemptPhase,
        after: Duration,
    },

    #[error("{provider} failed: {source}")]
    Provider {
        provider: String,
        #[source]
        source: ProviderError,
    },

    #[error("request cancelled")]
    Cancelled,
}

impl AttemptError {
    fn interrupted(provider: &str, phase: AttemptPhase, interrupted: Interrupted) -> Self {
        match interrupted {
            Interrupted::TimedOut(after) => AttemptError::Timeout {
                provider: provider.to_string(),
                phase,
                after,
            },
            Interrupted::Cancelled => AttemptError::Cancelled,
        }
    }
}

/// Terminal condition of a request.
#[derive(Error, Debug)]
pub enum OrchestrationError {
    #[error("All providers exhausted{}", describe_last(.last))]
    AllProvidersExhausted { last: Option<AttemptError> },
}

fn describe_last(last: &Option<AttemptError>) -> String {
    match last {
        Some(error) => format!(": {error}"),
        None => " (every circuit open or no providers registered)".to_string(),
    }
}

/// Routes each request through the provider chain.
///
/// One instance is shared by every session; its circuit state reflects
/// real backend health across all of them.
pub struct ResponseOrchestrator {
    /// Providers in priority order
    providers: Vec<Arc<dyn Provider>>,

    /// Circuit state keyed by provider name
    breakers: CircuitBreakerRegistry,

    config: RuntimeConfig,
}

impl ResponseOrchestrator {
    pub fn builder() -> ResponseOrchestratorBuilder {
        ResponseOrchestratorBuilder::new()
    }

    /// Build the orchestrator from configuration using the built-in
    /// provider factories.
    pub fn from_config(config: RuntimeConfig) -> Result<Self, RuntimeError> {
        Self::from_config_with(config, &ProviderFactoryRegistry::with_defaults())
    }

    /// Build the orchestrator from configuration with a custom factory
    /// registry.
    pub fn from_config_with(
        config: RuntimeConfig,
        factories: &ProviderFactoryRegistry,
    ) -> Result<Self, RuntimeError> {
        let providers = config.build_providers(factories)?;
        ResponseOrchestratorBuilder::new()
            .providers(providers)
            .config(config)
            .build()
    }

    /// Answer `prompt` with the first provider able to.
    ///
    /// Never fails: when every provider is skipped or fails, the result
    /// carries the safe fallback message and `success == false`.
    pub async fn generate_response(
        &self,
        prompt: &str,
        context: &RequestContext,
    ) -> OrchestrationResult {
        self.generate_response_with_cancel(prompt, context, &CancellationToken::new())
            .await
    }

    /// Like [`generate_response`](Self::generate_response), stopping early
    /// once `cancel` fires.
    ///
    /// The in-flight call is dropped and no failure is recorded against
    /// the provider that was interrupted.
    pub async fn generate_response_with_cancel(
        &self,
        prompt: &str,
        context: &RequestContext,
        cancel: &CancellationToken,
    ) -> OrchestrationResult {
        let mut last_error: Option<AttemptError> = None;

        for (index, provider) in self.providers.iter().enumerate() {
            if cancel.is_cancelled() {
                return self.cancelled();
            }

            let name = provider.name();
            if self.breakers.is_open(name) {
                tracing::warn!(provider = name, "Circuit open, skipping provider");
                continue;
            }

            match self.attempt(provider.as_ref(), prompt, context, cancel).await {
                Ok(text) => {
                    self.breakers.record_success(name);
                    let used_fallback = index > 0;
                    if used_fallback {
                        tracing::info!(provider = name, "Answered by fallback provider");
                    } else {
                        tracing::debug!(provider = name, "Answered by primary provider");
                    }
                    return OrchestrationResult::answered(text, name, used_fallback);
                }
                Err(AttemptError::Cancelled) => {
                    self.breakers.abandon_trial(name);
                    tracing::info!(provider = name, "Request cancelled during attempt");
                    return self.cancelled();
                }
                Err(error) => {
                    tracing::warn!(provider = name, error = %error, "Switching to next provider");
                    self.breakers.record_failure(name);
                    last_error = Some(error);
                }
            }
        }

        let exhausted = OrchestrationError::AllProvidersExhausted { last: last_error };
        tracing::error!(error = %exhausted, "No provider could answer");
        OrchestrationResult::exhausted(&self.config.fallback_message, exhausted.to_string())
    }

    /// Probe then generate, each bounded by its own deadline.
    async fn attempt(
        &self,
        provider: &dyn Provider,
        prompt: &str,
        context: &RequestContext,
        cancel: &CancellationToken,
    ) -> Result<String, AttemptError> {
        let name = provider.name();
        tracing::debug!(provider = name, "Checking availability");

        let probe = run_with_timeout(
            self.config.availability_timeout,
            cancel,
            provider.is_available(),
        )
        .await
            .map_err(|i| AttemptError::interrupted(name, AttemptPhase::Availability, i))?;

        match probe {
            Ok(true) => {}
            Ok(false) => {
                return Err(AttemptError::Unavailable {
                    provider: name.to_string(),
                    source: None,
                })
            }
            Err(source) => {
                return Err(AttemptError::Unavailable {
                    provider: name.to_string(),
                    source: Some(source),
                })
            }
        }

        tracing::debug!(provider = name, "Generating response");
        run_with_timeout(
            self.config.generation_timeout,
            cancel,
            provider.generate_response(prompt, context),
        )
        .await
        .map_err(|i| AttemptError::interrupted(name, AttemptPhase::Generation, i))?
        .map_err(|source| AttemptError::Provider {
            provider: name.to_string(),
            source,
        })
    }

    fn cancelled(&self) -> OrchestrationResult {
        OrchestrationResult::exhausted(
            &self.config.fallback_message,
            AttemptError::Cancelled.to_string(),
        )
    }

    /// Circuit-level status, without side effects.
    pub fn status(&self) -> OrchestratorStatus {
        StatusReporter::new(&self.providers, &self.breakers).status()
    }

    /// Probe every provider concurrently and report its health.
    ///
    /// Probes are bounded by the availability timeout and do not touch
    /// circuit state.
    pub async fn health_check(&self) -> HealthReport {
        let limit = self.config.availability_timeout;
        let probes = self.providers.iter().map(|provider| async move {
            match tokio::time::timeout(limit, provider.is_available()).await {
                Ok(Ok(available)) => available,
                Ok(Err(e)) => {
                    tracing::debug!(provider = provider.name(), error = %e, "Health probe failed");
                    false
                }
                Err(_) => {
                    tracing::debug!(provider = provider.name(), "Health probe timed out");
                    false
                }
            }
        });

        let availability = join_all(probes).await;
        StatusReporter::new(&self.providers, &self.breakers).health_report(&availability)
    }

    /// Provider names in priority order.
    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    pub fn breakers(&self) -> &CircuitBreakerRegistry {
        &self.breakers
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }
}

impl fmt::Debug for ResponseOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseOrchestrator")
            .field("providers", &self.provider_names())
            .field("breakers", &self.breakers)
            .finish()
    }
}

/// Builder for ResponseOrchestrator.
pub struct ResponseOrchestratorBuilder {
    providers: Vec<Arc<dyn Provider>>,
    config: RuntimeConfig,
    clock: Option<Arc<dyn Clock>>,
    require_providers: bool,
}

impl ResponseOrchestratorBuilder {
    pub fn new() -> Self {
        Self {
            providers: Vec::new(),
            config: RuntimeConfig::default(),
            clock: None,
            require_providers: false,
        }
    }

    /// Append a provider; earlier providers have higher priority.
    pub fn provider(mut self, provider: Arc<dyn Provider>) -> Self {
        self.providers.push(provider);
        self
    }

    pub fn providers(mut self, providers: impl IntoIterator<Item = Arc<dyn Provider>>) -> Self {
        self.providers.extend(providers);
        self
    }

    pub fn config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    /// Time source for the circuit breakers.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Refuse to build with an empty provider chain.
    pub fn require_providers(mut self, required: bool) -> Self {
        self.require_providers = required;
        self
    }

    pub fn build(self) -> Result<ResponseOrchestrator, RuntimeError> {
        self.config.validate()?;

        if self.providers.is_empty() {
            if self.require_providers {
                return Err(RuntimeError::NoProviders);
            }
            tracing::warn!("Orchestrator built without providers; every request will fall back");
        }

        let mut seen = HashSet::new();
        for provider in &self.providers {
            if !seen.insert(provider.name()) {
                return Err(RuntimeError::DuplicateProvider(provider.name().to_string()));
            }
        }

        let breaker_config = self.config.circuit_breaker.clone();
        let breakers = match self.clock {
            Some(clock) => CircuitBreakerRegistry::with_clock(breaker_config, clock),
            None => CircuitBreakerRegistry::new(breaker_config),
        };

        Ok(ResponseOrchestrator {
            providers: self.providers,
            breakers,
            config: self.config,
        })
    }
}

impl Default for ResponseOrchestratorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
