//! Read-only health summaries over the provider chain.

use std::sync::Arc;

use chrono::Utc;
use socrates_core::{HealthReport, OrchestratorStatus, ProviderHealth};

use crate::providers::Provider;
use crate::resilience::CircuitBreakerRegistry;

/// Projects the provider chain and its circuits into caller-facing
/// summaries.
///
/// Never mutates circuit state, so it is safe to poll as often as the UI
/// likes. Every provider after the first, including the offline last
/// resort, counts as a fallback.
pub struct StatusReporter<'a> {
    providers: &'a [Arc<dyn Provider>],
    breakers: &'a CircuitBreakerRegistry,
}

impl<'a> StatusReporter<'a> {
    pub fn new(providers: &'a [Arc<dyn Provider>], breakers: &'a CircuitBreakerRegistry) -> Self {
        Self {
            providers,
            breakers,
        }
    }

    /// Current circuit-level status.
    ///
    /// With no providers registered the primary is reported unavailable.
    pub fn status(&self) -> OrchestratorStatus {
        let mut closed = self
            .providers
            .iter()
            .map(|p| !self.breakers.peek_open(p.name()));

        let primary_available = closed.next().unwrap_or(false);
        let fallbacks_available = closed.filter(|is_closed| *is_closed).count();

        OrchestratorStatus {
            primary_available,
            fallbacks_available,
            total_providers: self.providers.len(),
        }
    }

    /// Combine probe outcomes, in provider order, with circuit state.
    pub fn health_report(&self, availability: &[bool]) -> HealthReport {
        let providers = self
            .providers
            .iter()
            .zip(availability.iter().copied().chain(std::iter::repeat(false)))
            .map(|(provider, available)| {
                let snapshot = self.breakers.snapshot(provider.name());
                ProviderHealth {
                    name: provider.name().to_string(),
                    available,
                    circuit_open: snapshot.open,
                    failures: snapshot.failures,
                    cost: provider.cost(),
                }
            })
            .collect();

        HealthReport {
            providers,
            checked_at: Utc::now(),
        }
    }
}
