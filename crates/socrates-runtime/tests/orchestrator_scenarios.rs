//! End-to-end behaviour of the provider walk with scripted providers.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use socrates_runtime::{
    CircuitBreakerConfig, ManualClock, OrchestratorStatus, Provider, ProviderError,
    RecoveryMode, RequestContext, ResponseOrchestrator, RuntimeConfig, StaticResponseProvider,
    StepMetadata, NO_PROVIDER, SAFE_FALLBACK_MESSAGE,
};

/// Provider whose behaviour can be flipped between calls.
struct ScriptedProvider {
    name: &'static str,
    available: AtomicBool,
    failing: AtomicBool,
    probes: AtomicUsize,
    generations: AtomicUsize,
}

impl ScriptedProvider {
    fn healthy(name: &'static str) -> Arc<Self> {
        Arc::new(Self {
            name,
            available: AtomicBool::new(true),
            failing: AtomicBool::new(false),
            probes: AtomicUsize::new(0),
            generations: AtomicUsize::new(0),
        })
    }

    fn failing(name: &'static str) -> Arc<Self> {
        let provider = Self::healthy(name);
        provider.failing.store(true, Ordering::SeqCst);
        provider
    }

    fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn probes(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        self.name
    }

    async fn is_available(&self) -> Result<bool, ProviderError> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        Ok(self.available.load(Ordering::SeqCst))
    }

    async fn generate_response(
        &self,
        _prompt: &str,
        _context: &RequestContext,
    ) -> Result<String, ProviderError> {
        self.generations.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(ProviderError::RateLimited { retry_after: None });
        }
        Ok(format!("{} says: what would that look like?", self.name))
    }

    fn cost(&self) -> u32 {
        1
    }
}

/// Provider that never answers in time.
struct StalledProvider;

#[async_trait]
impl Provider for StalledProvider {
    fn name(&self) -> &str {
        "stalled"
    }

    async fn is_available(&self) -> Result<bool, ProviderError> {
        Ok(true)
    }

    async fn generate_response(
        &self,
        _prompt: &str,
        _context: &RequestContext,
    ) -> Result<String, ProviderError> {
        tokio::time::sleep(Duration::from_secs(24 * 60 * 60)).await;
        Ok("never".to_string())
    }

    fn cost(&self) -> u32 {
        1
    }
}

/// Provider whose availability check hangs.
struct SlowProbeProvider {
    generations: AtomicUsize,
}

#[async_trait]
impl Provider for SlowProbeProvider {
    fn name(&self) -> &str {
        "slow-probe"
    }

    async fn is_available(&self) -> Result<bool, ProviderError> {
        tokio::time::sleep(Duration::from_secs(60 * 60)).await;
        Ok(true)
    }

    async fn generate_response(
        &self,
        _prompt: &str,
        _context: &RequestContext,
    ) -> Result<String, ProviderError> {
        self.generations.fetch_add(1, Ordering::SeqCst);
        Ok("unreachable".to_string())
    }

    fn cost(&self) -> u32 {
        1
    }
}

fn context() -> RequestContext {
    RequestContext::new(StepMetadata::step(2).with_topic("time management"))
}

fn build(providers: Vec<Arc<dyn Provider>>, clock: Arc<ManualClock>) -> ResponseOrchestrator {
    ResponseOrchestrator::builder()
        .providers(providers)
        .clock(clock)
        .build()
        .unwrap()
}

#[tokio::test]
async fn scenario_rate_limited_primary_falls_through() {
    let a = ScriptedProvider::failing("a");
    let b = ScriptedProvider::healthy("b");
    let c = ScriptedProvider::healthy("c");
    let orch = build(vec![a.clone(), b.clone(), c.clone()], Arc::new(ManualClock::new()));

    let result = orch.generate_response("I procrastinate.", &context()).await;

    assert!(result.success);
    assert_eq!(result.provider_name, "b");
    assert!(result.used_fallback);
    assert_eq!(c.probes(), 0);
    assert_eq!(orch.breakers().failure_count("a"), 1);
}

#[tokio::test]
async fn scenario_open_circuit_skips_probe() {
    let a = ScriptedProvider::failing("a");
    let b = ScriptedProvider::healthy("b");
    let orch = build(vec![a.clone(), b.clone()], Arc::new(ManualClock::new()));

    for _ in 0..3 {
        orch.generate_response("hello", &context()).await;
    }
    assert_eq!(a.probes(), 3);

    let result = orch.generate_response("hello", &context()).await;
    assert_eq!(a.probes(), 3, "open circuit must not be probed");
    assert_eq!(result.provider_name, "b");
}

#[tokio::test]
async fn scenario_cooldown_makes_primary_eligible_again() {
    let clock = Arc::new(ManualClock::new());
    let a = ScriptedProvider::failing("a");
    let b = ScriptedProvider::healthy("b");
    let orch = build(vec![a.clone(), b.clone()], clock.clone());

    for _ in 0..3 {
        orch.generate_response("hello", &context()).await;
    }
    assert!(!orch.status().primary_available);

    clock.advance(Duration::from_secs(5 * 60));
    a.set_failing(false);

    let result = orch.generate_response("hello", &context()).await;
    assert_eq!(a.probes(), 4);
    assert_eq!(result.provider_name, "a");
    assert!(!result.used_fallback);
    assert_eq!(orch.breakers().failure_count("a"), 0);
}

#[tokio::test]
async fn scenario_offline_provider_is_last_resort() {
    let orch = build(
        vec![
            ScriptedProvider::failing("a"),
            ScriptedProvider::failing("b"),
            Arc::new(StaticResponseProvider::new()),
        ],
        Arc::new(ManualClock::new()),
    );

    let result = orch.generate_response("I want to finish my thesis.", &context()).await;

    assert!(result.success);
    assert_eq!(result.provider_name, "static");
    assert!(result.used_fallback);
    assert!(!result.text.is_empty());
}

#[tokio::test]
async fn scenario_status_with_open_primary() {
    let orch = build(
        vec![
            ScriptedProvider::failing("a"),
            ScriptedProvider::healthy("b"),
            Arc::new(StaticResponseProvider::new()),
        ],
        Arc::new(ManualClock::new()),
    );

    for _ in 0..3 {
        orch.generate_response("hello", &context()).await;
    }

    // The offline provider counts as a fallback alongside "b".
    assert_eq!(
        orch.status(),
        OrchestratorStatus {
            primary_available: false,
            fallbacks_available: 2,
            total_providers: 3,
        }
    );
}

#[tokio::test]
async fn total_outage_returns_safe_message() {
    let orch = build(
        vec![ScriptedProvider::failing("a"), ScriptedProvider::failing("b")],
        Arc::new(ManualClock::new()),
    );

    let result = orch.generate_response("hello", &context()).await;

    assert!(!result.success);
    assert_eq!(result.provider_name, NO_PROVIDER);
    assert_eq!(result.text, SAFE_FALLBACK_MESSAGE);
    assert!(result.error.is_some());
}

#[tokio::test]
async fn every_circuit_open_still_returns_a_result() {
    let orch = build(
        vec![ScriptedProvider::failing("a"), ScriptedProvider::failing("b")],
        Arc::new(ManualClock::new()),
    );

    for _ in 0..4 {
        orch.generate_response("hello", &context()).await;
    }

    let result = orch.generate_response("hello", &context()).await;
    assert!(!result.success);
    assert!(result.error.unwrap().contains("every circuit open"));
}

#[tokio::test(start_paused = true)]
async fn generation_timeout_counts_as_failure() {
    let b = ScriptedProvider::healthy("b");
    let orch = build(vec![Arc::new(StalledProvider), b.clone()], Arc::new(ManualClock::new()));

    let started = tokio::time::Instant::now();
    let result = orch.generate_response("hello", &context()).await;

    assert_eq!(result.provider_name, "b");
    assert_eq!(orch.breakers().failure_count("stalled"), 1);
    assert!(started.elapsed() >= Duration::from_secs(30));
    assert!(started.elapsed() < Duration::from_secs(31));
}

#[tokio::test(start_paused = true)]
async fn availability_timeout_counts_as_failure() {
    let slow = Arc::new(SlowProbeProvider {
        generations: AtomicUsize::new(0),
    });
    let orch = build(
        vec![slow.clone(), Arc::new(StaticResponseProvider::new())],
        Arc::new(ManualClock::new()),
    );

    let started = tokio::time::Instant::now();
    let result = orch.generate_response("hello", &context()).await;

    assert!(result.success);
    assert!(result.used_fallback);
    assert_eq!(result.provider_name, "static");
    assert_eq!(orch.breakers().failure_count("slow-probe"), 1);
    assert_eq!(slow.generations.load(Ordering::SeqCst), 0);
    assert!(started.elapsed() >= Duration::from_secs(5));
    assert!(started.elapsed() < Duration::from_secs(6));
}

#[tokio::test]
async fn half_open_allows_single_trial() {
    let clock = Arc::new(ManualClock::new());
    let config = RuntimeConfig {
        circuit_breaker: CircuitBreakerConfig {
            recovery: RecoveryMode::HalfOpen,
            ..Default::default()
        },
        ..Default::default()
    };
    let a = ScriptedProvider::failing("a");
    let orch = ResponseOrchestrator::builder()
        .provider(a.clone())
        .provider(ScriptedProvider::healthy("b"))
        .config(config)
        .clock(clock.clone())
        .build()
        .unwrap();

    for _ in 0..3 {
        orch.generate_response("hello", &context()).await;
    }
    clock.advance(Duration::from_secs(5 * 60));

    // The trial fails, so the circuit reopens straight away.
    orch.generate_response("hello", &context()).await;
    assert_eq!(a.probes(), 4);
    orch.generate_response("hello", &context()).await;
    assert_eq!(a.probes(), 4);
    assert!(!orch.status().primary_available);
}

#[tokio::test]
async fn concurrent_requests_share_circuit_state() {
    let a = ScriptedProvider::failing("a");
    let orch = Arc::new(build(
        vec![a.clone(), ScriptedProvider::healthy("b")],
        Arc::new(ManualClock::new()),
    ));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let orch = orch.clone();
            tokio::spawn(async move { orch.generate_response("hello", &context()).await })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.await.unwrap().provider_name, "b");
    }

    assert!(!orch.status().primary_available);
    assert!(a.probes() >= 3);
}
