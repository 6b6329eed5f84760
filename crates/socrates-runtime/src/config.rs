//! Runtime configuration.
//!
//! Loaded from YAML; every field has a default so an empty document is a
//! valid configuration.
//!
//! ```yaml
//! availability_timeout: 5s
//! generation_timeout: 30s
//! circuit_breaker:
//!   failure_threshold: 3
//!   cooldown: 5m
//!   recovery: full_reset
//! providers:
//!   - type: gemini
//!     settings:
//!       model: gemini-1.5-flash
//!   - type: openai
//!   - type: static
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::providers::{Provider, ProviderError, ProviderFactoryRegistry, STATIC_PROVIDER_NAME};
use crate::resilience::CircuitBreakerConfig;

/// Bound on a single availability probe.
pub const AVAILABILITY_TIMEOUT: Duration = Duration::from_secs(5);

/// Bound on a single generation call.
pub const GENERATION_TIMEOUT: Duration = Duration::from_secs(30);

/// Shown to the student when no provider could answer.
pub const SAFE_FALLBACK_MESSAGE: &str = "I'm having technical difficulties right now. \
Please try again in a few minutes, or continue with the next step.";

/// Errors from loading or applying configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Provider '{provider}' could not be created: {source}")]
    Provider {
        provider: String,
        #[source]
        source: ProviderError,
    },
}

/// One entry of the provider chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderSpec {
    /// Factory type name, e.g. "gemini"
    #[serde(rename = "type")]
    pub kind: String,

    /// Provider-specific settings
    #[serde(default, skip_serializing_if = "JsonValue::is_null")]
    pub settings: JsonValue,
}

impl ProviderSpec {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            settings: JsonValue::Null,
        }
    }

    pub fn with_settings(mut self, settings: JsonValue) -> Self {
        self.settings = settings;
        self
    }
}

/// Configuration for the response orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Bound on each availability probe
    #[serde(default = "default_availability_timeout", with = "human_duration")]
    pub availability_timeout: Duration,

    /// Bound on each generation call
    #[serde(default = "default_generation_timeout", with = "human_duration")]
    pub generation_timeout: Duration,

    /// Text returned when every provider failed
    #[serde(default = "default_fallback_message")]
    pub fallback_message: String,

    #[serde(default)]
    pub circuit_breaker: CircuitBreakerConfig,

    /// Providers in priority order
    #[serde(default = "default_providers")]
    pub providers: Vec<ProviderSpec>,
}

fn default_availability_timeout() -> Duration {
    AVAILABILITY_TIMEOUT
}

fn default_generation_timeout() -> Duration {
    GENERATION_TIMEOUT
}

fn default_fallback_message() -> String {
    SAFE_FALLBACK_MESSAGE.to_string()
}

fn default_providers() -> Vec<ProviderSpec> {
    vec![
        ProviderSpec::new("gemini"),
        ProviderSpec::new("openai"),
        ProviderSpec::new(STATIC_PROVIDER_NAME),
    ]
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            availability_timeout: AVAILABILITY_TIMEOUT,
            generation_timeout: GENERATION_TIMEOUT,
            fallback_message: default_fallback_message(),
            circuit_breaker: CircuitBreakerConfig::default(),
            providers: default_providers(),
        }
    }
}

impl RuntimeConfig {
    /// Parse and validate a YAML document.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let yaml = std::fs::read_to_string(path)?;
        Self::from_yaml(&yaml)
    }

    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.availability_timeout.is_zero() || self.generation_timeout.is_zero() {
            return Err(ConfigError::Invalid("timeouts must be greater than zero".into()));
        }
        if self.circuit_breaker.failure_threshold == 0 {
            return Err(ConfigError::Invalid(
                "circuit_breaker.failure_threshold must be at least 1".into(),
            ));
        }

        let static_positions: Vec<usize> = self
            .providers
            .iter()
            .enumerate()
            .filter(|(_, spec)| spec.kind == STATIC_PROVIDER_NAME)
            .map(|(i, _)| i)
            .collect();

        match static_positions.as_slice() {
            [] => {}
            [i] if *i + 1 == self.providers.len() => {}
            [_] => {
                return Err(ConfigError::Invalid(
                    "the static provider must be last in the chain".into(),
                ))
            }
            _ => {
                return Err(ConfigError::Invalid(
                    "the static provider may only be listed once".into(),
                ))
            }
        }

        Ok(())
    }

    /// Build the provider chain in priority order.
    ///
    /// Backends without credentials are left out with a warning. The
    /// offline provider is always present and always last.
    pub fn build_providers(
        &self,
        factories: &ProviderFactoryRegistry,
    ) -> Result<Vec<Arc<dyn Provider>>, ConfigError> {
        self.validate()?;

        let mut providers: Vec<Arc<dyn Provider>> = Vec::with_capacity(self.providers.len() + 1);
        for spec in &self.providers {
            match factories.create(&spec.kind, &spec.settings) {
                Ok(provider) => {
                    tracing::debug!(provider = provider.name(), "Registered provider");
                    providers.push(provider);
                }
                Err(ProviderError::NotConfigured(reason)) => {
                    tracing::warn!(
                        provider = %spec.kind,
                        %reason,
                        "Skipping unconfigured provider"
                    );
                }
                Err(source) => {
                    return Err(ConfigError::Provider {
                        provider: spec.kind.clone(),
                        source,
                    })
                }
            }
        }

        if !providers.iter().any(|p| p.name() == STATIC_PROVIDER_NAME) {
            providers.push(factories.create(STATIC_PROVIDER_NAME, &JsonValue::Null).map_err(
                |source| ConfigError::Provider {
                    provider: STATIC_PROVIDER_NAME.to_string(),
                    source,
                },
            )?);
        }

        Ok(providers)
    }
}

/// Serde adapter for durations written as "30s", "5m", "1h 30m".
pub(crate) mod human_duration {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        humantime::parse_duration(&text).map_err(D::Error::custom)
    }
}
