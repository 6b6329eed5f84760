//! API keys for networked providers.
//!
//! Each backend declares a [`CredentialLookup`]: the settings key and the
//! environment variables its key may come from. Resolving it yields an
//! [`ApiCredential`] whose value is zeroed on drop and never printed.
//!
//! ```ignore
//! const KEY: CredentialLookup =
//!     CredentialLookup::new("Gemini API key", &["GEMINI_API_KEY", "NEXT_PUBLIC_GEMINI_API_KEY"]);
//!
//! let credential = KEY.resolve(&settings)?;
//! request.header("x-goog-api-key", credential.expose());
//! ```

use secrecy::{ExposeSecret, SecretString};
use serde_json::Value as JsonValue;
use std::fmt;

use super::ProviderError;

/// Settings key checked before the environment.
pub const API_KEY_SETTING: &str = "api_key";

/// Where a resolved key came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    /// The provider's `api_key` setting
    Settings,
    /// The named environment variable
    Environment(&'static str),
    /// Passed in by code
    Programmatic,
}

impl fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialSource::Settings => f.write_str("provider settings"),
            CredentialSource::Environment(var) => write!(f, "${var}"),
            CredentialSource::Programmatic => f.write_str("code"),
        }
    }
}

/// Where one backend looks for its key, in priority order.
#[derive(Debug, Clone, Copy)]
pub struct CredentialLookup {
    pub label: &'static str,
    pub env_vars: &'static [&'static str],
}

impl CredentialLookup {
    pub const fn new(label: &'static str, env_vars: &'static [&'static str]) -> Self {
        Self { label, env_vars }
    }

    /// Resolve from `settings`, then the environment.
    ///
    /// Empty values count as missing.
    pub fn resolve(&self, settings: &JsonValue) -> Result<ApiCredential, ProviderError> {
        if let Some(value) = setting(settings) {
            return Ok(ApiCredential::with_source(value, CredentialSource::Settings, self.label));
        }

        let (var, value) = self.from_env().ok_or_else(|| {
            ProviderError::NotConfigured(format!(
                "{} missing: set '{}' in provider settings or one of {:?}",
                self.label, API_KEY_SETTING, self.env_vars
            ))
        })?;

        if self.env_vars.first() != Some(&var) {
            tracing::debug!(variable = var, "{} read from fallback variable", self.label);
        }
        Ok(ApiCredential::with_source(value, CredentialSource::Environment(var), self.label))
    }

    /// Whether [`resolve`](Self::resolve) would find a key.
    pub fn is_satisfied(&self, settings: &JsonValue) -> bool {
        setting(settings).is_some() || self.from_env().is_some()
    }

    fn from_env(&self) -> Option<(&'static str, String)> {
        self.env_vars.iter().find_map(|var| {
            std::env::var(var)
                .ok()
                .filter(|v| !v.is_empty())
                .map(|v| (*var, v))
        })
    }
}

fn setting(settings: &JsonValue) -> Option<&str> {
    settings[API_KEY_SETTING].as_str().filter(|v| !v.is_empty())
}

/// A provider API key.
pub struct ApiCredential {
    value: SecretString,
    source: CredentialSource,
    label: &'static str,
}

impl ApiCredential {
    /// Wrap a key passed in by code.
    pub fn new(value: impl Into<String>, label: &'static str) -> Self {
        Self::with_source(value, CredentialSource::Programmatic, label)
    }

    fn with_source(
        value: impl Into<String>,
        source: CredentialSource,
        label: &'static str,
    ) -> Self {
        Self {
            value: SecretString::from(value.into()),
            source,
            label,
        }
    }

    /// The raw key. Only call this where the key is sent.
    pub fn expose(&self) -> &str {
        self.value.expose_secret()
    }

    pub fn is_empty(&self) -> bool {
        self.expose().is_empty()
    }

    pub fn source(&self) -> CredentialSource {
        self.source
    }

    pub fn label(&self) -> &'static str {
        self.label
    }
}

impl fmt::Debug for ApiCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiCredential")
            .field("label", &self.label)
            .field("source", &self.source)
            .field("value", &"[REDACTED]")
            .finish()
    }
}

impl fmt::Display for ApiCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (from {})", self.label, self.source)
    }
}
