//! Response provider abstractions for socrates-runtime.
//!
//! This module defines the contract every backend implements and includes
//! implementations for Gemini, OpenAI and the offline question bank.
//!
//! ## Security
//!
//! Networked providers use the [`secrets`] module for credential handling.
//! See [`ApiCredential`] for the recommended patterns.

use async_trait::async_trait;
use socrates_core::RequestContext;
use std::time::Duration;
use thiserror::Error;

mod factory;
pub mod prompts;
pub mod secrets;
mod static_responses;

#[cfg(feature = "gemini")]
mod gemini;

#[cfg(feature = "openai")]
mod openai;

pub use factory::{FactoryInfo, ProviderFactory, ProviderFactoryRegistry, StaticProviderFactory};
pub use secrets::{ApiCredential, CredentialLookup, CredentialSource};
pub use static_responses::{StaticResponseProvider, STATIC_PROVIDER_NAME};

#[cfg(feature = "gemini")]
pub use gemini::{GeminiProvider, GeminiProviderFactory};

#[cfg(feature = "openai")]
pub use openai::{OpenAiProvider, OpenAiProviderFactory};

/// Errors from response providers.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("Rate limit exceeded, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(String),

    #[error("Provider returned an empty response")]
    EmptyResponse,

    #[error("Authentication failed")]
    Auth,

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Unknown provider type '{requested}' (known: {known})")]
    UnknownType { requested: String, known: String },
}

/// One interchangeable backend able to answer a prompt.
///
/// The orchestrator only relies on this contract: how a provider talks to
/// its backend is its own business. Errors are returned to the caller, never
/// swallowed here.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Unique provider name, used as the circuit breaker key.
    fn name(&self) -> &str;

    /// Cheap liveness probe. An error counts the same as `Ok(false)`.
    async fn is_available(&self) -> Result<bool, ProviderError>;

    /// Produce a reply to `prompt` in the given conversation.
    async fn generate_response(
        &self,
        prompt: &str,
        context: &RequestContext,
    ) -> Result<String, ProviderError>;

    /// Declared relative cost per request.
    ///
    /// Informational only; attempt order is fixed by registration.
    fn cost(&self) -> u32;
}

/// Map a reqwest transport error onto the provider taxonomy.
#[cfg(any(feature = "gemini", feature = "openai"))]
pub(crate) fn http_error(e: reqwest::Error) -> ProviderError {
    ProviderError::Http(e.without_url().to_string())
}

/// Parse a `retry-after` header given in seconds.
#[cfg(any(feature = "gemini", feature = "openai"))]
pub(crate) fn retry_after(response: &reqwest::Response) -> Option<Duration> {
    response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}
