//! OpenAI chat-completions provider.
//!
//! Secondary backend. Costs more per request than Gemini, so it sits after
//! it in the default chain.

use super::factory::{check_base_url, ProviderFactory};
use super::secrets::{ApiCredential, CredentialLookup};
use super::{http_error, prompts, retry_after, Provider, ProviderError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use socrates_core::{RequestContext, Role};
use std::sync::Arc;

/// Environment variables checked for the OpenAI API key, in order.
pub const OPENAI_API_KEY_ENV: &[&str] = &["OPENAI_API_KEY", "NEXT_PUBLIC_OPENAI_API_KEY"];

const OPENAI_KEY: CredentialLookup = CredentialLookup::new("OpenAI API key", OPENAI_API_KEY_ENV);

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-3.5-turbo";

/// OpenAI chat-completions provider.
///
/// Without a key the provider stays registered but reports itself
/// unavailable.
pub struct OpenAiProvider {
    credential: Option<ApiCredential>,
    base_url: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
    client: reqwest::Client,
}

impl std::fmt::Debug for OpenAiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiProvider")
            .field("credential", &self.credential)
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish()
    }
}

impl OpenAiProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_credential(Some(ApiCredential::new(api_key, OPENAI_KEY.label)))
    }

    /// A provider with no key; it never becomes available.
    pub fn unconfigured() -> Self {
        Self::with_credential(None)
    }

    fn with_credential(credential: Option<ApiCredential>) -> Self {
        Self {
            credential,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            max_tokens: 500,
            temperature: 0.7,
            client: reqwest::Client::new(),
        }
    }

    /// Create from provider settings, falling back to the environment for
    /// the key.
    pub fn from_config(config: &JsonValue) -> Result<Self, ProviderError> {
        let mut provider = Self::with_credential(Some(OPENAI_KEY.resolve(config)?));
        if let Some(url) = config["base_url"].as_str() {
            provider.base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(model) = config["model"].as_str() {
            provider.model = model.to_string();
        }
        if let Some(max) = config["max_tokens"].as_u64() {
            provider.max_tokens = max as u32;
        }
        if let Some(t) = config["temperature"].as_f64() {
            provider.temperature = t as f32;
        }
        Ok(provider)
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    fn credential(&self) -> Result<&ApiCredential, ProviderError> {
        self.credential
            .as_ref()
            .filter(|c| !c.is_empty())
            .ok_or_else(|| {
                ProviderError::NotConfigured("OpenAI API key not configured".to_string())
            })
    }

    fn build_request<'a>(
        &'a self,
        system: &'a str,
        prompt: &'a str,
        context: &'a RequestContext,
    ) -> ChatRequest<'a> {
        let mut messages = vec![ChatMessage {
            role: Role::System.as_str(),
            content: system,
        }];

        messages.extend(
            context
                .history
                .iter()
                .filter(|t| t.role != Role::System && !t.content.trim().is_empty())
                .map(|t| ChatMessage {
                    role: t.role.as_str(),
                    content: t.content.as_str(),
                }),
        );

        messages.push(ChatMessage {
            role: Role::User.as_str(),
            content: prompt,
        });

        ChatRequest {
            model: &self.model,
            messages,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiError {
    error: OpenAiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct OpenAiErrorDetail {
    message: String,
}

fn extract_text(body: ChatResponse) -> Result<String, ProviderError> {
    body.choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
        .ok_or(ProviderError::EmptyResponse)
}

#[async_trait]
impl Provider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn is_available(&self) -> Result<bool, ProviderError> {
        let Ok(credential) = self.credential() else {
            return Ok(false);
        };

        let response = self
            .client
            .get(format!("{}/models", self.base_url))
            .bearer_auth(credential.expose())
            .send()
            .await
            .map_err(http_error)?;

        Ok(response.status().is_success())
    }

    async fn generate_response(
        &self,
        prompt: &str,
        context: &RequestContext,
    ) -> Result<String, ProviderError> {
        let credential = self.credential()?;
        let system = prompts::system_prompt(&context.step);
        let request = self.build_request(&system, prompt, context);

        // SECURITY: Only expose the credential here, at the point of use
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(credential.expose())
            .json(&request)
            .send()
            .await
            .map_err(http_error)?;

        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(ProviderError::RateLimited {
                retry_after: retry_after(&response),
            });
        }

        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(ProviderError::Auth);
        }

        if !status.is_success() {
            let message = match response.json::<OpenAiError>().await {
                Ok(body) => body.error.message,
                Err(_) => status.canonical_reason().unwrap_or("unknown error").to_string(),
            };
            return Err(ProviderError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;

        extract_text(body)
    }

    fn cost(&self) -> u32 {
        2
    }
}

/// Factory for creating OpenAI providers from configuration.
///
/// ## Configuration Format
/// ```json
/// {
///   "api_key": "sk-...",         // Optional, falls back to OPENAI_API_KEY env
///   "base_url": "https://...",   // Optional, custom API endpoint
///   "model": "gpt-3.5-turbo",    // Optional
///   "max_tokens": 500,           // Optional
///   "temperature": 0.7           // Optional
/// }
/// ```
pub struct OpenAiProviderFactory;

impl ProviderFactory for OpenAiProviderFactory {
    fn provider_type(&self) -> &'static str {
        "openai"
    }

    fn create(&self, config: &JsonValue) -> Result<Arc<dyn Provider>, ProviderError> {
        self.validate_config(config)?;
        Ok(Arc::new(OpenAiProvider::from_config(config)?))
    }

    fn validate_config(&self, config: &JsonValue) -> Result<(), ProviderError> {
        if !OPENAI_KEY.is_satisfied(config) {
            return Err(ProviderError::NotConfigured(format!(
                "OpenAI API key required: set 'api_key' in settings or one of {:?}",
                OPENAI_API_KEY_ENV
            )));
        }

        check_base_url(config)
    }

    fn default_config(&self) -> JsonValue {
        serde_json::json!({
            "model": DEFAULT_MODEL,
            "max_tokens": 500,
            "temperature": 0.7
        })
    }

    fn description(&self) -> &'static str {
        "OpenAI chat-completions provider (secondary)"
    }
}
