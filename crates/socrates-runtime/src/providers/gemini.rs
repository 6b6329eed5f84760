//! Google Gemini provider implementation.
//!
//! Primary backend. Sends the coach persona as a system instruction and the
//! conversation as a labelled transcript.
//!
//! ## Security
//!
//! The API key travels in the `x-goog-api-key` header, never in the URL, and
//! is held in an [`ApiCredential`].

use super::factory::{check_base_url, ProviderFactory};
use super::secrets::{ApiCredential, CredentialLookup};
use super::{http_error, prompts, retry_after, Provider, ProviderError};
use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use socrates_core::{render_transcript, RequestContext};
use std::sync::Arc;

/// Environment variables checked for the Gemini API key, in order.
pub const GEMINI_API_KEY_ENV: &[&str] = &["GEMINI_API_KEY", "NEXT_PUBLIC_GEMINI_API_KEY"];

const GEMINI_KEY: CredentialLookup = CredentialLookup::new("Gemini API key", GEMINI_API_KEY_ENV);

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_MODEL: &str = "gemini-1.5-flash";

lazy_static! {
    static ref GOOGLE_API_KEY: Regex = Regex::new(r"^AIza[0-9A-Za-z_\-]+$").unwrap();
}

/// Generation settings sent with every request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationSettings {
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    pub max_output_tokens: u32,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            top_p: 0.8,
            top_k: 40,
            max_output_tokens: 1024,
        }
    }
}

/// Google Gemini provider.
pub struct GeminiProvider {
    credential: ApiCredential,
    base_url: String,
    model: String,
    settings: GenerationSettings,
    client: reqwest::Client,
}

impl std::fmt::Debug for GeminiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiProvider")
            .field("credential", &self.credential)
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish()
    }
}

impl GeminiProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_credential(ApiCredential::new(api_key, GEMINI_KEY.label))
    }

    fn with_credential(credential: ApiCredential) -> Self {
        Self {
            credential,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            settings: GenerationSettings::default(),
            client: reqwest::Client::new(),
        }
    }

    /// Create from provider settings, falling back to the environment for
    /// the key.
    pub fn from_config(config: &JsonValue) -> Result<Self, ProviderError> {
        let mut provider = Self::with_credential(GEMINI_KEY.resolve(config)?);
        if let Some(url) = config["base_url"].as_str() {
            provider.base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(model) = config["model"].as_str() {
            provider.model = model.to_string();
        }
        if let Some(t) = config["temperature"].as_f64() {
            provider.settings.temperature = t as f32;
        }
        if let Some(max) = config["max_output_tokens"].as_u64() {
            provider.settings.max_output_tokens = max as u32;
        }
        Ok(provider)
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    fn model_url(&self) -> String {
        format!("{}/models/{}", self.base_url, self.model)
    }
}

/// Gemini `generateContent` request.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    system_instruction: Content<'a>,
    contents: Vec<Content<'a>>,
    generation_config: GenerationSettings,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiError {
    error: GeminiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorDetail {
    message: String,
}

/// Concatenate the text parts of the first candidate.
fn extract_text(body: GenerateResponse) -> Result<String, ProviderError> {
    let text = body
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|c| {
            c.parts
                .into_iter()
                .filter_map(|p| p.text)
                .collect::<String>()
        })
        .unwrap_or_default();

    let text = text.trim();
    if text.is_empty() {
        return Err(ProviderError::EmptyResponse);
    }
    Ok(text.to_string())
}

#[async_trait]
impl Provider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn is_available(&self) -> Result<bool, ProviderError> {
        if self.credential.is_empty() {
            return Ok(false);
        }

        let response = self
            .client
            .get(self.model_url())
            .header("x-goog-api-key", self.credential.expose())
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
        let system = prompts::system_prompt(&context.step);
        let transcript = render_transcript(context, prompt);

        let request = GenerateRequest {
            system_instruction: Content {
                role: None,
                parts: vec![Part { text: &system }],
            },
            contents: vec![Content {
                role: Some("user"),
                parts: vec![Part { text: &transcript }],
            }],
            generation_config: self.settings,
        };

        // SECURITY: Only expose the credential here, at the point of use
        let response = self
            .client
            .post(format!("{}:generateContent", self.model_url()))
            .header("x-goog-api-key", self.credential.expose())
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

        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(ProviderError::Auth);
        }

        if !status.is_success() {
            let message = match response.json::<GeminiError>().await {
                Ok(body) => body.error.message,
                Err(_) => status.canonical_reason().unwrap_or("unknown error").to_string(),
            };
            return Err(ProviderError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;

        extract_text(body)
    }

    fn cost(&self) -> u32 {
        1
    }
}

/// Factory for creating Gemini providers from configuration.
///
/// ## Configuration Format
/// ```json
/// {
///   "api_key": "AIza...",          // Optional, falls back to GEMINI_API_KEY env
///   "base_url": "https://...",      // Optional, custom API endpoint
///   "model": "gemini-1.5-flash",    // Optional
///   "temperature": 0.7,             // Optional
///   "max_output_tokens": 1024       // Optional
/// }
/// ```
pub struct GeminiProviderFactory;

impl ProviderFactory for GeminiProviderFactory {
    fn provider_type(&self) -> &'static str {
        "gemini"
    }

    fn create(&self, config: &JsonValue) -> Result<Arc<dyn Provider>, ProviderError> {
        self.validate_config(config)?;
        Ok(Arc::new(GeminiProvider::from_config(config)?))
    }

    fn validate_config(&self, config: &JsonValue) -> Result<(), ProviderError> {
        let credential = GEMINI_KEY.resolve(config)?;

        if !GOOGLE_API_KEY.is_match(credential.expose()) {
            return Err(ProviderError::NotConfigured(format!(
                "{} does not look like a Google API key",
                credential
            )));
        }

        check_base_url(config)
    }

    fn default_config(&self) -> JsonValue {
        serde_json::json!({
            "model": DEFAULT_MODEL,
            "temperature": 0.7,
            "max_output_tokens": 1024
        })
    }

    fn description(&self) -> &'static str {
        "Google Gemini provider (primary)"
    }
}
