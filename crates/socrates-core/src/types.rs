//! Conversation, result and status types shared by the coach runtime.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Provider name reported when no provider produced the response.
pub const NO_PROVIDER: &str = "none";

/// Errors raised while building a request context.
#[derive(Error, Debug)]
pub enum ContextError {
    #[error("Unknown chat role: '{0}' (expected user, assistant or system)")]
    UnknownRole(String),

    #[error("Invalid conversation history: {0}")]
    Json(#[from] serde_json::Error),
}

/// Who authored a turn in the conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[serde(alias = "student")]
    User,
    #[serde(alias = "coach", alias = "model")]
    Assistant,
    System,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ContextError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "user" | "student" => Ok(Role::User),
            "assistant" | "coach" | "model" => Ok(Role::Assistant),
            "system" => Ok(Role::System),
            other => Err(ContextError::UnknownRole(other.to_string())),
        }
    }
}

/// A single prior turn of the conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    /// Author of the turn
    pub role: Role,

    /// Turn text
    pub content: String,
}

impl ChatTurn {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    /// Create a student turn.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create a coach turn.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Create a system turn.
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }
}

/// Where in the goal-setting wizard the conversation takes place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepMetadata {
    /// Wizard chat step, 1-based
    pub number: u8,

    /// Topic of the step (e.g. "SMART goal")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,

    /// Free-form context the step collected so far
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

impl StepMetadata {
    pub fn step(number: u8) -> Self {
        Self {
            number,
            topic: None,
            context: None,
        }
    }

    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }
}

impl Default for StepMetadata {
    fn default() -> Self {
        Self::step(1)
    }
}

/// Per-call input handed to every provider.
///
/// Supplied fresh by the caller for each request and never retained by the
/// orchestrator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestContext {
    /// Prior turns, oldest first
    #[serde(default)]
    pub history: Vec<ChatTurn>,

    /// Wizard step metadata
    #[serde(default)]
    pub step: StepMetadata,
}

impl RequestContext {
    pub fn new(step: StepMetadata) -> Self {
        Self {
            history: Vec::new(),
            step,
        }
    }

    pub fn with_turn(mut self, turn: ChatTurn) -> Self {
        self.history.push(turn);
        self
    }

    pub fn with_history(mut self, history: Vec<ChatTurn>) -> Self {
        self.history = history;
        self
    }

    /// Parse a conversation history stored as a JSON array of turns.
    pub fn history_from_json(json: &str) -> Result<Vec<ChatTurn>, ContextError> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Outcome of one orchestrated generation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrchestrationResult {
    /// Response text (the safe fallback message when every provider failed)
    pub text: String,

    /// Provider that produced the text, or [`NO_PROVIDER`]
    pub provider_name: String,

    /// Whether a provider produced the text
    pub success: bool,

    /// Whether anything other than the first-priority provider was used
    pub used_fallback: bool,

    /// Description of the last observed failure when `success` is false
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl OrchestrationResult {
    /// A response produced by a provider.
    pub fn answered(
        text: impl Into<String>,
        provider_name: impl Into<String>,
        used_fallback: bool,
    ) -> Self {
        Self {
            text: text.into(),
            provider_name: provider_name.into(),
            success: true,
            used_fallback,
            error: None,
        }
    }

    /// The terminal result returned when no provider could answer.
    pub fn exhausted(fallback_message: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            text: fallback_message.into(),
            provider_name: NO_PROVIDER.to_string(),
            success: false,
            used_fallback: true,
            error: Some(error.into()),
        }
    }

    /// True when the UI should show a degraded-mode indicator.
    pub fn is_degraded(&self) -> bool {
        !self.success || self.used_fallback
    }
}

/// Caller-facing health summary, cheap enough to poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrchestratorStatus {
    /// Circuit of the first-priority provider is closed
    pub primary_available: bool,

    /// Non-primary providers whose circuit is closed
    pub fallbacks_available: usize,

    /// Providers registered with the orchestrator
    pub total_providers: usize,
}

impl OrchestratorStatus {
    pub fn is_degraded(&self) -> bool {
        !self.primary_available
    }
}

/// Health of a single provider as observed by an active probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderHealth {
    pub name: String,

    /// Result of the availability probe (errors and timeouts count as false)
    pub available: bool,

    pub circuit_open: bool,

    /// Failures currently recorded against the provider
    pub failures: u32,

    /// Declared relative cost per request
    pub cost: u32,
}

/// Result of probing every registered provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    pub providers: Vec<ProviderHealth>,
    pub checked_at: DateTime<Utc>,
}

impl HealthReport {
    /// Providers that answered their probe and are not circuit-open.
    pub fn healthy_count(&self) -> usize {
        self.providers
            .iter()
            .filter(|p| p.available && !p.circuit_open)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parsing() {
        assert_eq!("user".parse::<Role>().unwrap(), Role::User);
        assert_eq!("Assistant".parse::<Role>().unwrap(), Role::Assistant);
        assert_eq!(" coach ".parse::<Role>().unwrap(), Role::Assistant);
        assert!(matches!(
            "narrator".parse::<Role>(),
            Err(ContextError::UnknownRole(r)) if r == "narrator"
        ));
    }

    #[test]
    fn test_history_from_json() {
        let json = r#"[
            {"role": "user", "content": "I keep procrastinating."},
            {"role": "assistant", "content": "When did that last happen?"}
        ]"#;

        let history = RequestContext::history_from_json(json).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0], ChatTurn::user("I keep procrastinating."));
        assert_eq!(history[1].role, Role::Assistant);
    }

    #[test]
    fn test_history_accepts_same_role_names_as_parse() {
        let json = r#"[
            {"role": "student", "content": "I want to speak up in meetings."},
            {"role": "coach", "content": "What stops you today?"},
            {"role": "model", "content": "Which meeting comes next?"}
        ]"#;

        let history = RequestContext::history_from_json(json).unwrap();
        let roles: Vec<Role> = history.iter().map(|t| t.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Assistant, Role::Assistant]);

        let parsed: Vec<Role> = ["student", "coach", "model"]
            .iter()
            .map(|name| name.parse().unwrap())
            .collect();
        assert_eq!(parsed, roles);
    }

    #[test]
    fn test_history_from_json_rejects_unknown_role() {
        let json = r#"[{"role": "narrator", "content": "..."}]"#;
        assert!(matches!(
            RequestContext::history_from_json(json),
            Err(ContextError::Json(_))
        ));
    }

    #[test]
    fn test_context_defaults_to_first_step() {
        let context: RequestContext = serde_json::from_str("{}").unwrap();
        assert_eq!(context.step.number, 1);
        assert!(context.history.is_empty());
    }

    #[test]
    fn test_exhausted_result_shape() {
        let result = OrchestrationResult::exhausted("Try again later.", "boom");
        assert!(!result.success);
        assert!(result.used_fallback);
        assert_eq!(result.provider_name, NO_PROVIDER);
        assert_eq!(result.error.as_deref(), Some("boom"));
        assert!(result.is_degraded());
    }

    #[test]
    fn test_answered_result_omits_error_in_json() {
        let result = OrchestrationResult::answered("Hi", "gemini", false);
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["provider_name"], "gemini");
        assert!(json.get("error").is_none());
        assert!(!result.is_degraded());
    }

    #[test]
    fn test_health_report_counts_healthy() {
        let report = HealthReport {
            providers: vec![
                ProviderHealth {
                    name: "a".into(),
                    available: true,
                    circuit_open: true,
                    failures: 3,
                    cost: 1,
                },
                ProviderHealth {
                    name: "b".into(),
                    available: true,
                    circuit_open: false,
                    failures: 0,
                    cost: 0,
                },
            ],
            checked_at: Utc::now(),
        };
        assert_eq!(report.healthy_count(), 1);
    }
}
