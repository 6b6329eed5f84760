//! Offline last-resort provider.

use async_trait::async_trait;
use socrates_core::{QuestionBank, RequestContext};

use super::{Provider, ProviderError};

pub const STATIC_PROVIDER_NAME: &str = "static";

/// Answers from the offline question bank.
///
/// Always available, never calls the network and never fails. Registered
/// last so the orchestrator always has someone to fall back on.
#[derive(Debug, Default)]
pub struct StaticResponseProvider {
    bank: QuestionBank,
}

impl StaticResponseProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bank(bank: QuestionBank) -> Self {
        Self { bank }
    }
}

#[async_trait]
impl Provider for StaticResponseProvider {
    fn name(&self) -> &str {
        STATIC_PROVIDER_NAME
    }

    async fn is_available(&self) -> Result<bool, ProviderError> {
        Ok(true)
    }

    async fn generate_response(
        &self,
        prompt: &str,
        context: &RequestContext,
    ) -> Result<String, ProviderError> {
        Ok(self.bank.next_question(context.step.number, prompt))
    }

    fn cost(&self) -> u32 {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use socrates_core::StepMetadata;

    #[tokio::test]
    async fn test_always_available_and_free() {
        let provider = StaticResponseProvider::new();
        assert!(provider.is_available().await.unwrap());
        assert_eq!(provider.cost(), 0);
        assert_eq!(provider.name(), "static");
    }

    #[tokio::test]
    async fn test_answers_for_requested_step() {
        let provider = StaticResponseProvider::new();
        let context = RequestContext::new(StepMetadata::step(5));

        let reply = provider
            .generate_response("I think I'm at a 4.", &context)
            .await
            .unwrap();

        assert!(reply
            .ends_with("Where would you place yourself right now on a scale from 0 to 10?"));
    }
}
