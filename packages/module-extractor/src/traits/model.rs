//! Language-model trait.
//!
//! The pipeline treats the model as "prompt text in, generated text out".
//! Implementations must map provider failures onto [`ModelError`] so the
//! extractor can tell retryable failures from permanent ones.

use async_trait::async_trait;

use crate::error::ModelResult;

/// A prompt split into instructions and payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    /// Instructions (system message)
    pub system: String,

    /// Content to work on (user message)
    pub user: String,
}

impl Prompt {
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
        }
    }

    /// Total characters sent to the model.
    pub fn char_count(&self) -> usize {
        self.system.chars().count() + self.user.chars().count()
    }
}

/// Text completion provider.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Generate a completion for the prompt.
    async fn complete(&self, prompt: &Prompt, max_output_tokens: u32) -> ModelResult<String>;

    /// Model identifier for logging.
    fn model_name(&self) -> &str {
        "unknown"
    }
}

#[async_trait]
impl<M: LanguageModel + ?Sized> LanguageModel for std::sync::Arc<M> {
    async fn complete(&self, prompt: &Prompt, max_output_tokens: u32) -> ModelResult<String> {
        (**self).complete(prompt, max_output_tokens).await
    }

    fn model_name(&self) -> &str {
        (**self).model_name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockModel;
    use std::sync::Arc;

    #[test]
    fn test_shared_model_forwards_calls() {
        let model = MockModel::new().with_extraction_output("[]");
        let shared: Arc<MockModel> = Arc::new(model.clone());

        let output = tokio_test::block_on(shared.complete(&Prompt::new("extract", "text"), 256)).unwrap();

        assert_eq!(output, "[]");
        assert_eq!(shared.model_name(), "mock");
        assert_eq!(model.calls()[0].max_output_tokens, 256);
    }

    #[test]
    fn test_prompt_char_count() {
        assert_eq!(Prompt::new("abc", "de").char_count(), 5);
    }
}
