use std::sync::Arc;

use crate::config::MistralConfig;
use crate::error::{Result, SupportError};
use crate::models::{ChatMessage, ChatRequest};
use crate::transport::Transport;

/// Reply returned in place of a completion when no API key can be resolved.
pub const MISSING_KEY_SENTINEL: &str = "ERROR: MISTRAL_API_KEY is not set.";

/// Single-turn completion client shared by the classifier, reply generator and summarizer.
pub struct ModelClient {
    tx: Arc<dyn Transport>,
    settings: MistralConfig,
}

impl ModelClient {
    pub fn new(tx: Arc<dyn Transport>, settings: MistralConfig) -> Self {
        Self { tx, settings }
    }

    pub fn model(&self) -> &str {
        &self.settings.model
    }

    /// Sends `prompt` as one user message and returns the first choice verbatim.
    ///
    /// The key is resolved on every call. Without one, the sentinel text is
    /// returned and no request is made.
    pub async fn complete(&self, prompt: &str) -> Result<String> {
        let Some(api_key) = self.settings.resolve_api_key() else {
            tracing::warn!(
                "{} is not set - returning sentinel reply",
                self.settings.api_key_env
            );
            return Ok(MISSING_KEY_SENTINEL.to_string());
        };

        let request = ChatRequest {
            model: self.settings.model.clone(),
            messages: vec![ChatMessage::user(prompt)],
            temperature: self.settings.temperature,
            max_tokens: self.settings.max_tokens,
        };

        tracing::debug!(model = %request.model, prompt_chars = prompt.len(), "Sending completion request");
        let response = self.tx.chat(&api_key, &request).await?;

        response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| {
                SupportError::MalformedResponse("Mistral API returned empty choices".to_string())
            })
    }
}
