//! one-shot text generation against a remote backend.
//!
//! [`GenerationClient::generate`] never fails: every provider error, empty
//! reply or malformed response is logged and replaced by the client's
//! fallback text, so callers only ever see a `String`.

use std::sync::Arc;

use async_trait::async_trait;
use bevy::prelude::*;
use llm::{LLMProvider, chat::ChatMessage, error::LLMError};

pub const DEFAULT_INSTRUCTION: &str = "Respond tersely, in English only, with a witty and slightly sarcastic tone. \
Wrap any words you want to stress in {{ and }}. Message: ";

pub const DEFAULT_FALLBACK: &str = "Oops! Something went wrong.";

#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("provider error: {0}")]
    Provider(#[from] LLMError),
    #[error("backend returned no text")]
    EmptyResponse,
}

/// a single prompt-in, text-out call. implementations hold no per-call state.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, GenerationError>;
}

/// [`Backend`] over any `llm` provider, sending the prompt as one user message.
#[derive(Clone)]
pub struct LlmBackend {
    provider: Arc<dyn LLMProvider>,
}

impl LlmBackend {
    pub fn new(provider: Arc<dyn LLMProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl Backend for LlmBackend {
    async fn complete(&self, prompt: &str) -> Result<String, GenerationError> {
        let messages = [ChatMessage::user().content(prompt.to_string()).build()];
        let resp = self.provider.chat(&messages).await?;
        resp.text()
            .filter(|t| !t.trim().is_empty())
            .ok_or(GenerationError::EmptyResponse)
    }
}

/// stateless generation adapter. cheap to clone and share between sessions.
#[derive(Resource, Clone)]
pub struct GenerationClient {
    backend: Arc<dyn Backend>,
    instruction: Arc<str>,
    fallback: Arc<str>,
}

impl GenerationClient {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            backend,
            instruction: DEFAULT_INSTRUCTION.into(),
            fallback: DEFAULT_FALLBACK.into(),
        }
    }

    pub fn from_provider(provider: Arc<dyn LLMProvider>) -> Self {
        Self::new(Arc::new(LlmBackend::new(provider)))
    }

    pub fn with_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.instruction = instruction.into().into();
        self
    }

    pub fn with_fallback(mut self, fallback: impl Into<String>) -> Self {
        self.fallback = fallback.into().into();
        self
    }

    pub fn instruction(&self) -> &str {
        &self.instruction
    }

    pub fn fallback(&self) -> &str {
        &self.fallback
    }

    /// the exact text sent to the backend for `text`.
    pub fn prompt_for(&self, text: &str) -> String {
        format!("{}{}", self.instruction, text)
    }

    pub async fn generate(&self, text: &str) -> String {
        let prompt = self.prompt_for(text);
        match self.backend.complete(&prompt).await {
            Ok(reply) => {
                debug!(target: "bevy_chat_pipeline", "generate: reply_len={}", reply.len());
                reply
            }
            Err(err) => {
                error!(target: "bevy_chat_pipeline", "generation failed: {}", err);
                self.fallback.to_string()
            }
        }
    }
}
