//! backend selection and prompt settings for the generation client.

use std::str::FromStr;
use std::sync::Arc;

use bevy::prelude::*;
use llm::{
    LLMProvider,
    builder::{LLMBackend, LLMBuilder},
    error::LLMError,
};
use serde::{Deserialize, Serialize};

use crate::generation::{DEFAULT_FALLBACK, DEFAULT_INSTRUCTION, GenerationClient};

pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to build provider: {0}")]
    Provider(#[from] LLMError),
    #[error("invalid config json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unknown backend '{0}'")]
    UnknownBackend(String),
    #[error("no model configured")]
    MissingModel,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Google,
    OpenAI,
    Anthropic,
    Ollama,
    DeepSeek,
}

impl BackendKind {
    fn to_llm(self) -> LLMBackend {
        match self {
            BackendKind::Google => LLMBackend::Google,
            BackendKind::OpenAI => LLMBackend::OpenAI,
            BackendKind::Anthropic => LLMBackend::Anthropic,
            BackendKind::Ollama => LLMBackend::Ollama,
            BackendKind::DeepSeek => LLMBackend::DeepSeek,
        }
    }
}

impl FromStr for BackendKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "google" | "gemini" => Ok(BackendKind::Google),
            "openai" => Ok(BackendKind::OpenAI),
            "anthropic" => Ok(BackendKind::Anthropic),
            "ollama" => Ok(BackendKind::Ollama),
            "deepseek" => Ok(BackendKind::DeepSeek),
            other => Err(ConfigError::UnknownBackend(other.to_string())),
        }
    }
}

/// everything needed to build a [`GenerationClient`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub backend: BackendKind,
    pub model: String,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub instruction: String,
    pub fallback: String,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            model: DEFAULT_MODEL.to_string(),
            api_key: None,
            base_url: None,
            instruction: DEFAULT_INSTRUCTION.to_string(),
            fallback: DEFAULT_FALLBACK.to_string(),
        }
    }
}

impl GenerationConfig {
    /// defaults overridden by `LLM_BACKEND`, `LLM_MODEL`, `LLM_API_KEY` and `LLM_BASE_URL`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let mut config = Self::default();
        if let Some(backend) = var("LLM_BACKEND") {
            config.backend = backend.parse()?;
        }
        if let Some(model) = var("LLM_MODEL") {
            config.model = model;
        }
        config.api_key = var("LLM_API_KEY");
        config.base_url = var("LLM_BASE_URL");
        Ok(config)
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn build_provider(&self) -> Result<Arc<dyn LLMProvider>, ConfigError> {
        if self.model.trim().is_empty() {
            return Err(ConfigError::MissingModel);
        }
        info!(
            target: "bevy_chat_pipeline",
            "build_provider: backend={:?}, model='{}', base_url={:?}, key_present={}",
            self.backend, self.model, self.base_url, self.api_key.is_some()
        );

        let mut b = LLMBuilder::new()
            .backend(self.backend.to_llm())
            .model(self.model.clone());
        if let Some(url) = &self.base_url {
            b = b.base_url(url.clone());
        }
        if let Some(key) = &self.api_key {
            b = b.api_key(key.clone());
        }
        Ok(b.build()?.into())
    }

    pub fn build_client(&self) -> Result<GenerationClient, ConfigError> {
        let provider = self.build_provider()?;
        Ok(GenerationClient::from_provider(provider)
            .with_instruction(self.instruction.clone())
            .with_fallback(self.fallback.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn env_overrides_defaults() {
        let config = GenerationConfig::from_lookup(lookup(&[
            ("LLM_BACKEND", "OpenAI"),
            ("LLM_MODEL", "gpt-4o-mini"),
            ("LLM_API_KEY", "sk-test"),
        ]))
        .unwrap();

        assert_eq!(config.backend, BackendKind::OpenAI);
        assert_eq!(config.model, "gpt-4o-mini");
        assert_eq!(config.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.base_url, None);
        assert_eq!(config.fallback, DEFAULT_FALLBACK);
    }

    #[test]
    fn blank_env_values_are_ignored() {
        let config = GenerationConfig::from_lookup(lookup(&[("LLM_MODEL", "  "), ("LLM_API_KEY", "")])).unwrap();
        assert_eq!(config, GenerationConfig::default());
    }

    #[test]
    fn unknown_backend_is_rejected() {
        let err = GenerationConfig::from_lookup(lookup(&[("LLM_BACKEND", "carrier-pigeon")])).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownBackend(name) if name == "carrier-pigeon"));
    }

    #[test]
    fn json_fills_missing_fields_with_defaults() {
        let config = GenerationConfig::from_json(r#"{ "backend": "ollama", "model": "llama3" }"#).unwrap();
        assert_eq!(config.backend, BackendKind::Ollama);
        assert_eq!(config.model, "llama3");
        assert_eq!(config.instruction, DEFAULT_INSTRUCTION);
        assert_eq!(config.fallback, DEFAULT_FALLBACK);
    }

    #[test]
    fn empty_model_fails_before_building() {
        let config = GenerationConfig { model: String::new(), ..Default::default() };
        assert!(matches!(config.build_provider(), Err(ConfigError::MissingModel)));
    }
}
