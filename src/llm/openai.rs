use std::env;

use async_openai::error::OpenAIError;
use async_openai::types::{CreateChatCompletionRequest, CreateChatCompletionResponse};
use async_openai::{Client, config::OpenAIConfig};
use async_trait::async_trait;

use crate::config::AgentOptions;

use super::error::LlmError;
use super::provider::ChatCompletionProvider;

/// Implementation of [`ChatCompletionProvider`] backed by OpenAI-compatible APIs.
#[derive(Clone, Debug)]
pub struct OpenAiChatProvider {
    client: Client<OpenAIConfig>,
}

impl OpenAiChatProvider {
    /// Wrap an existing `async-openai` client instance.
    pub fn new(client: Client<OpenAIConfig>) -> Self {
        Self { client }
    }

    /// Build a client from agent options, falling back to `MODEL_API_KEY` and
    /// then `OPENAI_API_KEY` when no key was configured.
    pub fn from_options(options: &AgentOptions) -> Result<Self, LlmError> {
        let api_key = options
            .model_api_key
            .clone()
            .or_else(|| non_empty_env("MODEL_API_KEY"))
            .or_else(|| non_empty_env("OPENAI_API_KEY"))
            .ok_or(LlmError::MissingApiKey)?;

        let mut openai_config = OpenAIConfig::new().with_api_key(api_key);

        if let Some(api_base) = options
            .model_base_url
            .as_deref()
            .map(str::trim)
            .filter(|base| !base.is_empty())
        {
            openai_config = openai_config.with_api_base(api_base);
        }

        Ok(Self::new(Client::with_config(openai_config)))
    }
}

#[async_trait]
impl ChatCompletionProvider for OpenAiChatProvider {
    async fn create_chat_completion(
        &self,
        request: CreateChatCompletionRequest,
    ) -> Result<CreateChatCompletionResponse, OpenAIError> {
        self.client.chat().create(request).await
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}
