use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_openai::types::{
    ChatCompletionRequestMessage, CreateChatCompletionRequest, CreateChatCompletionRequestArgs,
    CreateChatCompletionResponse, ResponseFormat,
};
use serde_json::json;

use crate::logging::AgentLogger;

use super::error::LlmError;
use super::provider::ChatCompletionProvider;

/// Callback invoked after a successful completion to capture metrics.
pub type MetricsCallback =
    Arc<dyn Fn(&CreateChatCompletionResponse, Duration) + Send + Sync + 'static>;

/// Optional parameters that influence chat completion requests.
#[derive(Debug, Default, Clone)]
pub struct ChatCompletionOptions {
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub response_format: Option<ResponseFormat>,
    pub seed: Option<i64>,
    pub user: Option<String>,
}

/// Provider-neutral chat completion client.
pub struct LlmClient<P: ChatCompletionProvider> {
    provider: P,
    default_model: String,
    logger: AgentLogger,
    metrics_callback: Option<MetricsCallback>,
}

impl<P> fmt::Debug for LlmClient<P>
where
    P: ChatCompletionProvider + fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlmClient")
            .field("provider", &self.provider)
            .field("default_model", &self.default_model)
            .field("metrics_callback", &self.metrics_callback.is_some())
            .finish()
    }
}

impl<P: ChatCompletionProvider> LlmClient<P> {
    pub fn new(default_model: impl Into<String>, provider: P) -> Self {
        Self {
            provider,
            default_model: default_model.into(),
            logger: AgentLogger::default(),
            metrics_callback: None,
        }
    }

    pub fn with_logger(mut self, logger: AgentLogger) -> Self {
        self.logger = logger;
        self
    }

    /// Attach a metrics callback invoked after successful completions.
    pub fn with_metrics_callback(mut self, callback: Option<MetricsCallback>) -> Self {
        self.metrics_callback = callback;
        self
    }

    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    /// Access the underlying provider (primarily for testing).
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Construct an [`async_openai`] chat completion request using the provided messages and options.
    pub fn build_request(
        &self,
        messages: Vec<ChatCompletionRequestMessage>,
        options: ChatCompletionOptions,
    ) -> Result<CreateChatCompletionRequest, LlmError> {
        let model = options
            .model
            .clone()
            .unwrap_or_else(|| self.default_model.clone());

        if model.trim().is_empty() {
            return Err(LlmError::MissingDefaultModel);
        }

        let mut builder = CreateChatCompletionRequestArgs::default();
        builder.model(model);
        builder.messages(messages);
        apply_options(&mut builder, options);

        builder
            .build()
            .map_err(|err| LlmError::InvalidRequest(err.to_string()))
    }

    pub async fn create_chat_completion(
        &self,
        messages: Vec<ChatCompletionRequestMessage>,
        options: ChatCompletionOptions,
    ) -> Result<CreateChatCompletionResponse, LlmError> {
        let request = self.build_request(messages, options)?;
        self.execute_request(request).await
    }

    async fn execute_request(
        &self,
        request: CreateChatCompletionRequest,
    ) -> Result<CreateChatCompletionResponse, LlmError> {
        let model = request.model.clone();
        self.logger.debug(
            format!("sending chat completion request to model={model}"),
            Some("llm"),
            None,
        );

        let start = Instant::now();
        match self.provider.create_chat_completion(request).await {
            Ok(response) => {
                let elapsed = start.elapsed();
                if let Some(callback) = &self.metrics_callback {
                    callback(&response, elapsed);
                }
                self.logger.debug(
                    "chat completion succeeded",
                    Some("llm"),
                    Some(json!({
                        "model": model,
                        "duration_ms": elapsed.as_millis() as u64,
                    })),
                );
                Ok(response)
            }
            Err(err) => {
                self.logger.error(
                    format!("chat completion failed for model={model}: {err}"),
                    Some("llm"),
                    None,
                );
                Err(LlmError::OpenAi(err))
            }
        }
    }
}

fn apply_options(builder: &mut CreateChatCompletionRequestArgs, options: ChatCompletionOptions) {
    let ChatCompletionOptions {
        model: _,
        temperature,
        max_tokens,
        response_format,
        seed,
        user,
    } = options;

    if let Some(temperature) = temperature {
        builder.temperature(temperature);
    }
    if let Some(max_tokens) = max_tokens {
        builder.max_completion_tokens(max_tokens);
    }
    if let Some(response_format) = response_format {
        builder.response_format(response_format);
    }
    if let Some(seed) = seed {
        builder.seed(seed);
    }
    if let Some(user) = user {
        builder.user(user);
    }
}
