//! [`ModelClient`] backed by an OpenAI-compatible chat completion endpoint.

use std::sync::{Arc, Mutex};

use async_openai::types::{
    ChatCompletionRequestMessage, ChatCompletionRequestMessageContentPartImage,
    ChatCompletionRequestMessageContentPartText, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestSystemMessageContent, ChatCompletionRequestUserMessageArgs,
    ChatCompletionRequestUserMessageContent, ChatCompletionRequestUserMessageContentPart,
    CreateChatCompletionResponse, ImageDetail, ImageUrl, ResponseFormat, ResponseFormatJsonSchema,
};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde_json::{Value, json};

use crate::config::AgentOptions;
use crate::extractor::{ExtractionCallError, ModelClient};
use crate::logging::AgentLogger;
use crate::metrics::ExtractionMetrics;
use crate::types::ExtractionCall;

use super::client::{ChatCompletionOptions, LlmClient};
use super::error::LlmError;
use super::openai::OpenAiChatProvider;
use super::prompts::{build_extract_system_prompt, build_extract_user_prompt};
use super::provider::ChatCompletionProvider;

const RESPONSE_SCHEMA_NAME: &str = "extraction_schema";
const WRAPPED_FIELD: &str = "data";

/// Sends the instructions, accessibility text and screenshot to a chat model
/// and asks for JSON conforming to the caller's schema.
pub struct OpenAiModelClient<P: ChatCompletionProvider = OpenAiChatProvider> {
    client: LlmClient<P>,
    system_prompt: String,
    temperature: f32,
    max_tokens: Option<u32>,
    metrics: Arc<Mutex<ExtractionMetrics>>,
}

impl OpenAiModelClient<OpenAiChatProvider> {
    pub fn from_options(options: &AgentOptions, logger: AgentLogger) -> Result<Self, LlmError> {
        let provider = OpenAiChatProvider::from_options(options)?;
        Ok(Self::with_provider(provider, options, logger))
    }
}

impl<P: ChatCompletionProvider> OpenAiModelClient<P> {
    pub fn with_provider(provider: P, options: &AgentOptions, logger: AgentLogger) -> Self {
        let metrics = Arc::new(Mutex::new(ExtractionMetrics::default()));
        let sink = Arc::clone(&metrics);
        let client = LlmClient::new(options.model_name.clone(), provider)
            .with_logger(logger)
            .with_metrics_callback(Some(Arc::new(
                move |response: &CreateChatCompletionResponse, elapsed| {
                    let (prompt, completion) = response
                        .usage
                        .as_ref()
                        .map(|usage| (usage.prompt_tokens, usage.completion_tokens))
                        .unwrap_or_default();
                    if let Ok(mut metrics) = sink.lock() {
                        metrics.record(u64::from(prompt), u64::from(completion), elapsed);
                    }
                },
            )));

        Self {
            client,
            system_prompt: build_extract_system_prompt(options.system_prompt.as_deref()),
            temperature: options.temperature,
            max_tokens: options.max_tokens,
            metrics,
        }
    }

    /// Usage accumulated over every successful call made through this client.
    pub fn metrics(&self) -> ExtractionMetrics {
        self.metrics
            .lock()
            .map(|metrics| *metrics)
            .unwrap_or_default()
    }

    pub fn llm(&self) -> &LlmClient<P> {
        &self.client
    }

    fn build_messages(
        &self,
        call: &ExtractionCall<'_>,
    ) -> Result<Vec<ChatCompletionRequestMessage>, LlmError> {
        let system = ChatCompletionRequestSystemMessageArgs::default()
            .content(ChatCompletionRequestSystemMessageContent::Text(
                self.system_prompt.clone(),
            ))
            .build()
            .map_err(|err| LlmError::InvalidRequest(err.to_string()))?;

        let mut parts = vec![ChatCompletionRequestUserMessageContentPart::Text(
            ChatCompletionRequestMessageContentPartText {
                text: build_extract_user_prompt(call.instructions, call.page_text),
            },
        )];
        if !call.screenshot.is_empty() {
            parts.push(ChatCompletionRequestUserMessageContentPart::ImageUrl(
                ChatCompletionRequestMessageContentPartImage {
                    image_url: ImageUrl {
                        url: screenshot_data_url(call.screenshot),
                        detail: Some(ImageDetail::Auto),
                    },
                },
            ));
        }

        let user = ChatCompletionRequestUserMessageArgs::default()
            .content(ChatCompletionRequestUserMessageContent::Array(parts))
            .build()
            .map_err(|err| LlmError::InvalidRequest(err.to_string()))?;

        Ok(vec![
            ChatCompletionRequestMessage::System(system),
            ChatCompletionRequestMessage::User(user),
        ])
    }

    async fn run(&self, call: ExtractionCall<'_>) -> Result<Value, LlmError> {
        let (response_schema, wrapped) = response_schema_for(call.schema);
        let messages = self.build_messages(&call)?;
        let options = ChatCompletionOptions {
            temperature: Some(self.temperature),
            max_tokens: self.max_tokens,
            response_format: Some(ResponseFormat::JsonSchema {
                json_schema: ResponseFormatJsonSchema {
                    description: None,
                    name: RESPONSE_SCHEMA_NAME.to_string(),
                    schema: Some(response_schema),
                    strict: Some(false),
                },
            }),
            ..ChatCompletionOptions::default()
        };

        let response = self.client.create_chat_completion(messages, options).await?;
        let content = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.as_deref())
            .ok_or(LlmError::EmptyResponse)?;

        let value = parse_json_content(content)?;
        if wrapped {
            return match value {
                Value::Object(mut map) if map.contains_key(WRAPPED_FIELD) => {
                    Ok(map.remove(WRAPPED_FIELD).unwrap_or(Value::Null))
                }
                other => Ok(other),
            };
        }
        Ok(value)
    }
}

#[async_trait]
impl<P: ChatCompletionProvider> ModelClient for OpenAiModelClient<P> {
    async fn extract(&self, call: ExtractionCall<'_>) -> Result<Value, ExtractionCallError> {
        self.run(call).await.map_err(ExtractionCallError::from)
    }
}

fn screenshot_data_url(png: &[u8]) -> String {
    format!("data:image/png;base64,{}", BASE64.encode(png))
}

/// Structured output requires an object at the root; other schemas are
/// nested under a single `data` property. Definition blocks move to the new
/// root so `#/definitions/...` and `#/$defs/...` references still resolve.
fn response_schema_for(schema: &Value) -> (Value, bool) {
    let is_object = schema.get("type").and_then(Value::as_str) == Some("object");
    if is_object {
        return (schema.clone(), false);
    }

    let mut inner = schema.clone();
    let mut wrapper = json!({
        "type": "object",
        "required": [WRAPPED_FIELD]
    });
    if let Value::Object(map) = &mut inner {
        map.remove("$schema");
        for key in ["definitions", "$defs"] {
            if let Some(definitions) = map.remove(key) {
                wrapper[key] = definitions;
            }
        }
    }
    wrapper["properties"] = json!({ WRAPPED_FIELD: inner });
    (wrapper, true)
}

/// Accepts a bare JSON document or one wrapped in a markdown code fence.
fn parse_json_content(text: &str) -> Result<Value, LlmError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(LlmError::EmptyResponse);
    }
    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return Ok(value);
    }

    for marker in ["```json", "```JSON", "```"] {
        let mut rest = trimmed;
        while let Some(start) = rest.find(marker) {
            let body = &rest[start + marker.len()..];
            let Some(end) = body.find("```") else {
                break;
            };
            let candidate = body[..end].trim();
            if let Ok(value) = serde_json::from_str::<Value>(candidate) {
                return Ok(value);
            }
            rest = &body[end + 3..];
        }
    }

    let preview: String = trimmed.chars().take(120).collect();
    Err(LlmError::InvalidJson(preview))
}
