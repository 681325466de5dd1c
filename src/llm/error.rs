use thiserror::Error;

use async_openai::error::OpenAIError;

use crate::extractor::ExtractionCallError;

/// Errors surfaced by the chat completion layer.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("missing model API key; set MODEL_API_KEY or OPENAI_API_KEY")]
    MissingApiKey,
    #[error("missing default model configuration")]
    MissingDefaultModel,
    #[error("invalid chat completion request: {0}")]
    InvalidRequest(String),
    #[error("chat completion returned no content")]
    EmptyResponse,
    #[error("chat completion content is not JSON: {0}")]
    InvalidJson(String),
    #[error(transparent)]
    OpenAi(#[from] OpenAIError),
}

impl From<LlmError> for ExtractionCallError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::MissingApiKey | LlmError::MissingDefaultModel => {
                ExtractionCallError::Configuration(err.to_string())
            }
            LlmError::EmptyResponse | LlmError::InvalidJson(_) => {
                ExtractionCallError::InvalidResponse(err.to_string())
            }
            LlmError::InvalidRequest(_) | LlmError::OpenAi(_) => {
                ExtractionCallError::Request(err.to_string())
            }
        }
    }
}
