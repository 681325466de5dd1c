//! Structured extraction: the fixed call shape between the agent and a model.

use async_trait::async_trait;
use serde_json::{Value, json};
use thiserror::Error;

use crate::logging::AgentLogger;
use crate::schema::{Schema, SchemaMismatchError};
use crate::types::{ExtractionCall, Observation};

/// The model backend could not produce an answer.
#[derive(Debug, Error)]
pub enum ExtractionCallError {
    #[error("model request failed: {0}")]
    Request(String),
    #[error("model returned an unusable response: {0}")]
    InvalidResponse(String),
    #[error("model client misconfigured: {0}")]
    Configuration(String),
}

/// Backend performing a schema-constrained extraction.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Returns the model's raw JSON answer for the call.
    async fn extract(&self, call: ExtractionCall<'_>) -> Result<Value, ExtractionCallError>;
}

#[async_trait]
impl<M: ModelClient + ?Sized> ModelClient for std::sync::Arc<M> {
    async fn extract(&self, call: ExtractionCall<'_>) -> Result<Value, ExtractionCallError> {
        (**self).extract(call).await
    }
}

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error(transparent)]
    Call(#[from] ExtractionCallError),
    #[error(transparent)]
    Mismatch(#[from] SchemaMismatchError),
}

/// Glue between an [`Observation`] and a [`ModelClient`].
pub struct StructuredExtractor<M> {
    model: M,
    logger: AgentLogger,
}

impl<M: ModelClient> StructuredExtractor<M> {
    pub fn new(model: M, logger: AgentLogger) -> Self {
        Self { model, logger }
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub async fn extract<S: Schema>(
        &self,
        instructions: &str,
        schema: &S,
        observation: &Observation,
    ) -> Result<S::Output, ExtractError> {
        let call = ExtractionCall {
            instructions,
            schema: schema.descriptor(),
            screenshot: &observation.screenshot,
            page_text: &observation.tree_text,
        };

        self.logger.debug(
            "requesting structured extraction",
            Some("extract"),
            Some(json!({
                "instructions": instructions,
                "page_text_chars": observation.tree_text.chars().count(),
            })),
        );

        let raw = self.model.extract(call).await?;
        let decoded = schema.decode(raw).inspect_err(|err| {
            self.logger.error(
                format!("model output did not match schema: {err}"),
                Some("extract"),
                None,
            );
        })?;
        Ok(decoded)
    }
}
