//! Chat model plumbing behind the [`ModelClient`](crate::extractor::ModelClient) seam.
//!
//! The provider trait isolates the HTTP backend; [`OpenAiModelClient`] turns an
//! extraction call into a schema-constrained chat completion.

pub mod client;
pub mod error;
pub mod extract;
pub mod openai;
pub mod prompts;
pub mod provider;

pub use client::{ChatCompletionOptions, LlmClient, MetricsCallback};
pub use error::LlmError;
pub use extract::OpenAiModelClient;
pub use openai::OpenAiChatProvider;
pub use provider::ChatCompletionProvider;
