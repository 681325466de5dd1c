//! Browser agent: drive a Chromium page and extract schema-validated data from
//! it with a vision-capable chat model.
//!
//! [`BrowserAgent`] composes a [`BrowserConnector`] (browser lifecycle), a
//! [`PageObserver`] (accessibility text plus screenshot), a
//! [`StructuredExtractor`] (model call plus schema decode) and an
//! [`EventBus`] announcing navigations and extractions.

pub mod a11y;
pub mod agent;
pub mod browser;
pub mod config;
pub mod connector;
pub mod events;
pub mod extractor;
pub mod llm;
pub mod logging;
pub mod metrics;
pub mod narrator;
pub mod observer;
pub mod runtime;
pub mod schema;
pub mod types;

pub use agent::{AgentError, BrowserAgent, start_browser_agent};
pub use browser::{BrowserHarness, HarnessError, LaunchPlan, LaunchStrategy};
pub use config::{
    AgentConfigError, AgentOptions, BrowserAgentConfig, BrowserAgentConfigOverrides,
    BrowserOptions, Verbosity, Viewport, resolve_narrate,
};
pub use connector::{AgentCore, BrowserConnector, Connector, ConnectorError};
pub use events::{AgentEvent, EventBus, EventKind, HandlerResult};
pub use extractor::{ExtractError, ExtractionCallError, ModelClient, StructuredExtractor};
pub use llm::{LlmError, OpenAiChatProvider, OpenAiModelClient};
pub use logging::{AgentLogRecord, AgentLogger, LogLevel};
pub use metrics::ExtractionMetrics;
pub use narrator::narrate_agent;
pub use observer::{ObservationError, PageObserver};
pub use runtime::ChromiumoxideHarness;
pub use schema::{Schema, SchemaError, SchemaMismatchError, TypedSchema, ValueSchema};
pub use types::{AccessibilityNode, ExtractionCall, Observation};
