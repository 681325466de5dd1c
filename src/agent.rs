//! The browser agent facade: navigate, then extract structured data.

use serde_json::{Value, json};
use thiserror::Error;

use crate::browser::{BrowserHarness, HarnessError};
use crate::config::{BrowserAgentConfig, resolve_narrate};
use crate::connector::{AgentCore, BrowserConnector, Connector, ConnectorError};
use crate::events::{AgentEvent, EventBus};
use crate::extractor::{ExtractError, ExtractionCallError, ModelClient, StructuredExtractor};
use crate::llm::{LlmError, OpenAiModelClient};
use crate::logging::AgentLogger;
use crate::narrator::narrate_agent;
use crate::observer::{ObservationError, PageObserver};
use crate::runtime::ChromiumoxideHarness;
use crate::schema::{Schema, SchemaMismatchError, ValueSchema};

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("browser agent has not been started")]
    NotStarted,
    #[error(transparent)]
    Observation(#[from] ObservationError),
    #[error(transparent)]
    ExtractionCall(#[from] ExtractionCallError),
    #[error(transparent)]
    SchemaMismatch(#[from] SchemaMismatchError),
    #[error(transparent)]
    Navigation(HarnessError),
    #[error("connector {kind} is not registered with this agent")]
    MissingConnector { kind: &'static str },
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error(transparent)]
    Connector(ConnectorError),
    #[error(transparent)]
    Model(#[from] LlmError),
    /// The decoded output could not be re-encoded for the completion event.
    #[error("failed to serialize extracted output: {0}")]
    OutputSerialization(#[source] serde_json::Error),
}

impl From<ConnectorError> for AgentError {
    fn from(err: ConnectorError) -> Self {
        match err {
            ConnectorError::NotStarted { .. } => AgentError::NotStarted,
            ConnectorError::MissingConnector { kind } => AgentError::MissingConnector { kind },
            other => AgentError::Connector(other),
        }
    }
}

impl From<ExtractError> for AgentError {
    fn from(err: ExtractError) -> Self {
        match err {
            ExtractError::Call(err) => AgentError::ExtractionCall(err),
            ExtractError::Mismatch(err) => AgentError::SchemaMismatch(err),
        }
    }
}

/// Agent driving one browser page through a [`BrowserConnector`].
///
/// Calls on one instance are not serialized: callers that run `navigate` and
/// `extract` concurrently decide which page state an extraction observes.
pub struct BrowserAgent<H = ChromiumoxideHarness, M = OpenAiModelClient>
where
    H: BrowserHarness,
    M: ModelClient,
{
    core: AgentCore,
    events: EventBus,
    observer: PageObserver,
    extractor: StructuredExtractor<M>,
    logger: AgentLogger,
    _harness: std::marker::PhantomData<fn() -> H>,
}

impl<H: BrowserHarness, M: ModelClient> BrowserAgent<H, M> {
    /// Agent owning `connector` and extracting through `model`.
    pub fn new(connector: BrowserConnector<H>, model: M, logger: AgentLogger) -> Self {
        let mut core = AgentCore::new(logger.clone());
        core.register(connector);
        Self::with_core(core, model, logger)
    }

    /// Agent over a caller-assembled connector registry. The browser connector
    /// is looked up on each call and reported missing if never registered.
    pub fn with_core(core: AgentCore, model: M, logger: AgentLogger) -> Self {
        Self {
            core,
            events: EventBus::new(logger.clone()),
            observer: PageObserver::new(logger.clone()),
            extractor: StructuredExtractor::new(model, logger.clone()),
            logger,
            _harness: std::marker::PhantomData,
        }
    }

    pub async fn start(&self) -> Result<(), AgentError> {
        self.core.start().await?;
        self.logger.info("browser agent started", Some("agent"), None);
        Ok(())
    }

    pub async fn stop(&self) -> Result<(), AgentError> {
        self.core.stop().await?;
        self.logger.info("browser agent stopped", Some("agent"), None);
        Ok(())
    }

    pub fn is_started(&self) -> bool {
        self.core.is_started()
    }

    /// Event bus scoped to this agent.
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn model(&self) -> &M {
        self.extractor.model()
    }

    /// Typed access to any registered connector.
    pub fn connector<C: Connector>(&self) -> Result<&C, AgentError> {
        Ok(self.core.require::<C>()?)
    }

    fn harness(&self) -> Result<&H, AgentError> {
        Ok(self.core.require::<BrowserConnector<H>>()?.get_harness()?)
    }

    /// The live page handle.
    pub async fn page(&self) -> Result<H::Page, AgentError> {
        let harness = self.harness()?;
        harness
            .page()
            .await
            .map_err(|err| AgentError::Connector(ConnectorError::Harness(err)))
    }

    /// The live browsing context handle.
    pub async fn context(&self) -> Result<H::Context, AgentError> {
        let harness = self.harness()?;
        harness
            .context()
            .await
            .map_err(|err| AgentError::Connector(ConnectorError::Harness(err)))
    }

    /// Announce the navigation, then hand it to the harness.
    pub async fn navigate(&self, url: &str) -> Result<(), AgentError> {
        let harness = self.harness()?;

        self.events.emit(&AgentEvent::Navigation {
            url: url.to_string(),
        });
        self.logger
            .info(format!("navigating to {url}"), Some("agent"), None);

        harness.navigate(url).await.map_err(|err| {
            self.logger
                .error(format!("navigation failed: {err}"), Some("agent"), None);
            AgentError::Navigation(err)
        })
    }

    /// Observe the current page and extract data matching `schema`.
    pub async fn extract<S: Schema>(
        &self,
        instructions: &str,
        schema: &S,
    ) -> Result<S::Output, AgentError> {
        let harness = self.harness()?;
        if instructions.trim().is_empty() {
            return Err(AgentError::InvalidRequest(
                "extraction instructions must not be empty".into(),
            ));
        }

        self.events.emit(&AgentEvent::ExtractionStarted {
            instructions: instructions.to_string(),
            schema: schema.descriptor().clone(),
        });

        let observation = self.observer.observe(harness).await?;
        let output = self
            .extractor
            .extract(instructions, schema, &observation)
            .await?;
        let data = serde_json::to_value(&output).map_err(AgentError::OutputSerialization)?;

        self.logger.info(
            "extraction completed",
            Some("agent"),
            Some(json!({ "instructions": instructions })),
        );
        self.events.emit(&AgentEvent::ExtractionCompleted {
            instructions: instructions.to_string(),
            data,
        });

        Ok(output)
    }

    /// [`Self::extract`] against a raw JSON Schema document.
    pub async fn extract_value(
        &self,
        instructions: &str,
        descriptor: Value,
    ) -> Result<Value, AgentError> {
        let schema = ValueSchema::new(descriptor)
            .map_err(|err| AgentError::InvalidRequest(err.to_string()))?;
        self.extract(instructions, &schema).await
    }
}

/// Build a Chromium-backed agent from `config`, install the narrator when
/// narration is enabled, and start it.
pub async fn start_browser_agent(config: BrowserAgentConfig) -> Result<BrowserAgent, AgentError> {
    let logger = AgentLogger::from_options(&config.agent);
    let model = OpenAiModelClient::from_options(&config.agent, logger.clone())?;
    let connector = BrowserConnector::new(&config.browser, logger.clone());
    let agent = BrowserAgent::new(connector, model, logger.clone());

    if resolve_narrate(config.agent.narrate) {
        narrate_agent(agent.events(), logger);
    }

    agent.start().await?;
    Ok(agent)
}
