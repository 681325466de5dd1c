//! Strongly-typed configuration for the browser agent.
//!
//! Options come in two halves, mirroring the two collaborators the agent is
//! built from: [`AgentOptions`] configure the model client and the agent
//! itself, [`BrowserOptions`] configure how the browser connector reaches or
//! launches Chromium. Both can be built from defaults, loaded from environment
//! variables (with optional `.env` support), or merged with explicit overrides.

use std::env;
use std::fmt;
use std::num::{ParseFloatError, ParseIntError};
use std::path::PathBuf;
use std::sync::Arc;

use dotenvy::dotenv;
use serde::de::{Deserialize, Deserializer, Error as DeError};
use serde::ser::{Serialize, Serializer};
use serde::{Deserialize as DeriveDeserialize, Serialize as DeriveSerialize};
use thiserror::Error;

/// Model used when nothing else is configured.
pub const DEFAULT_MODEL_NAME: &str = "gpt-4o";

/// Sampling temperature used for extraction calls unless overridden.
pub const DEFAULT_BROWSER_AGENT_TEMPERATURE: f32 = 0.2;

/// Environment variable that switches narration on for every agent.
pub const NARRATE_ENV_VAR: &str = "BROWSER_AGENT_NARRATE";

/// Shared logger callback signature used by the configuration.
pub type LoggerCallback = Arc<dyn Fn(&str) + Send + Sync + 'static>;

/// Verbosity level for agent logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    Minimal,
    #[default]
    Medium,
    Detailed,
}

impl Verbosity {
    pub(crate) fn as_u8(self) -> u8 {
        match self {
            Verbosity::Minimal => 0,
            Verbosity::Medium => 1,
            Verbosity::Detailed => 2,
        }
    }

    fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Verbosity::Minimal),
            1 => Some(Verbosity::Medium),
            2 => Some(Verbosity::Detailed),
            _ => None,
        }
    }
}

impl Serialize for Verbosity {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u8(self.as_u8())
    }
}

impl<'de> Deserialize<'de> for Verbosity {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = u8::deserialize(deserializer)?;
        Verbosity::from_u8(value).ok_or_else(|| {
            DeError::custom(format!(
                "invalid verbosity value {value}; expected 0, 1, or 2"
            ))
        })
    }
}

/// Viewport dimensions applied to launched browsers and screenshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, DeriveSerialize, DeriveDeserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Viewport {
            width: 1280,
            height: 720,
        }
    }
}

/// Options for the model client and the agent facade.
#[derive(DeriveSerialize, DeriveDeserialize, Clone)]
#[serde(default)]
pub struct AgentOptions {
    #[serde(alias = "modelName")]
    pub model_name: String,
    #[serde(alias = "modelApiKey")]
    pub model_api_key: Option<String>,
    #[serde(alias = "modelBaseUrl", alias = "baseURL")]
    pub model_base_url: Option<String>,
    pub temperature: f32,
    #[serde(alias = "maxTokens")]
    pub max_tokens: Option<u32>,
    #[serde(alias = "systemPrompt")]
    pub system_prompt: Option<String>,
    pub verbose: Verbosity,
    /// Explicit narration toggle; `None` defers to [`NARRATE_ENV_VAR`].
    pub narrate: Option<bool>,
    #[serde(skip_serializing, skip_deserializing)]
    pub logger: Option<LoggerCallback>,
}

impl Default for AgentOptions {
    fn default() -> Self {
        AgentOptions {
            model_name: DEFAULT_MODEL_NAME.to_string(),
            model_api_key: None,
            model_base_url: None,
            temperature: DEFAULT_BROWSER_AGENT_TEMPERATURE,
            max_tokens: None,
            system_prompt: None,
            verbose: Verbosity::default(),
            narrate: None,
            logger: None,
        }
    }
}

impl fmt::Debug for AgentOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentOptions")
            .field("model_name", &self.model_name)
            .field("model_api_key", &self.model_api_key.as_ref().map(|_| "<redacted>"))
            .field("model_base_url", &self.model_base_url)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("system_prompt", &self.system_prompt)
            .field("verbose", &self.verbose)
            .field("narrate", &self.narrate)
            .field("logger_present", &self.logger.is_some())
            .finish()
    }
}

/// Options describing how the browser connector reaches Chromium.
#[derive(Debug, Clone, PartialEq, DeriveSerialize, DeriveDeserialize)]
#[serde(default)]
pub struct BrowserOptions {
    pub headless: bool,
    #[serde(alias = "chromeExecutable")]
    pub chrome_executable: Option<PathBuf>,
    /// Attach to an already running browser instead of launching one.
    #[serde(alias = "cdpUrl")]
    pub cdp_url: Option<String>,
    pub viewport: Viewport,
    #[serde(alias = "userDataDir")]
    pub user_data_dir: Option<PathBuf>,
    pub args: Vec<String>,
}

impl Default for BrowserOptions {
    fn default() -> Self {
        BrowserOptions {
            headless: true,
            chrome_executable: None,
            cdp_url: None,
            viewport: Viewport::default(),
            user_data_dir: None,
            args: vec!["--disable-blink-features=AutomationControlled".to_string()],
        }
    }
}

/// Combined configuration accepted by [`crate::agent::start_browser_agent`].
#[derive(Debug, Clone, Default, DeriveSerialize, DeriveDeserialize)]
#[serde(default)]
pub struct BrowserAgentConfig {
    #[serde(alias = "agentOptions")]
    pub agent: AgentOptions,
    #[serde(alias = "browserOptions")]
    pub browser: BrowserOptions,
}

impl BrowserAgentConfig {
    /// Construct a configuration by reading relevant environment variables, after
    /// loading a `.env` file if present.
    pub fn from_env() -> Result<Self, AgentConfigError> {
        let _ = dotenv();
        let mut config = BrowserAgentConfig::default();

        if let Some(value) = env_var("MODEL_API_KEY").or_else(|| env_var("OPENAI_API_KEY")) {
            config.agent.model_api_key = Some(value);
        }

        if let Some(value) = env_var("MODEL_NAME") {
            config.agent.model_name = value;
        }

        if let Some(value) = env_var("MODEL_BASE_URL") {
            config.agent.model_base_url = Some(value);
        }

        if let Some(value) = env_var("BROWSER_AGENT_TEMPERATURE") {
            config.agent.temperature = parse_f32("BROWSER_AGENT_TEMPERATURE", &value)?;
        }

        if let Some(value) = env_var("BROWSER_AGENT_MAX_TOKENS") {
            config.agent.max_tokens = Some(parse_u32("BROWSER_AGENT_MAX_TOKENS", &value)?);
        }

        if let Some(value) = env_var("BROWSER_AGENT_SYSTEM_PROMPT") {
            config.agent.system_prompt = Some(value);
        }

        if let Some(value) = env_var("BROWSER_AGENT_VERBOSE") {
            let parsed = parse_u8("BROWSER_AGENT_VERBOSE", &value)?;
            config.agent.verbose = Verbosity::from_u8(parsed).ok_or_else(|| {
                AgentConfigError::invalid_enum("BROWSER_AGENT_VERBOSE", parsed.to_string())
            })?;
        }

        if let Some(value) = env_var("BROWSER_AGENT_HEADLESS") {
            config.browser.headless = parse_bool("BROWSER_AGENT_HEADLESS", &value)?;
        }

        if let Some(value) = env_var("CHROME_BIN") {
            config.browser.chrome_executable = Some(PathBuf::from(value));
        }

        if let Some(value) = env_var("BROWSER_AGENT_CDP_URL") {
            config.browser.cdp_url = Some(value);
        }

        if let Some(value) = env_var("BROWSER_AGENT_USER_DATA_DIR") {
            config.browser.user_data_dir = Some(PathBuf::from(value));
        }

        Ok(config)
    }

    /// Create a new configuration with explicit field overrides applied.
    pub fn with_overrides(&self, overrides: BrowserAgentConfigOverrides) -> BrowserAgentConfig {
        let mut next = self.clone();

        if let Some(value) = overrides.model_name {
            next.agent.model_name = value;
        }
        if let Some(value) = overrides.model_api_key {
            next.agent.model_api_key = value;
        }
        if let Some(value) = overrides.model_base_url {
            next.agent.model_base_url = value;
        }
        if let Some(value) = overrides.temperature {
            next.agent.temperature = value;
        }
        if let Some(value) = overrides.max_tokens {
            next.agent.max_tokens = value;
        }
        if let Some(value) = overrides.system_prompt {
            next.agent.system_prompt = value;
        }
        if let Some(value) = overrides.verbose {
            next.agent.verbose = value;
        }
        if let Some(value) = overrides.narrate {
            next.agent.narrate = value;
        }
        if let Some(value) = overrides.logger {
            next.agent.logger = value;
        }
        if let Some(value) = overrides.headless {
            next.browser.headless = value;
        }
        if let Some(value) = overrides.chrome_executable {
            next.browser.chrome_executable = value;
        }
        if let Some(value) = overrides.cdp_url {
            next.browser.cdp_url = value;
        }
        if let Some(value) = overrides.viewport {
            next.browser.viewport = value;
        }

        next
    }
}

/// Field-level overrides for [`BrowserAgentConfig::with_overrides`].
///
/// The outer `Option` means "leave unchanged"; the inner one allows clearing a
/// field back to `None`.
#[derive(Default, Clone)]
pub struct BrowserAgentConfigOverrides {
    pub model_name: Option<String>,
    pub model_api_key: Option<Option<String>>,
    pub model_base_url: Option<Option<String>>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<Option<u32>>,
    pub system_prompt: Option<Option<String>>,
    pub verbose: Option<Verbosity>,
    pub narrate: Option<Option<bool>>,
    pub logger: Option<Option<LoggerCallback>>,
    pub headless: Option<bool>,
    pub chrome_executable: Option<Option<PathBuf>>,
    pub cdp_url: Option<Option<String>>,
    pub viewport: Option<Viewport>,
}

impl fmt::Debug for BrowserAgentConfigOverrides {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BrowserAgentConfigOverrides")
            .field("model_name", &self.model_name)
            .field("model_api_key", &self.model_api_key.as_ref().map(|inner| inner.is_some()))
            .field("model_base_url", &self.model_base_url)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("system_prompt", &self.system_prompt)
            .field("verbose", &self.verbose)
            .field("narrate", &self.narrate)
            .field("logger", &self.logger.as_ref().map(|inner| inner.is_some()))
            .field("headless", &self.headless)
            .field("chrome_executable", &self.chrome_executable)
            .field("cdp_url", &self.cdp_url)
            .field("viewport", &self.viewport)
            .finish()
    }
}

impl BrowserAgentConfigOverrides {
    /// Builder-style helper to set the `narrate` override.
    pub fn narrate(mut self, narrate: bool) -> Self {
        self.narrate = Some(Some(narrate));
        self
    }

    /// Builder-style helper to set the `headless` override.
    pub fn headless(mut self, headless: bool) -> Self {
        self.headless = Some(headless);
        self
    }
}

/// Decide whether narration is on: an explicit option always wins, otherwise
/// [`NARRATE_ENV_VAR`] is consulted. Any non-empty value other than an explicit
/// "off" spelling enables it.
pub fn resolve_narrate(explicit: Option<bool>) -> bool {
    if let Some(value) = explicit {
        return value;
    }
    match env_var(NARRATE_ENV_VAR) {
        Some(value) => parse_bool(NARRATE_ENV_VAR, &value).unwrap_or(true),
        None => false,
    }
}

/// Errors that can arise while constructing a [`BrowserAgentConfig`].
#[derive(Debug, Error)]
pub enum AgentConfigError {
    #[error("invalid value '{value}' for {field}")]
    InvalidEnumVariant { field: &'static str, value: String },
    #[error("invalid boolean '{value}' for {field}")]
    InvalidBool { field: &'static str, value: String },
    #[error("invalid number '{value}' for {field}: {source}")]
    InvalidNumber {
        field: &'static str,
        value: String,
        #[source]
        source: ParseIntError,
    },
    #[error("invalid decimal '{value}' for {field}: {source}")]
    InvalidDecimal {
        field: &'static str,
        value: String,
        #[source]
        source: ParseFloatError,
    },
}

impl AgentConfigError {
    fn invalid_enum(field: &'static str, value: String) -> Self {
        AgentConfigError::InvalidEnumVariant { field, value }
    }
}

fn env_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_bool(field: &'static str, value: &str) -> Result<bool, AgentConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(AgentConfigError::InvalidBool {
            field,
            value: value.to_string(),
        }),
    }
}

fn parse_u8(field: &'static str, value: &str) -> Result<u8, AgentConfigError> {
    value
        .trim()
        .parse::<u8>()
        .map_err(|source| AgentConfigError::InvalidNumber {
            field,
            value: value.to_string(),
            source,
        })
}

fn parse_u32(field: &'static str, value: &str) -> Result<u32, AgentConfigError> {
    value
        .trim()
        .parse::<u32>()
        .map_err(|source| AgentConfigError::InvalidNumber {
            field,
            value: value.to_string(),
            source,
        })
}

fn parse_f32(field: &'static str, value: &str) -> Result<f32, AgentConfigError> {
    value
        .trim()
        .parse::<f32>()
        .map_err(|source| AgentConfigError::InvalidDecimal {
            field,
            value: value.to_string(),
            source,
        })
}
