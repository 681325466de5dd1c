//! Structured logging shared by the agent, its observers and the model client.
//!
//! Records carry a level, an optional category and an optional JSON payload.
//! Each record goes to the configured external callback, or else to the `log`
//! facade under the `browser_agent::<category>` target so applications can
//! route it with whatever logger they install.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::{AgentOptions, Verbosity};

/// Sink receiving every record that passes the verbosity filter.
pub type LogCallback = Arc<dyn Fn(&AgentLogRecord) + Send + Sync + 'static>;

const TARGET_PREFIX: &str = "browser_agent";

/// Log severity, ordered from least to most verbose.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error = 0,
    Info = 1,
    Debug = 2,
}

impl LogLevel {
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    fn to_log(self) -> log::Level {
        match self {
            LogLevel::Error => log::Level::Error,
            LogLevel::Info => log::Level::Info,
            LogLevel::Debug => log::Level::Debug,
        }
    }

    /// Whether a record at this level passes `verbose`. Errors always pass.
    pub fn enabled_at(self, verbose: Verbosity) -> bool {
        self == LogLevel::Error || self.as_u8() <= verbose.as_u8()
    }
}

/// One structured log entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentLogRecord {
    pub timestamp: DateTime<Utc>,
    pub message: String,
    pub level: LogLevel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auxiliary: Option<Value>,
}

impl AgentLogRecord {
    pub fn new(
        message: impl Into<String>,
        level: LogLevel,
        category: Option<&str>,
        auxiliary: Option<Value>,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            message: message.into(),
            level,
            category: category.map(str::to_string),
            auxiliary: auxiliary.filter(|aux| !aux.is_null()),
        }
    }

    /// `log` target for this record, e.g. `browser_agent::harness`.
    pub fn target(&self) -> String {
        match &self.category {
            Some(category) => format!("{TARGET_PREFIX}::{category}"),
            None => TARGET_PREFIX.to_string(),
        }
    }
}

impl fmt::Display for AgentLogRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)?;
        if let Some(aux) = &self.auxiliary {
            write!(f, " {aux}")?;
        }
        Ok(())
    }
}

/// Forward a record to the `log` facade.
pub fn forward_to_log(record: &AgentLogRecord) {
    let target = record.target();
    log::log!(target: target.as_str(), record.level.to_log(), "{record}");
}

/// Logger held by the agent and cloned into its collaborators.
#[derive(Clone, Default)]
pub struct AgentLogger {
    verbose: Verbosity,
    sink: Option<LogCallback>,
}

impl fmt::Debug for AgentLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentLogger")
            .field("verbose", &self.verbose)
            .field("external_sink", &self.sink.is_some())
            .finish()
    }
}

impl AgentLogger {
    pub fn new(verbose: Verbosity) -> Self {
        Self {
            verbose,
            sink: None,
        }
    }

    /// Logger configured from agent options. A string callback in the options
    /// receives each record's message only.
    pub fn from_options(options: &AgentOptions) -> Self {
        let mut logger = Self::new(options.verbose);
        if let Some(callback) = options.logger.clone() {
            logger.set_external_logger(Some(Arc::new(move |record: &AgentLogRecord| {
                callback(&record.message)
            })));
        }
        logger
    }

    pub fn verbose(&self) -> Verbosity {
        self.verbose
    }

    /// Replace the sink; `None` falls back to the `log` facade.
    pub fn set_external_logger(&mut self, sink: Option<LogCallback>) {
        self.sink = sink;
    }

    pub fn log(
        &self,
        message: impl Into<String>,
        level: LogLevel,
        category: Option<&str>,
        auxiliary: Option<Value>,
    ) {
        if !level.enabled_at(self.verbose) {
            return;
        }

        let record = AgentLogRecord::new(message, level, category, auxiliary);
        match &self.sink {
            Some(sink) => sink(&record),
            None => forward_to_log(&record),
        }
    }

    pub fn error(
        &self,
        message: impl Into<String>,
        category: Option<&str>,
        auxiliary: Option<Value>,
    ) {
        self.log(message, LogLevel::Error, category, auxiliary);
    }

    pub fn info(
        &self,
        message: impl Into<String>,
        category: Option<&str>,
        auxiliary: Option<Value>,
    ) {
        self.log(message, LogLevel::Info, category, auxiliary);
    }

    pub fn debug(
        &self,
        message: impl Into<String>,
        category: Option<&str>,
        auxiliary: Option<Value>,
    ) {
        self.log(message, LogLevel::Debug, category, auxiliary);
    }
}
