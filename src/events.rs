//! Per-agent publish/subscribe channel for lifecycle events.
//!
//! Emission is synchronous and runs on the caller's task. Handlers are invoked
//! in registration order; a handler that returns an error or panics is logged
//! and skipped so it can never affect the operation that emitted the event.

use std::error::Error as StdError;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex};

use serde::Serialize;
use serde_json::{Value, json};

use crate::logging::AgentLogger;

/// Result returned by event handlers.
pub type HandlerResult = Result<(), Box<dyn StdError + Send + Sync>>;

type EventHandler = Arc<dyn Fn(&AgentEvent) -> HandlerResult + Send + Sync>;

/// Lifecycle events emitted by [`crate::agent::BrowserAgent`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum AgentEvent {
    /// Emitted before the harness is asked to navigate.
    Navigation { url: String },
    /// Emitted before the page is observed for an extraction.
    ExtractionStarted { instructions: String, schema: Value },
    /// Emitted after the model output has been decoded successfully.
    ExtractionCompleted { instructions: String, data: Value },
}

impl AgentEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            AgentEvent::Navigation { .. } => EventKind::Navigation,
            AgentEvent::ExtractionStarted { .. } => EventKind::ExtractionStarted,
            AgentEvent::ExtractionCompleted { .. } => EventKind::ExtractionCompleted,
        }
    }
}

/// Discriminant used to register handlers for a single event kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Navigation,
    ExtractionStarted,
    ExtractionCompleted,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::Navigation => "navigation",
            EventKind::ExtractionStarted => "extraction-started",
            EventKind::ExtractionCompleted => "extraction-completed",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

struct Registration {
    filter: Option<EventKind>,
    handler: EventHandler,
}

/// Typed event bus scoped to one agent instance.
pub struct EventBus {
    registrations: Mutex<Vec<Registration>>,
    logger: AgentLogger,
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("handlers", &self.handler_count())
            .finish()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(AgentLogger::default())
    }
}

impl EventBus {
    pub fn new(logger: AgentLogger) -> Self {
        Self {
            registrations: Mutex::new(Vec::new()),
            logger,
        }
    }

    /// Register a handler for one event kind.
    pub fn on<F>(&self, kind: EventKind, handler: F)
    where
        F: Fn(&AgentEvent) -> HandlerResult + Send + Sync + 'static,
    {
        self.register(Some(kind), Arc::new(handler));
    }

    /// Register a handler that receives every event.
    pub fn subscribe<F>(&self, handler: F)
    where
        F: Fn(&AgentEvent) -> HandlerResult + Send + Sync + 'static,
    {
        self.register(None, Arc::new(handler));
    }

    pub fn handler_count(&self) -> usize {
        self.lock().len()
    }

    /// Deliver an event to every matching handler, in registration order.
    pub fn emit(&self, event: &AgentEvent) {
        let kind = event.kind();
        let handlers: Vec<EventHandler> = self
            .lock()
            .iter()
            .filter(|registration| registration.filter.is_none_or(|filter| filter == kind))
            .map(|registration| Arc::clone(&registration.handler))
            .collect();

        for (index, handler) in handlers.iter().enumerate() {
            match catch_unwind(AssertUnwindSafe(|| handler(event))) {
                Ok(Ok(())) => {}
                Ok(Err(err)) => self.logger.error(
                    format!("event handler failed: {err}"),
                    Some("events"),
                    Some(json!({ "event": kind.as_str(), "handler": index })),
                ),
                Err(payload) => self.logger.error(
                    format!("event handler panicked: {}", panic_message(payload.as_ref())),
                    Some("events"),
                    Some(json!({ "event": kind.as_str(), "handler": index })),
                ),
            }
        }
    }

    fn register(&self, filter: Option<EventKind>, handler: EventHandler) {
        self.lock().push(Registration { filter, handler });
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Registration>> {
        self.registrations
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
