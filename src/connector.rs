//! Connector registry and start/stop sequencing shared by agents.
//!
//! An [`AgentCore`] owns a list of connectors, starts them in registration
//! order and stops them in reverse. Agents look connectors up by type with
//! [`AgentCore::require`], which fails fast when the kind was never
//! registered.

use std::any::{Any, type_name};
use std::error::Error as StdError;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use thiserror::Error;

use crate::browser::{BrowserHarness, HarnessError};
use crate::config::BrowserOptions;
use crate::logging::AgentLogger;
use crate::runtime::ChromiumoxideHarness;

#[derive(Debug, Error)]
pub enum ConnectorError {
    #[error("connector {kind} is not registered with this agent")]
    MissingConnector { kind: &'static str },
    #[error("connector {connector} has not been started")]
    NotStarted { connector: &'static str },
    #[error("connector {connector} failed: {source}")]
    Failed {
        connector: &'static str,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },
    #[error(transparent)]
    Harness(#[from] HarnessError),
}

/// Type-erasure helper so registered connectors can be downcast.
pub trait AsAny {
    fn as_any(&self) -> &dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A collaborator whose lifetime is tied to the agent's start/stop.
#[async_trait]
pub trait Connector: AsAny + Send + Sync + 'static {
    fn id(&self) -> &'static str;

    async fn on_start(&self) -> Result<(), ConnectorError> {
        Ok(())
    }

    async fn on_stop(&self) -> Result<(), ConnectorError> {
        Ok(())
    }
}

/// Connector registry with ordered lifecycle management.
pub struct AgentCore {
    connectors: Vec<Box<dyn Connector>>,
    started: AtomicBool,
    logger: AgentLogger,
}

impl fmt::Debug for AgentCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentCore")
            .field(
                "connectors",
                &self.connectors.iter().map(|c| c.id()).collect::<Vec<_>>(),
            )
            .field("started", &self.is_started())
            .finish()
    }
}

impl AgentCore {
    pub fn new(logger: AgentLogger) -> Self {
        Self {
            connectors: Vec::new(),
            started: AtomicBool::new(false),
            logger,
        }
    }

    pub fn register<C: Connector>(&mut self, connector: C) -> &mut Self {
        self.connectors.push(Box::new(connector));
        self
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    /// Typed lookup of a registered connector.
    pub fn require<C: Connector>(&self) -> Result<&C, ConnectorError> {
        self.connectors
            .iter()
            .find_map(|entry| {
                let connector: &dyn Connector = entry.as_ref();
                connector.as_any().downcast_ref::<C>()
            })
            .ok_or(ConnectorError::MissingConnector {
                kind: type_name::<C>(),
            })
    }

    /// Start every connector in registration order. If one fails, the ones
    /// already started are stopped again before the error is returned.
    pub async fn start(&self) -> Result<(), ConnectorError> {
        if self.is_started() {
            return Ok(());
        }

        for (index, connector) in self.connectors.iter().enumerate() {
            self.logger
                .debug(format!("starting connector {}", connector.id()), Some("agent"), None);
            if let Err(err) = connector.on_start().await {
                self.logger.error(
                    format!("connector {} failed to start: {err}", connector.id()),
                    Some("agent"),
                    None,
                );
                for started in self.connectors[..index].iter().rev() {
                    if let Err(stop_err) = started.on_stop().await {
                        self.logger.error(
                            format!("connector {} failed to stop: {stop_err}", started.id()),
                            Some("agent"),
                            None,
                        );
                    }
                }
                return Err(err);
            }
        }

        self.started.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Stop every connector in reverse order, returning the first failure
    /// after all of them have been asked to stop.
    pub async fn stop(&self) -> Result<(), ConnectorError> {
        if !self.started.swap(false, Ordering::SeqCst) {
            return Ok(());
        }

        let mut first_error = None;
        for connector in self.connectors.iter().rev() {
            if let Err(err) = connector.on_stop().await {
                self.logger.error(
                    format!("connector {} failed to stop: {err}", connector.id()),
                    Some("agent"),
                    None,
                );
                first_error.get_or_insert(err);
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// Connector owning the browser harness.
pub struct BrowserConnector<H: BrowserHarness = ChromiumoxideHarness> {
    harness: H,
    started: AtomicBool,
}

impl BrowserConnector<ChromiumoxideHarness> {
    pub fn new(options: &BrowserOptions, logger: AgentLogger) -> Self {
        Self::with_harness(ChromiumoxideHarness::new(options, logger))
    }
}

impl<H: BrowserHarness> BrowserConnector<H> {
    pub fn with_harness(harness: H) -> Self {
        Self {
            harness,
            started: AtomicBool::new(false),
        }
    }

    /// The harness, once the connector has started.
    pub fn get_harness(&self) -> Result<&H, ConnectorError> {
        if self.started.load(Ordering::SeqCst) {
            Ok(&self.harness)
        } else {
            Err(ConnectorError::NotStarted { connector: "browser" })
        }
    }
}

#[async_trait]
impl<H: BrowserHarness> Connector for BrowserConnector<H> {
    fn id(&self) -> &'static str {
        "browser"
    }

    async fn on_start(&self) -> Result<(), ConnectorError> {
        self.harness.start().await?;
        self.started.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn on_stop(&self) -> Result<(), ConnectorError> {
        self.started.store(false, Ordering::SeqCst);
        self.harness.stop().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    struct RecordingConnector {
        name: &'static str,
        fail_start: bool,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl RecordingConnector {
        fn new(name: &'static str, log: &Arc<Mutex<Vec<String>>>) -> Self {
            Self {
                name,
                fail_start: false,
                log: Arc::clone(log),
            }
        }
    }

    #[async_trait]
    impl Connector for RecordingConnector {
        fn id(&self) -> &'static str {
            self.name
        }

        async fn on_start(&self) -> Result<(), ConnectorError> {
            if self.fail_start {
                return Err(ConnectorError::Failed {
                    connector: self.name,
                    source: "boom".into(),
                });
            }
            self.log.lock().unwrap().push(format!("start:{}", self.name));
            Ok(())
        }

        async fn on_stop(&self) -> Result<(), ConnectorError> {
            self.log.lock().unwrap().push(format!("stop:{}", self.name));
            Ok(())
        }
    }

    struct OtherConnector;

    impl Connector for OtherConnector {
        fn id(&self) -> &'static str {
            "other"
        }
    }

    #[tokio::test]
    async fn starts_in_order_and_stops_in_reverse() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut core = AgentCore::new(AgentLogger::default());
        core.register(RecordingConnector::new("a", &log))
            .register(RecordingConnector::new("b", &log));

        core.start().await.expect("start");
        assert!(core.is_started());
        core.stop().await.expect("stop");
        assert!(!core.is_started());

        assert_eq!(
            log.lock().unwrap().as_slice(),
            ["start:a", "start:b", "stop:b", "stop:a"]
        );
    }

    #[tokio::test]
    async fn failed_start_rolls_back_started_connectors() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut core = AgentCore::new(AgentLogger::new(crate::config::Verbosity::Minimal));
        core.register(RecordingConnector::new("a", &log))
            .register(RecordingConnector {
                fail_start: true,
                ..RecordingConnector::new("b", &log)
            })
            .register(RecordingConnector::new("c", &log));

        let err = core.start().await.expect_err("start must fail");
        assert!(matches!(err, ConnectorError::Failed { connector: "b", .. }));
        assert!(!core.is_started());
        assert_eq!(log.lock().unwrap().as_slice(), ["start:a", "stop:a"]);
    }

    #[test]
    fn require_finds_registered_connector_by_type() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut core = AgentCore::new(AgentLogger::default());
        core.register(RecordingConnector::new("a", &log));

        let found = core.require::<RecordingConnector>().expect("registered");
        assert_eq!(found.id(), "a");

        match core.require::<OtherConnector>() {
            Err(ConnectorError::MissingConnector { kind }) => {
                assert!(kind.ends_with("OtherConnector"));
            }
            other => panic!("expected missing connector, got {:?}", other.map(|c| c.id())),
        }
    }

    #[test]
    fn browser_connector_hides_harness_until_started() {
        let connector = BrowserConnector::new(&BrowserOptions::default(), AgentLogger::default());
        assert!(matches!(
            connector.get_harness(),
            Err(ConnectorError::NotStarted { connector: "browser" })
        ));
    }
}
