//! Page observation: accessibility tree text plus a viewport screenshot.

use serde_json::json;
use thiserror::Error;

use crate::a11y::render_minimal_tree;
use crate::browser::{BrowserHarness, HarnessError};
use crate::logging::AgentLogger;
use crate::types::Observation;

#[derive(Debug, Error)]
pub enum ObservationError {
    #[error("failed to capture accessibility snapshot: {source}")]
    Accessibility {
        #[source]
        source: HarnessError,
    },
    #[error("failed to capture screenshot: {source}")]
    Screenshot {
        #[source]
        source: HarnessError,
    },
}

/// Captures [`Observation`]s from a harness. Either both artifacts are
/// captured or the whole observation fails.
#[derive(Debug, Clone, Default)]
pub struct PageObserver {
    logger: AgentLogger,
}

impl PageObserver {
    pub fn new(logger: AgentLogger) -> Self {
        Self { logger }
    }

    pub async fn observe<H: BrowserHarness>(
        &self,
        harness: &H,
    ) -> Result<Observation, ObservationError> {
        let snapshot = harness
            .accessibility_snapshot()
            .await
            .map_err(|source| ObservationError::Accessibility { source })?;
        let tree_text = snapshot.as_ref().map(render_minimal_tree).unwrap_or_default();

        let screenshot = harness
            .screenshot()
            .await
            .map_err(|source| ObservationError::Screenshot { source })?;

        self.logger.debug(
            "captured page observation",
            Some("observe"),
            Some(json!({
                "tree_lines": tree_text.lines().count(),
                "screenshot_bytes": screenshot.len(),
            })),
        );

        Ok(Observation {
            tree_text,
            screenshot,
        })
    }
}
