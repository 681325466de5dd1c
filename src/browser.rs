//! Browser harness contract and launch planning.
//!
//! A harness owns the browser process, its browsing context and the single
//! page the agent drives. [`LaunchPlan`] turns [`BrowserOptions`] into a
//! concrete strategy that a harness implementation executes on start.

use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;

use crate::a11y::AccessibilityError;
use crate::config::{BrowserOptions, Viewport};
use crate::types::AccessibilityNode;

/// Owner of the live browser session consumed by the agent.
///
/// `page` and `context` hand out fresh handles on every call; callers must not
/// cache them across navigations.
#[async_trait]
pub trait BrowserHarness: Send + Sync + 'static {
    type Page: Clone + Send + Sync;
    type Context: Clone + Send + Sync;

    async fn start(&self) -> Result<(), HarnessError>;

    async fn stop(&self) -> Result<(), HarnessError>;

    async fn page(&self) -> Result<Self::Page, HarnessError>;

    async fn context(&self) -> Result<Self::Context, HarnessError>;

    async fn navigate(&self, url: &str) -> Result<(), HarnessError>;

    /// PNG capture of the current viewport.
    async fn screenshot(&self) -> Result<Vec<u8>, HarnessError>;

    /// Interesting-only accessibility snapshot of the current page.
    async fn accessibility_snapshot(&self) -> Result<Option<AccessibilityNode>, HarnessError>;
}

#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("browser harness error: {0}")]
    Message(String),
    #[error("browser harness not initialized")]
    NotInitialized,
    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },
    #[error("accessibility capture failed: {0}")]
    Accessibility(#[from] AccessibilityError),
}

/// How the harness reaches a browser.
#[derive(Debug, Clone, PartialEq)]
pub enum LaunchStrategy {
    /// Attach to an already running browser through its DevTools endpoint.
    AttachCdp { url: String },
    /// Launch a fresh browser; without a user data dir a temporary one is used.
    Launch { user_data_dir: Option<PathBuf> },
}

/// Normalised launch plan derived from [`BrowserOptions`].
#[derive(Debug, Clone, PartialEq)]
pub struct LaunchPlan {
    pub strategy: LaunchStrategy,
    pub headless: bool,
    pub viewport: Viewport,
    pub args: Vec<String>,
    pub chrome_executable: Option<PathBuf>,
}

impl LaunchPlan {
    pub fn from_options(options: &BrowserOptions) -> Self {
        let strategy = match options
            .cdp_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
        {
            Some(url) => LaunchStrategy::AttachCdp {
                url: url.to_string(),
            },
            None => LaunchStrategy::Launch {
                user_data_dir: options.user_data_dir.clone(),
            },
        };

        let mut args = options.args.clone();
        args.dedup();

        LaunchPlan {
            strategy,
            headless: options.headless,
            viewport: options.viewport,
            args,
            chrome_executable: options.chrome_executable.clone(),
        }
    }

    pub fn is_attach(&self) -> bool {
        matches!(self.strategy, LaunchStrategy::AttachCdp { .. })
    }
}
