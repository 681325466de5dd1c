//! Chromiumoxide-based browser harness.
//!
//! Provides an implementation of [`BrowserHarness`](crate::browser::BrowserHarness)
//! backed by the `chromiumoxide` crate. The harness either launches a local
//! Chromium or attaches to a running one over CDP, keeps the handler loop
//! alive on a background task, and drives a single page.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chromiumoxide::{
    browser::{Browser, BrowserConfig},
    cdp::browser_protocol::{accessibility::GetFullAxTreeParams, page::CaptureScreenshotFormat},
    page::{Page as ChromiumPage, ScreenshotParams},
};
use futures_util::StreamExt;
use serde_json::json;
use tempfile::TempDir;
use tokio::{fs, sync::Mutex, task::JoinHandle};

use crate::a11y::{build_interesting_tree, parse_ax_nodes};
use crate::browser::{BrowserHarness, HarnessError, LaunchPlan, LaunchStrategy};
use crate::config::BrowserOptions;
use crate::logging::AgentLogger;
use crate::types::AccessibilityNode;

const TEMP_PROFILE_PREFIX: &str = "browser-agent-profile-";

pub struct ChromiumoxideHarness {
    plan: LaunchPlan,
    state: Arc<Mutex<Option<HarnessState>>>,
    logger: AgentLogger,
}

struct HarnessState {
    browser: Arc<Browser>,
    page: ChromiumPage,
    handler: JoinHandle<()>,
    attached: bool,
    temp_profile: Option<TempDir>,
}

impl ChromiumoxideHarness {
    pub fn new(options: &BrowserOptions, logger: AgentLogger) -> Self {
        Self::from_plan(LaunchPlan::from_options(options), logger)
    }

    pub fn from_plan(plan: LaunchPlan, logger: AgentLogger) -> Self {
        Self {
            plan,
            state: Arc::new(Mutex::new(None)),
            logger,
        }
    }

    async fn current_page(&self) -> Result<ChromiumPage, HarnessError> {
        let guard = self.state.lock().await;
        let state = guard.as_ref().ok_or(HarnessError::NotInitialized)?;
        Ok(state.page.clone())
    }
}

#[async_trait]
impl BrowserHarness for ChromiumoxideHarness {
    type Page = ChromiumPage;
    type Context = Arc<Browser>;

    async fn start(&self) -> Result<(), HarnessError> {
        let mut guard = self.state.lock().await;
        if guard.is_some() {
            return Ok(());
        }

        let state = match &self.plan.strategy {
            LaunchStrategy::AttachCdp { url } => attach_to_cdp(url, &self.logger).await?,
            LaunchStrategy::Launch { user_data_dir } => {
                launch(
                    &self.plan,
                    user_data_dir.clone(),
                    &std::env::temp_dir(),
                    &self.logger,
                )
                .await?
            }
        };

        self.logger.info(
            "browser session started",
            Some("harness"),
            Some(json!({
                "attached": state.attached,
                "headless": self.plan.headless,
            })),
        );
        *guard = Some(state);
        Ok(())
    }

    async fn stop(&self) -> Result<(), HarnessError> {
        let state = {
            let mut guard = self.state.lock().await;
            guard.take()
        };

        if let Some(state) = state {
            shutdown_state(state, &self.logger).await;
            self.logger
                .info("browser session stopped", Some("harness"), None);
        }
        Ok(())
    }

    async fn page(&self) -> Result<Self::Page, HarnessError> {
        self.current_page().await
    }

    async fn context(&self) -> Result<Self::Context, HarnessError> {
        let guard = self.state.lock().await;
        let state = guard.as_ref().ok_or(HarnessError::NotInitialized)?;
        Ok(Arc::clone(&state.browser))
    }

    async fn navigate(&self, url: &str) -> Result<(), HarnessError> {
        let page = self.current_page().await?;
        page.goto(url)
            .await
            .map_err(|err| HarnessError::Navigation {
                url: url.to_string(),
                reason: err.to_string(),
            })?;
        self.logger.debug(
            format!("navigated to {url}"),
            Some("harness"),
            None,
        );
        Ok(())
    }

    async fn screenshot(&self) -> Result<Vec<u8>, HarnessError> {
        let page = self.current_page().await?;
        page.screenshot(
            ScreenshotParams::builder()
                .format(CaptureScreenshotFormat::Png)
                .build(),
        )
        .await
        .map_err(map_chromiumoxide_error)
    }

    async fn accessibility_snapshot(&self) -> Result<Option<AccessibilityNode>, HarnessError> {
        let page = self.current_page().await?;
        let response = page
            .execute(GetFullAxTreeParams::default())
            .await
            .map_err(map_chromiumoxide_error)?;
        let payload = serde_json::to_value(&response.result.nodes)
            .map_err(|err| HarnessError::Accessibility(err.into()))?;
        let nodes = parse_ax_nodes(payload)?;
        self.logger.debug(
            "captured accessibility tree",
            Some("harness"),
            Some(json!({ "nodes": nodes.len() })),
        );
        Ok(build_interesting_tree(&nodes))
    }
}

fn build_config(plan: &LaunchPlan, user_data_dir: &Path) -> Result<BrowserConfig, HarnessError> {
    let viewport = chromiumoxide::handler::viewport::Viewport {
        width: plan.viewport.width,
        height: plan.viewport.height,
        device_scale_factor: None,
        emulating_mobile: false,
        is_landscape: plan.viewport.width >= plan.viewport.height,
        has_touch: false,
    };

    let mut builder = BrowserConfig::builder();

    if let Some(path) = &plan.chrome_executable {
        builder = builder.chrome_executable(path);
    }

    let builder = builder
        .viewport(viewport)
        .window_size(plan.viewport.width, plan.viewport.height)
        .user_data_dir(user_data_dir)
        .args(plan.args.clone());

    let builder = if plan.headless {
        builder
    } else {
        builder.with_head()
    };

    builder.build().map_err(HarnessError::Message)
}

fn map_chromiumoxide_error<E: std::fmt::Display>(err: E) -> HarnessError {
    HarnessError::Message(err.to_string())
}

async fn attach_to_cdp(url: &str, logger: &AgentLogger) -> Result<HarnessState, HarnessError> {
    let (browser, handler) = Browser::connect(url)
        .await
        .map_err(map_chromiumoxide_error)?;

    let handler = spawn_handler(handler, logger.clone());
    let existing = browser.pages().await.map_err(map_chromiumoxide_error)?;
    let page = match existing.into_iter().next() {
        Some(page) => page,
        None => browser
            .new_page("about:blank")
            .await
            .map_err(map_chromiumoxide_error)?,
    };

    Ok(HarnessState {
        browser: Arc::new(browser),
        page,
        handler,
        attached: true,
        temp_profile: None,
    })
}

async fn launch(
    plan: &LaunchPlan,
    user_data_dir: Option<PathBuf>,
    temp_root: &Path,
    logger: &AgentLogger,
) -> Result<HarnessState, HarnessError> {
    // A temporary profile is removed when `temp_profile` drops, including on
    // the early returns below.
    let (user_data_dir, temp_profile) = match user_data_dir {
        Some(dir) => {
            fs::create_dir_all(&dir)
                .await
                .map_err(|err| HarnessError::Message(err.to_string()))?;
            (dir, None)
        }
        None => {
            let temp = tempfile::Builder::new()
                .prefix(TEMP_PROFILE_PREFIX)
                .tempdir_in(temp_root)
                .map_err(|err| HarnessError::Message(err.to_string()))?;
            (temp.path().to_path_buf(), Some(temp))
        }
    };

    let config = build_config(plan, &user_data_dir)?;
    let (browser, handler) = Browser::launch(config)
        .await
        .map_err(map_chromiumoxide_error)?;

    let handler = spawn_handler(handler, logger.clone());
    let page = browser
        .new_page("about:blank")
        .await
        .map_err(map_chromiumoxide_error)?;

    Ok(HarnessState {
        browser: Arc::new(browser),
        page,
        handler,
        attached: false,
        temp_profile,
    })
}

fn spawn_handler(mut handler: chromiumoxide::handler::Handler, logger: AgentLogger) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(result) = handler.next().await {
            if let Err(err) = result {
                logger.debug(
                    format!("chromiumoxide handler error: {err}"),
                    Some("harness"),
                    None,
                );
            }
        }
    })
}

async fn shutdown_state(state: HarnessState, logger: &AgentLogger) {
    let HarnessState {
        browser,
        page,
        handler,
        attached,
        temp_profile,
    } = state;
    drop(page);

    if !attached {
        match Arc::try_unwrap(browser) {
            Ok(mut browser) => {
                if let Err(err) = browser.close().await {
                    logger.error(
                        format!("failed to close browser: {err}"),
                        Some("harness"),
                        None,
                    );
                }
                let _ = browser.wait().await;
            }
            Err(_) => logger.debug(
                "browser context still referenced; leaving process to drop",
                Some("harness"),
                None,
            ),
        }
    }
    handler.abort();

    if let Some(profile) = temp_profile {
        let path = profile.path().to_path_buf();
        if let Err(err) = profile.close() {
            logger.debug(
                format!("failed to remove temporary user data dir {path:?}: {err}"),
                Some("harness"),
                None,
            );
        }
    }
}
