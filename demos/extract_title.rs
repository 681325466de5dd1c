//! Run with:
//! `CHROME_BIN=/path/to/chrome MODEL_API_KEY=... cargo run --example extract_title`
//!
//! Opens example.com in a visible Chromium window with narration on, extracts
//! the page title into a typed struct and prints it along with token usage.

use anyhow::{Context, Result};
use browser_agent::config::{BrowserAgentConfig, BrowserAgentConfigOverrides};
use browser_agent::{TypedSchema, start_browser_agent};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, schemars::JsonSchema)]
struct PageSummary {
    /// The main heading of the page.
    title: String,
    /// Text of the first link on the page, if any.
    first_link: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_secs()
        .init();

    let config = BrowserAgentConfig::from_env()
        .context("failed to read configuration")?
        .with_overrides(
            BrowserAgentConfigOverrides::default()
                .headless(false)
                .narrate(true),
        );

    let agent = start_browser_agent(config)
        .await
        .context("failed to start browser agent")?;

    agent
        .navigate("https://example.com")
        .await
        .context("failed to open example.com")?;

    let schema = TypedSchema::<PageSummary>::new()?;
    let summary = agent
        .extract("extract the page title and the text of the first link", &schema)
        .await
        .context("extract failed")?;
    println!("{summary:#?}");

    let metrics = agent.model().metrics();
    println!(
        "{} call(s), {} tokens, {} ms",
        metrics.calls,
        metrics.total_tokens(),
        metrics.inference_time_ms
    );

    agent.stop().await.context("failed to stop browser agent")?;
    Ok(())
}
