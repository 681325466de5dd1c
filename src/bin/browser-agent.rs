//! Browser agent CLI.
//!
//! Launches a local Chromium, navigates to a page and prints the structured
//! data extracted from it.
//!
//! Usage:
//!   $ CHROME_BIN=/path/to/chrome MODEL_API_KEY=... \
//!     cargo run --bin browser-agent -- extract --url https://example.com \
//!       --instructions "extract the page title" --schema title.schema.json

use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};
use browser_agent::config::{BrowserAgentConfig, BrowserAgentConfigOverrides, Verbosity};
use browser_agent::start_browser_agent;
use clap::{Args, Parser, Subcommand};
use log::info;
use serde_json::{Value, json};

#[derive(Parser)]
#[command(
    name = "browser-agent",
    author,
    version,
    about = "Navigate a page and extract structured data from it"
)]
struct Cli {
    /// Increase log verbosity (pass multiple times for DEBUG).
    #[arg(long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Navigate to a URL and extract data matching a JSON Schema.
    Extract(ExtractArgs),
}

#[derive(Args)]
struct ExtractArgs {
    /// Page URL to open before extracting.
    #[arg(long)]
    url: String,

    /// Natural-language description of the data to extract.
    #[arg(long)]
    instructions: String,

    /// JSON Schema file describing the expected output.
    #[arg(long)]
    schema: Option<PathBuf>,

    /// Show the launched browser window.
    #[arg(long)]
    show_browser: bool,

    /// Print a line for every navigation and extraction.
    #[arg(long)]
    narrate: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_env_logger();

    let cli = Cli::parse();
    let verbosity = verbosity_from_count(cli.verbose);

    match cli.command {
        Command::Extract(args) => run_extract(args, verbosity).await?,
    }

    Ok(())
}

async fn run_extract(args: ExtractArgs, verbosity: Verbosity) -> Result<()> {
    let schema = load_schema(args.schema.as_ref())?;

    let mut overrides = BrowserAgentConfigOverrides {
        verbose: Some(verbosity),
        ..BrowserAgentConfigOverrides::default()
    }
    .headless(!args.show_browser);
    if args.narrate {
        overrides = overrides.narrate(true);
    }

    let config = BrowserAgentConfig::from_env()
        .context("failed to read configuration from the environment")?
        .with_overrides(overrides);

    let agent = start_browser_agent(config)
        .await
        .context("failed to start browser agent")?;

    let outcome = async {
        agent
            .navigate(&args.url)
            .await
            .with_context(|| format!("failed to open {}", args.url))?;
        agent
            .extract_value(&args.instructions, schema)
            .await
            .context("extract failed")
    }
    .await;

    let metrics = agent.model().metrics();
    agent.stop().await.context("failed to stop browser agent")?;

    let data = outcome?;
    println!("{}", serde_json::to_string_pretty(&data)?);
    info!(
        "Extraction used {} tokens in {} ms",
        metrics.total_tokens(),
        metrics.inference_time_ms
    );
    Ok(())
}

fn load_schema(path: Option<&PathBuf>) -> Result<Value> {
    let Some(path) = path else {
        return Ok(json!({ "type": "object" }));
    };
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read schema {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("schema {} is not JSON", path.display()))
}

fn verbosity_from_count(count: u8) -> Verbosity {
    match count {
        0 => Verbosity::Medium,
        _ => Verbosity::Detailed,
    }
}

fn init_env_logger() {
    if env::var("RUST_LOG").is_err() {
        unsafe {
            env::set_var("RUST_LOG", "info,browser_agent=debug");
        }
    }

    let _ = env_logger::Builder::from_env(env_logger::Env::default())
        .format_timestamp_secs()
        .try_init();
}
