//! Shopkeep — AI Etsy shop manager relayed over Telegram.
//!
//! Usage:
//!   shopkeep run       Start the bot polling loop
//!   shopkeep doctor    Check configuration and credentials

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

use shopkeep::agent::StoreAgent;
use shopkeep::config::{self, ShopkeepConfig};
use shopkeep::errors::RelayError;
use shopkeep::etsy::EtsyClient;
use shopkeep::llm::OpenRouterClient;
use shopkeep::telegram::{BotPoller, TelegramClient};

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(name = "shopkeep")]
#[command(version = "0.1.0")]
#[command(about = "AI-powered Etsy shop manager relayed over Telegram")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to shopkeep home directory (default ~/.shopkeep).
    #[arg(long)]
    home: Option<String>,

    /// Log level (debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the bot polling loop.
    Run,

    /// Check configuration and report missing credentials.
    Doctor,
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();

    // Resolve home directory
    let home_dir = match &cli.home {
        Some(home) => PathBuf::from(shellexpand::tilde(home).into_owned()),
        None => config::default_home_dir(),
    };

    match cli.command {
        Commands::Run => cmd_run(&home_dir).await,
        Commands::Doctor => cmd_doctor(&home_dir),
    }
}

// ---------------------------------------------------------------------------
// Command implementations
// ---------------------------------------------------------------------------

async fn cmd_run(home_dir: &Path) -> Result<()> {
    let config = bootstrap(home_dir)?;

    // Missing credentials degrade the affected API, they do not abort.
    for name in config.missing_credentials() {
        warn!("{}", RelayError::Config(name));
    }

    let llm = OpenRouterClient::new(&config.openrouter_api_url, &config.openrouter_api_key);
    let store = EtsyClient::new(
        &config.etsy_api_url,
        &config.etsy_api_key,
        &config.etsy_shop_id,
        &config.etsy_access_token,
    );
    let agent = StoreAgent::new(llm, store, config.model.clone(), config.max_tool_rounds);
    let telegram = TelegramClient::new(&config.telegram_bot_token);
    let poller = BotPoller::new(telegram, agent, &config);

    println!(
        "{} Bot is running! Waiting for messages... (model: {})",
        ">>>".green().bold(),
        config.model,
    );

    // Create a cancellation token for graceful shutdown
    let cancel = CancellationToken::new();

    let poll_cancel = cancel.clone();
    let poller_handle = tokio::spawn(async move {
        if let Err(e) = poller.run(poll_cancel).await {
            error!("Polling loop error: {e}");
        }
    });

    // Wait for shutdown signal
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl+C")?;

    println!("\n{} Shutting down gracefully...", "<<<".red().bold());
    cancel.cancel();

    let shutdown_timeout = tokio::time::Duration::from_secs(10);
    if tokio::time::timeout(shutdown_timeout, poller_handle).await.is_err() {
        warn!("Poller did not stop within the shutdown timeout");
    }

    Ok(())
}

fn cmd_doctor(home_dir: &Path) -> Result<()> {
    let config = bootstrap(home_dir)?;
    let missing = config.missing_credentials();

    println!();
    println!("{}", "=== Shopkeep Doctor ===".bold());
    println!();
    println!("  {}:   {}", "Model".bold(), config.model);
    println!("  {}:     {}", "LLM".bold(), config.openrouter_api_url);
    println!("  {}:    {}", "Etsy".bold(), config.etsy_api_url);
    println!("  {}:  {}", "Rounds".bold(), config.max_tool_rounds);
    println!();
    println!("  {}:", "Credentials".bold());

    for name in [
        "TELEGRAM_BOT_TOKEN",
        "OPENROUTER_API_KEY",
        "ETSY_API_KEY",
        "ETSY_SHOP_ID",
        "ETSY_ACCESS_TOKEN",
    ] {
        let status = if missing.contains(&name) {
            "missing".red().to_string()
        } else {
            "set".green().to_string()
        };
        println!("    {:<22} {}", name, status);
    }

    println!();
    if missing.is_empty() {
        println!("  {}", "All credentials present.".green());
    } else {
        println!(
            "  {} credential(s) missing. The bot will start, but the affected API is unreachable.",
            missing.len().to_string().red().bold(),
        );
    }
    println!();

    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Load the config file (if any) and apply environment overrides.
fn bootstrap(home_dir: &Path) -> Result<ShopkeepConfig> {
    let config_path = home_dir.join("shopkeep.toml");
    let mut config = config::load_config(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;
    config.apply_env_overrides();
    Ok(config)
}
