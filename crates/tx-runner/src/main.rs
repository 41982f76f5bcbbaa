//! # tx-runner
//!
//! Main entry point for the signal relay.
//!
//! Loads a JSON configuration file, builds the exchange registry, and runs
//! the intake channels selected by `mode` plus the control API until Ctrl+C.
//!
//! ```text
//!                 ┌── webhook server  (mode webhook | both)
//! registry ───────┼── mailbox poller  (mode email   | both)
//!                 └── control API     (control.enabled)
//! ```
//!
//! # Usage
//!
//! ```bash
//! tx-runner config.json --log-level info --mode webhook
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use tx_core::config::IntakeMode;
use tx_exchange::ExchangeRegistry;
use tx_intake::mailbox::{ImapStore, MailboxPoller};
use tx_intake::{control, webhook};
use tx_signal::{SignalProcessor, SignalValidator, TradeDesk};

/// Trading signal relay: webhook and mailbox intake, Binance and Bybit execution.
#[derive(Parser)]
#[command(name = "tx-runner", about = "Trading signal relay")]
struct Cli {
    /// Configuration file path (JSON).
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error); overrides the config.
    #[arg(short, long)]
    log_level: Option<String>,

    /// Optional log directory for file output; overrides the config.
    #[arg(long)]
    log_dir: Option<String>,

    /// Intake channels to run (webhook, email, both); overrides the config.
    #[arg(short, long)]
    mode: Option<IntakeMode>,
}

/// Spawn a server future, logging its exit instead of propagating it.
fn spawn_named(
    name: &'static str,
    fut: impl std::future::Future<Output = Result<()>> + Send + 'static,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        match fut.await {
            Ok(()) => warn!("{name} stopped"),
            Err(e) => error!("{name} failed: {e:#}"),
        }
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 1. Load configuration
    let mut config = tx_core::config::load_config(&cli.config)?;
    if let Some(mode) = cli.mode {
        config.mode = mode;
        config.validate().context("invalid --mode for this config")?;
    }

    // 2. Initialize logging
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    if let Some(dir) = cli.log_dir {
        config.logging.dir = Some(dir);
    }
    tx_core::logging::init_logging(&config.logging);

    info!(
        "tx-runner starting: config={}, mode={}, {} exchange entr{}",
        cli.config.display(),
        config.mode,
        config.exchanges.len(),
        if config.exchanges.len() == 1 { "y" } else { "ies" },
    );

    // 3. Build the exchange registry
    let registry = Arc::new(ExchangeRegistry::from_config(&config.exchanges));
    if registry.is_empty() {
        error!("no exchange available; signals will be rejected as unavailable");
    }

    let validator = SignalValidator::new(config.pin().map(str::to_string));
    if !validator.requires_pin() {
        warn!("no PIN configured; signals are accepted without authentication");
    }
    let processor = SignalProcessor::new(validator, Arc::clone(&registry));

    // 4. Spawn the intake channels and the control API
    let mut tasks: Vec<JoinHandle<()>> = Vec::new();

    if config.mode.runs_webhook() {
        let addr = format!("{}:{}", config.webhook.host, config.webhook.port);
        let processor = processor.clone();
        tasks.push(spawn_named("webhook server", async move {
            webhook::serve(&addr, processor).await
        }));
    }

    if config.mode.runs_mailbox() {
        // validate() guarantees the section exists in these modes.
        if let Some(mailbox) = config.mailbox.clone() {
            let poller = MailboxPoller::new(
                Arc::new(ImapStore::new(mailbox.clone())),
                processor.clone(),
                mailbox.marker,
                Duration::from_secs(mailbox.poll_interval_secs),
            );
            tasks.push(tokio::spawn(poller.run()));
        }
    }

    if config.control.enabled {
        let addr = format!("{}:{}", config.control.host, config.control.port);
        let desk = TradeDesk::new(Arc::clone(&registry));
        tasks.push(spawn_named("control API", async move { control::serve(&addr, desk).await }));
    }

    info!("{} task(s) running; press Ctrl+C to stop", tasks.len());

    // 5. Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");

    for task in &tasks {
        task.abort();
    }
    for task in tasks {
        let _ = task.await;
    }

    info!("all tasks stopped; goodbye");
    Ok(())
}
