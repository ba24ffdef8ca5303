//! Console mod host entry point.

use anyhow::{anyhow, Result};
use clap::Parser;
use mod_api::{setup_logging, SystemClock, ThreadRandom};
use mod_host::{build_host, console_channel, load_config, signals, spawn_console_writer, Args};
use std::io::BufRead;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

const TICK_PERIOD: Duration = Duration::from_secs(1);

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = load_config(&args.config).await?;
    config.apply_args(&args);
    config
        .validate()
        .map_err(|e| anyhow!("Configuration validation failed: {}", e))?;

    setup_logging(&config.logging.level, config.logging.json_format)?;
    info!("Starting mod host v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration loaded from: {}", args.config.display());

    let (console_tx, console_rx) = console_channel();
    let writer = spawn_console_writer(console_rx);

    let host = build_host(
        &config,
        &args.config,
        Arc::new(SystemClock),
        Arc::new(ThreadRandom),
        console_tx,
    )
    .await?;

    let ticker = host.trivia.spawn_ticker(TICK_PERIOD);

    let dispatcher = host.dispatcher;
    let mut events = spawn_stdin_reader();
    let reader = tokio::spawn(async move {
        while let Some(line) = events.recv().await {
            if let Err(e) = dispatcher.handle_line(&line).await {
                warn!("Ignoring host event '{}': {}", line.trim(), e);
            }
        }
        info!("Host event stream closed");
    });

    if let Err(e) = signals::wait_for_shutdown().await {
        error!("Signal handling failed: {}", e);
    }

    info!("Shutting down mod host");
    ticker.abort();
    reader.abort();
    writer.abort();
    Ok(())
}

/// Reads stdin on a plain thread so a pending read never holds up shutdown.
fn spawn_stdin_reader() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            match line {
                Ok(line) => {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    error!("Failed to read host events: {}", e);
                    break;
                }
            }
        }
    });
    rx
}
