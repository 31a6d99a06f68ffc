//! verwatch daemon
//!
//! Loads a YAML configuration, starts one tracking loop per service and
//! drains the Announce, Persist and ManualSave queues until interrupted.

mod logging;
mod store;

use anyhow::Context;
use clap::{Parser, Subcommand};
use logging::{init_logging, LogFormat};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use store::StateStore;
use verwatch_core::{Config, ServiceRegistry, WatchContext};
use verwatch_status::{DeliveryChannels, DeliveryReceivers};

/// How often pending persist messages are written out
const FLUSH_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Parser)]
#[command(name = "verwatch", version, about = "Track releases and run update actions")]
struct Cli {
    #[command(subcommand)]
    command: Cmd,
}

#[derive(Debug, Subcommand)]
enum Cmd {
    /// Track every configured service until interrupted
    Run {
        /// Configuration file
        #[arg(long, short, default_value = "config.yml")]
        config: PathBuf,
        /// `pretty` or `json`; overrides the configuration
        #[arg(long)]
        log_format: Option<LogFormat>,
    },
    /// Validate a configuration and exit
    Check {
        /// Configuration file
        #[arg(long, short, default_value = "config.yml")]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    match Cli::parse().command {
        Cmd::Run { config, log_format } => run(config, log_format).await,
        Cmd::Check { config } => check(&config),
    }
}

fn check(path: &Path) -> anyhow::Result<()> {
    init_logging(LogFormat::Pretty, None);
    let config = Config::load(path)?;
    config
        .check()
        .with_context(|| format!("{} is invalid", path.display()))?;
    tracing::info!(path = %path.display(), services = config.service.len(), "config ok");
    Ok(())
}

async fn run(path: PathBuf, log_format: Option<LogFormat>) -> anyhow::Result<()> {
    let config = Config::load(&path)?;
    let format = match log_format {
        Some(format) => format,
        None => config
            .settings
            .log_format
            .as_deref()
            .map(str::parse)
            .transpose()
            .map_err(anyhow::Error::msg)?
            .unwrap_or_default(),
    };
    init_logging(format, config.settings.log_level.as_deref());

    let ctx = Arc::new(WatchContext::new()?);
    let services = config
        .build_services(&ctx)
        .with_context(|| format!("{} is invalid", path.display()))?;

    let (channels, receivers) = DeliveryChannels::unbounded();
    let registry = Arc::new(ServiceRegistry::new(channels));
    for service in services {
        registry.register(service);
    }
    tracing::info!(path = %path.display(), services = registry.len(), "config loaded");

    let starter = {
        let registry = Arc::clone(&registry);
        tokio::spawn(async move { registry.start_all().await })
    };

    let mut store = StateStore::new(path, config);
    drain(&registry, &mut store, receivers).await;

    starter.abort();
    registry.shutdown_all();
    store.flush(&registry).await?;
    Ok(())
}

/// Consume the delivery queues until ctrl-c
async fn drain(registry: &ServiceRegistry, store: &mut StateStore, mut rx: DeliveryReceivers) {
    let mut flush = tokio::time::interval(FLUSH_INTERVAL);
    flush.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                tracing::info!("interrupted, shutting down");
                return;
            }
            Some(message) = rx.announce.recv() => {
                match serde_json::to_string(&message) {
                    Ok(json) => tracing::info!(target: "verwatch::announce", "{json}"),
                    Err(err) => tracing::warn!(error = %err, "unserialisable announce"),
                }
            }
            Some(message) = rx.persist.recv() => {
                tracing::debug!(
                    service = %message.service_id,
                    delete = message.delete,
                    cells = message.cells.len(),
                    "persist"
                );
                store.apply(&message);
            }
            Some(_) = rx.save.recv() => {
                if let Err(err) = store.flush(registry).await {
                    tracing::error!(error = %err, "manual save failed");
                }
            }
            _ = flush.tick() => {
                if store.is_dirty() {
                    if let Err(err) = store.flush(registry).await {
                        tracing::error!(error = %err, "state save failed");
                    }
                }
            }
        }
    }
}
