use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::prelude::*;

use jeedomd::config::Config;
use jeedomd::discovery::DiscoveryRules;
use jeedomd::hub::{
    FromIntegrationMessage, Hub, HubEvent, SaveDebouncer, SnapshotStore,
};
use jeedomd::integrations::mqtt::client::RumqttcClient;
use jeedomd::integrations::mqtt::JeedomMqttIntegration;
use jeedomd::integrations::Integration;

/// Jeedom discovery and state daemon
#[derive(Parser)]
#[command(name = "jeedomd", version)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value = "jeedomd.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = Config::from_file(&args.config)
        .with_context(|| format!("loading config from {}", args.config.display()))?;

    init_tracing(&config);
    info!("jeedomd starting");
    info!("Loaded config from: {}", args.config.display());

    let rules = DiscoveryRules::load(config.discovery.rules_path.as_deref())
        .context("loading discovery rules")?;
    let mut hub = Hub::new(rules, config.discovery.domains.clone());

    let store = Arc::new(SnapshotStore::new(config.discovery.store_path.clone()));
    let restored = store.load().await.context("loading discovery snapshot")?;
    hub.restore(restored);
    let mut debouncer = SaveDebouncer::new(store, SaveDebouncer::DEFAULT_DELAY);

    spawn_event_logger(hub.subscribe());

    let (tx, mut rx) = mpsc::channel(256);
    let client = RumqttcClient::new(&config.mqtt).context("creating MQTT client")?;
    let mut integration = JeedomMqttIntegration::new(client, &config.mqtt);
    integration
        .setup(tx)
        .await
        .map_err(|e| anyhow::anyhow!("setting up MQTT integration: {e}"))?;

    info!("Entering main loop, press Ctrl+C to exit");
    loop {
        tokio::select! {
            msg = rx.recv() => match msg {
                Some(FromIntegrationMessage::EqLogicUpdated { payload }) => {
                    if hub.handle_eqlogic(&payload) {
                        debouncer.schedule(hub.eqlogic_store().clone());
                    }
                }
                Some(FromIntegrationMessage::CmdValue { cmd_id, value }) => {
                    hub.handle_cmd_value(cmd_id, &value);
                }
                None => {
                    warn!("integration channel closed, shutting down");
                    break;
                }
            },
            result = tokio::signal::ctrl_c() => {
                match result {
                    Ok(()) => info!("Received shutdown signal"),
                    Err(e) => warn!("Failed to listen for shutdown signal: {}", e),
                }
                break;
            }
        }
    }

    if let Err(e) = integration.shutdown().await {
        warn!("MQTT integration shutdown failed: {}", e);
    }
    debouncer
        .flush(hub.eqlogic_store())
        .await
        .context("flushing discovery snapshot")?;

    info!("jeedomd shutdown complete");
    Ok(())
}

fn init_tracing(config: &Config) {
    let mut targets = tracing_subscriber::filter::Targets::new()
        .with_default(LevelFilter::from(config.logging.level));
    for (target, level) in &config.logging.overrides {
        targets = targets.with_target(target.clone(), LevelFilter::from(*level));
    }
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(targets)
        .init();
}

fn spawn_event_logger(mut events: broadcast::Receiver<HubEvent>) {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(HubEvent::EntityAdded { platform, unique_id }) => {
                    info!(%platform, %unique_id, "entity added");
                }
                Ok(HubEvent::StateChanged {
                    unique_id,
                    role,
                    value,
                }) => {
                    debug!(%unique_id, ?role, ?value, "state changed");
                }
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!(missed, "hub event logger lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });
}
