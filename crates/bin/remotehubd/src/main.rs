use std::sync::Arc;

use remotehub_adapter_virtual::VirtualHubConnector;
use remotehub_app::event_bus::InProcessEventBus;
use remotehubd::config::Config;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&config.logging.filter)?)
        .init();

    // Event bus
    let bus = Arc::new(InProcessEventBus::default());
    let logger = remotehubd::spawn_event_logger(bus.subscribe());

    // Hubs
    let registry = remotehubd::build_registry(&config, VirtualHubConnector::new(), Arc::clone(&bus));
    let started = remotehubd::register_all(&registry, &config).await;
    tracing::info!(
        started,
        config_dir = %config.storage.config_dir.display(),
        "remotehubd running, press ctrl-c to stop"
    );

    tokio::signal::ctrl_c().await?;

    registry.shutdown().await;
    logger.abort();
    Ok(())
}
