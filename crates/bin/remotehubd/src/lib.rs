//! # remotehubd: remote hub daemon
//!
//! Composition root that wires the adapters into a [`DeviceRegistry`].
//!
//! ## Responsibilities
//! - Parse configuration (config file, env vars)
//! - Construct the configuration store and the hub connector (adapters)
//! - Register static hubs and discovery announcements
//! - Log every state push published on the event bus
//! - Shut all hubs down on exit
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer: no domain logic belongs here.

pub mod config;

use std::sync::Arc;

use remotehub_adapter_config_file::JsonFileConfigStore;
use remotehub_adapter_virtual::VirtualHubConnector;
use remotehub_app::event_bus::InProcessEventBus;
use remotehub_app::services::registry::{DeviceRegistry, Registration};
use remotehub_domain::event::{Event, EventType};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::Config;

/// Registry as wired by the daemon.
pub type Registry = DeviceRegistry<VirtualHubConnector, JsonFileConfigStore, Arc<InProcessEventBus>>;

/// Build the registry for `config`, publishing on `bus`.
#[must_use]
pub fn build_registry(config: &Config, connector: VirtualHubConnector, bus: Arc<InProcessEventBus>) -> Registry {
    DeviceRegistry::new(connector, JsonFileConfigStore::new(), bus, &config.storage.config_dir)
}

/// Offer every configured hub to the registry.
///
/// Hubs that fail to start are logged and skipped; the rest keep going.
/// Returns how many managers started.
pub async fn register_all(registry: &Registry, config: &Config) -> usize {
    let mut started = 0;
    for entry in &config.hubs {
        let name = entry.name.clone();
        match registry.add_static(entry.clone()).await {
            Ok(Registration::Started(_)) => started += 1,
            Ok(_) => {}
            Err(err) => warn!(hub = %name, error = %err, "hub not ready"),
        }
    }
    for found in &config.discovery {
        let name = found.name.clone();
        match registry.on_discovered(found.clone()).await {
            Ok(Registration::Started(_)) => started += 1,
            Ok(_) => {}
            Err(err) => warn!(hub = %name, error = %err, "discovered hub not ready"),
        }
    }
    for pending in registry.pending_names() {
        warn!(hub = %pending, "hub has no host and was not discovered");
    }
    started
}

/// Log every event published on the bus until it closes.
#[must_use]
pub fn spawn_event_logger(mut events: broadcast::Receiver<Event>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => log_event(&event),
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "event logger lagging behind"),
                Err(RecvError::Closed) => break,
            }
        }
    })
}

fn log_event(event: &Event) {
    let entity_id = event.entity_id.as_ref().map(ToString::to_string).unwrap_or_default();
    match event.event_type {
        EventType::StateChanged => info!(
            entity_id = %entity_id,
            state = %event.data["state"],
            attributes = %event.data["attributes"],
            "remote state changed"
        ),
        EventType::ConfigChanged => info!(
            entity_id = %entity_id,
            activities = %event.data["activities"],
            devices = %event.data["devices"],
            "remote configuration changed"
        ),
    }
}
