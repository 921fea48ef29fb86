//! # remotehub-adapter-virtual
//!
//! Simulated hub implementing the `HubConnector` / `HubClient` ports.
//!
//! ## Demo configuration
//!
//! | Kind | Id | Name |
//! |------|----|------|
//! | Activity | `-1` | `PowerOff` |
//! | Activity | `24533120` | Watch TV |
//! | Activity | `24533121` | Listen to Music |
//! | Device | `38794003` | Living Room TV |
//! | Device | `38794004` | AV Receiver |
//!
//! Tests and demos drive the hub through [`VirtualHub`]: drop and restore
//! the connection, swap the configuration, inspect transmitted commands.
//!
//! ## Dependency rule
//!
//! Depends on `remotehub-app` (port traits) and `remotehub-domain` only.

mod client;
mod hub;

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use remotehub_app::ports::{HubConnector, HubEventSender};
use remotehub_domain::error::ConstructionError;
use remotehub_domain::settings::HubSettings;

pub use client::VirtualHubClient;
pub use hub::{VirtualHub, demo_config};

/// Hands out one [`VirtualHub`] per host, creating demo hubs on demand.
#[derive(Debug, Default)]
pub struct VirtualHubConnector {
    hubs: Mutex<HashMap<String, VirtualHub>>,
}

impl VirtualHubConnector {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `hub` for connections to `host`.
    #[must_use]
    pub fn with_hub(self, host: impl Into<String>, hub: VirtualHub) -> Self {
        self.hubs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(host.into(), hub);
        self
    }

    /// The hub answering on `host`.
    #[must_use]
    pub fn hub(&self, host: &str) -> VirtualHub {
        self.hubs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(host.to_string())
            .or_insert_with(VirtualHub::demo)
            .clone()
    }
}

impl HubConnector for VirtualHubConnector {
    type Client = VirtualHubClient;

    fn open(&self, settings: &HubSettings, events: HubEventSender) -> Result<VirtualHubClient, ConstructionError> {
        let hub = self.hub(&settings.host);
        hub.attach(events);
        Ok(VirtualHubClient::new(hub, settings))
    }
}
