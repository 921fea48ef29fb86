//! Client session against a [`VirtualHub`].

use remotehub_app::ports::HubClient;
use remotehub_domain::command::{CommandResult, CommandStep};
use remotehub_domain::error::TransportError;
use remotehub_domain::settings::HubSettings;
use remotehub_domain::snapshot::{ActivityRecord, ConfigSnapshot, POWER_OFF_ID};

use crate::hub::VirtualHub;

/// [`HubClient`] backed by an in-process [`VirtualHub`].
#[derive(Debug)]
pub struct VirtualHubClient {
    hub: VirtualHub,
    host: String,
    port: u16,
}

impl VirtualHubClient {
    pub(crate) fn new(hub: VirtualHub, settings: &HubSettings) -> Self {
        Self {
            hub,
            host: settings.host.clone(),
            port: settings.port,
        }
    }

    fn ensure_connected(&self) -> Result<(), TransportError> {
        if self.hub.is_connected() {
            Ok(())
        } else {
            Err(TransportError::NotConnected)
        }
    }
}

impl HubClient for VirtualHubClient {
    async fn connect(&self) -> Result<(), TransportError> {
        if self.hub.open_session() {
            tracing::debug!(host = %self.host, port = self.port, "virtual hub session opened");
            Ok(())
        } else {
            Err(TransportError::Unreachable {
                host: self.host.clone(),
                port: self.port,
            })
        }
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        self.hub.close_session();
        Ok(())
    }

    async fn get_config(&self) -> Result<ConfigSnapshot, TransportError> {
        self.ensure_connected()?;
        Ok(self.hub.config())
    }

    async fn current_activity(&self) -> Result<ActivityRecord, TransportError> {
        self.ensure_connected()?;
        Ok(self.hub.current_activity())
    }

    async fn start_activity(&self, activity_id: i64) -> Result<(), TransportError> {
        self.ensure_connected()?;
        if !self.hub.knows_activity(activity_id) {
            return Err(TransportError::Rejected {
                operation: "start_activity",
                reason: format!("unknown activity {activity_id}"),
            });
        }
        self.hub.start_activity(activity_id);
        Ok(())
    }

    async fn power_off(&self) -> Result<(), TransportError> {
        self.ensure_connected()?;
        self.hub.start_activity(POWER_OFF_ID);
        Ok(())
    }

    async fn send_commands(&self, steps: &[CommandStep]) -> Result<Vec<CommandResult>, TransportError> {
        self.ensure_connected()?;
        let mut results = Vec::new();
        for step in steps {
            match step {
                CommandStep::Send { device_id, command } => results.push(self.hub.transmit(*device_id, command)),
                CommandStep::Delay(delay) => tokio::time::sleep(*delay).await,
            }
        }
        Ok(results)
    }

    async fn sync(&self) -> Result<(), TransportError> {
        self.ensure_connected()
    }
}
