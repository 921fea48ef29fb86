//! Hub client port: one session with one physical hub.
//!
//! A [`HubConnector`] opens a [`HubClient`] for a given [`HubSettings`] and
//! hands it the sending half of a bounded channel. The client reports
//! asynchronous hub notifications as [`HubEvent`]s on that channel; the
//! owning manager drains it from a single task so events are applied in the
//! order they were emitted.

use std::future::Future;

use remotehub_domain::command::{CommandResult, CommandStep};
use remotehub_domain::error::{ConstructionError, TransportError};
use remotehub_domain::settings::HubSettings;
use remotehub_domain::snapshot::{ActivityRecord, ConfigSnapshot};
use tokio::sync::mpsc;

/// Capacity of the per-hub event channel.
pub const HUB_EVENT_CAPACITY: usize = 64;

/// Notification emitted by a hub session.
#[derive(Debug, Clone, PartialEq)]
pub enum HubEvent {
    /// The session is (re-)established.
    Connected,
    /// The session dropped.
    Disconnected,
    /// The hub switched to a new activity.
    ActivityChanged(ActivityRecord),
    /// The hub's configuration changed; carries the new snapshot.
    ConfigUpdated(ConfigSnapshot),
}

/// Sending half handed to a client by its connector.
pub type HubEventSender = mpsc::Sender<HubEvent>;

/// Operations a manager issues against its hub.
pub trait HubClient: Send + Sync {
    /// Establish the session. The client emits [`HubEvent::Connected`] once up.
    fn connect(&self) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Close the session.
    fn disconnect(&self) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Fetch the hub's full configuration.
    fn get_config(&self) -> impl Future<Output = Result<ConfigSnapshot, TransportError>> + Send;

    /// Activity the hub is currently running.
    fn current_activity(&self) -> impl Future<Output = Result<ActivityRecord, TransportError>> + Send;

    fn start_activity(&self, activity_id: i64) -> impl Future<Output = Result<(), TransportError>> + Send;

    fn power_off(&self) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Execute a batch in order, honouring its delay steps.
    ///
    /// Returns one entry per transmitted command, failures included.
    fn send_commands(
        &self,
        steps: &[CommandStep],
    ) -> impl Future<Output = Result<Vec<CommandResult>, TransportError>> + Send;

    /// Ask the hub to sync with its cloud account.
    fn sync(&self) -> impl Future<Output = Result<(), TransportError>> + Send;
}

/// Opens hub clients; one call per managed hub.
pub trait HubConnector: Send + Sync {
    type Client: HubClient + 'static;

    /// Create a client for `settings` that reports on `events`.
    ///
    /// Does not touch the network; [`HubClient::connect`] does.
    ///
    /// # Errors
    ///
    /// Returns [`ConstructionError`] when the settings cannot back a client.
    fn open(&self, settings: &HubSettings, events: HubEventSender) -> Result<Self::Client, ConstructionError>;
}
