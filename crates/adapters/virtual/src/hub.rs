//! Simulated hub state shared between a test harness and its client.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use remotehub_app::ports::{HubEvent, HubEventSender};
use remotehub_domain::command::CommandResult;
use remotehub_domain::snapshot::{ActivityRecord, ConfigSnapshot, DeviceRecord, POWER_OFF_ID};
use tokio::sync::mpsc::error::TrySendError;

/// Result code for a command the hub does not know.
pub(crate) const UNKNOWN_COMMAND: u32 = 404;

/// Configuration served by a fresh demo hub.
#[must_use]
pub fn demo_config() -> ConfigSnapshot {
    ConfigSnapshot::new(
        [
            ActivityRecord::power_off(),
            ActivityRecord::new(24_533_120, "Watch TV"),
            ActivityRecord::new(24_533_121, "Listen to Music"),
        ],
        [
            DeviceRecord::new(38_794_003, "Living Room TV")
                .with_commands(["PowerOn", "PowerOff", "VolumeUp", "VolumeDown", "Mute"]),
            DeviceRecord::new(38_794_004, "AV Receiver")
                .with_commands(["PowerOn", "PowerOff", "InputHdmi1", "InputHdmi2"]),
        ],
    )
    .with_metadata(serde_json::json!({
        "firmware": "virtual",
        "discovery": { "protocol": "virtual" },
    }))
}

#[derive(Debug)]
struct HubSim {
    config: ConfigSnapshot,
    current: i64,
    reachable: bool,
    connected: bool,
    sent: Vec<CommandResult>,
    events: Option<HubEventSender>,
}

impl HubSim {
    fn emit(&self, event: HubEvent) {
        let Some(events) = &self.events else { return };
        match events.try_send(event) {
            Ok(()) | Err(TrySendError::Closed(_)) => {}
            Err(TrySendError::Full(event)) => {
                tracing::warn!(?event, "virtual hub event channel full, dropping event");
            }
        }
    }

    fn activity(&self, id: i64) -> ActivityRecord {
        self.config
            .activity(id)
            .cloned()
            .unwrap_or_else(ActivityRecord::power_off)
    }
}

/// A simulated hub. Clones share the same hub.
#[derive(Debug, Clone)]
pub struct VirtualHub {
    sim: Arc<Mutex<HubSim>>,
}

impl VirtualHub {
    /// A reachable hub serving [`demo_config`], powered off.
    #[must_use]
    pub fn demo() -> Self {
        Self::with_config(demo_config())
    }

    #[must_use]
    pub fn with_config(config: ConfigSnapshot) -> Self {
        Self {
            sim: Arc::new(Mutex::new(HubSim {
                config,
                current: POWER_OFF_ID,
                reachable: true,
                connected: false,
                sent: Vec::new(),
                events: None,
            })),
        }
    }

    fn sim(&self) -> MutexGuard<'_, HubSim> {
        self.sim.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn attach(&self, events: HubEventSender) {
        self.sim().events = Some(events);
    }

    #[must_use]
    pub fn config(&self) -> ConfigSnapshot {
        self.sim().config.clone()
    }

    #[must_use]
    pub fn current_activity(&self) -> ActivityRecord {
        let sim = self.sim();
        sim.activity(sim.current)
    }

    #[must_use]
    pub fn is_reachable(&self) -> bool {
        self.sim().reachable
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.sim().connected
    }

    /// Unreachable hubs refuse new sessions; established ones are unaffected.
    pub fn set_reachable(&self, reachable: bool) {
        self.sim().reachable = reachable;
    }

    /// Drop the session as if the network went away.
    pub fn drop_connection(&self) {
        let mut sim = self.sim();
        if sim.connected {
            sim.connected = false;
            sim.emit(HubEvent::Disconnected);
        }
    }

    /// Bring a dropped session back, if the hub is reachable.
    pub fn restore_connection(&self) {
        let mut sim = self.sim();
        if sim.reachable && !sim.connected {
            sim.connected = true;
            sim.emit(HubEvent::Connected);
        }
    }

    /// Replace the configuration and notify the client.
    pub fn replace_config(&self, config: ConfigSnapshot) {
        let mut sim = self.sim();
        sim.config = config.clone();
        sim.emit(HubEvent::ConfigUpdated(config));
    }

    /// Switch activity from the hub side, e.g. a physical remote button.
    pub fn press_activity(&self, activity_id: i64) {
        self.sim().select(activity_id);
    }

    /// Every command transmitted so far, failed ones included.
    #[must_use]
    pub fn sent_commands(&self) -> Vec<CommandResult> {
        self.sim().sent.clone()
    }

    pub(crate) fn open_session(&self) -> bool {
        let mut sim = self.sim();
        if !sim.reachable {
            return false;
        }
        sim.connected = true;
        sim.emit(HubEvent::Connected);
        true
    }

    pub(crate) fn close_session(&self) {
        self.sim().connected = false;
    }

    pub(crate) fn knows_activity(&self, activity_id: i64) -> bool {
        activity_id == POWER_OFF_ID || self.sim().config.activity(activity_id).is_some()
    }

    pub(crate) fn start_activity(&self, activity_id: i64) {
        self.sim().select(activity_id);
    }

    pub(crate) fn transmit(&self, device_id: i64, command: &str) -> CommandResult {
        let mut sim = self.sim();
        let known = sim
            .config
            .device(device_id)
            .is_some_and(|d| d.commands.iter().any(|c| c == command));
        let result = if known {
            CommandResult::ok(device_id, command)
        } else {
            CommandResult {
                code: UNKNOWN_COMMAND,
                message: format!("device {device_id} has no command {command:?}"),
                ..CommandResult::ok(device_id, command)
            }
        };
        sim.sent.push(result.clone());
        result
    }
}

impl HubSim {
    fn select(&mut self, activity_id: i64) {
        if self.current == activity_id {
            return;
        }
        self.current = activity_id;
        let activity = self.activity(activity_id);
        self.emit(HubEvent::ActivityChanged(activity));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn attached() -> (VirtualHub, mpsc::Receiver<HubEvent>) {
        let hub = VirtualHub::demo();
        let (tx, rx) = mpsc::channel(8);
        hub.attach(tx);
        (hub, rx)
    }

    #[test]
    fn should_start_powered_off_and_disconnected() {
        let hub = VirtualHub::demo();
        assert_eq!(hub.current_activity(), ActivityRecord::power_off());
        assert!(!hub.is_connected());
        assert!(hub.is_reachable());
    }

    #[test]
    fn should_emit_disconnect_only_once() {
        let (hub, mut rx) = attached();
        assert!(hub.open_session());
        hub.drop_connection();
        hub.drop_connection();

        assert_eq!(rx.try_recv().unwrap(), HubEvent::Connected);
        assert_eq!(rx.try_recv().unwrap(), HubEvent::Disconnected);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn should_not_restore_connection_while_unreachable() {
        let (hub, mut rx) = attached();
        hub.open_session();
        hub.drop_connection();
        hub.set_reachable(false);
        hub.restore_connection();

        assert!(!hub.is_connected());
        assert!(!hub.open_session());
        let events: Vec<_> = std::iter::from_fn(|| rx.try_recv().ok()).collect();
        assert_eq!(events, vec![HubEvent::Connected, HubEvent::Disconnected]);
    }

    #[test]
    fn should_announce_activity_changes_once() {
        let (hub, mut rx) = attached();
        hub.press_activity(24_533_120);
        hub.press_activity(24_533_120);

        assert_eq!(
            rx.try_recv().unwrap(),
            HubEvent::ActivityChanged(ActivityRecord::new(24_533_120, "Watch TV"))
        );
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn should_announce_replaced_config() {
        let (hub, mut rx) = attached();
        let config = ConfigSnapshot::new([ActivityRecord::new(1, "Games")], []);

        hub.replace_config(config.clone());

        assert_eq!(hub.config(), config);
        assert_eq!(rx.try_recv().unwrap(), HubEvent::ConfigUpdated(config));
    }

    #[test]
    fn should_fail_unknown_commands() {
        let hub = VirtualHub::demo();
        assert!(hub.transmit(38_794_003, "Mute").is_success());

        let failed = hub.transmit(38_794_004, "Mute");
        assert_eq!(failed.code, UNKNOWN_COMMAND);
        assert_eq!(hub.sent_commands().len(), 2);
    }

    #[test]
    fn should_drop_events_without_blocking_when_channel_is_full() {
        let hub = VirtualHub::demo();
        let (tx, _rx) = mpsc::channel(1);
        hub.attach(tx);
        hub.press_activity(24_533_120);
        hub.press_activity(24_533_121);
        assert_eq!(hub.current_activity().name, "Listen to Music");
    }
}
