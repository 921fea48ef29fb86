//! In-memory port implementations shared by service tests.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use remotehub_domain::command::{CommandResult, CommandStep};
use remotehub_domain::error::{ConstructionError, PersistenceError, TransportError};
use remotehub_domain::event::{Event, EventType};
use remotehub_domain::settings::HubSettings;
use remotehub_domain::snapshot::{ActivityRecord, ConfigSnapshot, DeviceRecord};
use tokio::sync::broadcast;

use crate::ports::{ConfigStore, HubClient, HubConnector, HubEvent, HubEventSender};

pub(crate) fn demo_snapshot() -> ConfigSnapshot {
    ConfigSnapshot::new(
        [
            ActivityRecord::power_off(),
            ActivityRecord::new(100, "Watch TV"),
            ActivityRecord::new(200, "Play Game"),
        ],
        [
            DeviceRecord::new(300, "TV").with_commands(["PowerOn", "Mute", "VolumeUp"]),
            DeviceRecord::new(400, "Receiver").with_commands(["PowerOn"]),
        ],
    )
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Call {
    Connect,
    Disconnect,
    GetConfig,
    CurrentActivity,
    StartActivity(i64),
    PowerOff,
    SendCommands(Vec<CommandStep>),
    Sync,
}

#[derive(Debug)]
struct FakeHubState {
    config: ConfigSnapshot,
    current: ActivityRecord,
    calls: Vec<Call>,
    reachable: bool,
    failing_commands: HashSet<String>,
    events: Option<HubEventSender>,
}

/// Scriptable hub shared between a test and the client it backs.
#[derive(Debug, Clone)]
pub(crate) struct FakeHub {
    state: Arc<Mutex<FakeHubState>>,
}

impl Default for FakeHub {
    fn default() -> Self {
        Self {
            state: Arc::new(Mutex::new(FakeHubState {
                config: demo_snapshot(),
                current: ActivityRecord::power_off(),
                calls: Vec::new(),
                reachable: true,
                failing_commands: HashSet::new(),
                events: None,
            })),
        }
    }
}

impl FakeHub {
    fn with<T>(&self, f: impl FnOnce(&mut FakeHubState) -> T) -> T {
        f(&mut self.state.lock().unwrap())
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.with(|s| s.calls.clone())
    }

    pub(crate) fn count(&self, call: &Call) -> usize {
        self.with(|s| s.calls.iter().filter(|c| *c == call).count())
    }

    pub(crate) fn set_reachable(&self, reachable: bool) {
        self.with(|s| s.reachable = reachable);
    }

    pub(crate) fn set_config(&self, config: ConfigSnapshot) {
        self.with(|s| s.config = config);
    }

    pub(crate) fn set_current(&self, activity: ActivityRecord) {
        self.with(|s| s.current = activity);
    }

    pub(crate) fn fail_command(&self, command: &str) {
        self.with(|s| s.failing_commands.insert(command.to_string()));
    }

    pub(crate) async fn emit(&self, event: HubEvent) {
        let sender = self.with(|s| s.events.clone()).expect("hub was never opened");
        sender.send(event).await.unwrap();
    }

    fn record(&self, call: Call) -> Result<(), TransportError> {
        self.with(|s| {
            s.calls.push(call);
            if s.reachable {
                Ok(())
            } else {
                Err(TransportError::NotConnected)
            }
        })
    }
}

pub(crate) struct FakeClient {
    hub: FakeHub,
}

impl HubClient for FakeClient {
    async fn connect(&self) -> Result<(), TransportError> {
        self.hub.record(Call::Connect)?;
        let sender = self.hub.with(|s| s.events.clone());
        if let Some(sender) = sender {
            let _ = sender.send(HubEvent::Connected).await;
        }
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        self.hub.record(Call::Disconnect)
    }

    async fn get_config(&self) -> Result<ConfigSnapshot, TransportError> {
        self.hub.record(Call::GetConfig)?;
        Ok(self.hub.with(|s| s.config.clone()))
    }

    async fn current_activity(&self) -> Result<ActivityRecord, TransportError> {
        self.hub.record(Call::CurrentActivity)?;
        Ok(self.hub.with(|s| s.current.clone()))
    }

    async fn start_activity(&self, activity_id: i64) -> Result<(), TransportError> {
        self.hub.record(Call::StartActivity(activity_id))
    }

    async fn power_off(&self) -> Result<(), TransportError> {
        self.hub.record(Call::PowerOff)
    }

    async fn send_commands(&self, steps: &[CommandStep]) -> Result<Vec<CommandResult>, TransportError> {
        self.hub.record(Call::SendCommands(steps.to_vec()))?;
        let failing = self.hub.with(|s| s.failing_commands.clone());
        Ok(steps
            .iter()
            .filter_map(|step| match step {
                CommandStep::Send { device_id, command } if failing.contains(command) => Some(CommandResult {
                    code: 417,
                    message: "rejected".to_string(),
                    ..CommandResult::ok(*device_id, command.as_str())
                }),
                CommandStep::Send { device_id, command } => Some(CommandResult::ok(*device_id, command.as_str())),
                CommandStep::Delay(_) => None,
            })
            .collect())
    }

    async fn sync(&self) -> Result<(), TransportError> {
        self.hub.record(Call::Sync)
    }
}

/// Hands out one [`FakeHub`] per host.
#[derive(Debug, Default)]
pub(crate) struct FakeConnector {
    hubs: Mutex<HashMap<String, FakeHub>>,
    opened: Mutex<Vec<HubSettings>>,
}

impl FakeConnector {
    pub(crate) fn hub(&self, host: &str) -> FakeHub {
        self.hubs.lock().unwrap().entry(host.to_string()).or_default().clone()
    }

    pub(crate) fn opened(&self) -> Vec<HubSettings> {
        self.opened.lock().unwrap().clone()
    }
}

impl HubConnector for FakeConnector {
    type Client = FakeClient;

    fn open(&self, settings: &HubSettings, events: HubEventSender) -> Result<FakeClient, ConstructionError> {
        let hub = self.hub(&settings.host);
        hub.with(|s| s.events = Some(events));
        self.opened.lock().unwrap().push(settings.clone());
        Ok(FakeClient { hub })
    }
}

/// Store that records every write and remembers which paths exist.
#[derive(Debug, Default)]
pub(crate) struct RecordingStore {
    writes: Mutex<Vec<(PathBuf, ConfigSnapshot)>>,
    existing: Mutex<HashSet<PathBuf>>,
    failing: Mutex<bool>,
    stalled: Mutex<bool>,
}

impl RecordingStore {
    pub(crate) fn with_existing(path: impl Into<PathBuf>) -> Self {
        let store = Self::default();
        store.existing.lock().unwrap().insert(path.into());
        store
    }

    pub(crate) fn fail_writes(&self) {
        *self.failing.lock().unwrap() = true;
    }

    /// Make every later `save` hang forever.
    pub(crate) fn stall_writes(&self) {
        *self.stalled.lock().unwrap() = true;
    }

    pub(crate) fn writes(&self) -> Vec<(PathBuf, ConfigSnapshot)> {
        self.writes.lock().unwrap().clone()
    }
}

impl ConfigStore for RecordingStore {
    async fn exists(&self, path: &Path) -> bool {
        self.existing.lock().unwrap().contains(path)
    }

    async fn save(&self, path: &Path, snapshot: &ConfigSnapshot) -> Result<(), PersistenceError> {
        let stalled = *self.stalled.lock().unwrap();
        if stalled {
            std::future::pending::<()>().await;
        }
        if *self.failing.lock().unwrap() {
            return Err(PersistenceError::Write {
                path: path.to_path_buf(),
                source: std::io::Error::other("disk full"),
            });
        }
        self.writes.lock().unwrap().push((path.to_path_buf(), snapshot.clone()));
        self.existing.lock().unwrap().insert(path.to_path_buf());
        Ok(())
    }
}

/// Let spawned tasks run until idle.
pub(crate) async fn settle() {
    tokio::time::sleep(Duration::from_millis(10)).await;
}

pub(crate) fn drain(rx: &mut broadcast::Receiver<Event>) -> Vec<Event> {
    std::iter::from_fn(|| rx.try_recv().ok()).collect()
}

pub(crate) fn state_pushes(rx: &mut broadcast::Receiver<Event>) -> Vec<Event> {
    drain(rx)
        .into_iter()
        .filter(|e| e.event_type == EventType::StateChanged)
        .collect()
}
