//! Hub manager: owns one hub session and everything derived from it.
//!
//! A manager runs two background tasks once [`HubManager::start`] is called:
//!
//! - the **event loop** drains the client's [`HubEvent`] channel, drives the
//!   [`ConnectionTracker`] and fires the grace-period deadline;
//! - the **persistence worker** writes accepted snapshots to the
//!   [`ConfigStore`] one at a time, in the order they were accepted. Its
//!   queue is unbounded so a stalled store never holds up the event loop.
//!
//! Every observable change ends with a state push on the [`EventPublisher`].

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;

use remotehub_domain::command::{self, CommandResult, SendCommand};
use remotehub_domain::error::{ConstructionError, RemoteHubError, RequestError, ResolutionError, TransportError};
use remotehub_domain::event::Event;
use remotehub_domain::id::EntityId;
use remotehub_domain::remote::{ConnectionState, RemoteState};
use remotehub_domain::settings::HubSettings;
use remotehub_domain::snapshot::{ActivityRecord, ConfigSnapshot, IdentifierRole, POWER_OFF_ID};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::ports::hub_client::HUB_EVENT_CAPACITY;
use crate::ports::{ConfigStore, EventPublisher, HubClient, HubConnector, HubEvent};
use crate::services::connection_tracker::{ConnectionTracker, GRACE_PERIOD};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

struct Inner<C, S, P> {
    settings: HubSettings,
    entity_id: EntityId,
    config_path: PathBuf,
    delay: Duration,
    grace: Duration,
    client: C,
    store: S,
    publisher: P,
    state: RwLock<RemoteState>,
    snapshot: RwLock<Option<Arc<ConfigSnapshot>>>,
    events: Mutex<Option<mpsc::Receiver<HubEvent>>>,
    persist_tx: mpsc::UnboundedSender<Arc<ConfigSnapshot>>,
    persist_rx: Mutex<Option<mpsc::UnboundedReceiver<Arc<ConfigSnapshot>>>>,
    cancel: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

/// Connection and state-sync manager for one hub.
///
/// Cheap to clone; clones share the same session and state.
pub struct HubManager<C, S, P> {
    inner: Arc<Inner<C, S, P>>,
}

impl<C, S, P> Clone for HubManager<C, S, P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C, S, P> HubManager<C, S, P>
where
    C: HubClient + 'static,
    S: ConfigStore + 'static,
    P: EventPublisher + Send + Sync + 'static,
{
    /// Build a manager and open its client through `connector`.
    ///
    /// The snapshot is written to `config_dir` under
    /// [`HubSettings::config_file_name`]. Nothing touches the network until
    /// [`start`](Self::start).
    ///
    /// # Errors
    ///
    /// Returns [`ConstructionError`] for invalid settings or when the
    /// connector refuses them.
    pub fn new<K>(
        settings: HubSettings,
        entity_id: EntityId,
        config_dir: &Path,
        connector: &K,
        store: S,
        publisher: P,
    ) -> Result<Self, ConstructionError>
    where
        K: HubConnector<Client = C>,
    {
        settings.validate()?;
        let delay = settings.command_delay()?;
        let (events_tx, events_rx) = mpsc::channel(HUB_EVENT_CAPACITY);
        let client = connector.open(&settings, events_tx)?;
        let (persist_tx, persist_rx) = mpsc::unbounded_channel();
        let config_path = config_dir.join(settings.config_file_name());

        Ok(Self {
            inner: Arc::new(Inner {
                settings,
                entity_id,
                config_path,
                delay,
                grace: GRACE_PERIOD,
                client,
                store,
                publisher,
                state: RwLock::new(RemoteState::default()),
                snapshot: RwLock::new(None),
                events: Mutex::new(Some(events_rx)),
                persist_tx,
                persist_rx: Mutex::new(Some(persist_rx)),
                cancel: CancellationToken::new(),
                tasks: Mutex::new(Vec::new()),
            }),
        })
    }

    /// Connect, load the configuration and publish the initial state.
    ///
    /// The snapshot is written to disk only if no file exists yet. Failing to
    /// fetch the configuration or the current activity is logged, not fatal.
    ///
    /// # Errors
    ///
    /// Returns [`ConstructionError::NotReady`] when the hub cannot be reached.
    #[tracing::instrument(skip(self), fields(hub = %self.name()))]
    pub async fn start(&self) -> Result<(), RemoteHubError> {
        self.spawn_tasks();

        info!(
            host = %self.inner.settings.host,
            port = self.inner.settings.port,
            default_activity = ?self.inner.settings.default_activity,
            "connecting to hub"
        );
        self.inner
            .client
            .connect()
            .await
            .map_err(ConstructionError::NotReady)?;

        match self.inner.client.get_config().await {
            Ok(snapshot) => {
                let snapshot = self.replace_snapshot(snapshot);
                if self.inner.store.exists(&self.inner.config_path).await {
                    debug!(path = %self.inner.config_path.display(), "configuration file already present");
                } else {
                    self.persist(snapshot);
                }
            }
            Err(err) => warn!(error = %err, "unable to fetch hub configuration"),
        }

        self.refresh_activity().await;
        self.publish_state().await;
        Ok(())
    }

    /// Start `activity`, or the configured default when `None`.
    ///
    /// Resolving to `-1` powers the hub off. The new state is published once
    /// the hub reports the activity change.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError::NoActivity`] without an activity or default,
    /// [`ResolutionError`] for an unknown identifier, or a transport error.
    #[tracing::instrument(skip(self), fields(hub = %self.name()))]
    pub async fn turn_on(&self, activity: Option<&str>) -> Result<(), RemoteHubError> {
        let Some(raw) = activity.or(self.inner.settings.default_activity.as_deref()) else {
            error!("no activity given to turn_on and no default activity configured");
            return Err(RequestError::NoActivity.into());
        };
        let activity_id = self.resolve(IdentifierRole::Activity, raw)?;

        if activity_id == POWER_OFF_ID {
            self.inner.client.power_off().await.inspect_err(log_transport)?;
        } else {
            debug!(activity_id, "starting activity");
            self.inner
                .client
                .start_activity(activity_id)
                .await
                .inspect_err(log_transport)?;
        }
        Ok(())
    }

    /// Power everything off.
    ///
    /// # Errors
    ///
    /// Returns a transport error when the hub rejects the request.
    #[tracing::instrument(skip(self), fields(hub = %self.name()))]
    pub async fn turn_off(&self) -> Result<(), RemoteHubError> {
        self.inner.client.power_off().await.inspect_err(log_transport)?;
        Ok(())
    }

    /// Send one or more commands to a device.
    ///
    /// Failed commands are logged and returned alongside successful ones.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError`] for a malformed request, [`ResolutionError`]
    /// for an unknown device, or a transport error.
    #[tracing::instrument(skip(self, request), fields(hub = %self.name(), device = %request.device))]
    pub async fn send_command(&self, request: &SendCommand) -> Result<Vec<CommandResult>, RemoteHubError> {
        request
            .validate()
            .inspect_err(|err| error!(error = %err, "invalid send_command request"))?;
        let device_id = self.resolve(IdentifierRole::Device, &request.device)?;
        let delay = match request.delay_secs {
            Some(secs) => command::delay_from_secs(secs)?,
            None => self.inner.delay,
        };

        let steps = command::sequence(device_id, &request.commands, request.num_repeats, delay);
        debug!(device_id, steps = steps.len(), "sending command batch");
        let results = self
            .inner
            .client
            .send_commands(&steps)
            .await
            .inspect_err(log_transport)?;

        for failed in results.iter().filter(|r| !r.is_success()) {
            warn!(
                device_id = failed.device_id,
                command = %failed.command,
                code = failed.code,
                "sending command failed: {}",
                failed.message
            );
        }
        Ok(results)
    }

    /// Ask the hub to sync with its cloud account, then reload its
    /// configuration.
    ///
    /// # Errors
    ///
    /// Returns a transport error when the sync or the reload fails.
    #[tracing::instrument(skip(self), fields(hub = %self.name()))]
    pub async fn sync(&self) -> Result<(), RemoteHubError> {
        debug!("syncing hub with its account");
        self.inner.client.sync().await.inspect_err(log_transport)?;
        let snapshot = self.inner.client.get_config().await.inspect_err(log_transport)?;
        self.accept_config(snapshot).await;
        Ok(())
    }

    /// Poll the hub for its current activity and publish the state.
    ///
    /// Loads the configuration first when none was ever fetched.
    ///
    /// # Errors
    ///
    /// Returns a transport error when the hub cannot be queried.
    #[tracing::instrument(skip(self), fields(hub = %self.name()))]
    pub async fn update(&self) -> Result<(), RemoteHubError> {
        if self.snapshot().is_none() {
            let snapshot = self.inner.client.get_config().await?;
            self.replace_snapshot(snapshot);
        }
        let activity = self.inner.client.current_activity().await?;
        self.apply_activity(&activity);
        self.publish_state().await;
        Ok(())
    }

    /// Close the session and stop the background tasks.
    ///
    /// Snapshots already queued for persistence are written first.
    ///
    /// # Errors
    ///
    /// Returns the transport error of the disconnect; tasks are stopped
    /// regardless.
    #[tracing::instrument(skip(self), fields(hub = %self.name()))]
    pub async fn shutdown(&self) -> Result<(), TransportError> {
        info!("closing hub connection");
        let result = self.inner.client.disconnect().await;
        self.inner.cancel.cancel();

        let tasks = std::mem::take(&mut *lock(&self.inner.tasks));
        for task in tasks {
            if let Err(err) = task.await {
                warn!(error = %err, "hub task ended abnormally");
            }
        }
        result
    }

    /// Push the current state to observers.
    pub async fn publish_state(&self) {
        let state = self.state();
        debug!(hub = %self.name(), state = %state.entity_state(), "publishing state");
        let event = Event::state_changed(self.inner.entity_id.clone(), &state);
        if let Err(err) = self.inner.publisher.publish(event).await {
            warn!(hub = %self.name(), error = %err, "unable to publish state");
        }
    }

    fn spawn_tasks(&self) {
        let events = lock(&self.inner.events).take();
        let persist = lock(&self.inner.persist_rx).take();
        let mut tasks = lock(&self.inner.tasks);
        if let Some(events) = events {
            tasks.push(tokio::spawn(self.clone().run_events(events)));
        }
        if let Some(persist) = persist {
            tasks.push(tokio::spawn(self.clone().run_persistence(persist)));
        }
    }

    async fn run_events(self, mut events: mpsc::Receiver<HubEvent>) {
        let mut tracker = ConnectionTracker::new(self.inner.grace);
        loop {
            let deadline = tracker.deadline();
            tokio::select! {
                () = self.inner.cancel.cancelled() => break,
                event = events.recv() => {
                    let Some(event) = event else { break };
                    self.handle_event(&mut tracker, event).await;
                }
                () = sleep_until(deadline) => self.on_grace_elapsed(&mut tracker).await,
            }
        }
        debug!(hub = %self.name(), "hub event loop stopped");
    }

    async fn handle_event(&self, tracker: &mut ConnectionTracker, event: HubEvent) {
        match event {
            HubEvent::Connected => {
                let refresh = tracker.on_connected();
                debug!(hub = %self.name(), "connected to hub");
                if refresh {
                    info!(hub = %self.name(), "hub is back, reloading configuration");
                    match self.inner.client.get_config().await {
                        Ok(snapshot) => {
                            self.install_snapshot(snapshot).await;
                            self.refresh_activity().await;
                        }
                        Err(err) => warn!(hub = %self.name(), error = %err, "unable to reload configuration"),
                    }
                }
                self.set_connection(tracker.state(), true);
                if refresh {
                    self.publish_state().await;
                }
            }
            HubEvent::Disconnected => {
                if tracker.on_disconnected(Instant::now()) {
                    debug!(
                        hub = %self.name(),
                        grace = ?tracker.grace(),
                        "disconnected from hub, waiting before reporting unavailable"
                    );
                    self.set_connection(tracker.state(), false);
                }
            }
            HubEvent::ActivityChanged(activity) => {
                self.apply_activity(&activity);
                self.publish_state().await;
            }
            HubEvent::ConfigUpdated(snapshot) => {
                debug!(hub = %self.name(), "hub configuration changed");
                self.accept_config(snapshot).await;
            }
        }
    }

    async fn on_grace_elapsed(&self, tracker: &mut ConnectionTracker) {
        if tracker.on_grace_elapsed() {
            info!(hub = %self.name(), "hub still disconnected, reporting unavailable");
            self.set_connection(tracker.state(), false);
            self.publish_state().await;
        }
    }

    async fn run_persistence(self, mut queue: mpsc::UnboundedReceiver<Arc<ConfigSnapshot>>) {
        loop {
            tokio::select! {
                biased;
                snapshot = queue.recv() => {
                    let Some(snapshot) = snapshot else { break };
                    self.write_snapshot(&snapshot).await;
                }
                () = self.inner.cancel.cancelled() => break,
            }
        }
    }

    async fn write_snapshot(&self, snapshot: &ConfigSnapshot) {
        let path = &self.inner.config_path;
        debug!(hub = %self.name(), path = %path.display(), "writing hub configuration");
        if let Err(err) = self.inner.store.save(path, snapshot).await {
            error!(hub = %self.name(), path = %path.display(), error = %err, "unable to write hub configuration");
        }
    }

    /// Install a new snapshot, refresh the activity once and publish once.
    async fn accept_config(&self, snapshot: ConfigSnapshot) {
        self.install_snapshot(snapshot).await;
        self.refresh_activity().await;
        self.publish_state().await;
    }

    /// Replace the snapshot, queue it for writing and announce it.
    async fn install_snapshot(&self, snapshot: ConfigSnapshot) {
        let snapshot = self.replace_snapshot(snapshot);
        let event = Event::config_changed(
            self.inner.entity_id.clone(),
            snapshot.activities().count(),
            snapshot.devices().count(),
        );
        self.persist(snapshot);
        if let Err(err) = self.inner.publisher.publish(event).await {
            warn!(hub = %self.name(), error = %err, "unable to publish configuration change");
        }
    }

    fn replace_snapshot(&self, snapshot: ConfigSnapshot) -> Arc<ConfigSnapshot> {
        let snapshot = Arc::new(snapshot);
        *self.inner.snapshot.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::clone(&snapshot));
        snapshot
    }

    /// Queue `snapshot` for the persistence worker without waiting on the store.
    fn persist(&self, snapshot: Arc<ConfigSnapshot>) {
        if self.inner.persist_tx.send(snapshot).is_err() {
            warn!(hub = %self.name(), "persistence worker stopped, configuration not written");
        }
    }

    async fn refresh_activity(&self) {
        match self.inner.client.current_activity().await {
            Ok(activity) => self.apply_activity(&activity),
            Err(err) => warn!(hub = %self.name(), error = %err, "unable to read current activity"),
        }
    }

    fn apply_activity(&self, activity: &ActivityRecord) {
        debug!(hub = %self.name(), activity = %activity.name, "current activity");
        self.write_state(|state| state.current_activity = Some(activity.name.clone()));
    }

    fn set_connection(&self, connection: ConnectionState, available: bool) {
        self.write_state(|state| {
            state.connection = connection;
            state.available = available;
        });
    }

    fn write_state(&self, f: impl FnOnce(&mut RemoteState)) {
        f(&mut self.inner.state.write().unwrap_or_else(PoisonError::into_inner));
    }

    fn resolve(&self, role: IdentifierRole, raw: &str) -> Result<i64, ResolutionError> {
        let resolved = match self.snapshot() {
            Some(snapshot) => snapshot.resolve(role, raw),
            None => Err(ResolutionError {
                role,
                input: raw.to_string(),
            }),
        };
        if let Err(err) = &resolved {
            error!(hub = %self.name(), error = %err, "{role} {raw:?} is invalid");
        }
        resolved
    }
}

impl<C, S, P> HubManager<C, S, P> {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.settings.name
    }

    #[must_use]
    pub fn entity_id(&self) -> &EntityId {
        &self.inner.entity_id
    }

    #[must_use]
    pub fn settings(&self) -> &HubSettings {
        &self.inner.settings
    }

    /// `(host, port)` of the managed hub.
    #[must_use]
    pub fn address(&self) -> (&str, u16) {
        self.inner.settings.address()
    }

    #[must_use]
    pub fn config_path(&self) -> &Path {
        &self.inner.config_path
    }

    /// Managers push their state; the host never needs to poll them.
    #[must_use]
    pub fn is_pollable(&self) -> bool {
        false
    }

    #[must_use]
    pub fn state(&self) -> RemoteState {
        self.inner
            .state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    #[must_use]
    pub fn is_on(&self) -> bool {
        self.state().is_on()
    }

    #[must_use]
    pub fn is_available(&self) -> bool {
        self.state().available
    }

    #[must_use]
    pub fn current_activity(&self) -> Option<String> {
        self.state().current_activity
    }

    #[must_use]
    pub fn attributes(&self) -> serde_json::Value {
        self.state().attributes()
    }

    /// Last accepted configuration, if any.
    #[must_use]
    pub fn snapshot(&self) -> Option<Arc<ConfigSnapshot>> {
        self.inner
            .snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

fn log_transport(err: &TransportError) {
    warn!(error = %err, "hub request failed");
}
