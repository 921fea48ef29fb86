//! Device registry: the set of running hub managers.
//!
//! Hubs arrive from two sources: static entries and discovery
//! announcements. A static entry without a host is kept as a pending
//! override until a hub with the same name is discovered. At most one
//! manager runs per `(host, port)`.

use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};

use remotehub_domain::command::SendCommand;
use remotehub_domain::error::{ConstructionError, NotFoundError, RemoteHubError, RequestError};
use remotehub_domain::id::EntityId;
use remotehub_domain::remote::RemoteState;
use remotehub_domain::settings::{DiscoveryInfo, HubEntry, HubSettings, PendingOverride};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, error, info, warn};

use crate::ports::{ConfigStore, EventPublisher, HubConnector};
use crate::services::hub_manager::HubManager;

pub const SERVICE_TURN_ON: &str = "turn_on";
pub const SERVICE_TURN_OFF: &str = "turn_off";
pub const SERVICE_SEND_COMMAND: &str = "send_command";
pub const SERVICE_SYNC: &str = "sync";

/// Outcome of offering a hub to the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Registration {
    /// A manager was created, connected and published its first state.
    Started(EntityId),
    /// The entry has no host; kept until a matching discovery.
    Deferred,
    /// A manager already runs for this `(host, port)`.
    AlreadyKnown(EntityId),
}

#[derive(Debug, Deserialize)]
struct TurnOnData {
    #[serde(default)]
    activity: Option<String>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct DeviceRegistry<K: HubConnector, S, P> {
    connector: K,
    store: S,
    publisher: P,
    config_dir: PathBuf,
    pending: Mutex<Vec<PendingOverride>>,
    managers: Mutex<Vec<HubManager<K::Client, S, P>>>,
    registration: tokio::sync::Mutex<()>,
}

impl<K, S, P> DeviceRegistry<K, S, P>
where
    K: HubConnector,
    S: ConfigStore + Clone + 'static,
    P: EventPublisher + Clone + Send + Sync + 'static,
{
    /// Snapshots are written under `config_dir`.
    pub fn new(connector: K, store: S, publisher: P, config_dir: impl Into<PathBuf>) -> Self {
        Self {
            connector,
            store,
            publisher,
            config_dir: config_dir.into(),
            pending: Mutex::new(Vec::new()),
            managers: Mutex::new(Vec::new()),
            registration: tokio::sync::Mutex::new(()),
        }
    }

    /// Register a statically configured hub.
    ///
    /// # Errors
    ///
    /// Returns [`ConstructionError`] when the manager cannot be built or
    /// the hub cannot be reached.
    #[tracing::instrument(skip(self, entry), fields(hub = %entry.name))]
    pub async fn add_static(&self, entry: HubEntry) -> Result<Registration, RemoteHubError> {
        match entry.into_settings() {
            Ok(settings) => self.register(settings).await,
            Err(pending) => {
                debug!("no host configured, waiting for discovery");
                let mut cached = lock(&self.pending);
                cached.retain(|p| p.name != pending.name);
                cached.push(pending);
                Ok(Registration::Deferred)
            }
        }
    }

    /// Register a hub announced by discovery.
    ///
    /// A pending override with the same name supplies port, default activity
    /// and delay; it is consumed once the manager starts.
    ///
    /// # Errors
    ///
    /// Returns [`ConstructionError`] when the manager cannot be built or
    /// the hub cannot be reached.
    #[tracing::instrument(skip(self, info), fields(hub = %info.name, host = %info.host))]
    pub async fn on_discovered(&self, info: DiscoveryInfo) -> Result<Registration, RemoteHubError> {
        let pending = lock(&self.pending).iter().find(|p| p.name == info.name).cloned();
        let name = info.name.clone();
        let registration = self.register(info.into_settings(pending)).await?;
        if matches!(registration, Registration::Started(_)) {
            lock(&self.pending).retain(|p| p.name != name);
        }
        Ok(registration)
    }

    async fn register(&self, settings: HubSettings) -> Result<Registration, RemoteHubError> {
        let _guard = self.registration.lock().await;

        if let Some(existing) = self.find(|m| m.address() == settings.address()) {
            debug!(
                host = %settings.host,
                port = settings.port,
                existing = %existing.entity_id(),
                "hub already managed"
            );
            return Ok(Registration::AlreadyKnown(existing.entity_id().clone()));
        }

        let entity_id = self.unique_entity_id(&settings.name);
        let manager = HubManager::new(
            settings,
            entity_id.clone(),
            &self.config_dir,
            &self.connector,
            self.store.clone(),
            self.publisher.clone(),
        )?;

        if let Err(err) = manager.start().await {
            error!(error = %err, "unable to start hub manager");
            if let Err(err) = manager.shutdown().await {
                warn!(entity_id = %entity_id, error = %err, "error while closing hub connection");
            }
            return Err(match err {
                RemoteHubError::Transport(transport) => ConstructionError::NotReady(transport).into(),
                other => other,
            });
        }

        info!(entity_id = %entity_id, "hub registered");
        lock(&self.managers).push(manager);
        Ok(Registration::Started(entity_id))
    }

    fn unique_entity_id(&self, name: &str) -> EntityId {
        let base = EntityId::for_remote(name);
        let managers = lock(&self.managers);
        let taken = |candidate: &EntityId| managers.iter().any(|m| m.entity_id() == candidate);

        let mut candidate = base.clone();
        let mut suffix = 2;
        while taken(&candidate) {
            candidate = base.with_suffix(suffix);
            suffix += 1;
        }
        candidate
    }

    fn find(&self, predicate: impl Fn(&HubManager<K::Client, S, P>) -> bool) -> Option<HubManager<K::Client, S, P>> {
        lock(&self.managers).iter().find(|m| predicate(m)).cloned()
    }

    #[must_use]
    pub fn get(&self, entity_id: &EntityId) -> Option<HubManager<K::Client, S, P>> {
        self.find(|m| m.entity_id() == entity_id)
    }

    #[must_use]
    pub fn managers(&self) -> Vec<HubManager<K::Client, S, P>> {
        lock(&self.managers).clone()
    }

    #[must_use]
    pub fn entity_ids(&self) -> Vec<EntityId> {
        lock(&self.managers).iter().map(|m| m.entity_id().clone()).collect()
    }

    /// Names of static entries still waiting for discovery.
    #[must_use]
    pub fn pending_names(&self) -> Vec<String> {
        lock(&self.pending).iter().map(|p| p.name.clone()).collect()
    }

    /// Dispatch a host service call to the manager owning `entity_id`.
    ///
    /// `data` may be `null` for services without arguments. Returns the
    /// manager's state after the call.
    ///
    /// # Errors
    ///
    /// Returns [`NotFoundError`] for an unknown entity,
    /// [`RequestError::UnknownService`] or [`RequestError::InvalidData`] for
    /// a malformed call, or whatever the manager operation returns.
    #[tracing::instrument(skip(self, data))]
    pub async fn handle_service_call(
        &self,
        entity_id: &EntityId,
        service: &str,
        data: serde_json::Value,
    ) -> Result<RemoteState, RemoteHubError> {
        let manager = self
            .get(entity_id)
            .ok_or_else(|| NotFoundError(entity_id.clone()))?;

        match service {
            SERVICE_TURN_ON => {
                let data: TurnOnData = service_data(data)?;
                manager.turn_on(data.activity.as_deref()).await?;
            }
            SERVICE_TURN_OFF => manager.turn_off().await?,
            SERVICE_SEND_COMMAND => {
                let request: SendCommand = service_data(data)?;
                manager.send_command(&request).await?;
            }
            SERVICE_SYNC => manager.sync().await?,
            other => {
                warn!(service = other, "unknown service");
                return Err(RequestError::UnknownService(other.to_string()).into());
            }
        }
        Ok(manager.state())
    }

    /// Sync the targeted hubs (all when `targets` is `None`) and publish
    /// their state.
    ///
    /// Failures are logged per hub and do not stop the others. Returns the
    /// entities that synced successfully.
    #[tracing::instrument(skip(self))]
    pub async fn sync_all(&self, targets: Option<&[EntityId]>) -> Vec<EntityId> {
        let mut synced = Vec::new();
        for manager in self.managers() {
            if targets.is_some_and(|t| !t.contains(manager.entity_id())) {
                continue;
            }
            if let Err(err) = manager.sync().await {
                error!(entity_id = %manager.entity_id(), error = %err, "hub sync failed");
                continue;
            }
            if let Err(err) = manager.update().await {
                warn!(entity_id = %manager.entity_id(), error = %err, "unable to refresh hub after sync");
                manager.publish_state().await;
            }
            synced.push(manager.entity_id().clone());
        }
        synced
    }

    /// Shut every manager down, best effort.
    pub async fn shutdown(&self) {
        let managers = std::mem::take(&mut *lock(&self.managers));
        info!(count = managers.len(), "shutting down hub managers");
        for manager in managers {
            if let Err(err) = manager.shutdown().await {
                warn!(entity_id = %manager.entity_id(), error = %err, "error while closing hub connection");
            }
        }
    }
}

fn service_data<T: DeserializeOwned>(data: serde_json::Value) -> Result<T, RequestError> {
    let data = if data.is_null() {
        serde_json::Value::Object(serde_json::Map::new())
    } else {
        data
    };
    serde_json::from_value(data).map_err(RequestError::InvalidData)
}
