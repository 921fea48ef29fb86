//! Hub settings: everything needed to construct one hub manager.
//!
//! Settings come from two places:
//! - a static [`HubEntry`] (from the host's configuration file), which may or
//!   may not carry a host address;
//! - a [`DiscoveryInfo`] announcement, which carries only name and host.
//!
//! Static entries without a host become [`PendingOverride`]s that are merged
//! into the first discovery announcement bearing the same name.

use std::time::Duration;

use serde::Deserialize;

use crate::error::ConstructionError;
use crate::slug::slugify;

/// Well-known port of the hub's local API.
pub const DEFAULT_PORT: u16 = 8088;

/// Default pause between consecutive commands, in seconds.
pub const DEFAULT_DELAY_SECS: f64 = 0.4;

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_delay_secs() -> f64 {
    DEFAULT_DELAY_SECS
}

/// A statically configured hub, as written by the user.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HubEntry {
    pub name: String,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Activity started by `turn_on` when none is given.
    #[serde(default)]
    pub activity: Option<String>,
    #[serde(default = "default_delay_secs")]
    pub delay_secs: f64,
}

impl HubEntry {
    /// An entry with default port and delay and no host.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            host: None,
            port: DEFAULT_PORT,
            activity: None,
            delay_secs: DEFAULT_DELAY_SECS,
        }
    }

    #[must_use]
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    #[must_use]
    pub fn with_activity(mut self, activity: impl Into<String>) -> Self {
        self.activity = Some(activity.into());
        self
    }

    #[must_use]
    pub fn with_delay_secs(mut self, delay_secs: f64) -> Self {
        self.delay_secs = delay_secs;
        self
    }

    /// Split the entry into ready-to-use settings, or a pending override when
    /// no host is configured.
    ///
    /// # Errors
    ///
    /// Returns the entry as a [`PendingOverride`] when it has no host.
    pub fn into_settings(self) -> Result<HubSettings, PendingOverride> {
        match self.host {
            Some(host) => Ok(HubSettings {
                name: self.name,
                host,
                port: self.port,
                default_activity: self.activity,
                delay_secs: self.delay_secs,
            }),
            None => Err(PendingOverride {
                name: self.name,
                activity: self.activity,
                delay_secs: self.delay_secs,
                port: self.port,
            }),
        }
    }
}

/// A hub announced by the discovery listener.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DiscoveryInfo {
    pub name: String,
    pub host: String,
}

impl DiscoveryInfo {
    #[must_use]
    pub fn new(name: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            host: host.into(),
        }
    }

    /// Build settings for the announced hub, applying `pending` when present.
    #[must_use]
    pub fn into_settings(self, pending: Option<PendingOverride>) -> HubSettings {
        let (port, default_activity, delay_secs) = match pending {
            Some(p) => (p.port, p.activity, p.delay_secs),
            None => (DEFAULT_PORT, None, DEFAULT_DELAY_SECS),
        };
        HubSettings {
            name: self.name,
            host: self.host,
            port,
            default_activity,
            delay_secs,
        }
    }
}

/// Static settings cached until a hub with the same name is discovered.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingOverride {
    pub name: String,
    pub activity: Option<String>,
    pub delay_secs: f64,
    pub port: u16,
}

/// Resolved settings of one hub manager.
#[derive(Debug, Clone, PartialEq)]
pub struct HubSettings {
    pub name: String,
    pub host: String,
    pub port: u16,
    pub default_activity: Option<String>,
    pub delay_secs: f64,
}

impl HubSettings {
    /// Check the settings can back a manager.
    ///
    /// # Errors
    ///
    /// Returns a [`ConstructionError`] for an empty name or host, port zero,
    /// or a negative / non-finite delay.
    pub fn validate(&self) -> Result<(), ConstructionError> {
        if self.name.trim().is_empty() {
            return Err(ConstructionError::EmptyName);
        }
        if self.host.trim().is_empty() {
            return Err(ConstructionError::EmptyHost);
        }
        if self.port == 0 {
            return Err(ConstructionError::InvalidPort);
        }
        self.command_delay()?;
        Ok(())
    }

    /// Default delay between commands.
    ///
    /// # Errors
    ///
    /// Returns [`ConstructionError::InvalidDelay`] for a negative or
    /// non-finite value.
    pub fn command_delay(&self) -> Result<Duration, ConstructionError> {
        Duration::try_from_secs_f64(self.delay_secs)
            .map_err(|_| ConstructionError::InvalidDelay(self.delay_secs))
    }

    /// `(host, port)` pair identifying the physical hub.
    #[must_use]
    pub fn address(&self) -> (&str, u16) {
        (&self.host, self.port)
    }

    /// File name of the persisted configuration snapshot.
    #[must_use]
    pub fn config_file_name(&self) -> String {
        format!("hub_{}.conf", slugify(&self.name))
    }
}
