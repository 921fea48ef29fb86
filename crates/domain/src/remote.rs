//! Remote state: what the host observes about one hub.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::snapshot::POWER_OFF_NAME;

/// Discrete state reported to the host for a remote entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityState {
    On,
    Off,
    #[default]
    Unknown,
    Unavailable,
}

impl fmt::Display for EntityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::On => f.write_str("on"),
            Self::Off => f.write_str("off"),
            Self::Unknown => f.write_str("unknown"),
            Self::Unavailable => f.write_str("unavailable"),
        }
    }
}

/// Connection lifecycle of a hub session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// No session established yet.
    #[default]
    Disconnected,
    /// Session up; the remote is available.
    Available,
    /// Session dropped; still inside the grace period.
    PendingUnavailable,
    /// Session dropped for longer than the grace period.
    Unavailable,
}

/// Latest known state of a remote.
///
/// `is_on` is derived from `current_activity`, so the two can never disagree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteState {
    pub current_activity: Option<String>,
    pub available: bool,
    pub connection: ConnectionState,
}

impl Default for RemoteState {
    fn default() -> Self {
        Self {
            current_activity: None,
            available: true,
            connection: ConnectionState::Disconnected,
        }
    }
}

impl RemoteState {
    /// On unless the current activity is unknown or `PowerOff`.
    #[must_use]
    pub fn is_on(&self) -> bool {
        self.current_activity
            .as_deref()
            .is_some_and(|name| name != POWER_OFF_NAME)
    }

    #[must_use]
    pub fn entity_state(&self) -> EntityState {
        if !self.available {
            EntityState::Unavailable
        } else if self.is_on() {
            EntityState::On
        } else if self.current_activity.is_none() {
            EntityState::Unknown
        } else {
            EntityState::Off
        }
    }

    /// Extra attributes exposed next to the state.
    #[must_use]
    pub fn attributes(&self) -> serde_json::Value {
        serde_json::json!({ "current_activity": self.current_activity })
    }

    /// Payload pushed to observers on every state update.
    #[must_use]
    pub fn to_payload(&self) -> serde_json::Value {
        serde_json::json!({
            "state": self.entity_state(),
            "available": self.available,
            "is_on": self.is_on(),
            "attributes": self.attributes(),
        })
    }
}
