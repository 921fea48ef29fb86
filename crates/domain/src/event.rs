//! Event: an immutable record of something observers should know about.

use serde::{Deserialize, Serialize};

use crate::id::{EntityId, EventId};
use crate::remote::RemoteState;
use crate::time::{Timestamp, now};

/// Kind of event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// The observable state of a remote changed.
    StateChanged,
    /// A new configuration snapshot was accepted for a remote.
    ConfigChanged,
}

/// A published event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub event_type: EventType,
    pub entity_id: Option<EntityId>,
    pub data: serde_json::Value,
    pub timestamp: Timestamp,
}

impl Event {
    /// Create a new event stamped with the current time.
    #[must_use]
    pub fn new(event_type: EventType, entity_id: Option<EntityId>, data: serde_json::Value) -> Self {
        Self {
            id: EventId::new(),
            event_type,
            entity_id,
            data,
            timestamp: now(),
        }
    }

    /// State push for `entity_id`.
    #[must_use]
    pub fn state_changed(entity_id: EntityId, state: &RemoteState) -> Self {
        Self::new(EventType::StateChanged, Some(entity_id), state.to_payload())
    }

    /// Announcement that `entity_id` accepted a new configuration.
    #[must_use]
    pub fn config_changed(entity_id: EntityId, activities: usize, devices: usize) -> Self {
        Self::new(
            EventType::ConfigChanged,
            Some(entity_id),
            serde_json::json!({ "activities": activities, "devices": devices }),
        )
    }

    /// `available` flag of a state payload, if this is a state push.
    #[must_use]
    pub fn available(&self) -> Option<bool> {
        match self.event_type {
            EventType::StateChanged => self.data.get("available").and_then(serde_json::Value::as_bool),
            EventType::ConfigChanged => None,
        }
    }
}
