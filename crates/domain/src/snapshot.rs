//! Configuration snapshot: the hub's activities and devices as last fetched.
//!
//! A snapshot is immutable once built. When the hub reports a configuration
//! change the whole snapshot is replaced, never patched.
//!
//! The resolver ([`ConfigSnapshot::resolve`]) maps user-supplied identifiers
//! to hub-internal ids:
//!
//! 1. a string of ASCII digits, or exactly `-1`, is tried as a literal id and
//!    accepted if the snapshot knows it (`-1` is always accepted for
//!    activities);
//! 2. otherwise the trimmed string is looked up as an exact, case-sensitive
//!    name;
//! 3. anything else is a [`ResolutionError`].

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ResolutionError;

/// Reserved activity id meaning "everything off".
pub const POWER_OFF_ID: i64 = -1;

/// Name the hub reports for the [`POWER_OFF_ID`] activity.
pub const POWER_OFF_NAME: &str = "PowerOff";

/// Which namespace an identifier is resolved in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentifierRole {
    Activity,
    Device,
}

impl fmt::Display for IdentifierRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Activity => f.write_str("activity"),
            Self::Device => f.write_str("device"),
        }
    }
}

/// A hub-defined activity such as "Watch TV".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityRecord {
    pub id: i64,
    pub name: String,
}

impl ActivityRecord {
    #[must_use]
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }

    /// The reserved power-off activity.
    #[must_use]
    pub fn power_off() -> Self {
        Self::new(POWER_OFF_ID, POWER_OFF_NAME)
    }
}

/// A downstream device controlled by the hub.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub id: i64,
    pub name: String,
    /// Command names the hub knows for this device.
    #[serde(default)]
    pub commands: Vec<String>,
}

impl DeviceRecord {
    #[must_use]
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            commands: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_commands<I, S>(mut self, commands: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.commands = commands.into_iter().map(Into::into).collect();
        self
    }
}

/// Full set of activities and devices plus raw hub metadata.
///
/// Maps are keyed by id so the serialized form has a stable key order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigSnapshot {
    #[serde(default)]
    activities: BTreeMap<i64, ActivityRecord>,
    #[serde(default)]
    devices: BTreeMap<i64, DeviceRecord>,
    #[serde(default)]
    metadata: serde_json::Value,
}

impl ConfigSnapshot {
    /// Build a snapshot from activity and device records.
    ///
    /// When two records share an id, the last one wins.
    pub fn new<A, D>(activities: A, devices: D) -> Self
    where
        A: IntoIterator<Item = ActivityRecord>,
        D: IntoIterator<Item = DeviceRecord>,
    {
        Self {
            activities: activities.into_iter().map(|a| (a.id, a)).collect(),
            devices: devices.into_iter().map(|d| (d.id, d)).collect(),
            metadata: serde_json::Value::Null,
        }
    }

    /// Attach raw hub metadata (firmware, account, discovery info, …).
    #[must_use]
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn activities(&self) -> impl Iterator<Item = &ActivityRecord> {
        self.activities.values()
    }

    pub fn devices(&self) -> impl Iterator<Item = &DeviceRecord> {
        self.devices.values()
    }

    #[must_use]
    pub fn metadata(&self) -> &serde_json::Value {
        &self.metadata
    }

    #[must_use]
    pub fn activity(&self, id: i64) -> Option<&ActivityRecord> {
        self.activities.get(&id)
    }

    #[must_use]
    pub fn device(&self, id: i64) -> Option<&DeviceRecord> {
        self.devices.get(&id)
    }

    /// Name of the activity with `id`, if any.
    #[must_use]
    pub fn activity_name(&self, id: i64) -> Option<&str> {
        self.activity(id).map(|a| a.name.as_str())
    }

    /// Id of the activity named exactly `name`, if any.
    #[must_use]
    pub fn activity_id(&self, name: &str) -> Option<i64> {
        self.activities().find(|a| a.name == name).map(|a| a.id)
    }

    /// Id of the device named exactly `name`, if any.
    #[must_use]
    pub fn device_id(&self, name: &str) -> Option<i64> {
        self.devices().find(|d| d.name == name).map(|d| d.id)
    }

    /// Resolve an activity identifier. Shorthand for
    /// [`resolve`](Self::resolve) with [`IdentifierRole::Activity`].
    ///
    /// # Errors
    ///
    /// See [`resolve`](Self::resolve).
    pub fn resolve_activity(&self, raw: &str) -> Result<i64, ResolutionError> {
        self.resolve(IdentifierRole::Activity, raw)
    }

    /// Resolve a device identifier. Shorthand for
    /// [`resolve`](Self::resolve) with [`IdentifierRole::Device`].
    ///
    /// # Errors
    ///
    /// See [`resolve`](Self::resolve).
    pub fn resolve_device(&self, raw: &str) -> Result<i64, ResolutionError> {
        self.resolve(IdentifierRole::Device, raw)
    }

    /// Map a raw identifier to a hub-internal id.
    ///
    /// # Errors
    ///
    /// Returns [`ResolutionError`] when `raw` is neither a known literal id
    /// nor the exact name of a record in `role`'s namespace.
    pub fn resolve(&self, role: IdentifierRole, raw: &str) -> Result<i64, ResolutionError> {
        if let Some(id) = literal_id(raw) {
            let known = match role {
                IdentifierRole::Activity => id == POWER_OFF_ID || self.activities.contains_key(&id),
                IdentifierRole::Device => self.devices.contains_key(&id),
            };
            if known {
                return Ok(id);
            }
        }

        let name = raw.trim();
        let found = match role {
            IdentifierRole::Activity => self.activity_id(name),
            IdentifierRole::Device => self.device_id(name),
        };
        found.ok_or_else(|| ResolutionError {
            role,
            input: raw.to_string(),
        })
    }
}

/// Parse `raw` as a literal id when it is all digits or exactly `-1`.
fn literal_id(raw: &str) -> Option<i64> {
    if raw == "-1" {
        return Some(POWER_OFF_ID);
    }
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    raw.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> ConfigSnapshot {
        ConfigSnapshot::new(
            [
                ActivityRecord::new(24_533_120, "Watch TV"),
                ActivityRecord::new(24_533_121, "Listen to Music"),
                ActivityRecord::new(777, "1234"),
            ],
            [
                DeviceRecord::new(38_794_003, "Living Room TV").with_commands(["PowerOn", "Mute"]),
                DeviceRecord::new(38_794_004, "AV Receiver"),
            ],
        )
    }

    #[test]
    fn should_return_numeric_activity_id_unchanged_when_known() {
        assert_eq!(snapshot().resolve_activity("24533120"), Ok(24_533_120));
    }

    #[test]
    fn should_resolve_activity_by_exact_name() {
        assert_eq!(snapshot().resolve_activity("Listen to Music"), Ok(24_533_121));
    }

    #[test]
    fn should_trim_whitespace_before_name_lookup() {
        assert_eq!(snapshot().resolve_activity("  Watch TV \t"), Ok(24_533_120));
    }

    #[test]
    fn should_match_names_case_sensitively() {
        let err = snapshot().resolve_activity("watch tv").unwrap_err();
        assert_eq!(err.role, IdentifierRole::Activity);
        assert_eq!(err.input, "watch tv");
    }

    #[test]
    fn should_fall_back_to_name_when_numeric_id_is_unknown() {
        assert_eq!(snapshot().resolve_activity("1234"), Ok(777));
    }

    #[test]
    fn should_reject_unknown_numeric_id() {
        let err = snapshot().resolve_activity("42").unwrap_err();
        assert_eq!(err.input, "42");
    }

    #[test]
    fn should_resolve_power_off_sentinel_without_entry() {
        let snapshot = snapshot();
        assert!(snapshot.activity(POWER_OFF_ID).is_none());
        assert_eq!(snapshot.resolve_activity("-1"), Ok(POWER_OFF_ID));
    }

    #[test]
    fn should_resolve_power_off_sentinel_on_empty_snapshot() {
        assert_eq!(ConfigSnapshot::default().resolve_activity("-1"), Ok(POWER_OFF_ID));
    }

    #[test]
    fn should_not_treat_sentinel_as_device_id() {
        let err = snapshot().resolve_device("-1").unwrap_err();
        assert_eq!(err.role, IdentifierRole::Device);
    }

    #[test]
    fn should_resolve_device_by_id_and_by_name() {
        let snapshot = snapshot();
        assert_eq!(snapshot.resolve_device("38794004"), Ok(38_794_004));
        assert_eq!(snapshot.resolve_device(" Living Room TV "), Ok(38_794_003));
    }

    #[test]
    fn should_keep_activity_and_device_namespaces_apart() {
        let err = snapshot().resolve_device("Watch TV").unwrap_err();
        assert_eq!(err.role, IdentifierRole::Device);
    }

    #[test]
    fn should_not_parse_signed_or_padded_numbers_as_literal_ids() {
        assert_eq!(literal_id("+42"), None);
        assert_eq!(literal_id(" 42"), None);
        assert_eq!(literal_id("-2"), None);
        assert_eq!(literal_id(""), None);
        assert_eq!(literal_id("42"), Some(42));
    }

    #[test]
    fn should_ignore_overflowing_digit_strings() {
        assert_eq!(literal_id("99999999999999999999999"), None);
    }

    #[test]
    fn should_replace_duplicate_ids_with_last_record() {
        let snapshot = ConfigSnapshot::new(
            [ActivityRecord::new(1, "Old"), ActivityRecord::new(1, "New")],
            [],
        );
        assert_eq!(snapshot.activity_name(1), Some("New"));
    }

    #[test]
    fn should_roundtrip_through_serde_json() {
        let original = snapshot().with_metadata(serde_json::json!({"firmware": "4.15.250"}));
        let json = serde_json::to_string(&original).unwrap();
        let parsed: ConfigSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, original);
    }
}
