//! Command steps and the sequencer expanding a send request into them.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::RequestError;

/// One element of a batch submitted to the hub.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandStep {
    /// Transmit `command` to the device with `device_id`.
    Send { device_id: i64, command: String },
    /// Pause before the next step.
    Delay(Duration),
}

impl CommandStep {
    /// Shorthand for a [`CommandStep::Send`].
    #[must_use]
    pub fn send(device_id: i64, command: impl Into<String>) -> Self {
        Self::Send {
            device_id,
            command: command.into(),
        }
    }
}

/// Outcome reported by the hub for one transmitted command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResult {
    pub device_id: i64,
    pub command: String,
    /// Zero on success.
    pub code: u32,
    pub message: String,
}

impl CommandResult {
    /// A successful result for `(device_id, command)`.
    #[must_use]
    pub fn ok(device_id: i64, command: impl Into<String>) -> Self {
        Self {
            device_id,
            command: command.into(),
            code: 0,
            message: String::new(),
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.code == 0
    }
}

/// Upper bound on `num_repeats` for one request.
pub const MAX_REPEATS: u32 = 100;

/// Arguments of a `send_command` call, as received from the host.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SendCommand {
    /// Device id or name.
    pub device: String,
    /// Command names, sent in order.
    #[serde(rename = "command", deserialize_with = "one_or_many")]
    pub commands: Vec<String>,
    #[serde(default = "default_repeats")]
    pub num_repeats: u32,
    /// Overrides the hub's default delay when set.
    #[serde(default)]
    pub delay_secs: Option<f64>,
}

impl SendCommand {
    /// A single pass over `commands` using the hub's default delay.
    pub fn new<I, S>(device: impl Into<String>, commands: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            device: device.into(),
            commands: commands.into_iter().map(Into::into).collect(),
            num_repeats: default_repeats(),
            delay_secs: None,
        }
    }

    #[must_use]
    pub fn repeated(mut self, num_repeats: u32) -> Self {
        self.num_repeats = num_repeats;
        self
    }

    #[must_use]
    pub fn with_delay_secs(mut self, delay_secs: f64) -> Self {
        self.delay_secs = Some(delay_secs);
        self
    }

    /// Check the request shape, independent of any hub configuration.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError`] for a blank device, an empty command list,
    /// a repeat count outside `1..=MAX_REPEATS` or an invalid delay override.
    pub fn validate(&self) -> Result<(), RequestError> {
        if self.device.trim().is_empty() {
            return Err(RequestError::MissingDevice);
        }
        if self.commands.is_empty() {
            return Err(RequestError::NoCommands);
        }
        if !(1..=MAX_REPEATS).contains(&self.num_repeats) {
            return Err(RequestError::InvalidRepeats);
        }
        if let Some(secs) = self.delay_secs {
            delay_from_secs(secs)?;
        }
        Ok(())
    }
}

fn default_repeats() -> u32 {
    1
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(command) => vec![command],
        OneOrMany::Many(commands) => commands,
    })
}

/// Convert a delay in seconds into a [`Duration`].
///
/// # Errors
///
/// Returns [`RequestError::InvalidDelay`] for negative or non-finite values.
pub fn delay_from_secs(secs: f64) -> Result<Duration, RequestError> {
    Duration::try_from_secs_f64(secs).map_err(|_| RequestError::InvalidDelay(secs))
}

/// Expand a send request into an ordered batch.
///
/// Every repeat sends each command in order. Consecutive sends are separated
/// by `delay`; no delay follows the final send, and a zero delay emits no
/// delay steps at all.
#[must_use]
pub fn sequence(device_id: i64, commands: &[String], num_repeats: u32, delay: Duration) -> Vec<CommandStep> {
    let mut steps = Vec::new();

    for _ in 0..num_repeats {
        for command in commands {
            if !delay.is_zero() && !steps.is_empty() {
                steps.push(CommandStep::Delay(delay));
            }
            steps.push(CommandStep::send(device_id, command.as_str()));
        }
    }

    steps
}

#[cfg(test)]
mod tests {
    use super::*;

    fn commands(names: &[&str]) -> Vec<String> {
        names.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn should_interleave_delays_between_repeated_sends() {
        let one = Duration::from_secs(1);
        let steps = sequence(7, &commands(&["c1", "c2"]), 2, one);
        assert_eq!(
            steps,
            vec![
                CommandStep::send(7, "c1"),
                CommandStep::Delay(one),
                CommandStep::send(7, "c2"),
                CommandStep::Delay(one),
                CommandStep::send(7, "c1"),
                CommandStep::Delay(one),
                CommandStep::send(7, "c2"),
            ]
        );
    }

    #[test]
    fn should_emit_four_n_minus_one_steps_for_two_commands() {
        let delay = Duration::from_millis(400);
        for n in 1..=5 {
            let steps = sequence(1, &commands(&["a", "b"]), n, delay);
            assert_eq!(steps.len(), 4 * n as usize - 1, "num_repeats = {n}");
        }
    }

    #[test]
    fn should_emit_no_delays_when_delay_is_zero() {
        let steps = sequence(1, &commands(&["a", "b", "c"]), 3, Duration::ZERO);
        assert_eq!(steps.len(), 9);
        assert!(steps.iter().all(|s| matches!(s, CommandStep::Send { .. })));
    }

    #[test]
    fn should_emit_single_send_without_delay() {
        let steps = sequence(1, &commands(&["PowerOn"]), 1, Duration::from_secs(2));
        assert_eq!(steps, vec![CommandStep::send(1, "PowerOn")]);
    }

    #[test]
    fn should_reject_negative_and_non_finite_delays() {
        assert!(matches!(delay_from_secs(-0.5), Err(RequestError::InvalidDelay(_))));
        assert!(matches!(delay_from_secs(f64::NAN), Err(RequestError::InvalidDelay(_))));
        assert!(matches!(delay_from_secs(f64::INFINITY), Err(RequestError::InvalidDelay(_))));
        assert_eq!(delay_from_secs(0.4).unwrap(), Duration::from_millis(400));
    }

    #[test]
    fn should_deserialize_single_command_string() {
        let cmd: SendCommand =
            serde_json::from_value(serde_json::json!({"device": "TV", "command": "Mute"})).unwrap();
        assert_eq!(cmd.commands, vec!["Mute".to_string()]);
        assert_eq!(cmd.num_repeats, 1);
        assert_eq!(cmd.delay_secs, None);
    }

    #[test]
    fn should_deserialize_command_list_with_options() {
        let cmd: SendCommand = serde_json::from_value(serde_json::json!({
            "device": "38794003",
            "command": ["VolumeUp", "VolumeUp"],
            "num_repeats": 3,
            "delay_secs": 0.2,
        }))
        .unwrap();
        assert_eq!(cmd.commands.len(), 2);
        assert_eq!(cmd.num_repeats, 3);
        assert_eq!(cmd.delay_secs, Some(0.2));
    }

    #[test]
    fn should_reject_missing_device_when_deserializing() {
        let result = serde_json::from_value::<SendCommand>(serde_json::json!({"command": "Mute"}));
        assert!(result.is_err());
    }

    #[test]
    fn should_validate_request_shape() {
        assert!(SendCommand::new("TV", ["Mute"]).validate().is_ok());
        assert!(matches!(
            SendCommand::new("  ", ["Mute"]).validate(),
            Err(RequestError::MissingDevice)
        ));
        assert!(matches!(
            SendCommand::new("TV", Vec::<String>::new()).validate(),
            Err(RequestError::NoCommands)
        ));
        assert!(matches!(
            SendCommand::new("TV", ["Mute"]).repeated(0).validate(),
            Err(RequestError::InvalidRepeats)
        ));
        assert!(SendCommand::new("TV", ["Mute"]).repeated(MAX_REPEATS).validate().is_ok());
        assert!(matches!(
            SendCommand::new("TV", ["Mute"]).with_delay_secs(-1.0).validate(),
            Err(RequestError::InvalidDelay(_))
        ));
    }

    #[test]
    fn should_report_success_only_for_zero_code() {
        assert!(CommandResult::ok(1, "Mute").is_success());
        let failed = CommandResult {
            code: 404,
            message: "unknown command".to_string(),
            ..CommandResult::ok(1, "Mute")
        };
        assert!(!failed.is_success());
    }
}
