//! Common error types used across the workspace.
//!
//! Each failure family has its own typed error; [`RemoteHubError`] wraps them
//! via `#[from]` so callers can use `?` across layers.

use std::path::PathBuf;

use crate::id::EntityId;
use crate::snapshot::IdentifierRole;

/// Base error type for remotehub operations.
#[derive(Debug, thiserror::Error)]
pub enum RemoteHubError {
    /// An activity or device identifier did not match the cached configuration.
    #[error("identifier resolution failed")]
    Resolution(#[from] ResolutionError),

    /// The hub could not be reached or rejected a request.
    #[error("hub transport error")]
    Transport(#[from] TransportError),

    /// The configuration snapshot could not be written to disk.
    #[error("configuration persistence failed")]
    Persistence(#[from] PersistenceError),

    /// A hub manager could not be built from its settings.
    #[error("hub manager construction failed")]
    Construction(#[from] ConstructionError),

    /// A service call carried invalid or missing arguments.
    #[error("invalid request")]
    Request(#[from] RequestError),

    /// No managed remote carries the requested entity id.
    #[error("not found")]
    NotFound(#[from] NotFoundError),
}

/// A raw identifier did not resolve against the current snapshot.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{role} {input:?} is not known to the hub")]
pub struct ResolutionError {
    /// Whether an activity or a device was being resolved.
    pub role: IdentifierRole,
    /// The identifier exactly as the caller supplied it.
    pub input: String,
}

/// Network-level failures reported by the hub client.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The session to the hub is not established.
    #[error("hub is not connected")]
    NotConnected,

    /// The hub could not be reached at the given address.
    #[error("hub at {host}:{port} is unreachable")]
    Unreachable {
        /// Hub address.
        host: String,
        /// Hub port.
        port: u16,
    },

    /// The hub answered but refused the request.
    #[error("hub rejected `{operation}`: {reason}")]
    Rejected {
        /// Client operation that was refused.
        operation: &'static str,
        /// Reason reported by the hub.
        reason: String,
    },

    /// Any other failure raised by the underlying client library.
    #[error("hub request `{operation}` failed")]
    Client {
        /// Client operation that failed.
        operation: &'static str,
        /// Underlying error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// Failures while writing a configuration snapshot to disk.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    /// The snapshot could not be encoded.
    #[error("failed to encode hub configuration")]
    Encode(#[source] serde_json::Error),

    /// The file could not be written or renamed into place.
    #[error("failed to write hub configuration to {}", path.display())]
    Write {
        /// Destination file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The blocking writer task did not complete.
    #[error("configuration writer task failed")]
    Task(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// A hub manager could not be constructed.
///
/// The host is expected to treat every variant as "not ready" and retry the
/// setup later.
#[derive(Debug, thiserror::Error)]
pub enum ConstructionError {
    /// The display name is empty or whitespace.
    #[error("hub name must not be empty")]
    EmptyName,

    /// The host address is empty or whitespace.
    #[error("hub host must not be empty")]
    EmptyHost,

    /// Port zero was configured.
    #[error("hub port must be non-zero")]
    InvalidPort,

    /// The default command delay is negative or not finite.
    #[error("command delay must be a finite, non-negative number of seconds (got {0})")]
    InvalidDelay(f64),

    /// The manager was built but its first connection attempt failed.
    #[error("hub is not ready")]
    NotReady(#[source] TransportError),
}

/// Invalid arguments supplied with a service call.
#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    /// `turn_on` was called without an activity and no default is configured.
    #[error("no activity specified and no default activity configured")]
    NoActivity,

    /// `send_command` was called without a target device.
    #[error("missing required argument: device")]
    MissingDevice,

    /// `send_command` was called with an empty command list.
    #[error("at least one command is required")]
    NoCommands,

    /// `num_repeats` is zero or above [`MAX_REPEATS`](crate::command::MAX_REPEATS).
    #[error("num_repeats must be between 1 and {}", crate::command::MAX_REPEATS)]
    InvalidRepeats,

    /// Delay is negative or not finite.
    #[error("delay must be a finite, non-negative number of seconds (got {0})")]
    InvalidDelay(f64),

    /// The service data payload does not match the service schema.
    #[error("malformed service data")]
    InvalidData(#[source] serde_json::Error),

    /// The service name is not handled by remotes.
    #[error("unknown service {0:?}")]
    UnknownService(String),
}

/// A lookup by entity id found nothing.
#[derive(Debug, thiserror::Error)]
#[error("no remote with entity id {0}")]
pub struct NotFoundError(pub EntityId);
