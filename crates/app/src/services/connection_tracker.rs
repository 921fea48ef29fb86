//! Connection tracker: debounces short disconnects into a grace period.
//!
//! Pure state machine; the caller supplies the clock and arms a timer on
//! [`ConnectionTracker::deadline`].
//!
//! ```text
//! Disconnected --connected--> Available --disconnected--> PendingUnavailable
//!                                 ^                          |         |
//!                                 +-------connected----------+   grace elapsed
//!                                 |                                    v
//!                                 +--connected (refresh config)-- Unavailable
//! ```

use std::time::Duration;

use remotehub_domain::remote::ConnectionState;
use tokio::time::Instant;

/// How long a dropped session may stay down before the remote is reported
/// unavailable.
pub const GRACE_PERIOD: Duration = Duration::from_secs(10);

#[derive(Debug)]
pub struct ConnectionTracker {
    state: ConnectionState,
    grace: Duration,
    deadline: Option<Instant>,
}

impl Default for ConnectionTracker {
    fn default() -> Self {
        Self::new(GRACE_PERIOD)
    }
}

impl ConnectionTracker {
    #[must_use]
    pub fn new(grace: Duration) -> Self {
        Self {
            state: ConnectionState::Disconnected,
            grace,
            deadline: None,
        }
    }

    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Pending "report unavailable" deadline, if a disconnect is being debounced.
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    #[must_use]
    pub fn grace(&self) -> Duration {
        self.grace
    }

    /// Session established. Cancels any pending deadline.
    ///
    /// Returns `true` when coming back from [`ConnectionState::Unavailable`],
    /// in which case the configuration must be fetched again.
    pub fn on_connected(&mut self) -> bool {
        let refresh = self.state == ConnectionState::Unavailable;
        self.state = ConnectionState::Available;
        self.deadline = None;
        refresh
    }

    /// Session dropped at `now`.
    ///
    /// Returns `true` when a new grace period starts. Repeated disconnects
    /// keep the first deadline.
    pub fn on_disconnected(&mut self, now: Instant) -> bool {
        match self.state {
            ConnectionState::Available | ConnectionState::Disconnected => {
                self.state = ConnectionState::PendingUnavailable;
                self.deadline = Some(now + self.grace);
                true
            }
            ConnectionState::PendingUnavailable | ConnectionState::Unavailable => false,
        }
    }

    /// The deadline fired.
    ///
    /// Returns `true` when the remote must now be reported unavailable.
    pub fn on_grace_elapsed(&mut self) -> bool {
        self.deadline = None;
        if self.state == ConnectionState::PendingUnavailable {
            self.state = ConnectionState::Unavailable;
            true
        } else {
            false
        }
    }
}
