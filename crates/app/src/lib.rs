//! # remotehub-app
//!
//! Application layer: use-cases and **port definitions** (traits).
//!
//! ## Responsibilities
//! - Define **port traits** that adapters must implement (driven/outbound ports):
//!   - `HubClient` / `HubConnector`: session with one physical hub
//!   - `ConfigStore`: persistence of configuration snapshots
//!   - `EventPublisher`: state pushes to observers
//! - Define **driving/inbound** use-cases:
//!   - `HubManager`: one per hub: connection tracking, name resolution,
//!     command sequencing, configuration persistence
//!   - `DeviceRegistry`: static/discovered hub registration, service
//!     dispatch, sync-all, shutdown
//! - Provide **in-process infrastructure** (event bus) that doesn't need IO
//!
//! ## Dependency rule
//! Depends on `remotehub-domain` only (plus `tokio` for channels and timers).
//! Never imports adapter crates. Adapters depend on *this* crate, not the reverse.

pub mod event_bus;
pub mod ports;
pub mod services;

#[cfg(test)]
pub(crate) mod testing;
