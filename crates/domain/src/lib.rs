//! # remotehub-domain
//!
//! Pure domain model for integrating hub-based universal remotes.
//!
//! ## Responsibilities
//! - Foundational types: typed identifiers, error conventions, timestamps
//! - Define **hub settings** (name, address, default activity, command delay)
//!   and the **pending overrides** recovered during discovery
//! - Define the **configuration snapshot** (activities and devices) and the
//!   name resolver that maps user input to hub-internal ids
//! - Define **command steps** and the sequencer expanding a send request
//! - Define the **remote state** observed by the host and the **events** that
//!   carry it
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod error;
pub mod id;
pub mod slug;
pub mod time;

pub mod command;
pub mod event;
pub mod remote;
pub mod settings;
pub mod snapshot;
