//! Tri-color light controller core.
//!
//! Drives a light fixture from messages on a pub/sub connection and
//! supports live reconfiguration without a hard reset.  Three subsystems:
//! the [`event`] broadcast cell, the [`bridge`] that demultiplexes one
//! protocol connection into per-topic event bindings, and the [`light`]
//! transition engine that interpolates brightness and color toward a
//! target over time.  The [`runner`] supervisor ties them together and
//! rebuilds the whole pipeline when new configuration arrives.
//!
//! Everything runs on a single-threaded cooperative executor; all I/O goes
//! through the port traits in [`ports`], so the core is testable with mock
//! collaborators.

#![deny(unused_must_use)]

pub mod adapters;
pub mod bridge;
pub mod config;
pub mod event;
pub mod light;
pub mod ports;
pub mod runner;

mod error;

pub use error::{Error, Result};
