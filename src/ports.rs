//! Port traits — the hexagonal boundary between the controller core and the
//! outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ core (bridge / light / runner)
//! ```
//!
//! Driven adapters (the wire-protocol client, PWM output channels, the
//! configuration store) implement these traits.  The core consumes them via
//! generics, so it never touches a socket, a pin, or the filesystem directly.
//! The protocol client is assumed to provide reliable, in-order delivery per
//! topic; at-least-once is acceptable.

use serde_json::Value;

use crate::config::DeviceConfig;

// ───────────────────────────────────────────────────────────────
// Broker port (driven adapter: pub/sub wire protocol)
// ───────────────────────────────────────────────────────────────

/// One decoded inbound message, as surfaced by [`BrokerPort::check_msg`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: String,
}

/// Synchronous pub/sub protocol client.
///
/// The bridge owns one instance and is the only writer to the underlying
/// connection.  `check_msg` is the non-blocking "poll for one message"
/// operation the bridge's poll loop drives; it must deliver messages only
/// for topics that were previously passed to `subscribe`.
pub trait BrokerPort {
    fn connect(&mut self) -> Result<(), BrokerError>;

    /// Issue a protocol-level subscription for `topic`.
    fn subscribe(&mut self, topic: &str) -> Result<(), BrokerError>;

    /// Send one message.  Must not be called concurrently for the same
    /// topic; the bridge serializes sends through per-topic sender tasks.
    fn publish(&mut self, topic: &str, payload: &str) -> Result<(), BrokerError>;

    /// Check for at most one incoming message without blocking.
    fn check_msg(&mut self) -> Result<Option<InboundMessage>, BrokerError>;

    /// Close the underlying connection.  Must tolerate repeated calls.
    fn disconnect(&mut self);
}

// ───────────────────────────────────────────────────────────────
// PWM port (driven adapter: one output channel of the fixture)
// ───────────────────────────────────────────────────────────────

/// One dimmable output channel.  The light engine drives three of these
/// (red, green, blue) with normalized intensities.
pub trait PwmPort {
    /// Program the duty cycle.  `level` is normalized to `[0, 1]`.
    fn set_intensity(&mut self, level: f32);

    /// Release the underlying hardware channel.  Must tolerate repeated calls.
    fn release(&mut self);
}

// ───────────────────────────────────────────────────────────────
// Clock port (driven adapter: monotonic time source)
// ───────────────────────────────────────────────────────────────

/// Monotonic time source for transition timing.
///
/// The engine's interpolation math takes timestamps as plain arguments, so
/// tests can replay a transition at any speed.  Values only need to be
/// monotonic relative to each other; the epoch is arbitrary.
pub trait ClockPort {
    /// Milliseconds on a monotonic clock.
    fn now_ms(&self) -> u64;
}

// ───────────────────────────────────────────────────────────────
// Configuration port (driven adapter: persisted config document)
// ───────────────────────────────────────────────────────────────

/// Loads and persists the configuration document (a flat JSON object).
///
/// Implementations must distinguish "nothing stored yet"
/// ([`ConfigError::NotFound`]) from "stored but unreadable"
/// ([`ConfigError::Corrupted`]) — the supervisor deletes a corrupt document
/// and falls back to defaults instead of failing.
pub trait ConfigPort {
    fn load(&self) -> Result<Value, ConfigError>;

    fn save(&self, document: &Value) -> Result<(), ConfigError>;

    /// Delete the persisted document.  Deleting an absent document is not
    /// an error.
    fn remove(&self);
}

// ───────────────────────────────────────────────────────────────
// Platform (factory for per-generation collaborators)
// ───────────────────────────────────────────────────────────────

/// Constructs the collaborators that live for one pipeline generation.
///
/// The supervisor rebuilds the whole pipeline on reconfiguration, so the
/// protocol client and the PWM channels are created fresh each generation
/// from the then-current configuration.
pub trait Platform {
    type Client: BrokerPort + 'static;
    type Channel: PwmPort + 'static;
    type Clock: ClockPort + 'static;

    /// Build a protocol client for the given configuration (server address,
    /// client identity).  The client is returned unconnected.
    fn make_client(&mut self, config: &DeviceConfig) -> Result<Self::Client, PlatformError>;

    /// Acquire one PWM output channel.
    fn make_channel(&mut self, pin: u32, freq_hz: u32) -> Result<Self::Channel, PlatformError>;

    /// Build the monotonic clock the transition engine reads.
    fn make_clock(&self) -> Self::Clock;
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`BrokerPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrokerError {
    /// The initial connection could not be established.
    ConnectFailed,
    /// An operation was attempted on a closed connection.
    NotConnected,
    /// The protocol-level subscribe was rejected.
    SubscribeFailed,
    /// The send failed (connection dropped mid-write, broker rejected).
    PublishFailed,
    /// The incoming-message poll failed.
    ReceiveFailed,
}

/// Errors from [`ConfigPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// No document found in storage (first boot).
    NotFound,
    /// Stored document failed to parse.
    Corrupted,
    /// A configuration value failed validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
    /// A module entry names a kind this build does not provide.
    UnknownModule,
    /// Generic I/O error from the storage backend.
    IoError,
}

/// Errors from [`Platform`] factory operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformError {
    /// The protocol client could not be constructed.
    Client(BrokerError),
    /// A PWM output channel could not be acquired.
    Channel(&'static str),
}

impl core::fmt::Display for BrokerError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::ConnectFailed => write!(f, "connect failed"),
            Self::NotConnected => write!(f, "not connected"),
            Self::SubscribeFailed => write!(f, "subscribe failed"),
            Self::PublishFailed => write!(f, "publish failed"),
            Self::ReceiveFailed => write!(f, "receive failed"),
        }
    }
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "config not found"),
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::UnknownModule => write!(f, "unknown module kind"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl core::fmt::Display for PlatformError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Client(e) => write!(f, "client: {}", e),
            Self::Channel(msg) => write!(f, "channel: {}", msg),
        }
    }
}

impl From<BrokerError> for PlatformError {
    fn from(e: BrokerError) -> Self {
        Self::Client(e)
    }
}
