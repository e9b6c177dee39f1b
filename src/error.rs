//! Unified error types for the light controller core.
//!
//! A single `Error` enum that every subsystem can convert into, keeping the
//! supervisor's error handling uniform.  All variants are `Copy` so they can
//! be cheaply passed across suspension points without allocation.

use core::fmt;

use crate::ports::{BrokerError, ConfigError, PlatformError};

/// Every fallible operation in the core funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The pub/sub protocol client failed.
    Broker(BrokerError),
    /// Configuration is invalid or could not be loaded.
    Config(ConfigError),
    /// A platform factory could not construct a collaborator.
    Platform(PlatformError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Broker(e) => write!(f, "broker: {e}"),
            Self::Config(e) => write!(f, "config: {e}"),
            Self::Platform(e) => write!(f, "platform: {e}"),
        }
    }
}

impl From<BrokerError> for Error {
    fn from(e: BrokerError) -> Self {
        Self::Broker(e)
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

impl From<PlatformError> for Error {
    fn from(e: PlatformError) -> Self {
        Self::Platform(e)
    }
}

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
