//! D-Bus client side of the VSS hardware signal protocol.
//!
//! Sends `com.vss_lib.VehicleSignals.EmitHardwareSignal(s, i)` to the signal
//! service on the system bus.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐  connect   ┌──────────────┐  build   ┌────────────────┐
//! │  Connector   │──────────> │ BusConnection│          │MethodCallRequest│
//! └──────────────┘            └──────┬───────┘          └───────┬────────┘
//!                                    │      Dispatcher          │
//!                                    └──────────┬───────────────┘
//!                                               │ blocking: PendingCall -> reply
//!                                               │ fire-and-forget: send + flush
//!                                               v
//!                                   com.vss_lib.VehicleSignals
//! ```
//!
//! Each stage fails with its own error type; [`SignalError`] collects them so
//! the caller can tell which stage broke.

mod connection;
mod dispatch;
mod message;
mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use connection::{BusConnection, Connector, ZbusConnector};
pub use dispatch::{DispatchReceipt, Dispatcher};
pub use message::{ArgumentKind, MethodCallRequest, SignalArgument};
pub use transport::{BusTransport, PendingCall, ZbusTransport};

use crate::config::{BusKind, ConfigError};
use thiserror::Error;

/// The bus could not be reached or handed back an unusable connection.
#[derive(Error, Debug)]
pub enum ConnectionError {
    #[error("Cannot connect to the {bus} bus: {source}")]
    Unreachable {
        bus: BusKind,
        #[source]
        source: zbus::Error,
    },

    #[error("Invalid bus address {address}: {source}")]
    InvalidAddress {
        address: String,
        #[source]
        source: zbus::Error,
    },

    #[error("Invalid bus address: {0}")]
    InvalidBus(String),

    #[error("Connected to the {0} bus but no unique name was assigned")]
    NoHandle(BusKind),
}

/// The method call message could not be constructed.
#[derive(Error, Debug)]
pub enum BuildError {
    #[error("Invalid {field}: {reason}")]
    InvalidAddress { field: &'static str, reason: String },

    #[error("Invalid target: {0}")]
    InvalidTarget(String),

    #[error("Expected {expected} arguments, got {found}")]
    ArgumentCount { expected: usize, found: usize },

    #[error("Argument {index} must be {expected}, got {found}")]
    ArgumentType {
        index: usize,
        expected: ArgumentKind,
        found: ArgumentKind,
    },

    #[error("Argument {index} cannot be marshalled: {reason}")]
    Unmarshallable { index: usize, reason: String },

    #[error("Failed to append arguments to D-Bus message: {0}")]
    Marshal(#[source] zbus::Error),
}

/// The built message could not be delivered, or its reply never arrived.
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("Failed to submit the D-Bus message: {0}")]
    Submit(#[source] zbus::Error),

    #[error("Pending call null: the bus did not register a reply handler")]
    NoPendingCall,

    #[error("Failed to send the D-Bus message: {0}")]
    OneWayRefused(#[source] zbus::Error),

    #[error("Failed to flush the bus connection: {0}")]
    Flush(#[source] zbus::Error),

    #[error("Reply null: the connection closed before a reply arrived")]
    ReplyNull,
}

/// Any failure of one signal invocation.
#[derive(Error, Debug)]
pub enum SignalError {
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error(transparent)]
    Build(#[from] BuildError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

impl SignalError {
    /// Name of the stage that failed.
    pub fn stage(&self) -> &'static str {
        match self {
            SignalError::Connection(_) => "connection",
            SignalError::Build(_) => "build",
            SignalError::Dispatch(_) => "dispatch",
            SignalError::Unexpected(_) => "unexpected",
        }
    }

    /// Process exit code for this failure. Never 0, and never clap's usage code 2.
    pub fn exit_code(&self) -> u8 {
        match self {
            SignalError::Unexpected(_) => 1,
            SignalError::Connection(_) => 3,
            SignalError::Build(_) => 4,
            SignalError::Dispatch(_) => 5,
        }
    }
}

/// Bus problems belong to the connection stage, target problems to the build stage.
impl From<ConfigError> for SignalError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::InvalidBus(reason) => {
                SignalError::Connection(ConnectionError::InvalidBus(reason))
            }
            ConfigError::ValidationError(reason) => {
                SignalError::Build(BuildError::InvalidTarget(reason))
            }
            ConfigError::SerializeError(_) => SignalError::Unexpected(err.into()),
        }
    }
}
