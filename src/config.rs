//! Client configuration.
//!
//! Everything here is assembled from command-line flags; nothing is read from
//! disk or from the environment. The defaults describe the VSS signal service
//! on the system bus.

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Well-known bus name of the VSS signal service.
pub const SERVICE_NAME: &str = "com.vss_lib.VehicleSignals";

/// Object path the service exports its interface at.
pub const OBJECT_PATH: &str = "/com/vss_lib/VehicleSignals";

/// Interface carrying `EmitHardwareSignal`.
pub const INTERFACE_NAME: &str = "com.vss_lib.VehicleSignals";

/// Remote method that receives hardware signals.
pub const METHOD_NAME: &str = "EmitHardwareSignal";

/// Signal sent when the binary runs without arguments.
pub const DEFAULT_SIGNAL_NAME: &str = "Speed";

/// Value sent when the binary runs without arguments.
pub const DEFAULT_SIGNAL_VALUE: i32 = 80;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    ValidationError(String),

    #[error("Invalid bus address: {0}")]
    InvalidBus(String),

    #[error("Failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),
}

/// Which message bus to connect to.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BusKind {
    /// The system-wide bus (default)
    #[default]
    System,
    /// The per-user session bus
    Session,
    /// An explicit bus address, e.g. `unix:path=/run/dbus/custom_socket`
    Address(String),
}

impl fmt::Display for BusKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BusKind::System => write!(f, "system"),
            BusKind::Session => write!(f, "session"),
            BusKind::Address(addr) => write!(f, "'{}'", addr),
        }
    }
}

/// How the method call is dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum DispatchMode {
    /// Send and wait for the reply (no timeout)
    #[default]
    Blocking,
    /// Send one-way and flush, never waiting for a reply
    FireAndForget,
}

impl fmt::Display for DispatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchMode::Blocking => write!(f, "blocking"),
            DispatchMode::FireAndForget => write!(f, "fire-and-forget"),
        }
    }
}

/// Address of the remote method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignalTarget {
    pub service: String,
    pub object_path: String,
    pub interface: String,
    pub method: String,
}

impl Default for SignalTarget {
    fn default() -> Self {
        Self {
            service: SERVICE_NAME.to_string(),
            object_path: OBJECT_PATH.to_string(),
            interface: INTERFACE_NAME.to_string(),
            method: METHOD_NAME.to_string(),
        }
    }
}

impl SignalTarget {
    /// Reject targets with missing addressing fields.
    ///
    /// Syntax of the individual names is checked later by the message builder.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let fields = [
            ("service", &self.service),
            ("object_path", &self.object_path),
            ("interface", &self.interface),
            ("method", &self.method),
        ];
        for (field, value) in fields {
            if value.trim().is_empty() {
                return Err(ConfigError::ValidationError(format!(
                    "{} must not be empty",
                    field
                )));
            }
        }
        Ok(())
    }
}

/// Resolved settings for one invocation.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ClientConfig {
    pub bus: BusKind,
    pub mode: DispatchMode,
    pub target: SignalTarget,
}

impl ClientConfig {
    pub fn new(bus: BusKind, mode: DispatchMode) -> Self {
        Self {
            bus,
            mode,
            target: SignalTarget::default(),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if let BusKind::Address(addr) = &self.bus {
            if addr.trim().is_empty() {
                return Err(ConfigError::InvalidBus(
                    "address must not be empty".to_string(),
                ));
            }
        }
        self.target.validate()
    }

    /// Render the configuration as TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}
