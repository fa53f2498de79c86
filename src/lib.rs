//! Client for the VSS hardware signal D-Bus service.
//!
//! Vendors call `com.vss_lib.VehicleSignals.EmitHardwareSignal(name, value)` on
//! the system bus to feed real hardware readings into the signal service.
//!
//! ```ignore
//! let client = SignalClient::new(ClientConfig::default());
//! let sent = client.emit_hardware_signal("Speed", 80).await?;
//! println!("{}", report::confirmation(&sent, None));
//! ```

pub mod client;
pub mod config;
pub mod dbus;
pub mod report;

// Re-export commonly used types for convenience
pub use client::{SentSignal, SignalClient};
pub use config::{BusKind, ClientConfig, DispatchMode, SignalTarget};
pub use dbus::SignalError;
