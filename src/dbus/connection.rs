//! Bus connection setup.

use async_trait::async_trait;
use tracing::{debug, info};

use super::transport::{BusTransport, ZbusTransport};
use super::ConnectionError;
use crate::config::BusKind;

/// A live link to a message bus, owned by exactly one invocation.
///
/// Dropping it closes the link.
pub struct BusConnection {
    bus: BusKind,
    transport: Box<dyn BusTransport>,
}

impl BusConnection {
    pub fn new(bus: BusKind, transport: impl BusTransport + 'static) -> Self {
        Self {
            bus,
            transport: Box::new(transport),
        }
    }

    pub fn bus(&self) -> &BusKind {
        &self.bus
    }

    pub fn transport(&self) -> &dyn BusTransport {
        self.transport.as_ref()
    }
}

impl Drop for BusConnection {
    fn drop(&mut self) {
        debug!("Releasing {} bus connection", self.bus);
    }
}

/// Something that can open a [`BusConnection`].
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self) -> Result<BusConnection, ConnectionError>;
}

/// Opens real bus connections through zbus.
#[derive(Debug, Clone, Default)]
pub struct ZbusConnector {
    bus: BusKind,
}

impl ZbusConnector {
    pub fn new(bus: BusKind) -> Self {
        Self { bus }
    }
}

#[async_trait]
impl Connector for ZbusConnector {
    async fn connect(&self) -> Result<BusConnection, ConnectionError> {
        debug!("Connecting to the {} bus", self.bus);

        let result = match &self.bus {
            BusKind::System => zbus::Connection::system().await,
            BusKind::Session => zbus::Connection::session().await,
            BusKind::Address(address) => {
                let builder =
                    zbus::connection::Builder::address(address.as_str()).map_err(|source| {
                        ConnectionError::InvalidAddress {
                            address: address.clone(),
                            source,
                        }
                    })?;
                builder.build().await
            }
        };

        let connection = result.map_err(|source| ConnectionError::Unreachable {
            bus: self.bus.clone(),
            source,
        })?;

        // A bus connection that finished the handshake always has a unique name.
        let Some(unique_name) = connection.unique_name().map(|n| n.to_string()) else {
            return Err(ConnectionError::NoHandle(self.bus.clone()));
        };

        info!("Connected to the {} bus as {}", self.bus, unique_name);
        Ok(BusConnection::new(
            self.bus.clone(),
            ZbusTransport::new(connection),
        ))
    }
}
