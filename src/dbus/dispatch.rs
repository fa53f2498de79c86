//! Sending a built method call in blocking or fire-and-forget mode.

use std::num::NonZeroU32;

use tracing::{debug, warn};
use zbus::message::Type;
use zbus::Message;

use super::connection::BusConnection;
use super::DispatchError;
use crate::config::DispatchMode;

/// What happened to a dispatched call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchReceipt {
    pub mode: DispatchMode,
    pub serial: NonZeroU32,
    /// A reply arrived (blocking mode only)
    pub reply_received: bool,
    /// Outbound data was flushed (fire-and-forget mode only)
    pub flushed: bool,
}

/// Sends one message per call over a connection it takes ownership of.
#[derive(Debug, Clone, Copy, Default)]
pub struct Dispatcher {
    mode: DispatchMode,
}

impl Dispatcher {
    pub fn new(mode: DispatchMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> DispatchMode {
        self.mode
    }

    /// Send `message` and complete it according to the dispatch mode.
    ///
    /// The connection is released when this returns, on success and on error.
    pub async fn dispatch(
        &self,
        connection: BusConnection,
        message: Message,
    ) -> Result<DispatchReceipt, DispatchError> {
        let serial = message.primary_header().serial_num();
        match self.mode {
            DispatchMode::Blocking => call_and_wait(&connection, message, serial).await,
            DispatchMode::FireAndForget => send_and_flush(&connection, message, serial).await,
        }
    }
}

async fn call_and_wait(
    connection: &BusConnection,
    message: Message,
    serial: NonZeroU32,
) -> Result<DispatchReceipt, DispatchError> {
    // The message is handed off here and dropped by the transport.
    let pending = connection
        .transport()
        .send_with_reply(message)
        .await?
        .ok_or(DispatchError::NoPendingCall)?;

    debug!("Waiting for reply to serial {}", pending.serial());
    let reply = pending.steal_reply().await?;

    if reply.message_type() == Type::Error {
        let header = reply.header();
        warn!(
            "Service answered serial {} with error {}",
            serial,
            header
                .error_name()
                .map(|n| n.to_string())
                .unwrap_or_default()
        );
    }
    debug!("Reply received for serial {}", serial);

    Ok(DispatchReceipt {
        mode: DispatchMode::Blocking,
        serial,
        reply_received: true,
        flushed: false,
    })
}

async fn send_and_flush(
    connection: &BusConnection,
    message: Message,
    serial: NonZeroU32,
) -> Result<DispatchReceipt, DispatchError> {
    let transport = connection.transport();
    transport.send(message).await?;
    transport.flush().await?;
    debug!("Sent serial {} one-way", serial);

    Ok(DispatchReceipt {
        mode: DispatchMode::FireAndForget,
        serial,
        reply_received: false,
        flushed: true,
    })
}
