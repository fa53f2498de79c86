//! Low-level send primitives over an established bus connection.

use std::fmt;
use std::future::Future;
use std::num::NonZeroU32;

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use futures_util::{FutureExt, StreamExt};
use tracing::debug;
use zbus::message::Flags;
use zbus::{Connection, Message, MessageStream};

use super::DispatchError;

/// An outstanding method call awaiting its reply.
///
/// Consumed by [`PendingCall::steal_reply`], so a reply can be taken at most once.
pub struct PendingCall {
    serial: NonZeroU32,
    reply: BoxFuture<'static, Option<Message>>,
}

impl PendingCall {
    pub fn new<F>(serial: NonZeroU32, reply: F) -> Self
    where
        F: Future<Output = Option<Message>> + Send + 'static,
    {
        Self {
            serial,
            reply: reply.boxed(),
        }
    }

    /// Serial of the call this handle belongs to.
    pub fn serial(&self) -> NonZeroU32 {
        self.serial
    }

    /// Wait until the call resolves and take its reply.
    ///
    /// There is no timeout: a service that never answers keeps this pending forever.
    pub async fn steal_reply(self) -> Result<Message, DispatchError> {
        self.reply.await.ok_or(DispatchError::ReplyNull)
    }
}

impl fmt::Debug for PendingCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingCall")
            .field("serial", &self.serial)
            .finish_non_exhaustive()
    }
}

/// Sending side of a bus connection.
#[async_trait]
pub trait BusTransport: Send + Sync {
    /// Queue a method call and register for its reply.
    ///
    /// Returns `None` when no reply handler was registered, e.g. because the
    /// message carries `NO_REPLY_EXPECTED`.
    async fn send_with_reply(&self, message: Message)
        -> Result<Option<PendingCall>, DispatchError>;

    /// Queue a message without registering for any reply.
    async fn send(&self, message: Message) -> Result<(), DispatchError>;

    /// Push everything queued so far out to the bus.
    async fn flush(&self) -> Result<(), DispatchError>;
}

/// [`BusTransport`] backed by a zbus connection.
pub struct ZbusTransport {
    connection: Connection,
}

impl ZbusTransport {
    pub fn new(connection: Connection) -> Self {
        Self { connection }
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }
}

#[async_trait]
impl BusTransport for ZbusTransport {
    async fn send_with_reply(
        &self,
        message: Message,
    ) -> Result<Option<PendingCall>, DispatchError> {
        let serial = message.primary_header().serial_num();
        let no_reply = message
            .primary_header()
            .flags()
            .contains(Flags::NoReplyExpected);

        if no_reply {
            self.connection
                .send(&message)
                .await
                .map_err(DispatchError::Submit)?;
            return Ok(None);
        }

        // Subscribe before sending so a fast reply cannot slip past us.
        let mut stream = MessageStream::from(&self.connection);
        self.connection
            .send(&message)
            .await
            .map_err(DispatchError::Submit)?;
        debug!("Submitted method call (serial {})", serial);

        let reply = async move {
            while let Some(item) = stream.next().await {
                match item {
                    Ok(msg) if msg.header().reply_serial() == Some(serial) => return Some(msg),
                    Ok(_) => {}
                    Err(e) => debug!("Skipping unreadable incoming message: {}", e),
                }
            }
            None
        };

        Ok(Some(PendingCall::new(serial, reply)))
    }

    async fn send(&self, message: Message) -> Result<(), DispatchError> {
        self.connection
            .send(&message)
            .await
            .map_err(DispatchError::OneWayRefused)
    }

    async fn flush(&self) -> Result<(), DispatchError> {
        // zbus writes each message to the socket before `send` resolves, so
        // nothing is left buffered on our side at this point.
        debug!(
            "Flushed connection {}",
            self.connection
                .unique_name()
                .map(|n| n.to_string())
                .unwrap_or_default()
        );
        Ok(())
    }
}
