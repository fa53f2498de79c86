//! In-memory bus doubles for unit tests.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use zbus::message::Flags;
use zbus::{Connection, Message};

use super::transport::{BusTransport, PendingCall};
use super::{BusConnection, ConnectionError, Connector, DispatchError};
use crate::config::BusKind;

/// How the fake bus misbehaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Fault {
    #[default]
    None,
    SubmitFails,
    NoPendingCall,
    ReplyNull,
    SendRefused,
    FlushFails,
}

/// Everything the fake bus saw.
#[derive(Debug, Default)]
pub struct BusLog {
    pub connects: usize,
    pub submitted: Vec<Message>,
    pub pending_calls: usize,
    pub replies_consumed: usize,
    pub flushes: usize,
    pub connections_released: usize,
}

pub type SharedLog = Arc<Mutex<BusLog>>;

pub struct RecordingTransport {
    log: SharedLog,
    fault: Fault,
}

impl RecordingTransport {
    pub fn new(log: SharedLog, fault: Fault) -> Self {
        Self { log, fault }
    }
}

impl Drop for RecordingTransport {
    fn drop(&mut self) {
        self.log.lock().unwrap().connections_released += 1;
    }
}

fn reply_stub() -> Message {
    Message::method_call("/com/vss_lib/VehicleSignals", "Reply")
        .unwrap()
        .build(&())
        .unwrap()
}

#[async_trait]
impl BusTransport for RecordingTransport {
    async fn send_with_reply(
        &self,
        message: Message,
    ) -> Result<Option<PendingCall>, DispatchError> {
        if self.fault == Fault::SubmitFails {
            return Err(DispatchError::Submit(zbus::Error::Failure(
                "out of memory".to_string(),
            )));
        }

        let serial = message.primary_header().serial_num();
        let no_reply = message
            .primary_header()
            .flags()
            .contains(Flags::NoReplyExpected);
        self.log.lock().unwrap().submitted.push(message);

        if no_reply || self.fault == Fault::NoPendingCall {
            return Ok(None);
        }

        self.log.lock().unwrap().pending_calls += 1;
        let log = Arc::clone(&self.log);
        let reply_null = self.fault == Fault::ReplyNull;
        Ok(Some(PendingCall::new(serial, async move {
            if reply_null {
                return None;
            }
            log.lock().unwrap().replies_consumed += 1;
            Some(reply_stub())
        })))
    }

    async fn send(&self, message: Message) -> Result<(), DispatchError> {
        if self.fault == Fault::SendRefused {
            return Err(DispatchError::OneWayRefused(zbus::Error::Failure(
                "out of memory".to_string(),
            )));
        }
        self.log.lock().unwrap().submitted.push(message);
        Ok(())
    }

    async fn flush(&self) -> Result<(), DispatchError> {
        if self.fault == Fault::FlushFails {
            return Err(DispatchError::Flush(zbus::Error::Failure(
                "broken pipe".to_string(),
            )));
        }
        self.log.lock().unwrap().flushes += 1;
        Ok(())
    }
}

/// Hands out [`RecordingTransport`] connections, or refuses to connect.
pub struct RecordingConnector {
    pub log: SharedLog,
    pub fault: Fault,
    pub unreachable: bool,
}

impl RecordingConnector {
    pub fn new(fault: Fault) -> Self {
        Self {
            log: SharedLog::default(),
            fault,
            unreachable: false,
        }
    }

    pub fn unreachable() -> Self {
        Self {
            unreachable: true,
            ..Self::new(Fault::None)
        }
    }

    pub fn connection(&self) -> BusConnection {
        BusConnection::new(
            BusKind::System,
            RecordingTransport::new(Arc::clone(&self.log), self.fault),
        )
    }
}

#[async_trait]
impl Connector for RecordingConnector {
    async fn connect(&self) -> Result<BusConnection, ConnectionError> {
        self.log.lock().unwrap().connects += 1;
        if self.unreachable {
            return Err(ConnectionError::Unreachable {
                bus: BusKind::System,
                source: zbus::Error::Failure("connection refused".to_string()),
            });
        }
        Ok(self.connection())
    }
}

/// Two zbus connections joined over a socket pair, with no bus daemon.
///
/// Returns `(client, service)`.
pub async fn peer_pair() -> (Connection, Connection) {
    let guid = zbus::Guid::generate();
    let (client, service) = tokio::net::UnixStream::pair().unwrap();
    tokio::try_join!(
        zbus::connection::Builder::unix_stream(client).p2p().build(),
        zbus::connection::Builder::unix_stream(service)
            .server(guid)
            .unwrap()
            .p2p()
            .build(),
    )
    .unwrap()
}
