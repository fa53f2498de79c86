//! End-to-end emission of one hardware signal.
//!
//! Runs the stages in order (connect, build, dispatch) and stops at the first
//! failure. Nothing is retried; each call is one independent remote invocation.

use tracing::{debug, info};

use crate::config::ClientConfig;
use crate::dbus::{
    Connector, DispatchReceipt, Dispatcher, MethodCallRequest, SignalError, ZbusConnector,
};

/// A signal the bus accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentSignal {
    pub name: String,
    pub value: i32,
    pub receipt: DispatchReceipt,
}

/// Client for the VSS `EmitHardwareSignal` method.
pub struct SignalClient<C: Connector = ZbusConnector> {
    connector: C,
    config: ClientConfig,
}

impl SignalClient<ZbusConnector> {
    pub fn new(config: ClientConfig) -> Self {
        let connector = ZbusConnector::new(config.bus.clone());
        Self { connector, config }
    }
}

impl<C: Connector> SignalClient<C> {
    pub fn with_connector(connector: C, config: ClientConfig) -> Self {
        Self { connector, config }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Send `EmitHardwareSignal(name, value)` once.
    pub async fn emit_hardware_signal(
        &self,
        name: &str,
        value: i32,
    ) -> Result<SentSignal, SignalError> {
        self.config.validate()?;

        let connection = self.connector.connect().await?;

        let request = MethodCallRequest::for_signal(&self.config.target, name, value)?;
        let message = request.to_message(self.config.mode)?;
        debug!("Dispatching '{}' = {} ({})", name, value, self.config.mode);

        let receipt = Dispatcher::new(self.config.mode)
            .dispatch(connection, message)
            .await?;

        info!(
            "Hardware signal '{}' = {} delivered (serial {})",
            name, value, receipt.serial
        );
        Ok(SentSignal {
            name: name.to_string(),
            value,
            receipt,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BusKind, DispatchMode};
    use crate::dbus::testing::{Fault, RecordingConnector};
    use crate::dbus::{BuildError, ConnectionError, DispatchError};

    fn client(connector: RecordingConnector, mode: DispatchMode) -> SignalClient<RecordingConnector> {
        SignalClient::with_connector(connector, ClientConfig::new(BusKind::System, mode))
    }

    #[tokio::test]
    async fn test_speed_blocking_scenario() {
        let client = client(RecordingConnector::new(Fault::None), DispatchMode::Blocking);

        let sent = client.emit_hardware_signal("Speed", 80).await.unwrap();
        assert_eq!(sent.name, "Speed");
        assert_eq!(sent.value, 80);
        assert!(sent.receipt.reply_received);

        let log = client.connector.log.lock().unwrap();
        assert_eq!(log.connects, 1);
        assert_eq!(log.submitted.len(), 1);
        assert_eq!(log.pending_calls, 1);
        assert_eq!(log.replies_consumed, 1);
        assert_eq!(log.connections_released, 1);

        let msg = &log.submitted[0];
        let header = msg.header();
        assert_eq!(
            header.member().map(|m| m.as_str()),
            Some("EmitHardwareSignal")
        );
        let (name, value): (String, i32) = msg.body().deserialize().unwrap();
        assert_eq!((name.as_str(), value), ("Speed", 80));
    }

    #[tokio::test]
    async fn test_speed_fire_and_forget_scenario() {
        let client = client(
            RecordingConnector::new(Fault::None),
            DispatchMode::FireAndForget,
        );

        let sent = client.emit_hardware_signal("Speed", 80).await.unwrap();
        assert!(sent.receipt.flushed);
        assert!(!sent.receipt.reply_received);

        let log = client.connector.log.lock().unwrap();
        assert_eq!(log.submitted.len(), 1);
        assert_eq!(log.flushes, 1);
        assert_eq!(log.pending_calls, 0);
        assert_eq!(log.replies_consumed, 0);
    }

    #[tokio::test]
    async fn test_connection_failure_sends_nothing() {
        for mode in [DispatchMode::Blocking, DispatchMode::FireAndForget] {
            let client = client(RecordingConnector::unreachable(), mode);

            let err = client.emit_hardware_signal("Speed", 80).await.unwrap_err();
            assert!(matches!(
                err,
                SignalError::Connection(ConnectionError::Unreachable { .. })
            ));
            assert_eq!(err.stage(), "connection");

            let log = client.connector.log.lock().unwrap();
            assert_eq!(log.connects, 1);
            assert!(log.submitted.is_empty());
        }
    }

    #[tokio::test]
    async fn test_marshalling_failure_sends_nothing() {
        let client = client(RecordingConnector::new(Fault::None), DispatchMode::Blocking);

        let err = client
            .emit_hardware_signal("Spe\0ed", 80)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SignalError::Build(BuildError::Unmarshallable { index: 0, .. })
        ));

        let log = client.connector.log.lock().unwrap();
        assert!(log.submitted.is_empty());
        assert_eq!(log.connections_released, 1);
    }

    #[tokio::test]
    async fn test_boundary_values() {
        for (name, value) in [("", 0), ("Speed", i32::MIN), ("Speed", i32::MAX)] {
            for mode in [DispatchMode::Blocking, DispatchMode::FireAndForget] {
                let client = client(RecordingConnector::new(Fault::None), mode);
                let sent = client.emit_hardware_signal(name, value).await.unwrap();
                assert_eq!(sent.value, value);
                assert_eq!(client.connector.log.lock().unwrap().submitted.len(), 1);
            }
        }
    }

    #[tokio::test]
    async fn test_repeated_calls_are_independent() {
        let client = client(RecordingConnector::new(Fault::None), DispatchMode::Blocking);

        let first = client.emit_hardware_signal("Speed", 80).await.unwrap();
        let second = client.emit_hardware_signal("Speed", 80).await.unwrap();
        assert_ne!(first.receipt.serial, second.receipt.serial);

        let log = client.connector.log.lock().unwrap();
        assert_eq!(log.connects, 2);
        assert_eq!(log.submitted.len(), 2);
        assert_eq!(log.connections_released, 2);
    }

    #[tokio::test]
    async fn test_dispatch_failure_is_reported_as_dispatch_stage() {
        let client = client(
            RecordingConnector::new(Fault::ReplyNull),
            DispatchMode::Blocking,
        );

        let err = client.emit_hardware_signal("Speed", 80).await.unwrap_err();
        assert!(matches!(err, SignalError::Dispatch(DispatchError::ReplyNull)));
        assert_eq!(err.exit_code(), 5);
    }

    #[tokio::test]
    async fn test_invalid_target_fails_before_connecting() {
        let mut config = ClientConfig::default();
        config.target.service = String::new();
        let client = SignalClient::with_connector(RecordingConnector::new(Fault::None), config);

        let err = client.emit_hardware_signal("Speed", 80).await.unwrap_err();
        assert_eq!(err.stage(), "build");
        assert_eq!(client.connector.log.lock().unwrap().connects, 0);
    }
}
