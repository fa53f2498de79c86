//! Method call construction and argument marshalling.

use std::fmt;

use tracing::debug;
use zbus::message::Flags;
use zbus::names::{BusName, InterfaceName, MemberName};
use zbus::zvariant::ObjectPath;
use zbus::Message;

use super::BuildError;
use crate::config::{DispatchMode, SignalTarget};

/// Wire types the signal protocol uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgumentKind {
    /// UTF-8 string (`s`)
    String,
    /// 32-bit signed integer (`i`)
    Int32,
}

impl fmt::Display for ArgumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgumentKind::String => write!(f, "string (s)"),
            ArgumentKind::Int32 => write!(f, "int32 (i)"),
        }
    }
}

/// One positional argument of a method call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignalArgument {
    Str(String),
    Int32(i32),
}

impl SignalArgument {
    pub fn kind(&self) -> ArgumentKind {
        match self {
            SignalArgument::Str(_) => ArgumentKind::String,
            SignalArgument::Int32(_) => ArgumentKind::Int32,
        }
    }
}

impl From<&str> for SignalArgument {
    fn from(value: &str) -> Self {
        SignalArgument::Str(value.to_string())
    }
}

impl From<String> for SignalArgument {
    fn from(value: String) -> Self {
        SignalArgument::Str(value)
    }
}

impl From<i32> for SignalArgument {
    fn from(value: i32) -> Self {
        SignalArgument::Int32(value)
    }
}

/// `EmitHardwareSignal` takes exactly `(s, i)`.
const EXPECTED_ARGUMENTS: [ArgumentKind; 2] = [ArgumentKind::String, ArgumentKind::Int32];

/// A fully addressed, validated method call that has not touched the bus yet.
#[derive(Debug, Clone)]
pub struct MethodCallRequest {
    service: BusName<'static>,
    object_path: ObjectPath<'static>,
    interface: InterfaceName<'static>,
    method: MemberName<'static>,
    args: Vec<SignalArgument>,
}

impl MethodCallRequest {
    /// Validate the address and the arguments of a call.
    ///
    /// Arguments must be exactly one string followed by one int32; there is no
    /// schema negotiation with the remote side, so anything else is rejected here.
    pub fn build(
        service: &str,
        object_path: &str,
        interface: &str,
        method: &str,
        args: Vec<SignalArgument>,
    ) -> Result<Self, BuildError> {
        let service = BusName::try_from(service)
            .map(|n| n.into_owned())
            .map_err(|e| invalid("service name", e))?;
        let object_path = ObjectPath::try_from(object_path)
            .map(|p| p.into_owned())
            .map_err(|e| invalid("object path", e))?;
        let interface = InterfaceName::try_from(interface)
            .map(|n| n.into_owned())
            .map_err(|e| invalid("interface name", e))?;
        let method = MemberName::try_from(method)
            .map(|n| n.into_owned())
            .map_err(|e| invalid("method name", e))?;

        check_arguments(&args)?;

        Ok(Self {
            service,
            object_path,
            interface,
            method,
            args,
        })
    }

    /// Build the `EmitHardwareSignal(name, value)` call for `target`.
    pub fn for_signal(target: &SignalTarget, name: &str, value: i32) -> Result<Self, BuildError> {
        Self::build(
            &target.service,
            &target.object_path,
            &target.interface,
            &target.method,
            vec![name.into(), value.into()],
        )
    }

    pub fn service(&self) -> &str {
        self.service.as_str()
    }

    pub fn object_path(&self) -> &str {
        self.object_path.as_str()
    }

    pub fn interface(&self) -> &str {
        self.interface.as_str()
    }

    pub fn method(&self) -> &str {
        self.method.as_str()
    }

    pub fn args(&self) -> &[SignalArgument] {
        &self.args
    }

    /// Marshal the request into a wire message.
    ///
    /// Fire-and-forget messages carry `NO_REPLY_EXPECTED` so the service does
    /// not answer.
    pub fn to_message(&self, mode: DispatchMode) -> Result<Message, BuildError> {
        let (name, value) = self.body()?;

        let mut builder = Message::method_call(self.object_path.as_str(), self.method.as_str())
            .map_err(|e| invalid("object path or method name", e))?
            .destination(self.service.as_str())
            .map_err(|e| invalid("service name", e))?
            .interface(self.interface.as_str())
            .map_err(|e| invalid("interface name", e))?;

        if mode == DispatchMode::FireAndForget {
            builder = builder
                .with_flags(Flags::NoReplyExpected)
                .map_err(|e| invalid("header flags", e))?;
        }

        let message = builder.build(&(name, value)).map_err(BuildError::Marshal)?;
        debug!(
            "Built {}.{} call to {} (serial {})",
            self.interface,
            self.method,
            self.service,
            message.primary_header().serial_num()
        );
        Ok(message)
    }

    fn body(&self) -> Result<(&str, i32), BuildError> {
        match self.args.as_slice() {
            [SignalArgument::Str(name), SignalArgument::Int32(value)] => Ok((name, *value)),
            args => Err(check_arguments(args)
                .err()
                .unwrap_or(BuildError::ArgumentCount {
                    expected: EXPECTED_ARGUMENTS.len(),
                    found: args.len(),
                })),
        }
    }
}

fn invalid(field: &'static str, err: impl fmt::Display) -> BuildError {
    BuildError::InvalidAddress {
        field,
        reason: err.to_string(),
    }
}

fn check_arguments(args: &[SignalArgument]) -> Result<(), BuildError> {
    if args.len() != EXPECTED_ARGUMENTS.len() {
        return Err(BuildError::ArgumentCount {
            expected: EXPECTED_ARGUMENTS.len(),
            found: args.len(),
        });
    }

    for (index, (arg, expected)) in args.iter().zip(EXPECTED_ARGUMENTS).enumerate() {
        if arg.kind() != expected {
            return Err(BuildError::ArgumentType {
                index,
                expected,
                found: arg.kind(),
            });
        }
        // D-Bus strings are NUL-terminated on the wire.
        if let SignalArgument::Str(s) = arg {
            if s.contains('\0') {
                return Err(BuildError::Unmarshallable {
                    index,
                    reason: "string contains a NUL byte".to_string(),
                });
            }
        }
    }

    Ok(())
}
