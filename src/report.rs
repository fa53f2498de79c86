//! User-facing reporting of a signal invocation.

use std::process::ExitCode;

use tracing::error;

use crate::client::SentSignal;
use crate::dbus::SignalError;

/// Confirmation line for a delivered signal.
pub fn confirmation(sent: &SentSignal, vendor: Option<&str>) -> String {
    let mut line = format!(
        "Hardware signal '{}' with value {} sent to D-Bus.",
        sent.name, sent.value
    );
    if let Some(vendor) = vendor {
        line.push_str(&format!(" (sent by {})", vendor));
    }
    line
}

/// Diagnostic line naming the failed stage.
pub fn diagnostic(err: &SignalError) -> String {
    match err {
        SignalError::Unexpected(inner) => {
            format!("Error: {} stage failed: {:#}", err.stage(), inner)
        }
        _ => format!("Error: {} stage failed: {}", err.stage(), err),
    }
}

pub fn report_success(sent: &SentSignal, vendor: Option<&str>) -> ExitCode {
    println!("{}", confirmation(sent, vendor));
    ExitCode::SUCCESS
}

pub fn report_failure(err: &SignalError) -> ExitCode {
    error!("Signal not sent ({} stage)", err.stage());
    eprintln!("{}", diagnostic(err));
    ExitCode::from(err.exit_code())
}
