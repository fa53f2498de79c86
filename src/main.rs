use std::process::ExitCode;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use vss_signal::config::{DEFAULT_SIGNAL_NAME, DEFAULT_SIGNAL_VALUE};
use vss_signal::{report, BusKind, ClientConfig, DispatchMode, SignalClient, SignalError};

#[derive(Parser)]
#[command(name = "vss-signal")]
#[command(author, version, about = "Send vendor hardware signals to the VSS D-Bus service", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Send one hardware signal (default when no command is given)
    Send {
        /// Signal name
        #[arg(default_value = DEFAULT_SIGNAL_NAME)]
        name: String,

        /// Signal value (32-bit signed integer)
        #[arg(default_value_t = DEFAULT_SIGNAL_VALUE, allow_negative_numbers = true)]
        value: i32,

        /// Vendor sending the signal (only shown in the confirmation)
        #[arg(long)]
        vendor: Option<String>,

        #[command(flatten)]
        bus: BusArgs,
    },

    /// Show the bus target without sending anything
    Target {
        #[command(flatten)]
        bus: BusArgs,
    },
}

#[derive(Args)]
struct BusArgs {
    /// Use the session bus instead of the system bus
    #[arg(long, conflicts_with = "address")]
    session: bool,

    /// Connect to an explicit bus address (e.g. unix:path=/run/dbus/system_bus_socket)
    #[arg(long, value_name = "ADDR")]
    address: Option<String>,

    /// Dispatch mode
    #[arg(short, long, value_enum, default_value_t = DispatchMode::Blocking)]
    mode: DispatchMode,
}

impl BusArgs {
    fn into_config(self) -> ClientConfig {
        let bus = match (self.session, self.address) {
            (_, Some(address)) => BusKind::Address(address),
            (true, None) => BusKind::Session,
            (false, None) => BusKind::System,
        };
        ClientConfig::new(bus, self.mode)
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("vss_signal=debug,zbus=info")
    } else {
        EnvFilter::new("vss_signal=info,zbus=warn")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn send(config: ClientConfig, name: &str, value: i32, vendor: Option<&str>) -> ExitCode {
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")
    {
        Ok(runtime) => runtime,
        Err(e) => return report::report_failure(&SignalError::Unexpected(e)),
    };

    info!(
        "Sending '{}' = {} over the {} bus ({})",
        name, value, config.bus, config.mode
    );
    let client = SignalClient::new(config);
    match runtime.block_on(client.emit_hardware_signal(name, value)) {
        Ok(sent) => report::report_success(&sent, vendor),
        Err(e) => report::report_failure(&e),
    }
}

fn show_target(config: ClientConfig) -> ExitCode {
    let rendered = config.validate().and_then(|_| config.to_toml());
    match rendered {
        Ok(toml) => {
            print!("{}", toml);
            ExitCode::SUCCESS
        }
        Err(e) => report::report_failure(&SignalError::from(e)),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        None => send(
            ClientConfig::default(),
            DEFAULT_SIGNAL_NAME,
            DEFAULT_SIGNAL_VALUE,
            None,
        ),

        Some(Commands::Send {
            name,
            value,
            vendor,
            bus,
        }) => send(bus.into_config(), &name, value, vendor.as_deref()),

        Some(Commands::Target { bus }) => show_target(bus.into_config()),
    }
}
