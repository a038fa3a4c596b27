use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Subcommand, ValueEnum};
use servolink_frame::{Command as DmmCommand, GeneralRead, TelemetryChannel, BROADCAST_ID};
use servolink_scope::{find_controller, Session, SessionConfig};
use servolink_transport::{candidate_ports, SerialConfig, SerialTransport, DEFAULT_BAUD_RATE};
use tracing::info;

use crate::exit::{scope_error, transport_error, usage, CliError, CliResult, INTERNAL};
use crate::output::OutputFormat;

pub mod drive;
pub mod find;
pub mod id;
pub mod monitor;
pub mod read;
pub mod scope;
pub mod send;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Scan serial ports for a responding controller.
    Find(FindArgs),
    /// Read the drive id of the controller on a port.
    Id(ConnectArgs),
    /// Send a single command.
    Send(SendArgs),
    /// Read one parameter or telemetry value.
    Read(ReadArgs),
    /// Read every readable parameter.
    ReadAll(ConnectArgs),
    /// Enable, disable or reset the motor drive.
    Drive(DriveArgs),
    /// Print every frame received on the line.
    Monitor(MonitorArgs),
    /// Sample telemetry at a fixed rate.
    Scope(ScopeArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Find(args) => find::run(args, format),
        Command::Id(args) => id::run(args, format),
        Command::Send(args) => send::run(args, format),
        Command::Read(args) => read::run(args, format),
        Command::ReadAll(args) => read::run_all(args, format),
        Command::Drive(args) => drive::run(args, format),
        Command::Monitor(args) => monitor::run(args, format),
        Command::Scope(args) => scope::run(args, format),
        Command::Version(args) => version::run(args, format),
    }
}

/// Serial line and addressing shared by every command that talks to a drive.
#[derive(Args, Debug, Clone)]
pub struct ConnectArgs {
    /// Serial port. Default: scan candidate ports for a controller.
    #[arg(long, short = 'p')]
    pub port: Option<String>,
    /// Line rate in baud.
    #[arg(long, default_value_t = DEFAULT_BAUD_RATE)]
    pub baud: u32,
    /// Target device id, decimal or 0x-prefixed hex. Default: the id found
    /// while scanning, or broadcast (0x7f) with --port.
    #[arg(long, value_parser = parse_device_id)]
    pub device_id: Option<u8>,
    /// How long one receive waits for bytes (e.g. 20ms).
    #[arg(long, default_value = "20ms")]
    pub recv_window: String,
}

impl ConnectArgs {
    fn serial_config(&self) -> SerialConfig {
        SerialConfig::default().with_baud_rate(self.baud)
    }

    fn session_config(&self) -> CliResult<SessionConfig> {
        Ok(SessionConfig::default()
            .with_device_id(self.device_id.unwrap_or(BROADCAST_ID))
            .with_recv_window(parse_duration(&self.recv_window)?))
    }
}

#[derive(Args, Debug)]
pub struct FindArgs {
    /// Ports to probe, comma-separated. Default: enumerated system ports.
    #[arg(long, value_delimiter = ',')]
    pub ports: Option<Vec<String>>,
    /// Line rate in baud.
    #[arg(long, default_value_t = DEFAULT_BAUD_RATE)]
    pub baud: u32,
    /// How long one receive waits for bytes (e.g. 20ms).
    #[arg(long, default_value = "20ms")]
    pub recv_window: String,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,
    /// Command name (Set_MainGain, go-absolute-pos, ...) or id (0x10).
    pub command: DmmCommand,
    /// Command argument.
    #[arg(default_value_t = 0, allow_negative_numbers = true)]
    pub value: i32,
    /// Print frames received within one receive window after sending.
    #[arg(long)]
    pub wait: bool,
}

#[derive(Args, Debug)]
pub struct ReadArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,
    /// Telemetry channel (position, speed, torque) or a Read_* command.
    pub param: String,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum DriveAction {
    Enable,
    Disable,
    Reset,
}

impl DriveAction {
    pub fn request(self) -> GeneralRead {
        match self {
            DriveAction::Enable => GeneralRead::DriveEnable,
            DriveAction::Disable => GeneralRead::DriveDisable,
            DriveAction::Reset => GeneralRead::DriveReset,
        }
    }
}

#[derive(Args, Debug)]
pub struct DriveArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,
    pub action: DriveAction,
}

#[derive(Args, Debug)]
pub struct MonitorArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,
    /// Exit after printing N frames.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug)]
pub struct ScopeArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,
    /// JSON acquisition settings; flags below override it.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
    /// Sample rate in Hz.
    #[arg(long)]
    pub rate: Option<u32>,
    /// Window width (e.g. 2s, 500ms).
    #[arg(long)]
    pub window: Option<String>,
    /// Telemetry requests between sentinel reads.
    #[arg(long)]
    pub sentinel_interval: Option<u32>,
    /// Quantity to sample.
    #[arg(long)]
    pub channel: Option<TelemetryChannel>,
    /// Stop after this long (e.g. 10s). Default: until Ctrl-C.
    #[arg(long)]
    pub duration: Option<String>,
    /// Print only window summaries, not individual samples.
    #[arg(long)]
    pub summary: bool,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Open the configured port, or scan for a controller when none is given.
///
/// A scanned session targets the id the controller reported unless
/// `--device-id` overrides it.
pub fn connect(args: &ConnectArgs) -> CliResult<Session<SerialTransport>> {
    let session_config = args.session_config()?;

    let Some(port) = &args.port else {
        let ports = candidate_ports();
        let found = find_controller(&ports, &args.serial_config(), &session_config)
            .map_err(|err| scope_error("discovery failed", err))?;
        let mut session = found.session;
        if args.device_id.is_none() {
            session.set_device_id(found.device_id);
        }
        return Ok(session);
    };

    let transport = SerialTransport::open_with_config(port, &args.serial_config())
        .map_err(|err| transport_error("open failed", err))?;
    info!(port = %port, device_id = session_config.device_id, "connected");
    Ok(Session::with_config(transport, session_config))
}

fn parse_device_id(input: &str) -> Result<u8, String> {
    let input = input.trim();
    let parsed = match input.strip_prefix("0x").or_else(|| input.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => input.parse::<u8>(),
    };
    match parsed {
        Ok(id) if id <= BROADCAST_ID => Ok(id),
        Ok(id) => Err(format!("device id {id} is out of range 0-127")),
        Err(_) => Err(format!("invalid device id: {input}")),
    }
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(usage("duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| usage(format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(usage("duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}

/// Raise `stop` on Ctrl-C.
pub fn install_ctrlc_handler(stop: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        stop.store(true, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
