mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "servolink", version, about = "DMM servo controller CLI")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "info", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let result = cmd::run(cli.command, format);

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use servolink_frame::{Command as DmmCommand, TelemetryChannel};

    #[test]
    fn parses_send_with_named_command() {
        let cli = Cli::try_parse_from([
            "servolink",
            "send",
            "set_main_gain",
            "40",
            "--port",
            "/dev/ttyUSB0",
            "--device-id",
            "0x01",
        ])
        .expect("send args should parse");

        let Command::Send(args) = cli.command else {
            panic!("expected send");
        };
        assert_eq!(args.command, DmmCommand::SetMainGain);
        assert_eq!(args.value, 40);
        assert_eq!(args.connect.port.as_deref(), Some("/dev/ttyUSB0"));
        assert_eq!(args.connect.device_id, Some(1));
    }

    #[test]
    fn send_accepts_negative_values() {
        let cli = Cli::try_parse_from(["servolink", "send", "go_absolute_pos", "-2000"])
            .expect("negative value should parse");
        let Command::Send(args) = cli.command else {
            panic!("expected send");
        };
        assert_eq!(args.value, -2000);
    }

    #[test]
    fn rejects_unknown_command_name() {
        let err = Cli::try_parse_from(["servolink", "send", "warp_drive"])
            .expect_err("unknown command should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn parses_scope_overrides() {
        let cli = Cli::try_parse_from([
            "servolink",
            "scope",
            "--rate",
            "100",
            "--channel",
            "speed",
            "--duration",
            "5s",
            "--format",
            "json",
        ])
        .expect("scope args should parse");

        assert_eq!(cli.format, Some(OutputFormat::Json));
        let Command::Scope(args) = cli.command else {
            panic!("expected scope");
        };
        assert_eq!(args.rate, Some(100));
        assert_eq!(args.channel, Some(TelemetryChannel::Speed));
        assert_eq!(args.duration.as_deref(), Some("5s"));
    }

    #[test]
    fn parses_drive_action() {
        let cli = Cli::try_parse_from(["servolink", "drive", "disable"])
            .expect("drive args should parse");
        assert!(matches!(
            cli.command,
            Command::Drive(cmd::DriveArgs {
                action: cmd::DriveAction::Disable,
                ..
            })
        ));
    }

    #[test]
    fn parses_read_all_and_version() {
        let cli = Cli::try_parse_from(["servolink", "read-all", "--baud", "19200"])
            .expect("read-all args should parse");
        let Command::ReadAll(args) = cli.command else {
            panic!("expected read-all");
        };
        assert_eq!(args.baud, 19_200);

        let cli = Cli::try_parse_from(["servolink", "version", "--extended"])
            .expect("version args should parse");
        assert!(matches!(cli.command, Command::Version(_)));
    }
}
