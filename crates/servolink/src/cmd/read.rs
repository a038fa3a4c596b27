use servolink_frame::{Command, TelemetryChannel};

use crate::cmd::{connect, ConnectArgs, ReadArgs};
use crate::exit::{scope_error, usage, CliResult, SUCCESS};
use crate::output::{print_values, OutputFormat, ValueRow};

/// What `read` was asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    Telemetry(TelemetryChannel),
    Parameter(Command),
}

fn parse_target(param: &str) -> CliResult<Target> {
    if let Ok(channel) = param.parse::<TelemetryChannel>() {
        return Ok(Target::Telemetry(channel));
    }
    match param.parse::<Command>() {
        Ok(command) if command.expected_reply().is_some() => Ok(Target::Parameter(command)),
        Ok(command) => Err(usage(format!("{command} does not read anything back"))),
        Err(err) => Err(usage(err)),
    }
}

pub fn run(args: ReadArgs, format: OutputFormat) -> CliResult<i32> {
    let target = parse_target(&args.param)?;
    let mut session = connect(&args.connect)?;

    let row = match target {
        Target::Telemetry(channel) => {
            let reply = channel.reply();
            let value = session
                .read_general(channel.request())
                .map_err(|err| scope_error("read failed", err))?;
            ValueRow {
                name: reply.name().to_string(),
                id: reply.id(),
                value,
            }
        }
        Target::Parameter(command) => {
            let value = session
                .read_parameter(command)
                .map_err(|err| scope_error("read failed", err))?;
            ValueRow {
                name: command.name().to_string(),
                id: command.id(),
                value,
            }
        }
    };

    print_values(&[row], format);
    Ok(SUCCESS)
}

pub fn run_all(args: ConnectArgs, format: OutputFormat) -> CliResult<i32> {
    let mut session = connect(&args)?;
    let rows: Vec<ValueRow> = session
        .read_all_parameters()
        .map_err(|err| scope_error("read failed", err))?
        .into_iter()
        .map(|(command, value)| ValueRow {
            name: command.name().to_string(),
            id: command.id(),
            value,
        })
        .collect();

    print_values(&rows, format);
    Ok(SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn telemetry_names_win_over_commands() {
        assert_eq!(
            parse_target("speed").unwrap(),
            Target::Telemetry(TelemetryChannel::Speed)
        );
        assert_eq!(
            parse_target("read_main_gain").unwrap(),
            Target::Parameter(Command::ReadMainGain)
        );
    }

    #[test]
    fn commands_without_replies_are_rejected() {
        let err = parse_target("set_origin").unwrap_err();
        assert_eq!(err.code, crate::exit::USAGE);
        assert!(parse_target("nonsense").is_err());
    }
}
