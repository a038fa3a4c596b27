use servolink_scope::{find_controller, SessionConfig};
use servolink_transport::{candidate_ports, SerialConfig};

use crate::cmd::{parse_duration, FindArgs};
use crate::exit::{scope_error, CliResult, SUCCESS};
use crate::output::{print_controller, OutputFormat};

pub fn run(args: FindArgs, format: OutputFormat) -> CliResult<i32> {
    let ports = args.ports.unwrap_or_else(candidate_ports);
    let serial = SerialConfig::default().with_baud_rate(args.baud);
    let session = SessionConfig::default().with_recv_window(parse_duration(&args.recv_window)?);

    let found = find_controller(&ports, &serial, &session)
        .map_err(|err| scope_error("discovery failed", err))?;
    print_controller(&found.port, found.device_id, format);
    Ok(SUCCESS)
}
