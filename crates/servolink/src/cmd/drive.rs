use servolink_frame::Command;

use crate::cmd::{connect, DriveArgs};
use crate::exit::{scope_error, CliResult, SUCCESS};
use crate::output::{print_sent, OutputFormat};

pub fn run(args: DriveArgs, format: OutputFormat) -> CliResult<i32> {
    let mut session = connect(&args.connect)?;
    let request = args.action.request();
    session
        .send_general_read(request)
        .map_err(|err| scope_error("drive request failed", err))?;
    print_sent(
        session.port_name(),
        session.device_id(),
        Command::GeneralRead,
        request.code(),
        format,
    );
    Ok(SUCCESS)
}
