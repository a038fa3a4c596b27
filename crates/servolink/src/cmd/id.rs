use servolink_scope::probe;

use crate::cmd::{connect, ConnectArgs};
use crate::exit::{scope_error, CliResult, SUCCESS};
use crate::output::{print_controller, OutputFormat};

pub fn run(args: ConnectArgs, format: OutputFormat) -> CliResult<i32> {
    let mut session = connect(&args)?;
    let device_id =
        probe(&mut session).map_err(|err| scope_error("read drive id failed", err))?;
    print_controller(session.port_name(), device_id, format);
    Ok(SUCCESS)
}
