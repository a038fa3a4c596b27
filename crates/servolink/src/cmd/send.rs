use crate::cmd::{connect, SendArgs};
use crate::exit::{scope_error, CliResult, SUCCESS};
use crate::output::{print_frame, print_sent, OutputFormat};

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let mut session = connect(&args.connect)?;
    session
        .send(args.command, args.value)
        .map_err(|err| scope_error("send failed", err))?;
    print_sent(
        session.port_name(),
        session.device_id(),
        args.command,
        args.value,
        format,
    );

    if args.wait {
        let frames = session
            .recv()
            .map_err(|err| scope_error("receive failed", err))?;
        for frame in &frames {
            print_frame(frame, format);
        }
    }

    Ok(SUCCESS)
}
