use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::cmd::{connect, install_ctrlc_handler, MonitorArgs};
use crate::exit::{scope_error, CliResult, SUCCESS};
use crate::output::{print_frame, OutputFormat};

pub fn run(args: MonitorArgs, format: OutputFormat) -> CliResult<i32> {
    let mut session = connect(&args.connect)?;

    let stop = Arc::new(AtomicBool::new(false));
    install_ctrlc_handler(stop.clone())?;

    let wait = session.config().recv_window;
    let mut printed = 0usize;

    while !stop.load(Ordering::SeqCst) {
        let frames = session
            .poll(wait)
            .map_err(|err| scope_error("receive failed", err))?;

        for frame in &frames {
            print_frame(frame, format);
            printed = printed.saturating_add(1);

            if let Some(count) = args.count {
                if printed >= count {
                    return Ok(SUCCESS);
                }
            }
        }
    }

    Ok(SUCCESS)
}
