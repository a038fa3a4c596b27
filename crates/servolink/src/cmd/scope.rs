use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use servolink_scope::{AcquisitionEngine, IntervalTicker, MonotonicClock, ScopeConfig};

use crate::cmd::{connect, install_ctrlc_handler, parse_duration, ScopeArgs};
use crate::exit::{scope_error, CliResult, SUCCESS};
use crate::output::{print_samples, print_stats, print_window, OutputFormat};

fn build_config(args: &ScopeArgs) -> CliResult<ScopeConfig> {
    let mut config = match &args.config {
        Some(path) => ScopeConfig::from_json_file(path)
            .map_err(|err| scope_error("config load failed", err))?,
        None => ScopeConfig::default(),
    };

    if let Some(rate) = args.rate {
        config = config.with_sample_rate(rate);
    }
    if let Some(window) = &args.window {
        config = config.with_window_width(parse_duration(window)?);
    }
    if let Some(interval) = args.sentinel_interval {
        config = config.with_sentinel_interval(interval);
    }
    if let Some(channel) = args.channel {
        config = config.with_channel(channel);
    }

    config
        .validate()
        .map_err(|err| scope_error("invalid scope settings", err))?;
    Ok(config)
}

pub fn run(args: ScopeArgs, format: OutputFormat) -> CliResult<i32> {
    let config = build_config(&args)?;
    let deadline = match &args.duration {
        Some(duration) => Some(Instant::now() + parse_duration(duration)?),
        None => None,
    };

    let session = connect(&args.connect)?;
    let ticker_period = config.tick_period();
    let mut engine = AcquisitionEngine::new(session, MonotonicClock::new(), config)
        .map_err(|err| scope_error("scope setup failed", err))?;

    let stop = Arc::new(AtomicBool::new(false));
    install_ctrlc_handler(stop.clone())?;

    let summaries_only = args.summary || format == OutputFormat::Table;
    let mut ticker = IntervalTicker::new(ticker_period);
    engine
        .run(&mut ticker, &stop, |report, window| {
            if !summaries_only && report.samples > 0 {
                let fresh = report.samples.min(window.len());
                print_samples(window.samples().skip(window.len() - fresh), format);
            }
            if report.rollovers > 0 {
                print_window(window, report.status, format);
            }
            if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                stop.store(true, Ordering::SeqCst);
            }
        })
        .map_err(|err| scope_error("acquisition failed", err))?;

    print_stats(engine.stats(), engine.status(), format);
    Ok(SUCCESS)
}
