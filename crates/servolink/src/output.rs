use std::io::IsTerminal;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use servolink_frame::{Command, Frame, FrameKind};
use servolink_scope::{EngineStats, LinkStatus, Sample, SampleWindow};

#[derive(Clone, Debug, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

fn table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);
    table
}

fn print_json<T: Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

fn optional(value: Option<i32>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}

#[derive(Serialize)]
struct FrameOutput<'a> {
    kind: FrameKind,
    device_id: u8,
    id: u8,
    name: &'a str,
    value: i32,
    timestamp: String,
}

pub fn print_frame(frame: &Frame, format: OutputFormat) {
    let name = frame.label();
    match format {
        OutputFormat::Json => print_json(&FrameOutput {
            kind: frame.kind,
            device_id: frame.device_id,
            id: frame.id,
            name: &name,
            value: frame.value,
            timestamp: now_unix_seconds(),
        }),
        OutputFormat::Table => {
            let mut out = table(vec!["KIND", "DEVICE", "ID", "NAME", "VALUE"]);
            out.add_row(vec![
                kind_name(frame.kind).to_string(),
                format!("0x{:02X}", frame.device_id),
                format!("0x{:02X}", frame.id),
                name,
                frame.value.to_string(),
            ]);
            println!("{out}");
        }
        OutputFormat::Pretty => {
            println!(
                "{:<5} {name}(0x{:02x}) device=0x{:02x} value={}",
                kind_name(frame.kind),
                frame.id,
                frame.device_id,
                frame.value
            );
        }
    }
}

fn kind_name(kind: FrameKind) -> &'static str {
    match kind {
        FrameKind::Echo => "echo",
        FrameKind::Reply => "reply",
    }
}

#[derive(Serialize)]
struct ControllerOutput<'a> {
    port: &'a str,
    device_id: u8,
}

pub fn print_controller(port: &str, device_id: u8, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&ControllerOutput { port, device_id }),
        OutputFormat::Table => {
            let mut out = table(vec!["PORT", "DEVICE ID"]);
            out.add_row(vec![port.to_string(), device_id.to_string()]);
            println!("{out}");
        }
        OutputFormat::Pretty => println!("controller on {port}, device id {device_id}"),
    }
}

#[derive(Serialize)]
struct SentOutput<'a> {
    port: &'a str,
    device_id: u8,
    command: &'a str,
    id: u8,
    value: i32,
}

pub fn print_sent(
    port: &str,
    device_id: u8,
    command: Command,
    value: i32,
    format: OutputFormat,
) {
    match format {
        OutputFormat::Json => print_json(&SentOutput {
            port,
            device_id,
            command: command.name(),
            id: command.id(),
            value,
        }),
        OutputFormat::Table => {
            let mut out = table(vec!["PORT", "DEVICE", "COMMAND", "VALUE"]);
            out.add_row(vec![
                port.to_string(),
                format!("0x{device_id:02X}"),
                format!("{command} (0x{:02X})", command.id()),
                value.to_string(),
            ]);
            println!("{out}");
        }
        OutputFormat::Pretty => println!(
            "sent {command}(0x{:02x}) value={value} to {port}",
            command.id()
        ),
    }
}

/// One named value read back from the controller.
#[derive(Debug, Clone, Serialize)]
pub struct ValueRow {
    pub name: String,
    pub id: u8,
    pub value: Option<i32>,
}

pub fn print_values(rows: &[ValueRow], format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&rows),
        OutputFormat::Table => {
            let mut out = table(vec!["PARAMETER", "ID", "VALUE"]);
            for row in rows {
                out.add_row(vec![
                    row.name.clone(),
                    format!("0x{:02X}", row.id),
                    optional(row.value),
                ]);
            }
            println!("{out}");
        }
        OutputFormat::Pretty => {
            for row in rows {
                println!("{:<16} {}", row.name, optional(row.value));
            }
        }
    }
}

#[derive(Serialize)]
struct SampleOutput {
    t_ms: f64,
    value: i32,
}

/// Stream samples as they arrive. Table output only shows summaries.
pub fn print_samples<'a>(samples: impl Iterator<Item = &'a Sample>, format: OutputFormat) {
    for sample in samples {
        match format {
            OutputFormat::Json => print_json(&SampleOutput {
                t_ms: sample.timestamp.as_secs_f64() * 1000.0,
                value: sample.value,
            }),
            OutputFormat::Pretty => println!(
                "{:>10.1} ms  {}",
                sample.timestamp.as_secs_f64() * 1000.0,
                sample.value
            ),
            OutputFormat::Table => {}
        }
    }
}

#[derive(Serialize)]
struct WindowOutput {
    status: LinkStatus,
    origin_ms: u128,
    width_ms: u128,
    center: Option<i32>,
    min: Option<i32>,
    max: Option<i32>,
    retained: usize,
}

/// Summary of the sample window, printed at each rollover.
pub fn print_window(window: &SampleWindow, status: LinkStatus, format: OutputFormat) {
    let range = window.range();
    let out = WindowOutput {
        status,
        origin_ms: window.origin().as_millis(),
        width_ms: window.width().as_millis(),
        center: window.center(),
        min: range.map(|(lo, _)| lo),
        max: range.map(|(_, hi)| hi),
        retained: window.len(),
    };
    match format {
        OutputFormat::Json => print_json(&out),
        OutputFormat::Table => {
            let mut table = table(vec!["WINDOW (ms)", "CENTER", "MIN", "MAX", "SAMPLES", "STATUS"]);
            table.add_row(vec![
                format!("{}+{}", out.origin_ms, out.width_ms),
                optional(out.center),
                optional(out.min),
                optional(out.max),
                out.retained.to_string(),
                status_name(status),
            ]);
            println!("{table}");
        }
        OutputFormat::Pretty => println!(
            "window {}ms center={} range=[{}, {}] samples={} {}",
            out.origin_ms,
            optional(out.center),
            optional(out.min),
            optional(out.max),
            out.retained,
            status_name(status)
        ),
    }
}

#[derive(Serialize)]
struct StatsOutput<'a> {
    status: LinkStatus,
    #[serde(flatten)]
    stats: &'a EngineStats,
}

pub fn print_stats(stats: &EngineStats, status: LinkStatus, format: OutputFormat) {
    let rows = [
        ("ticks", stats.ticks),
        ("requests", stats.requests),
        ("sentinels", stats.sentinels),
        ("samples", stats.samples),
        ("stale_discarded", stats.stale_discarded),
        ("sentinels_skipped", stats.sentinels_skipped),
        ("unmatched_replies", stats.unmatched_replies),
        ("other_replies", stats.other_replies),
        ("echoes", stats.echoes),
        ("rejected_frames", stats.rejected_frames),
        ("rollovers", stats.rollovers),
        ("overflowed", stats.overflowed),
    ];
    match format {
        OutputFormat::Json => print_json(&StatsOutput { status, stats }),
        OutputFormat::Table => {
            let mut table = table(vec!["COUNTER", "VALUE"]);
            for (name, value) in rows {
                table.add_row(vec![name.to_string(), value.to_string()]);
            }
            table.add_row(vec!["status".to_string(), status_name(status)]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for (name, value) in rows {
                println!("{name:<18} {value}");
            }
            println!("{:<18} {}", "status", status_name(status));
        }
    }
}

fn status_name(status: LinkStatus) -> String {
    match status {
        LinkStatus::Healthy => "healthy".to_string(),
        LinkStatus::Degraded {
            silent_ticks,
            echoes,
        } => format!("degraded ({silent_ticks} silent ticks, {echoes} echoes)"),
    }
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_names_include_degraded_detail() {
        assert_eq!(status_name(LinkStatus::Healthy), "healthy");
        assert_eq!(
            status_name(LinkStatus::Degraded {
                silent_ticks: 120,
                echoes: 4
            }),
            "degraded (120 silent ticks, 4 echoes)"
        );
    }

    #[test]
    fn missing_values_render_as_dash() {
        assert_eq!(optional(None), "-");
        assert_eq!(optional(Some(-3)), "-3");
    }
}
