use std::fmt;
use std::io;

use servolink_frame::FrameError;
use servolink_scope::ScopeError;
use servolink_transport::TransportError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const NOT_FOUND: i32 = 69;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

fn io_kind_code(kind: io::ErrorKind) -> i32 {
    match kind {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::NotFound => NOT_FOUND,
        _ => TRANSPORT_ERROR,
    }
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    let code = if err.is_missing_device() {
        NOT_FOUND
    } else {
        err.io_kind().map_or(TRANSPORT_ERROR, io_kind_code)
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    match err {
        FrameError::Transport(err) => transport_error(context, err),
        FrameError::Io(source) => CliError::new(
            io_kind_code(source.kind()),
            format!("{context}: {source}"),
        ),
        FrameError::ValueOutOfRange { .. } => CliError::new(USAGE, format!("{context}: {err}")),
        other => CliError::new(DATA_INVALID, format!("{context}: {other}")),
    }
}

pub fn scope_error(context: &str, err: ScopeError) -> CliError {
    match err {
        ScopeError::Transport(err) => transport_error(context, err),
        ScopeError::Frame(err) => frame_error(context, err),
        ScopeError::NotFound { .. } | ScopeError::NoCandidatePorts => {
            CliError::new(NOT_FOUND, format!("{context}: {err}"))
        }
        ScopeError::NotReadable(_) | ScopeError::InvalidConfig(_) => {
            CliError::new(USAGE, format!("{context}: {err}"))
        }
        ScopeError::Json(_) => CliError::new(DATA_INVALID, format!("{context}: {err}")),
        ScopeError::ConfigIo { .. } => CliError::new(FAILURE, format!("{context}: {err}")),
    }
}

pub fn usage(message: impl Into<String>) -> CliError {
    CliError::new(USAGE, message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_maps_to_its_own_code() {
        let err = scope_error(
            "discovery failed",
            ScopeError::NotFound {
                port: "COM4".to_string(),
            },
        );
        assert_eq!(err.code, NOT_FOUND);
        assert_eq!(err.to_string(), "discovery failed: no controller responded on COM4");
    }

    #[test]
    fn range_errors_are_usage_errors() {
        let err = scope_error(
            "send failed",
            ScopeError::Frame(FrameError::ValueOutOfRange { value: 1 << 28 }),
        );
        assert_eq!(err.code, USAGE);
    }

    #[test]
    fn io_errors_keep_their_kind() {
        let err = scope_error(
            "poll failed",
            ScopeError::Transport(TransportError::Io(io::Error::from(
                io::ErrorKind::PermissionDenied,
            ))),
        );
        assert_eq!(err.code, PERMISSION_DENIED);
        assert_eq!(
            transport_error("write failed", TransportError::Closed).code,
            TRANSPORT_ERROR
        );
    }
}
