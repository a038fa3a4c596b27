/// Errors that can occur in session, discovery and acquisition operations.
#[derive(Debug, thiserror::Error)]
pub enum ScopeError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] servolink_transport::TransportError),

    /// Frame-level error, such as a value outside the 28-bit range.
    #[error("frame error: {0}")]
    Frame(#[from] servolink_frame::FrameError),

    /// No controller answered the device-id probe.
    #[error("no controller responded on {port}")]
    NotFound { port: String },

    /// The command has no reply to wait for.
    #[error("{0} is not a parameter read")]
    NotReadable(servolink_frame::Command),

    /// Port scan had nothing to try.
    #[error("no candidate serial ports to scan")]
    NoCandidatePorts,

    /// Configuration rejected by validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// JSON serialization/deserialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Reading a configuration file failed.
    #[error("failed to read {path}: {source}")]
    ConfigIo {
        path: std::path::PathBuf,
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, ScopeError>;
