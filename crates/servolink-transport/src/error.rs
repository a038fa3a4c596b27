/// Errors that can occur in transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to open the named serial port.
    #[error("failed to open {port}: {source}")]
    Open {
        port: String,
        source: serialport::Error,
    },

    /// The serial driver reported an error on an open port.
    #[error("serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// An I/O error occurred on the transport stream.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The transport has been closed.
    #[error("transport closed")]
    Closed,
}

impl TransportError {
    /// True when the port does not exist or nothing is attached to it.
    pub fn is_missing_device(&self) -> bool {
        match self {
            TransportError::Open { source, .. } | TransportError::Serial(source) => {
                source.kind == serialport::ErrorKind::NoDevice
            }
            _ => false,
        }
    }

    /// Underlying I/O error kind, when there is one.
    pub fn io_kind(&self) -> Option<std::io::ErrorKind> {
        match self {
            TransportError::Io(err) => Some(err.kind()),
            TransportError::Open { source, .. } | TransportError::Serial(source) => {
                match source.kind {
                    serialport::ErrorKind::Io(kind) => Some(kind),
                    _ => None,
                }
            }
            TransportError::Closed => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, TransportError>;
