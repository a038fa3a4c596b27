/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The value does not fit in the 28-bit signed range a frame can carry.
    #[error("value {value} is out of 28-bit range")]
    ValueOutOfRange { value: i32 },

    /// A byte after the header is missing its high bit.
    #[error("frame format error: byte {index} (0x{byte:02x}) lacks the high bit")]
    Format { index: usize, byte: u8 },

    /// The trailing checksum does not match the frame contents.
    #[error("checksum mismatch (expected 0x{expected:02x}, found 0x{found:02x})")]
    Checksum { expected: u8, found: u8 },

    /// The slice length disagrees with the length code in the control byte.
    #[error("frame length mismatch ({actual} bytes, control byte says {expected})")]
    Length { expected: usize, actual: usize },

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The underlying transport failed.
    #[error("transport error: {0}")]
    Transport(#[from] servolink_transport::TransportError),
}

impl FrameError {
    /// True for errors confined to one frame; the stream stays usable.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            FrameError::Format { .. } | FrameError::Checksum { .. } | FrameError::Length { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;
