//! Variable-length 7-bit framing codec for DMM servo controllers.
//!
//! Every frame on the wire is 4 to 7 bytes:
//! - A header byte carrying the device id, with the high bit clear
//! - A control byte carrying a 5-bit command/reply id and a 2-bit length code
//! - One to four value bytes, 7 bits each, most significant chunk first
//! - A 7-bit checksum of everything before it
//!
//! Only the header byte has its high bit clear, which is what lets the
//! [`Reassembler`] find its way back after corrupt or partial input.

pub mod codec;
pub mod command;
pub mod error;
pub mod reassembler;
pub mod registry;

#[cfg(feature = "async")]
pub mod tokio_codec;

pub use codec::{
    decode_frame, encode_frame, encode_reply, frame_len, Frame, FrameKind, Request, BROADCAST_ID,
    MAX_FRAME_LEN, MIN_FRAME_LEN,
};
pub use command::{Command, GeneralRead, Reply, TelemetryChannel, ValueKind};
pub use error::{FrameError, Result};
pub use reassembler::Reassembler;
pub use registry::ReplyRegistry;

#[cfg(feature = "async")]
pub use tokio_codec::FrameCodec;
