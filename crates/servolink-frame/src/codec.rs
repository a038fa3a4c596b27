use bytes::{BufMut, Bytes, BytesMut};
use serde::Serialize;

use crate::command::{Command, Reply, ValueKind};
use crate::error::{FrameError, Result};

/// Device id that addresses any controller; an unconfigured drive echoes
/// every frame sent to it with this id.
pub const BROADCAST_ID: u8 = 0x7f;

/// Header + control + one value byte + checksum.
pub const MIN_FRAME_LEN: usize = 4;

/// Header + control + four value bytes + checksum.
pub const MAX_FRAME_LEN: usize = 7;

/// Width of the signed value a frame can carry.
pub const VALUE_BITS: u32 = 28;

const HIGH_BIT: u8 = 0x80;
const LOW_BITS: u8 = 0x7f;
const ID_MASK: u8 = 0x1f;
const LENGTH_SHIFT: u8 = 5;

/// Whether a decoded frame came from a configured controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameKind {
    /// Reflection of a command sent to the broadcast id.
    Echo,
    /// Genuine reply from a configured controller.
    Reply,
}

/// A decoded frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    /// Device id from the header byte.
    pub device_id: u8,
    /// Command id (echo) or reply id (reply), 0-31.
    pub id: u8,
    /// Reassembled value.
    pub value: i32,
    pub kind: FrameKind,
}

impl Frame {
    /// The reply this frame carries, if it is a reply with a known id.
    pub fn reply(&self) -> Option<Reply> {
        match self.kind {
            FrameKind::Reply => Reply::from_id(self.id),
            FrameKind::Echo => None,
        }
    }

    /// The command this frame reflects, if it is an echo.
    pub fn command(&self) -> Option<Command> {
        match self.kind {
            FrameKind::Echo => Some(Command::from_id(self.id)),
            FrameKind::Reply => None,
        }
    }

    pub fn is_echo(&self) -> bool {
        self.kind == FrameKind::Echo
    }

    /// Name of the command or reply, or a hex placeholder for unknown ids.
    pub fn label(&self) -> String {
        match self.kind {
            FrameKind::Echo => Command::from_id(self.id).name().to_string(),
            FrameKind::Reply => match Reply::from_id(self.id) {
                Some(reply) => reply.name().to_string(),
                None => format!("[{:02X}]", self.id),
            },
        }
    }
}

/// An outgoing command addressed to one device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Request {
    pub device_id: u8,
    pub command: Command,
    pub value: i32,
}

impl Request {
    pub fn new(device_id: u8, command: Command, value: i32) -> Self {
        Self {
            device_id,
            command,
            value,
        }
    }

    /// Append this request's wire bytes to `dst`.
    pub fn encode(&self, dst: &mut BytesMut) -> Result<()> {
        encode_frame(self.device_id, self.command, self.value, dst)
    }

    /// Encode into a standalone buffer.
    pub fn to_bytes(&self) -> Result<Bytes> {
        let mut buf = BytesMut::with_capacity(MAX_FRAME_LEN);
        self.encode(&mut buf)?;
        Ok(buf.freeze())
    }
}

/// Total frame length implied by a control byte.
pub fn frame_len(control: u8) -> usize {
    MIN_FRAME_LEN + usize::from((control >> LENGTH_SHIFT) & 0x03)
}

fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |sum, b| sum.wrapping_add(*b)) & LOW_BITS
}

/// Encode a command into the wire format.
///
/// Wire format:
/// ```text
/// ┌───────────┬──────────────────┬──────────────────┬──────────┐
/// │ Device id │ Control          │ Value            │ Checksum │
/// │ 0ddddddd  │ 1 LL ccccc       │ 1vvvvvvv × (L+1) │ 1sssssss │
/// └───────────┴──────────────────┴──────────────────┴──────────┘
/// ```
///
/// Value chunks go most significant first. Leading chunks that only repeat
/// the sign of the next chunk are left out, so small values take one byte.
pub fn encode_frame(device_id: u8, command: Command, value: i32, dst: &mut BytesMut) -> Result<()> {
    encode_id(device_id, command.id(), value, dst)
}

/// Encode a frame the way a configured controller answers, for simulators
/// and bench tools.
pub fn encode_reply(device_id: u8, reply: Reply, value: i32, dst: &mut BytesMut) -> Result<()> {
    encode_id(device_id, reply.id(), value, dst)
}

fn encode_id(device_id: u8, id: u8, value: i32, dst: &mut BytesMut) -> Result<()> {
    if !(-1..=0).contains(&(value >> (VALUE_BITS - 1))) {
        return Err(FrameError::ValueOutOfRange { value });
    }

    let start = dst.len();
    dst.reserve(MAX_FRAME_LEN);
    dst.put_u8(device_id & LOW_BITS);
    dst.put_u8(HIGH_BIT | (id & ID_MASK));

    let mut chunks = 0u8;
    for shift in [21, 14, 7, 0] {
        if shift != 0 && (-1..=0).contains(&(value >> (shift - 1))) {
            continue;
        }
        dst.put_u8(HIGH_BIT | ((value >> shift) as u8 & LOW_BITS));
        chunks += 1;
    }
    dst[start + 1] |= (chunks - 1) << LENGTH_SHIFT;

    let sum = checksum(&dst[start..]);
    dst.put_u8(HIGH_BIT | sum);
    Ok(())
}

/// Decode one complete frame.
///
/// `bytes` must start at the header byte and hold exactly the length the
/// control byte announces.
pub fn decode_frame(bytes: &[u8]) -> Result<Frame> {
    if let Some(index) = bytes.iter().skip(1).position(|b| b & HIGH_BIT == 0) {
        return Err(FrameError::Format {
            index: index + 1,
            byte: bytes[index + 1],
        });
    }
    if bytes.len() < MIN_FRAME_LEN {
        return Err(FrameError::Length {
            expected: MIN_FRAME_LEN,
            actual: bytes.len(),
        });
    }
    if bytes[0] & HIGH_BIT != 0 {
        return Err(FrameError::Format {
            index: 0,
            byte: bytes[0],
        });
    }
    let expected = frame_len(bytes[1]);
    if bytes.len() != expected {
        return Err(FrameError::Length {
            expected,
            actual: bytes.len(),
        });
    }

    let (body, trailer) = bytes.split_at(expected - 1);
    let sum = checksum(body);
    let found = trailer[0] & LOW_BITS;
    if sum != found {
        return Err(FrameError::Checksum {
            expected: sum,
            found,
        });
    }

    let device_id = bytes[0];
    let id = bytes[1] & ID_MASK;

    let mut value = i32::from(body[2] & LOW_BITS);
    if value >= 64 {
        value -= 128;
    }
    for b in &body[3..] {
        value = (value << 7) | i32::from(b & LOW_BITS);
    }

    let kind = if device_id == BROADCAST_ID {
        FrameKind::Echo
    } else {
        FrameKind::Reply
    };

    if kind == FrameKind::Reply {
        if let Some(reply) = Reply::from_id(id) {
            if reply.value_kind() == ValueKind::Unsigned7 {
                value &= i32::from(LOW_BITS);
            }
        }
    }

    Ok(Frame {
        device_id,
        id,
        value,
        kind,
    })
}
