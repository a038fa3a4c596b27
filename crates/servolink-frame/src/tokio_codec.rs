use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};
use tracing::debug;

use crate::codec::{Frame, Request};
use crate::error::FrameError;
use crate::reassembler::next_frame_in;

/// `tokio_util` codec with the same resync rules as [`Reassembler`].
///
/// Malformed frames are skipped rather than surfaced, so a `FramedRead`
/// stream only ends on I/O errors.
///
/// [`Reassembler`]: crate::Reassembler
#[derive(Debug, Default)]
pub struct FrameCodec {
    rejected: u64,
}

impl FrameCodec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Frames skipped as malformed.
    pub fn rejected(&self) -> u64 {
        self.rejected
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, FrameError> {
        loop {
            match next_frame_in(src) {
                None => return Ok(None),
                Some(Ok(frame)) => return Ok(Some(frame)),
                Some(Err(err)) => {
                    self.rejected += 1;
                    debug!(error = %err, "discarding malformed frame");
                }
            }
        }
    }
}

impl Encoder<Request> for FrameCodec {
    type Error = FrameError;

    fn encode(&mut self, item: Request, dst: &mut BytesMut) -> Result<(), FrameError> {
        item.encode(dst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::BROADCAST_ID;
    use crate::command::Command;

    #[test]
    fn decodes_encoded_requests() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::new();
        codec
            .encode(Request::new(BROADCAST_ID, Command::SetHighAccel, 20), &mut buf)
            .unwrap();
        codec
            .encode(Request::new(BROADCAST_ID, Command::GoAbsolutePos, -6000), &mut buf)
            .unwrap();

        let first = codec.decode(&mut buf).unwrap().unwrap();
        let second = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!((first.id, first.value), (Command::SetHighAccel.id(), 20));
        assert_eq!((second.id, second.value), (Command::GoAbsolutePos.id(), -6000));
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn skips_corrupt_frames() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::new();
        codec
            .encode(Request::new(BROADCAST_ID, Command::SetIntGain, 1), &mut buf)
            .unwrap();
        buf[2] ^= 0x02;
        codec
            .encode(Request::new(BROADCAST_ID, Command::SetTrqCons, 80), &mut buf)
            .unwrap();

        let frame = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(frame.command(), Some(Command::SetTrqCons));
        assert_eq!(codec.rejected(), 1);
    }

    #[test]
    fn out_of_range_request_fails_to_encode() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::new();
        let err = codec
            .encode(Request::new(1, Command::GoAbsolutePos, 1 << 27), &mut buf)
            .unwrap_err();
        assert!(matches!(err, FrameError::ValueOutOfRange { .. }));
    }
}
