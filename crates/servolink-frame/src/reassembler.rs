use std::time::Duration;

use bytes::{Buf, BytesMut};
use servolink_transport::Transport;
use tracing::{debug, trace};

use crate::codec::{decode_frame, frame_len, Frame};
use crate::error::{FrameError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 256;
const HIGH_BIT: u8 = 0x80;

/// Turns an arbitrarily fragmented byte stream back into frames.
///
/// Bytes go in through [`feed`](Self::feed) or [`fill_from`](Self::fill_from)
/// and come out as decode attempts through [`next_frame`](Self::next_frame)
/// or [`drain`](Self::drain). A rejected frame costs one byte of scan
/// position, never the rest of the stream.
#[derive(Debug)]
pub struct Reassembler {
    buf: BytesMut,
    decoded: u64,
    rejected: u64,
}

impl Default for Reassembler {
    fn default() -> Self {
        Self::new()
    }
}

impl Reassembler {
    pub fn new() -> Self {
        Self {
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            decoded: 0,
            rejected: 0,
        }
    }

    /// Append newly received bytes.
    pub fn feed(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Append whatever `transport` delivers within `wait`.
    pub fn fill_from<T: Transport + ?Sized>(
        &mut self,
        transport: &mut T,
        wait: Duration,
    ) -> Result<usize> {
        let read = transport.read_available(&mut self.buf, wait)?;
        if read > 0 {
            trace!(read, buffered = self.buf.len(), "bytes received");
        }
        Ok(read)
    }

    /// Attempt the next frame.
    ///
    /// Returns `None` when the buffer holds no complete frame candidate.
    /// `Some(Err(_))` reports a rejected candidate; calling again resumes the
    /// scan one byte past its start.
    pub fn next_frame(&mut self) -> Option<Result<Frame>> {
        let result = next_frame_in(&mut self.buf)?;
        match &result {
            Ok(_) => self.decoded += 1,
            Err(err) => {
                self.rejected += 1;
                debug!(error = %err, "discarding malformed frame");
            }
        }
        Some(result)
    }

    /// Iterate over every decode attempt currently possible.
    pub fn drain(&mut self) -> Drain<'_> {
        Drain { inner: self }
    }

    /// Bytes held back waiting for the rest of a frame.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Frames decoded so far.
    pub fn decoded(&self) -> u64 {
        self.decoded
    }

    /// Candidates rejected so far.
    pub fn rejected(&self) -> u64 {
        self.rejected
    }

    /// Forget any partial frame.
    pub fn clear(&mut self) {
        self.buf.clear();
    }
}

/// Iterator returned by [`Reassembler::drain`].
pub struct Drain<'a> {
    inner: &'a mut Reassembler,
}

impl Iterator for Drain<'_> {
    type Item = Result<Frame>;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next_frame()
    }
}

/// Scan `buf` for the next frame candidate and try to decode it.
///
/// Bytes with the high bit set cannot start a frame and are dropped. A
/// candidate is rejected as soon as a byte inside it shows a clear high bit,
/// so a truncated frame never holds up the one after it.
pub(crate) fn next_frame_in(buf: &mut BytesMut) -> Option<Result<Frame>> {
    let start = match buf.iter().position(|b| b & HIGH_BIT == 0) {
        Some(start) => start,
        None => {
            buf.clear();
            return None;
        }
    };
    if start > 0 {
        trace!(skipped = start, "skipping bytes before frame start");
        buf.advance(start);
    }
    if buf.len() < 2 {
        return None;
    }

    let len = frame_len(buf[1]);
    let available = len.min(buf.len());
    if let Some(offset) = buf[1..available].iter().position(|b| b & HIGH_BIT == 0) {
        let index = offset + 1;
        let err = FrameError::Format {
            index,
            byte: buf[index],
        };
        buf.advance(1);
        return Some(Err(err));
    }
    if buf.len() < len {
        return None;
    }

    match decode_frame(&buf[..len]) {
        Ok(frame) => {
            buf.advance(len);
            Some(Ok(frame))
        }
        Err(err) => {
            buf.advance(1);
            Some(Err(err))
        }
    }
}
