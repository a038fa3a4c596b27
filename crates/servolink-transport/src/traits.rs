use std::time::Duration;

use bytes::BytesMut;

use crate::error::Result;

/// A bidirectional byte link to a servo controller.
///
/// Implementations never block longer than the `wait` passed to
/// [`read_available`](Transport::read_available); a zero wait means "take
/// what is already buffered and return".
pub trait Transport {
    /// Write every byte of `bytes` to the link.
    fn write_all(&mut self, bytes: &[u8]) -> Result<()>;

    /// Append bytes that arrive within `wait` to `dst`.
    ///
    /// Returns the number of bytes appended, which may be zero.
    fn read_available(&mut self, dst: &mut BytesMut, wait: Duration) -> Result<usize>;

    /// Human-readable name of the link (port path or label).
    fn name(&self) -> &str;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        (**self).write_all(bytes)
    }

    fn read_available(&mut self, dst: &mut BytesMut, wait: Duration) -> Result<usize> {
        (**self).read_available(dst, wait)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
