use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use bytes::BytesMut;

use crate::error::{Result, TransportError};
use crate::traits::Transport;

#[derive(Debug, Default)]
struct Shared {
    inbound: VecDeque<u8>,
    outbound: Vec<u8>,
    closed: bool,
}

/// In-process transport backed by shared byte queues.
///
/// The paired [`MemoryHandle`] plays the controller side: it injects bytes
/// the transport will read and collects bytes the transport wrote. Reads
/// never wait, whatever `wait` is passed.
#[derive(Debug)]
pub struct MemoryTransport {
    shared: Arc<Mutex<Shared>>,
    name: String,
}

/// Controller-side handle of a [`MemoryTransport`].
#[derive(Debug, Clone)]
pub struct MemoryHandle {
    shared: Arc<Mutex<Shared>>,
}

impl MemoryTransport {
    /// Create a transport and its controller-side handle.
    pub fn new(name: impl Into<String>) -> (Self, MemoryHandle) {
        let shared = Arc::new(Mutex::new(Shared::default()));
        let transport = Self {
            shared: Arc::clone(&shared),
            name: name.into(),
        };
        (transport, MemoryHandle { shared })
    }
}

fn lock(shared: &Mutex<Shared>) -> MutexGuard<'_, Shared> {
    // A panic while holding the lock leaves plain byte queues behind; keep going.
    shared.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl Transport for MemoryTransport {
    fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        let mut shared = lock(&self.shared);
        if shared.closed {
            return Err(TransportError::Closed);
        }
        shared.outbound.extend_from_slice(bytes);
        Ok(())
    }

    fn read_available(&mut self, dst: &mut BytesMut, _wait: Duration) -> Result<usize> {
        let mut shared = lock(&self.shared);
        if shared.closed && shared.inbound.is_empty() {
            return Err(TransportError::Closed);
        }
        let n = shared.inbound.len();
        dst.extend(shared.inbound.drain(..));
        Ok(n)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl MemoryHandle {
    /// Queue bytes for the transport to read.
    pub fn push_inbound(&self, bytes: &[u8]) {
        lock(&self.shared).inbound.extend(bytes.iter().copied());
    }

    /// Take every byte the transport has written so far.
    pub fn take_outbound(&self) -> Vec<u8> {
        std::mem::take(&mut lock(&self.shared).outbound)
    }

    /// Number of inbound bytes not yet read by the transport.
    pub fn inbound_len(&self) -> usize {
        lock(&self.shared).inbound.len()
    }

    /// Close the link; later writes fail and reads fail once drained.
    pub fn close(&self) {
        lock(&self.shared).closed = true;
    }
}
