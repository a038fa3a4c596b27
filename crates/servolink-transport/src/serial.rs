use std::io::{ErrorKind, Read, Write};
use std::time::{Duration, Instant};

use bytes::BytesMut;
use serialport::SerialPort;
use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::traits::Transport;

/// Default line rate of DMM DYN2/DYN4 drives.
pub const DEFAULT_BAUD_RATE: u32 = 38_400;

const READ_CHUNK_SIZE: usize = 256;
const POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Serial line settings.
#[derive(Debug, Clone)]
pub struct SerialConfig {
    /// Line rate in baud. Default: 38400.
    pub baud_rate: u32,
    /// Timeout applied to individual driver reads and writes.
    pub io_timeout: Duration,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            baud_rate: DEFAULT_BAUD_RATE,
            io_timeout: Duration::from_millis(10),
        }
    }
}

impl SerialConfig {
    /// Override the line rate.
    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }
}

/// Serial port transport.
pub struct SerialTransport {
    port: Box<dyn SerialPort>,
    name: String,
}

impl SerialTransport {
    /// Open a serial port with default settings.
    pub fn open(port: &str) -> Result<Self> {
        Self::open_with_config(port, &SerialConfig::default())
    }

    /// Open a serial port with explicit settings.
    pub fn open_with_config(port: &str, config: &SerialConfig) -> Result<Self> {
        let handle = serialport::new(port, config.baud_rate)
            .timeout(config.io_timeout)
            .open()
            .map_err(|source| TransportError::Open {
                port: port.to_string(),
                source,
            })?;
        info!(port, baud = config.baud_rate, "opened serial port");
        Ok(Self {
            port: handle,
            name: port.to_string(),
        })
    }

    /// Wrap an already-open port.
    pub fn from_port(port: Box<dyn SerialPort>) -> Self {
        let name = port.name().unwrap_or_else(|| "serial".to_string());
        Self { port, name }
    }

    /// Discard anything sitting in the driver's receive buffer.
    pub fn clear_input(&mut self) -> Result<()> {
        self.port.clear(serialport::ClearBuffer::Input)?;
        Ok(())
    }

    fn read_pending(&mut self, dst: &mut BytesMut) -> Result<usize> {
        let pending = self.port.bytes_to_read()? as usize;
        if pending == 0 {
            return Ok(0);
        }

        let mut chunk = [0u8; READ_CHUNK_SIZE];
        let mut total = 0usize;
        while total < pending {
            let want = (pending - total).min(READ_CHUNK_SIZE);
            let read = match self.port.read(&mut chunk[..want]) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::TimedOut => break,
                Err(err) => return Err(TransportError::Io(err)),
            };
            if read == 0 {
                break;
            }
            dst.extend_from_slice(&chunk[..read]);
            total += read;
        }
        Ok(total)
    }
}

impl Transport for SerialTransport {
    fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        let mut offset = 0usize;
        while offset < bytes.len() {
            match self.port.write(&bytes[offset..]) {
                Ok(0) => return Err(TransportError::Closed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(TransportError::Io(err)),
            }
        }

        loop {
            match self.port.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(TransportError::Io(err)),
            }
        }
    }

    fn read_available(&mut self, dst: &mut BytesMut, wait: Duration) -> Result<usize> {
        let deadline = Instant::now() + wait;
        let mut total = self.read_pending(dst)?;
        while Instant::now() < deadline {
            std::thread::sleep(POLL_INTERVAL);
            total += self.read_pending(dst)?;
        }
        Ok(total)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Debug for SerialTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialTransport")
            .field("name", &self.name)
            .finish()
    }
}

/// Ports worth probing for a controller, in scan order.
///
/// Enumerated system ports come first. When enumeration fails or finds
/// nothing, a fixed platform list is used instead (COM9 down to COM2 on
/// Windows, `/dev/ttyS0` to `/dev/ttyS4` elsewhere).
pub fn candidate_ports() -> Vec<String> {
    match serialport::available_ports() {
        Ok(ports) if !ports.is_empty() => ports.into_iter().map(|p| p.port_name).collect(),
        Ok(_) => fallback_ports(),
        Err(err) => {
            debug!(error = %err, "port enumeration failed, using fallback list");
            fallback_ports()
        }
    }
}

fn fallback_ports() -> Vec<String> {
    if cfg!(windows) {
        (2..=9).rev().map(|n| format!("COM{n}")).collect()
    } else {
        (0..5).map(|n| format!("/dev/ttyS{n}")).collect()
    }
}
