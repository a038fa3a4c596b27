//! Byte-stream transport abstraction for serial servo controllers.
//!
//! The protocol layers above only need two things from a link: write a run of
//! bytes, and collect whatever bytes have arrived within a short bounded wait.
//! [`Transport`] captures exactly that contract.
//!
//! - [`SerialTransport`] drives a real serial port through `serialport`.
//! - [`MemoryTransport`] is an in-process link for simulations and tests.
//!
//! This is the lowest layer of servolink.

pub mod error;
pub mod memory;
pub mod serial;
pub mod traits;

pub use error::{Result, TransportError};
pub use memory::{MemoryHandle, MemoryTransport};
pub use serial::{candidate_ports, SerialConfig, SerialTransport, DEFAULT_BAUD_RATE};
pub use traits::Transport;
