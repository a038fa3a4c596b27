//! Serial protocol stack for DMM servo controllers.
//!
//! servolink talks the controllers' compact 7-bit framed protocol over a
//! serial line, finds attached controllers, and samples telemetry at a
//! fixed rate while staying in step with a controller that silently drops
//! requests.
//!
//! # Crate Structure
//!
//! - [`transport`]: Byte-stream transport abstraction (serial port, in-memory)
//! - [`frame`]: Frame codec, command catalogue, stream reassembly, reply registry
//! - [`scope`]: Controller sessions, discovery and the telemetry acquisition engine

/// Re-export transport types.
pub mod transport {
    pub use servolink_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use servolink_frame::*;
}

/// Re-export session, discovery and acquisition types.
pub mod scope {
    pub use servolink_scope::*;
}
