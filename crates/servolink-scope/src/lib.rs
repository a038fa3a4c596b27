//! Controller sessions, discovery and telemetry acquisition for DMM servo
//! controllers.
//!
//! - [`Session`] pairs a transport with a receive buffer and reply registry.
//! - [`probe`] and [`find_controller`] locate a responding controller.
//! - [`AcquisitionEngine`] polls telemetry at a fixed rate into a rolling
//!   [`SampleWindow`], using periodic sentinel reads to recover when the
//!   controller silently ignores requests.

pub mod clock;
pub mod config;
pub mod discovery;
pub mod engine;
pub mod error;
pub mod pending;
pub mod session;
pub mod window;

pub use clock::{Clock, IntervalTicker, ManualClock, ManualTicker, MonotonicClock, Ticker};
pub use config::{ScopeConfig, SessionConfig};
pub use discovery::{find_controller, find_controller_with, probe, Discovered};
pub use engine::{
    AcquisitionEngine, EngineState, EngineStats, LinkStatus, TickReport, SENTINEL_COMMAND,
};
pub use error::{Result, ScopeError};
pub use pending::{Matched, PendingKind, PendingQueue, PendingRequest};
pub use session::Session;
pub use window::{Sample, SampleWindow};
