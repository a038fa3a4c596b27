use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use servolink_frame::{TelemetryChannel, BROADCAST_ID};

use crate::error::{Result, ScopeError};

/// Per-controller session settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Device id placed in outgoing frames. The broadcast id reaches an
    /// unconfigured controller, which then echoes everything it is sent.
    pub device_id: u8,
    /// How long one poll waits for bytes already on their way.
    pub recv_window: Duration,
    /// Poll windows a parameter read gets before giving up: the first one
    /// plus retries.
    pub probe_attempts: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            device_id: BROADCAST_ID,
            recv_window: Duration::from_millis(20),
            probe_attempts: 2,
        }
    }
}

impl SessionConfig {
    pub fn with_device_id(mut self, device_id: u8) -> Self {
        self.device_id = device_id & 0x7f;
        self
    }

    pub fn with_recv_window(mut self, recv_window: Duration) -> Self {
        self.recv_window = recv_window;
        self
    }
}

/// Telemetry acquisition settings.
///
/// Loadable from JSON; fields left out take their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScopeConfig {
    /// Target request rate. The controller starts ignoring requests well
    /// below what the serial line could carry, hence the sentinel.
    pub sample_rate_hz: u32,
    /// Width of the visible window; the buffer rolls over once per width.
    pub window_width_ms: u64,
    /// A sentinel request follows every this-many telemetry requests.
    pub sentinel_interval: u32,
    /// Consecutive ticks without a reply before the link reports degraded.
    pub degraded_after_ticks: u32,
    /// Outstanding requests kept before the oldest are dropped.
    pub max_pending: usize,
    /// Quantity to sample.
    pub channel: TelemetryChannel,
    /// Bounded wait for bytes at the start of each tick.
    pub poll_wait_ms: u64,
}

impl Default for ScopeConfig {
    fn default() -> Self {
        Self {
            sample_rate_hz: 155,
            window_width_ms: 2000,
            sentinel_interval: 8,
            degraded_after_ticks: 100,
            max_pending: 512,
            channel: TelemetryChannel::Position,
            poll_wait_ms: 0,
        }
    }
}

impl ScopeConfig {
    /// Parse from a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ScopeError::ConfigIo {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<()> {
        if self.sample_rate_hz == 0 {
            return Err(ScopeError::InvalidConfig(
                "sample_rate_hz must be greater than zero".to_string(),
            ));
        }
        if self.window_width_ms == 0 {
            return Err(ScopeError::InvalidConfig(
                "window_width_ms must be greater than zero".to_string(),
            ));
        }
        if self.sentinel_interval == 0 {
            return Err(ScopeError::InvalidConfig(
                "sentinel_interval must be greater than zero".to_string(),
            ));
        }
        if self.max_pending == 0 {
            return Err(ScopeError::InvalidConfig(
                "max_pending must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Time between ticks.
    pub fn tick_period(&self) -> Duration {
        Duration::from_secs(1) / self.sample_rate_hz.max(1)
    }

    pub fn window_width(&self) -> Duration {
        Duration::from_millis(self.window_width_ms)
    }

    pub fn poll_wait(&self) -> Duration {
        Duration::from_millis(self.poll_wait_ms)
    }

    pub fn with_sample_rate(mut self, sample_rate_hz: u32) -> Self {
        self.sample_rate_hz = sample_rate_hz;
        self
    }

    pub fn with_window_width(mut self, width: Duration) -> Self {
        self.window_width_ms = u64::try_from(width.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn with_sentinel_interval(mut self, interval: u32) -> Self {
        self.sentinel_interval = interval;
        self
    }

    pub fn with_channel(mut self, channel: TelemetryChannel) -> Self {
        self.channel = channel;
        self
    }
}
