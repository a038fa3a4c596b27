use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use serde::Serialize;
use servolink_frame::{Command, FrameKind, Reply};
use servolink_transport::Transport;
use tracing::{debug, info, warn};

use crate::clock::{Clock, Ticker};
use crate::config::ScopeConfig;
use crate::error::Result;
use crate::pending::PendingQueue;
use crate::session::Session;
use crate::window::{Sample, SampleWindow};

/// Cheap parameter read whose reply marks a known point in the request
/// stream.
pub const SENTINEL_COMMAND: Command = Command::ReadMainGain;
const SENTINEL_REPLY: Reply = Reply::MainGain;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineState {
    Idle,
    Acquiring,
}

/// Connectivity as seen from the acquisition loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LinkStatus {
    Healthy,
    /// No reply from a configured controller for `silent_ticks` ticks.
    /// `echoes` counts broadcast echoes seen meanwhile; a nonzero count
    /// means the link works but the controller is not answering as itself.
    Degraded { silent_ticks: u32, echoes: u64 },
}

/// Running totals since the last start.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EngineStats {
    pub ticks: u64,
    pub requests: u64,
    pub sentinels: u64,
    pub samples: u64,
    /// Telemetry requests found stale at a sentinel reply.
    pub stale_discarded: u64,
    /// Sentinels the controller ignored.
    pub sentinels_skipped: u64,
    /// Replies with no outstanding request to pair with.
    pub unmatched_replies: u64,
    pub other_replies: u64,
    pub echoes: u64,
    pub rejected_frames: u64,
    pub rollovers: u64,
    /// Requests dropped from a full pending queue.
    pub overflowed: u64,
}

/// What one tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    /// Samples appended to the window.
    pub samples: usize,
    /// Stale requests discarded by a resync.
    pub discarded: usize,
    pub rollovers: u32,
    pub echoes: usize,
    pub status: LinkStatus,
}

impl TickReport {
    fn idle() -> Self {
        Self {
            samples: 0,
            discarded: 0,
            rollovers: 0,
            echoes: 0,
            status: LinkStatus::Healthy,
        }
    }
}

/// Fixed-rate telemetry poller with sentinel resynchronization.
///
/// Every tick drains replies to earlier requests, pairs telemetry replies
/// with the send time of the oldest outstanding request, then sends the
/// next request. Every `sentinel_interval` requests a sentinel read follows;
/// when its reply comes back, any telemetry request still queued ahead of it
/// was ignored by the controller and is discarded.
pub struct AcquisitionEngine<T, C> {
    session: Session<T>,
    clock: C,
    config: ScopeConfig,
    state: EngineState,
    pending: PendingQueue,
    window: SampleWindow,
    started_at: Duration,
    silent_ticks: u32,
    echoes_since_reply: u64,
    status: LinkStatus,
    stats: EngineStats,
}

impl<T: Transport, C: Clock> AcquisitionEngine<T, C> {
    pub fn new(session: Session<T>, clock: C, config: ScopeConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            session,
            clock,
            pending: PendingQueue::new(config.max_pending),
            window: SampleWindow::new(config.window_width()),
            config,
            state: EngineState::Idle,
            started_at: Duration::ZERO,
            silent_ticks: 0,
            echoes_since_reply: 0,
            status: LinkStatus::Healthy,
            stats: EngineStats::default(),
        })
    }

    /// Enter `Acquiring` with empty state.
    ///
    /// Bytes already waiting on the link belong to earlier traffic and are
    /// thrown away.
    pub fn start(&mut self) -> Result<()> {
        let discarded = self.session.discard_input()?;
        if discarded > 0 {
            debug!(frames = discarded, "discarded stale input");
        }
        self.pending.clear();
        self.window.reset(Duration::ZERO);
        self.silent_ticks = 0;
        self.echoes_since_reply = 0;
        self.status = LinkStatus::Healthy;
        self.stats = EngineStats::default();
        self.started_at = self.clock.now();
        self.state = EngineState::Acquiring;
        info!(
            port = self.session.port_name(),
            channel = ?self.config.channel,
            rate_hz = self.config.sample_rate_hz,
            "acquisition started"
        );
        Ok(())
    }

    /// Enter `Idle`. Samples stay available until the next start.
    pub fn stop(&mut self) {
        if self.state == EngineState::Acquiring {
            self.state = EngineState::Idle;
            info!(
                samples = self.stats.samples,
                stale = self.stats.stale_discarded,
                "acquisition stopped"
            );
        }
    }

    /// Run one scheduling tick. Does nothing while idle.
    pub fn tick(&mut self) -> Result<TickReport> {
        if self.state == EngineState::Idle {
            return Ok(TickReport::idle());
        }
        self.stats.ticks += 1;
        let mut report = TickReport::idle();

        let errors_before = self.session.frame_errors();
        let frames = self.session.poll(self.config.poll_wait())?;
        self.stats.rejected_frames += self.session.frame_errors() - errors_before;

        let telemetry = self.config.channel.reply();
        let mut replied = false;
        for frame in frames {
            if frame.kind == FrameKind::Echo {
                report.echoes += 1;
                continue;
            }
            replied = true;
            match frame.reply() {
                Some(reply) if reply == telemetry => self.on_telemetry(frame.value, &mut report),
                Some(SENTINEL_REPLY) => self.on_sentinel(&mut report),
                _ => self.stats.other_replies += 1,
            }
        }
        self.stats.echoes += report.echoes as u64;

        self.send_requests()?;

        if let Some(latest) = self.window.latest().map(|s| s.timestamp) {
            report.rollovers = self.window.rollover(latest);
            self.stats.rollovers += u64::from(report.rollovers);
        }

        report.status = self.update_status(replied, report.echoes);
        Ok(report)
    }

    fn on_telemetry(&mut self, value: i32, report: &mut TickReport) {
        let Some(matched) = self.pending.pop_telemetry() else {
            self.stats.unmatched_replies += 1;
            debug!(value, "telemetry reply without outstanding request");
            return;
        };
        if matched.sentinels_skipped > 0 {
            self.stats.sentinels_skipped += matched.sentinels_skipped as u64;
            debug!(count = matched.sentinels_skipped, "controller ignored sentinel");
        }
        let sample = Sample {
            timestamp: matched.sent_at,
            value,
        };
        if self.window.append(sample) {
            self.stats.samples += 1;
            report.samples += 1;
        }
    }

    fn on_sentinel(&mut self, report: &mut TickReport) {
        match self.pending.resync() {
            Some(0) => {}
            Some(stale) => {
                self.stats.stale_discarded += stale as u64;
                report.discarded += stale;
                warn!(stale, "controller ignored telemetry requests; resynchronized");
            }
            None => {
                self.stats.unmatched_replies += 1;
                debug!("sentinel reply without outstanding sentinel");
            }
        }
    }

    fn send_requests(&mut self) -> Result<()> {
        let overflowed_before = self.pending.overflowed();

        self.session.send_general_read(self.config.channel.request())?;
        // Stamped once the write has returned.
        let sent_at = self.clock.now().saturating_sub(self.started_at);
        self.pending.push_telemetry(sent_at);
        self.stats.requests += 1;

        if self.stats.requests % u64::from(self.config.sentinel_interval) == 0 {
            self.session.send(SENTINEL_COMMAND, 0)?;
            self.pending.push_sentinel();
            self.stats.sentinels += 1;
        }

        let overflowed = self.pending.overflowed() - overflowed_before;
        if overflowed > 0 {
            self.stats.overflowed += overflowed;
            warn!(
                dropped = overflowed,
                max_pending = self.config.max_pending,
                "pending queue full; dropped oldest requests"
            );
        }
        Ok(())
    }

    fn update_status(&mut self, replied: bool, echoes: usize) -> LinkStatus {
        if replied {
            if matches!(self.status, LinkStatus::Degraded { .. }) {
                info!(silent_ticks = self.silent_ticks, "controller replying again");
            }
            self.silent_ticks = 0;
            self.echoes_since_reply = 0;
            self.status = LinkStatus::Healthy;
            return self.status;
        }

        self.silent_ticks = self.silent_ticks.saturating_add(1);
        self.echoes_since_reply += echoes as u64;
        if self.silent_ticks >= self.config.degraded_after_ticks {
            if self.status == LinkStatus::Healthy {
                warn!(
                    silent_ticks = self.silent_ticks,
                    echoes = self.echoes_since_reply,
                    "no replies from controller; connectivity degraded"
                );
            }
            self.status = LinkStatus::Degraded {
                silent_ticks: self.silent_ticks,
                echoes: self.echoes_since_reply,
            };
        }
        self.status
    }

    /// Tick on `ticker` until it ends or `stop` is raised, then go idle.
    ///
    /// Starts acquisition if idle. `stop` is checked after every wait, so no
    /// tick runs once it is observed. `on_tick` sees each report and the
    /// window it produced.
    pub fn run<K, F>(&mut self, ticker: &mut K, stop: &AtomicBool, mut on_tick: F) -> Result<()>
    where
        K: Ticker + ?Sized,
        F: FnMut(&TickReport, &SampleWindow),
    {
        if self.state == EngineState::Idle {
            self.start()?;
        }
        while ticker.wait_next() {
            if stop.load(Ordering::SeqCst) {
                break;
            }
            let report = match self.tick() {
                Ok(report) => report,
                Err(err) => {
                    self.stop();
                    return Err(err);
                }
            };
            on_tick(&report, &self.window);
        }
        self.stop();
        Ok(())
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    /// Current sample window, for rendering.
    pub fn window(&self) -> &SampleWindow {
        &self.window
    }

    pub fn status(&self) -> LinkStatus {
        self.status
    }

    pub fn stats(&self) -> &EngineStats {
        &self.stats
    }

    /// Requests sent and not yet answered.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    pub fn config(&self) -> &ScopeConfig {
        &self.config
    }

    pub fn session(&self) -> &Session<T> {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session<T> {
        &mut self.session
    }

    pub fn into_session(self) -> Session<T> {
        self.session
    }
}

#[cfg(test)]
mod tests {
    use bytes::BytesMut;
    use servolink_frame::{decode_frame, encode_frame, encode_reply, GeneralRead, BROADCAST_ID};
    use servolink_transport::{MemoryHandle, MemoryTransport};

    use super::*;
    use crate::clock::ManualClock;

    const PERIOD: Duration = Duration::from_millis(10);

    type TestEngine = AcquisitionEngine<MemoryTransport, ManualClock>;

    fn engine(config: ScopeConfig) -> (TestEngine, MemoryHandle, ManualClock) {
        let (transport, handle) = MemoryTransport::new("mem");
        let clock = ManualClock::new();
        let engine =
            AcquisitionEngine::new(Session::new(transport), clock.clone(), config).unwrap();
        (engine, handle, clock)
    }

    fn reply(reply: Reply, value: i32) -> Vec<u8> {
        let mut buf = BytesMut::new();
        encode_reply(1, reply, value, &mut buf).unwrap();
        buf.to_vec()
    }

    fn sent_commands(handle: &MemoryHandle) -> Vec<(Command, i32)> {
        let mut out = Vec::new();
        let mut reassembler = servolink_frame::Reassembler::new();
        reassembler.feed(&handle.take_outbound());
        for frame in reassembler.drain() {
            let frame = frame.unwrap();
            out.push((frame.command().unwrap(), frame.value));
        }
        out
    }

    #[test]
    fn idle_engine_does_nothing() {
        let (mut engine, handle, _clock) = engine(ScopeConfig::default());
        let report = engine.tick().unwrap();
        assert_eq!(report, TickReport::idle());
        assert!(handle.take_outbound().is_empty());
        assert_eq!(engine.state(), EngineState::Idle);
    }

    #[test]
    fn start_discards_stale_input() {
        let (mut engine, handle, _clock) = engine(ScopeConfig::default());
        handle.push_inbound(&reply(Reply::AbsPos32, 99));
        engine.start().unwrap();
        let report = engine.tick().unwrap();
        assert_eq!(report.samples, 0);
        assert_eq!(engine.stats().unmatched_replies, 0);
    }

    #[test]
    fn sends_sentinel_every_interval() {
        let config = ScopeConfig::default().with_sentinel_interval(3);
        let (mut engine, handle, clock) = engine(config);
        engine.start().unwrap();
        for _ in 0..6 {
            engine.tick().unwrap();
            clock.advance(PERIOD);
        }

        let sent = sent_commands(&handle);
        let position = (Command::GeneralRead, GeneralRead::Position.code());
        let sentinel = (SENTINEL_COMMAND, 0);
        let expected = [position, position, position, sentinel];
        assert_eq!(sent, [expected, expected].concat());
        assert_eq!(engine.stats().sentinels, 2);
        assert_eq!(engine.pending(), 8);
    }

    #[test]
    fn replies_pair_with_send_time() {
        let (mut engine, handle, clock) = engine(ScopeConfig::default());
        clock.set(Duration::from_secs(5));
        engine.start().unwrap();

        engine.tick().unwrap();
        clock.advance(PERIOD);
        handle.push_inbound(&reply(Reply::AbsPos32, -400));
        let report = engine.tick().unwrap();

        assert_eq!(report.samples, 1);
        let sample = engine.window().latest().unwrap();
        assert_eq!(sample.timestamp, Duration::ZERO);
        assert_eq!(sample.value, -400);
        assert_eq!(engine.window().center(), Some(-400));
    }

    #[test]
    fn sentinel_reply_discards_ignored_requests() {
        let config = ScopeConfig::default().with_sentinel_interval(4);
        let (mut engine, handle, clock) = engine(config);
        engine.start().unwrap();
        for _ in 0..4 {
            engine.tick().unwrap();
            clock.advance(PERIOD);
        }
        // Controller answered the first request and the sentinel only.
        let mut bytes = reply(Reply::AbsPos32, 10);
        bytes.extend(reply(Reply::MainGain, 40));
        handle.push_inbound(&bytes);

        let report = engine.tick().unwrap();
        assert_eq!(report.samples, 1);
        assert_eq!(report.discarded, 3);
        assert_eq!(engine.stats().stale_discarded, 3);
        // Only the request sent this tick is outstanding.
        assert_eq!(engine.pending(), 1);
    }

    #[test]
    fn echoes_do_not_become_samples() {
        let config = ScopeConfig {
            degraded_after_ticks: 2,
            ..ScopeConfig::default()
        };
        let (mut engine, handle, _clock) = engine(config);
        engine.start().unwrap();

        let mut echo = BytesMut::new();
        encode_frame(BROADCAST_ID, Command::GeneralRead, 0x1b, &mut echo).unwrap();
        handle.push_inbound(&echo);
        let first = engine.tick().unwrap();
        assert_eq!(first.echoes, 1);
        assert_eq!(first.status, LinkStatus::Healthy);

        handle.push_inbound(&echo);
        let second = engine.tick().unwrap();
        assert_eq!(
            second.status,
            LinkStatus::Degraded {
                silent_ticks: 2,
                echoes: 2
            }
        );
        assert!(engine.window().is_empty());

        handle.push_inbound(&reply(Reply::AbsPos32, 1));
        assert_eq!(engine.tick().unwrap().status, LinkStatus::Healthy);
    }

    #[test]
    fn corrupt_frames_are_counted_and_skipped() {
        let (mut engine, handle, _clock) = engine(ScopeConfig::default());
        engine.start().unwrap();
        engine.tick().unwrap();
        engine.tick().unwrap();

        let mut bytes = reply(Reply::AbsPos32, 5);
        let last = bytes.len() - 1;
        bytes[last] ^= 0x01;
        bytes.extend(reply(Reply::AbsPos32, 6));
        handle.push_inbound(&bytes);

        let report = engine.tick().unwrap();
        assert_eq!(report.samples, 1);
        assert_eq!(engine.stats().rejected_frames, 1);
        assert_eq!(engine.window().latest().unwrap().value, 6);
    }

    #[test]
    fn stop_prevents_further_requests() {
        let (mut engine, handle, _clock) = engine(ScopeConfig::default());
        engine.start().unwrap();
        engine.tick().unwrap();
        handle.take_outbound();

        engine.stop();
        handle.push_inbound(&reply(Reply::AbsPos32, 1));
        engine.tick().unwrap();
        assert!(handle.take_outbound().is_empty());
        assert!(engine.window().is_empty());
        assert_eq!(engine.state(), EngineState::Idle);
    }

    #[test]
    fn run_honours_stop_flag() {
        let (mut engine, handle, clock) = engine(ScopeConfig::default());
        let mut ticker = crate::clock::ManualTicker::new(clock, PERIOD).with_limit(100);
        let stop = AtomicBool::new(false);

        let mut ticks = 0;
        engine
            .run(&mut ticker, &stop, |_, _| {
                ticks += 1;
                if ticks == 3 {
                    stop.store(true, Ordering::SeqCst);
                }
            })
            .unwrap();

        assert_eq!(ticks, 3);
        assert_eq!(engine.state(), EngineState::Idle);
        let sent = handle.take_outbound();
        let first = decode_frame(&sent[..4]).unwrap();
        assert_eq!(first.command(), Some(Command::GeneralRead));
        assert_eq!(engine.stats().requests, 3);
    }

    #[test]
    fn torque_channel_uses_its_own_reply() {
        let config = ScopeConfig::default().with_channel(servolink_frame::TelemetryChannel::Torque);
        let (mut engine, handle, _clock) = engine(config);
        engine.start().unwrap();
        engine.tick().unwrap();

        let mut bytes = reply(Reply::AbsPos32, 1000);
        bytes.extend(reply(Reply::TrqCurrent, -12));
        handle.push_inbound(&bytes);
        let report = engine.tick().unwrap();

        assert_eq!(report.samples, 1);
        assert_eq!(engine.window().latest().unwrap().value, -12);
        assert_eq!(engine.stats().other_replies, 1);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let (transport, _handle) = MemoryTransport::new("mem");
        let config = ScopeConfig::default().with_sentinel_interval(0);
        let result = AcquisitionEngine::new(Session::new(transport), ManualClock::new(), config);
        assert!(result.is_err());
    }
}
