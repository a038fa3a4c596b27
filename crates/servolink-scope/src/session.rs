use std::time::Duration;

use servolink_frame::{Command, Frame, GeneralRead, Reassembler, Reply, ReplyRegistry, Request};
use servolink_transport::Transport;
use tracing::{debug, trace, warn};

use crate::config::SessionConfig;
use crate::error::{Result, ScopeError};

const GAIN_RANGE: std::ops::RangeInclusive<i32> = 1..=127;

/// One controller on one transport.
///
/// Owns the receive buffer and the reply registry, so several sessions on
/// different ports never share state.
#[derive(Debug)]
pub struct Session<T> {
    transport: T,
    reassembler: Reassembler,
    registry: ReplyRegistry,
    config: SessionConfig,
    frame_errors: u64,
}

impl<T: Transport> Session<T> {
    pub fn new(transport: T) -> Self {
        Self::with_config(transport, SessionConfig::default())
    }

    pub fn with_config(transport: T, config: SessionConfig) -> Self {
        Self {
            transport,
            reassembler: Reassembler::new(),
            registry: ReplyRegistry::new(),
            config,
            frame_errors: 0,
        }
    }

    /// Encode and write one command to the configured device id.
    ///
    /// Gain setters with a value outside 1-127 are still sent; the drive
    /// decides what to make of them.
    pub fn send(&mut self, command: Command, value: i32) -> Result<()> {
        if command.is_gain_setter() && !GAIN_RANGE.contains(&value) {
            warn!(%command, value, "motion gain outside 1-127");
        }
        let bytes = Request::new(self.config.device_id, command, value).to_bytes()?;
        trace!(%command, value, wire = ?bytes.as_ref(), "sending");
        self.transport.write_all(&bytes)?;
        Ok(())
    }

    /// Send a General_Read sub-request.
    pub fn send_general_read(&mut self, read: GeneralRead) -> Result<()> {
        self.send(Command::GeneralRead, read.code())
    }

    /// Collect bytes for up to `wait` and decode every complete frame.
    ///
    /// Replies are recorded in the registry before being returned. Malformed
    /// frames are logged and skipped.
    pub fn poll(&mut self, wait: Duration) -> Result<Vec<Frame>> {
        self.reassembler.fill_from(&mut self.transport, wait)?;
        let mut frames = Vec::new();
        while let Some(result) = self.reassembler.next_frame() {
            match result {
                Ok(frame) => {
                    self.registry.record(&frame);
                    frames.push(frame);
                }
                Err(err) => {
                    self.frame_errors += 1;
                    warn!(port = self.transport.name(), error = %err, "skipping malformed frame");
                }
            }
        }
        Ok(frames)
    }

    /// Poll once with the configured receive window.
    pub fn recv(&mut self) -> Result<Vec<Frame>> {
        self.poll(self.config.recv_window)
    }

    /// Send a parameter-read command and wait for its reply.
    ///
    /// Waits one receive window, then retries the wait (without resending)
    /// until `probe_attempts` windows have passed. `Ok(None)` means nothing
    /// answered.
    pub fn read_parameter(&mut self, command: Command) -> Result<Option<i32>> {
        let Some(reply) = command.expected_reply() else {
            return Err(ScopeError::NotReadable(command));
        };
        self.await_reply(reply, |session| session.send(command, 0))
    }

    /// Send a General_Read for position, speed or torque current and wait
    /// for the value.
    pub fn read_general(&mut self, read: GeneralRead) -> Result<Option<i32>> {
        let Some(reply) = read.expected_reply() else {
            self.send_general_read(read)?;
            return Ok(None);
        };
        self.await_reply(reply, |session| session.send_general_read(read))
    }

    /// Read every parameter that can be read back without arguments.
    pub fn read_all_parameters(&mut self) -> Result<Vec<(Command, Option<i32>)>> {
        let mut values = Vec::new();
        for command in Command::parameter_reads() {
            let value = self.read_parameter(command)?;
            values.push((command, value));
        }
        Ok(values)
    }

    fn await_reply(
        &mut self,
        reply: Reply,
        send: impl FnOnce(&mut Self) -> Result<()>,
    ) -> Result<Option<i32>> {
        self.registry.clear(reply);
        send(self)?;
        for attempt in 1..=self.config.probe_attempts.max(1) {
            self.recv()?;
            if let Some(value) = self.registry.get(reply) {
                debug!(%reply, value, attempt, "reply received");
                return Ok(Some(value));
            }
        }
        debug!(%reply, attempts = self.config.probe_attempts, "no reply");
        Ok(None)
    }

    /// Drop buffered bytes and partial frames.
    pub fn discard_input(&mut self) -> Result<usize> {
        let mut frames = 0;
        self.reassembler.fill_from(&mut self.transport, Duration::ZERO)?;
        while self.reassembler.next_frame().is_some() {
            frames += 1;
        }
        self.reassembler.clear();
        Ok(frames)
    }

    pub fn registry(&self) -> &ReplyRegistry {
        &self.registry
    }

    pub fn device_id(&self) -> u8 {
        self.config.device_id
    }

    /// Address later commands to `device_id`.
    pub fn set_device_id(&mut self, device_id: u8) {
        self.config.device_id = device_id & 0x7f;
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Malformed frames skipped so far.
    pub fn frame_errors(&self) -> u64 {
        self.frame_errors
    }

    pub fn port_name(&self) -> &str {
        self.transport.name()
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn into_transport(self) -> T {
        self.transport
    }
}

#[cfg(test)]
mod tests {
    use bytes::BytesMut;
    use servolink_frame::{decode_frame, encode_reply, FrameKind, BROADCAST_ID};
    use servolink_transport::{MemoryHandle, MemoryTransport};

    use super::*;

    fn session() -> (Session<MemoryTransport>, MemoryHandle) {
        let (transport, handle) = MemoryTransport::new("mem");
        (Session::new(transport), handle)
    }

    fn reply_bytes(device_id: u8, reply: Reply, value: i32) -> Vec<u8> {
        let mut buf = BytesMut::new();
        encode_reply(device_id, reply, value, &mut buf).unwrap();
        buf.to_vec()
    }

    #[test]
    fn send_writes_encoded_frame() {
        let (mut session, handle) = session();
        session.send(Command::SetMainGain, 50).unwrap();
        assert_eq!(handle.take_outbound(), vec![0x7F, 0x90, 0xB2, 0xC1]);
    }

    #[test]
    fn out_of_range_gain_is_still_sent() {
        let (mut session, handle) = session();
        session.send(Command::SetSpeedGain, 300).unwrap();
        let frame = decode_frame(&handle.take_outbound()).unwrap();
        assert_eq!(frame.value, 300);
    }

    #[test]
    fn out_of_range_value_sends_nothing() {
        let (mut session, handle) = session();
        assert!(session.send(Command::GoAbsolutePos, 1 << 28).is_err());
        assert!(handle.take_outbound().is_empty());
    }

    #[test]
    fn general_read_carries_sub_request_code() {
        let (mut session, handle) = session();
        session.send_general_read(GeneralRead::DriveDisable).unwrap();
        let frame = decode_frame(&handle.take_outbound()).unwrap();
        assert_eq!(frame.command(), Some(Command::GeneralRead));
        assert_eq!(frame.value, 0x21);
    }

    #[test]
    fn poll_records_replies_but_not_echoes() {
        let (mut session, handle) = session();
        let mut bytes = reply_bytes(BROADCAST_ID, Reply::MainGain, 33);
        bytes.extend(reply_bytes(4, Reply::MainGain, 40));
        handle.push_inbound(&bytes);

        let frames = session.poll(Duration::ZERO).unwrap();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].kind, FrameKind::Echo);
        assert_eq!(session.registry().get(Reply::MainGain), Some(40));
    }

    #[test]
    fn poll_skips_malformed_frames() {
        let (mut session, handle) = session();
        let mut bytes = reply_bytes(4, Reply::Status, 3);
        bytes[2] ^= 0x01;
        bytes.extend(reply_bytes(4, Reply::Config, 9));
        handle.push_inbound(&bytes);

        let frames = session.poll(Duration::ZERO).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].reply(), Some(Reply::Config));
        assert_eq!(session.frame_errors(), 1);
    }

    #[test]
    fn read_parameter_returns_reply_value() {
        let (mut session, handle) = session();
        handle.push_inbound(&reply_bytes(2, Reply::GearNumber, 4096));
        let value = session.read_parameter(Command::ReadGearNumber).unwrap();
        assert_eq!(value, Some(4096));

        let sent = decode_frame(&handle.take_outbound()).unwrap();
        assert_eq!(sent.command(), Some(Command::ReadGearNumber));
    }

    #[test]
    fn read_parameter_ignores_stale_value() {
        let (mut session, handle) = session();
        handle.push_inbound(&reply_bytes(2, Reply::IntGain, 10));
        session.recv().unwrap();
        assert_eq!(session.registry().get(Reply::IntGain), Some(10));

        let value = session.read_parameter(Command::ReadIntGain).unwrap();
        assert_eq!(value, None);
    }

    #[test]
    fn read_parameter_rejects_non_read_commands() {
        let (mut session, handle) = session();
        assert!(matches!(
            session.read_parameter(Command::SetOrigin),
            Err(ScopeError::NotReadable(Command::SetOrigin))
        ));
        assert!(handle.take_outbound().is_empty());
    }

    #[test]
    fn read_general_waits_for_position() {
        let (mut session, handle) = session();
        handle.push_inbound(&reply_bytes(2, Reply::AbsPos32, -12_345));
        assert_eq!(
            session.read_general(GeneralRead::Position).unwrap(),
            Some(-12_345)
        );
        assert_eq!(session.read_general(GeneralRead::DriveReset).unwrap(), None);
    }

    #[test]
    fn read_all_covers_every_parameter_read() {
        let (mut session, _handle) = session();
        let values = session.read_all_parameters().unwrap();
        assert_eq!(values.len(), Command::parameter_reads().count());
        assert!(values.iter().all(|(_, value)| value.is_none()));
    }

    #[test]
    fn discard_input_drops_pending_bytes() {
        let (mut session, handle) = session();
        let mut bytes = reply_bytes(2, Reply::Speed, 7);
        bytes.extend_from_slice(&[0x02, 0x9d]);
        handle.push_inbound(&bytes);

        assert_eq!(session.discard_input().unwrap(), 1);
        assert!(session.poll(Duration::ZERO).unwrap().is_empty());
        assert_eq!(session.registry().get(Reply::Speed), None);
    }
}
