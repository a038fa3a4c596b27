use servolink_frame::Command;
use servolink_transport::{SerialConfig, SerialTransport, Transport};
use tracing::{debug, info};

use crate::config::SessionConfig;
use crate::error::{Result, ScopeError};
use crate::session::Session;

/// A port with a responding controller, left open.
#[derive(Debug)]
pub struct Discovered<T> {
    pub port: String,
    pub device_id: u8,
    pub session: Session<T>,
}

/// Ask whatever is on the session's link for its device id.
///
/// Sends one Read_Drive_ID and waits one receive window, retrying the wait
/// once if nothing arrived, before reporting [`ScopeError::NotFound`].
pub fn probe<T: Transport>(session: &mut Session<T>) -> Result<u8> {
    match session.read_parameter(Command::ReadDriveId)? {
        Some(id) => {
            let id = (id & 0x7f) as u8;
            debug!(port = session.port_name(), device_id = id, "controller answered");
            Ok(id)
        }
        None => Err(ScopeError::NotFound {
            port: session.port_name().to_string(),
        }),
    }
}

/// Scan serial ports in order and return the first with a controller.
pub fn find_controller(
    ports: &[String],
    serial: &SerialConfig,
    session: &SessionConfig,
) -> Result<Discovered<SerialTransport>> {
    find_controller_with(ports, session, |port| {
        SerialTransport::open_with_config(port, serial).map_err(ScopeError::from)
    })
}

/// [`find_controller`] over any transport `open` can produce.
///
/// Ports that fail to open are skipped; silent ones are closed by dropping
/// their session.
pub fn find_controller_with<T, F>(
    ports: &[String],
    session_config: &SessionConfig,
    mut open: F,
) -> Result<Discovered<T>>
where
    T: Transport,
    F: FnMut(&str) -> Result<T>,
{
    if ports.is_empty() {
        return Err(ScopeError::NoCandidatePorts);
    }

    for port in ports {
        let transport = match open(port) {
            Ok(transport) => transport,
            Err(err) => {
                debug!(port = %port, error = %err, "skipping port");
                continue;
            }
        };
        info!(port = %port, "trying port");

        let mut session = Session::with_config(transport, session_config.clone());
        match probe(&mut session) {
            Ok(device_id) => {
                info!(port = %port, device_id, "controller present");
                return Ok(Discovered {
                    port: port.clone(),
                    device_id,
                    session,
                });
            }
            Err(ScopeError::NotFound { .. }) => {
                info!(port = %port, "no reply from controller");
            }
            Err(err) => {
                debug!(port = %port, error = %err, "probe failed");
            }
        }
    }

    Err(ScopeError::NotFound {
        port: ports.join(", "),
    })
}

#[cfg(test)]
mod tests {
    use bytes::BytesMut;
    use servolink_frame::{decode_frame, encode_reply, Reply};
    use servolink_transport::{MemoryHandle, MemoryTransport, TransportError};

    use super::*;

    fn drive_id_reply(id: u8) -> Vec<u8> {
        let mut buf = BytesMut::new();
        encode_reply(id, Reply::DriveId, i32::from(id), &mut buf).unwrap();
        buf.to_vec()
    }

    fn memory_session() -> (Session<MemoryTransport>, MemoryHandle) {
        let (transport, handle) = MemoryTransport::new("mem0");
        (Session::new(transport), handle)
    }

    #[test]
    fn probe_returns_reported_id() {
        let (mut session, handle) = memory_session();
        handle.push_inbound(&drive_id_reply(3));

        assert_eq!(probe(&mut session).unwrap(), 3);
        let sent = decode_frame(&handle.take_outbound()).unwrap();
        assert_eq!(sent.command(), Some(Command::ReadDriveId));
    }

    #[test]
    fn probe_sends_once_and_reports_not_found() {
        let (mut session, handle) = memory_session();
        let err = probe(&mut session).unwrap_err();
        assert!(matches!(err, ScopeError::NotFound { ref port } if port == "mem0"));
        // One request, two receive windows.
        assert_eq!(handle.take_outbound().len(), 4);
    }

    /// Transport whose reply shows up only on the second read.
    struct SlowController {
        reads: usize,
        reply: Vec<u8>,
    }

    impl Transport for SlowController {
        fn write_all(&mut self, _bytes: &[u8]) -> servolink_transport::Result<()> {
            Ok(())
        }

        fn read_available(
            &mut self,
            dst: &mut BytesMut,
            _wait: std::time::Duration,
        ) -> servolink_transport::Result<usize> {
            self.reads += 1;
            if self.reads == 2 {
                dst.extend_from_slice(&self.reply);
                return Ok(self.reply.len());
            }
            Ok(0)
        }

        fn name(&self) -> &str {
            "slow"
        }
    }

    #[test]
    fn probe_retries_one_window() {
        let mut session = Session::new(SlowController {
            reads: 0,
            reply: drive_id_reply(9),
        });
        assert_eq!(probe(&mut session).unwrap(), 9);
        assert_eq!(session.transport_mut().reads, 2);
    }

    #[test]
    fn scan_skips_missing_and_silent_ports() {
        let ports: Vec<String> = ["COM9", "COM8", "COM7"].map(String::from).to_vec();
        let mut tried = Vec::new();

        let found = find_controller_with(&ports, &SessionConfig::default(), |port| {
            tried.push(port.to_string());
            match port {
                "COM9" => Err(TransportError::Closed.into()),
                "COM8" => Ok(MemoryTransport::new(port).0),
                _ => {
                    let (transport, handle) = MemoryTransport::new(port);
                    handle.push_inbound(&drive_id_reply(12));
                    Ok(transport)
                }
            }
        })
        .unwrap();

        assert_eq!(found.port, "COM7");
        assert_eq!(found.device_id, 12);
        assert_eq!(found.session.port_name(), "COM7");
        assert_eq!(tried, ports);
    }

    #[test]
    fn scan_without_ports_fails_fast() {
        let err = find_controller_with::<MemoryTransport, _>(&[], &SessionConfig::default(), |_| {
            unreachable!("nothing to open")
        })
        .unwrap_err();
        assert!(matches!(err, ScopeError::NoCandidatePorts));
    }

    #[test]
    fn scan_reports_not_found_when_all_silent() {
        let ports = vec!["/dev/ttyS0".to_string(), "/dev/ttyS1".to_string()];
        let err = find_controller_with(&ports, &SessionConfig::default(), |port| {
            Ok(MemoryTransport::new(port).0)
        })
        .unwrap_err();
        assert!(matches!(err, ScopeError::NotFound { ref port } if port == "/dev/ttyS0, /dev/ttyS1"));
    }
}
