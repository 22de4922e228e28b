//! The protocol session: serialized command dispatch plus push routing

use crate::config::SessionConfig;
use crate::error::SessionError;
use nuvo_protocol::{Command, Frame, FrameCodec};
use nuvo_transport::{Transport, TransportError};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::Instant;
use tracing::{debug, warn};

/// Everything the session emits to subscribers
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// A decoded frame. `is_ack` is true when the frame resolved the pending
    /// command; false means it arrived unsolicited (a push).
    Frame { frame: Frame, is_ack: bool },
    /// The link died. No further events follow.
    Disconnected { reason: String },
}

struct CommandRequest {
    command: Command,
    responder: oneshot::Sender<Result<Frame, SessionError>>,
}

/// Handle to a running protocol session
///
/// Cheap to clone; all clones share the one serialized command queue. The
/// background worker stops when every handle is dropped.
///
/// # Example
///
/// ```rust,ignore
/// let transport = Transport::connect(&"tcp://bridge:4001".parse()?).await?;
/// let session = Session::open(transport, SessionConfig::default());
///
/// let mut events = session.subscribe();
/// let ack = session.command(Command::SetPower { zone, on: true }).await?;
/// ```
#[derive(Clone)]
pub struct Session {
    command_tx: mpsc::Sender<CommandRequest>,
    events_tx: broadcast::Sender<SessionEvent>,
}

impl Session {
    /// Start a session over an open transport
    pub fn open(transport: Transport, config: SessionConfig) -> Self {
        let (command_tx, command_rx) = mpsc::channel(config.command_queue_size);
        let (events_tx, _) = broadcast::channel(config.event_buffer_size);

        let worker = SessionWorker {
            transport,
            codec: FrameCodec::new(),
            command_rx,
            events_tx: events_tx.clone(),
            config,
            pending: None,
        };
        tokio::spawn(worker.run());

        Self {
            command_tx,
            events_tx,
        }
    }

    /// Issue a command and wait for its acknowledgement
    ///
    /// Commands from all handles are written one at a time in submission
    /// order. The future resolves when the amplifier acknowledges, the retry
    /// budget is exhausted (`Timeout`), or the link dies (`Disconnected`).
    /// Dropping the future cancels the command if it has not been written yet.
    pub async fn command(&self, command: Command) -> Result<Frame, SessionError> {
        let (responder, rx) = oneshot::channel();
        self.command_tx
            .send(CommandRequest { command, responder })
            .await
            .map_err(|_| SessionError::Closed)?;
        rx.await.map_err(|_| SessionError::Closed)?
    }

    /// Subscribe to every frame the session sees, acks and pushes alike
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events_tx.subscribe()
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session").finish_non_exhaustive()
    }
}

/// A command that has been written and is waiting for its acknowledgement
///
/// Owned exclusively by the worker; exists from issue until matched, retries
/// exhausted, or disconnect.
struct PendingCommand {
    command: Command,
    payload: Vec<u8>,
    responder: oneshot::Sender<Result<Frame, SessionError>>,
    deadline: Instant,
    retries_remaining: u32,
    attempts: u32,
}

struct SessionWorker {
    transport: Transport,
    codec: FrameCodec,
    command_rx: mpsc::Receiver<CommandRequest>,
    events_tx: broadcast::Sender<SessionEvent>,
    config: SessionConfig,
    pending: Option<PendingCommand>,
}

impl SessionWorker {
    async fn run(mut self) {
        let mut buf = vec![0u8; self.config.read_buffer_size];
        loop {
            // The deadline only participates in the select while a command is
            // outstanding; the placeholder is never polled.
            let deadline = self
                .pending
                .as_ref()
                .map(|p| p.deadline)
                .unwrap_or_else(Instant::now);

            tokio::select! {
                read = self.transport.read_available(&mut buf) => match read {
                    Ok(n) => self.process_bytes(&buf[..n]),
                    Err(e) => return self.disconnect(e),
                },
                request = self.command_rx.recv(), if self.pending.is_none() => match request {
                    Some(request) => {
                        if let Err(e) = self.issue(request).await {
                            return self.disconnect(e);
                        }
                    }
                    None => {
                        debug!("all session handles dropped, stopping worker");
                        return;
                    }
                },
                _ = tokio::time::sleep_until(deadline), if self.pending.is_some() => {
                    if let Err(e) = self.handle_timeout().await {
                        return self.disconnect(e);
                    }
                }
            }
        }
    }

    /// Decode newly-read bytes and route every completed frame: resolve the
    /// pending command on a matcher hit, broadcast everything.
    fn process_bytes(&mut self, bytes: &[u8]) {
        let frames: Vec<Frame> = self.codec.feed(bytes).collect();
        for frame in frames {
            let matched = self
                .pending
                .take_if(|p| p.command.ack_matches(&frame));
            let is_ack = match matched {
                Some(pending) => {
                    let result = if matches!(frame, Frame::Error) {
                        Err(SessionError::Rejected)
                    } else {
                        Ok(frame.clone())
                    };
                    debug!(command = ?pending.command, attempts = pending.attempts, "command resolved");
                    let _ = pending.responder.send(result);
                    true
                }
                None => false,
            };
            let _ = self.events_tx.send(SessionEvent::Frame { frame, is_ack });
        }
    }

    /// Write a queued command onto the link and arm its matcher
    async fn issue(&mut self, request: CommandRequest) -> Result<(), TransportError> {
        if request.responder.is_closed() {
            debug!(command = ?request.command, "issuer went away before write, skipping");
            return Ok(());
        }

        let payload = request.command.encode();
        self.transport.write(&payload).await?;
        debug!(command = ?request.command, "command written");

        self.pending = Some(PendingCommand {
            command: request.command,
            payload,
            responder: request.responder,
            deadline: Instant::now() + self.config.command_timeout,
            retries_remaining: self.config.command_retries,
            attempts: 1,
        });
        Ok(())
    }

    /// The wait window for the outstanding command expired: retry with the
    /// same payload while budget remains, then fail it and advance the queue
    /// so a dead command cannot block the link.
    async fn handle_timeout(&mut self) -> Result<(), TransportError> {
        let retry_payload = match self.pending.as_mut() {
            None => return Ok(()),
            Some(p) if p.retries_remaining > 0 => {
                p.retries_remaining -= 1;
                p.attempts += 1;
                p.deadline = Instant::now() + self.config.command_timeout;
                warn!(
                    command = ?p.command,
                    attempt = p.attempts,
                    "no acknowledgement, retrying"
                );
                Some(p.payload.clone())
            }
            Some(_) => None,
        };

        match retry_payload {
            Some(payload) => self.transport.write(&payload).await?,
            None => {
                if let Some(pending) = self.pending.take() {
                    warn!(
                        command = ?pending.command,
                        attempts = pending.attempts,
                        "command failed after final retry"
                    );
                    let _ = pending.responder.send(Err(SessionError::Timeout {
                        attempts: pending.attempts,
                    }));
                }
            }
        }
        Ok(())
    }

    /// Fail the pending command and everything queued behind it, tell
    /// subscribers, and stop. Reconnect policy lives outside the session.
    fn disconnect(&mut self, error: TransportError) {
        let reason = error.to_string();
        warn!(%reason, "session transport lost");

        if let Some(pending) = self.pending.take() {
            let _ = pending
                .responder
                .send(Err(SessionError::Disconnected(reason.clone())));
        }

        self.command_rx.close();
        while let Ok(request) = self.command_rx.try_recv() {
            let _ = request
                .responder
                .send(Err(SessionError::Disconnected(reason.clone())));
        }

        let _ = self.events_tx.send(SessionEvent::Disconnected { reason });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nuvo_protocol::{Volume, ZoneId};
    use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};

    fn zone(id: u8) -> ZoneId {
        ZoneId::new(id).unwrap()
    }

    /// A session wired to an in-memory amplifier end
    fn session_pair(config: SessionConfig) -> (Session, DuplexStream) {
        let (near, far) = tokio::io::duplex(4096);
        let session = Session::open(Transport::from_stream(near, "test"), config);
        (session, far)
    }

    #[tokio::test]
    async fn test_command_resolves_on_matching_ack() {
        let (session, mut amp) = session_pair(SessionConfig::default());

        let issue = tokio::spawn({
            let session = session.clone();
            async move {
                session
                    .command(Command::SetVolume {
                        zone: zone(3),
                        volume: Volume::new(30).unwrap(),
                    })
                    .await
            }
        });

        let mut buf = [0u8; 64];
        let n = amp.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"*Z3VOL30\r");

        amp.write_all(b"#Z3,ON,SRC1,VOL30,DND0,LOCK0\r").await.unwrap();

        let ack = issue.await.unwrap().unwrap();
        assert!(matches!(ack, Frame::ZoneStatus(s) if s.zone == zone(3)));
    }

    #[tokio::test]
    async fn test_push_while_pending_is_not_misattributed() {
        let (session, mut amp) = session_pair(SessionConfig::default());
        let mut events = session.subscribe();

        let issue = tokio::spawn({
            let session = session.clone();
            async move {
                session
                    .command(Command::SetVolume {
                        zone: zone(3),
                        volume: Volume::new(30).unwrap(),
                    })
                    .await
            }
        });

        let mut buf = [0u8; 64];
        amp.read(&mut buf).await.unwrap();

        // A keypad push for a different zone lands first, then the real ack
        amp.write_all(b"#Z7,ON,SRC2,VOL10,DND0,LOCK0\r#Z3,ON,SRC1,VOL30,DND0,LOCK0\r")
            .await
            .unwrap();

        let ack = issue.await.unwrap().unwrap();
        assert_eq!(ack.zone(), Some(zone(3)));

        // Subscriber sees both frames, with only the second marked as the ack
        let SessionEvent::Frame { frame, is_ack } = events.recv().await.unwrap() else {
            panic!("expected frame event");
        };
        assert_eq!(frame.zone(), Some(zone(7)));
        assert!(!is_ack);

        let SessionEvent::Frame { frame, is_ack } = events.recv().await.unwrap() else {
            panic!("expected frame event");
        };
        assert_eq!(frame.zone(), Some(zone(3)));
        assert!(is_ack);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_retries_then_fails() {
        let config = SessionConfig::default().with_command_retries(2);
        let (session, mut amp) = session_pair(config);

        let result = session
            .command(Command::SetPower {
                zone: zone(1),
                on: true,
            })
            .await;

        match result {
            Err(SessionError::Timeout { attempts }) => assert_eq!(attempts, 3),
            other => panic!("expected timeout, got {other:?}"),
        }

        // All three attempts carried the identical payload
        let mut wire = vec![0u8; 64];
        let n = amp.read(&mut wire).await.unwrap();
        assert_eq!(&wire[..n], b"*Z1ON\r*Z1ON\r*Z1ON\r");
    }

    #[tokio::test]
    async fn test_rejected_command() {
        let (session, mut amp) = session_pair(SessionConfig::default());

        let issue = tokio::spawn({
            let session = session.clone();
            async move {
                session
                    .command(Command::SetSource {
                        zone: zone(2),
                        source: nuvo_protocol::SourceId::new(6).unwrap(),
                    })
                    .await
            }
        });

        let mut buf = [0u8; 64];
        amp.read(&mut buf).await.unwrap();
        amp.write_all(b"#?\r").await.unwrap();

        assert!(matches!(issue.await.unwrap(), Err(SessionError::Rejected)));
    }

    #[tokio::test]
    async fn test_commands_serialize_in_submission_order() {
        let (session, mut amp) = session_pair(SessionConfig::default());

        let first = tokio::spawn({
            let session = session.clone();
            async move {
                session
                    .command(Command::SetPower { zone: zone(1), on: true })
                    .await
            }
        });
        // Make sure the first command hits the queue before the second
        tokio::task::yield_now().await;
        let second = tokio::spawn({
            let session = session.clone();
            async move {
                session
                    .command(Command::SetPower { zone: zone(2), on: true })
                    .await
            }
        });

        let mut buf = [0u8; 64];
        let n = amp.read(&mut buf).await.unwrap();
        // Only the first command is on the wire until it is acknowledged
        assert_eq!(&buf[..n], b"*Z1ON\r");

        amp.write_all(b"#Z1,ON,SRC1,VOL60,DND0,LOCK0\r").await.unwrap();
        first.await.unwrap().unwrap();

        let n = amp.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"*Z2ON\r");
        amp.write_all(b"#Z2,ON,SRC1,VOL60,DND0,LOCK0\r").await.unwrap();
        second.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_disconnect_fails_pending_command() {
        let (session, mut amp) = session_pair(SessionConfig::default());

        let issue = tokio::spawn({
            let session = session.clone();
            async move {
                session
                    .command(Command::SetPower { zone: zone(1), on: true })
                    .await
            }
        });

        let mut buf = [0u8; 64];
        amp.read(&mut buf).await.unwrap();
        drop(amp);

        assert!(matches!(
            issue.await.unwrap(),
            Err(SessionError::Disconnected(_))
        ));

        // Later commands fail fast instead of hanging
        let late = session
            .command(Command::SetPower { zone: zone(2), on: true })
            .await;
        assert!(matches!(
            late,
            Err(SessionError::Disconnected(_)) | Err(SessionError::Closed)
        ));
    }

    #[tokio::test]
    async fn test_disconnect_event_reaches_subscribers() {
        let (session, amp) = session_pair(SessionConfig::default());
        let mut events = session.subscribe();
        drop(amp);

        match events.recv().await.unwrap() {
            SessionEvent::Disconnected { .. } => {}
            other => panic!("expected disconnect, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_pushes_flow_without_pending_command() {
        let (session, mut amp) = session_pair(SessionConfig::default());
        let mut events = session.subscribe();

        amp.write_all(b"#Z9S3NEXT\r").await.unwrap();

        let SessionEvent::Frame { frame, is_ack } = events.recv().await.unwrap() else {
            panic!("expected frame event");
        };
        assert!(matches!(frame, Frame::ZoneButton(_)));
        assert!(!is_ack);
    }
}
