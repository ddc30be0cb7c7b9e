use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use bytes::BytesMut;
use rtlink_frame::wire::{command_name, param_name};
use rtlink_frame::{encode_command, CommandSelector, FrameError, Packet, MAX_PACKET_SIZE};
use tracing::{debug, info};

use crate::error::{PeerError, Result};

/// Result of dispatching one logical command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// The packet was written in full; carries its size in bytes.
    Sent(usize),
    /// `Terminate` closed the channel.
    Terminated,
}

struct WriterState<W> {
    writer: Option<W>,
    buf: BytesMut,
}

/// Serialized, paced command writer.
///
/// Shared across threads behind an `Arc`. Each send holds the writer lock
/// through the single write and the pacing delay that follows it, so packets
/// never interleave and consecutive commands are at least one delay apart.
pub struct CommandChannel<W: Write> {
    state: Mutex<WriterState<W>>,
    pacing_delay: Duration,
    shutdown: Arc<AtomicBool>,
}

impl<W: Write> CommandChannel<W> {
    pub fn new(writer: W, pacing_delay: Duration) -> Self {
        Self::with_shutdown(writer, pacing_delay, Arc::new(AtomicBool::new(false)))
    }

    /// Channel that raises `shutdown` when it is terminated.
    pub fn with_shutdown(writer: W, pacing_delay: Duration, shutdown: Arc<AtomicBool>) -> Self {
        Self {
            state: Mutex::new(WriterState {
                writer: Some(writer),
                buf: BytesMut::with_capacity(MAX_PACKET_SIZE),
            }),
            pacing_delay,
            shutdown,
        }
    }

    /// Encode and send a numeric logical command.
    ///
    /// Selector 0 terminates the channel. Unknown selectors fail with
    /// [`PeerError::InvalidCommand`] before anything is written.
    pub fn send_command(&self, selector: u16, param_id: u16, param_value: f64) -> Result<Dispatch> {
        if selector == CommandSelector::Terminate as u16 {
            return self.terminate();
        }
        let packet = encode_command(selector, param_id, param_value).map_err(|err| match err {
            FrameError::InvalidCommand(code) => PeerError::InvalidCommand(code),
            other => PeerError::Frame(other),
        })?;
        self.send_packet(&packet).map(Dispatch::Sent)
    }

    /// Typed variant of [`CommandChannel::send_command`].
    pub fn send(&self, selector: CommandSelector, param_id: u16, param_value: f64) -> Result<Dispatch> {
        match selector.to_packet(param_id, param_value) {
            Some(packet) => self.send_packet(&packet).map(Dispatch::Sent),
            None => self.terminate(),
        }
    }

    /// Write one already-built packet with pacing. Returns bytes written.
    pub fn send_packet(&self, packet: &Packet) -> Result<usize> {
        let mut guard = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let state = &mut *guard;
        let writer = state.writer.as_mut().ok_or(PeerError::ChannelClosed)?;

        state.buf.clear();
        packet.encode(&mut state.buf);
        let expected = state.buf.len();

        let written = writer
            .write(&state.buf)
            .map_err(PeerError::TransportWriteFailed)?;
        if written != expected {
            return Err(PeerError::TransportWriteFailed(io::Error::new(
                io::ErrorKind::WriteZero,
                format!("short write ({written} of {expected} bytes)"),
            )));
        }
        writer.flush().map_err(PeerError::TransportWriteFailed)?;

        match packet {
            Packet::Command(code) => {
                debug!(command = command_name(*code), bytes = written, "command sent")
            }
            Packet::SetParam {
                param_id,
                param_value,
            } => debug!(
                param = param_name(*param_id),
                value = param_value,
                bytes = written,
                "parameter sent"
            ),
            other => debug!(kind = ?other.kind(), bytes = written, "packet sent"),
        }
        thread::sleep(self.pacing_delay);
        Ok(written)
    }

    /// Whether `Terminate` has closed this channel.
    pub fn is_closed(&self) -> bool {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .writer
            .is_none()
    }

    pub fn pacing_delay(&self) -> Duration {
        self.pacing_delay
    }

    /// Shutdown flag raised on terminate.
    pub fn shutdown_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    fn terminate(&self) -> Result<Dispatch> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let writer = state.writer.take().ok_or(PeerError::ChannelClosed)?;
        drop(writer);
        self.shutdown.store(true, Ordering::SeqCst);
        info!("command channel terminated");
        Ok(Dispatch::Terminated)
    }
}

impl<W: Write> std::fmt::Debug for CommandChannel<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandChannel")
            .field("pacing_delay", &self.pacing_delay)
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::time::Instant;

    use rtlink_frame::{decode_packet, wire, MessageKind, PacketDecoder};

    use super::*;

    /// Writer that records every write call separately.
    #[derive(Clone, Default)]
    struct Recorder {
        writes: Arc<Mutex<Vec<Vec<u8>>>>,
    }

    impl Write for Recorder {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.writes.lock().unwrap().push(buf.to_vec());
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    /// Writer that stays inside `write` for a while and counts calls that
    /// arrive while another one is still in flight.
    #[derive(Clone, Default)]
    struct ExclusiveWriter {
        in_flight: Arc<AtomicBool>,
        overlaps: Arc<AtomicUsize>,
        recorder: Recorder,
    }

    impl Write for ExclusiveWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.in_flight.swap(true, Ordering::SeqCst) {
                self.overlaps.fetch_add(1, Ordering::SeqCst);
            }
            thread::sleep(Duration::from_millis(1));
            let written = self.recorder.write(buf)?;
            self.in_flight.store(false, Ordering::SeqCst);
            Ok(written)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    struct ShortWriter {
        accept: usize,
        calls: Arc<AtomicUsize>,
    }

    impl Write for ShortWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(buf.len().min(self.accept))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    struct BrokenWriter;

    impl Write for BrokenWriter {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "link down"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn set_param_writes_twelve_bytes() {
        let recorder = Recorder::default();
        let channel = CommandChannel::new(recorder.clone(), Duration::ZERO);

        let dispatch = channel
            .send_command(7, wire::PARAM_FREQUENCY, 50.0)
            .unwrap();
        assert_eq!(dispatch, Dispatch::Sent(12));

        let writes = recorder.writes.lock().unwrap();
        assert_eq!(writes.len(), 1);
        assert_eq!(&writes[0][..4], &[0xB1, 0x00, 0x02, 0x00]);
        assert_eq!(&writes[0][4..], &50.0f64.to_le_bytes());
    }

    #[test]
    fn invalid_selector_writes_nothing() {
        let recorder = Recorder::default();
        let channel = CommandChannel::new(recorder.clone(), Duration::ZERO);

        let err = channel.send_command(9, 0, 0.0).unwrap_err();
        assert!(matches!(err, PeerError::InvalidCommand(9)));
        assert!(recorder.writes.lock().unwrap().is_empty());
    }

    #[test]
    fn concurrent_sends_never_interleave() {
        let writer = ExclusiveWriter::default();
        let channel = Arc::new(CommandChannel::new(writer.clone(), Duration::ZERO));

        let handles: Vec<_> = (0..4)
            .map(|t| {
                let channel = Arc::clone(&channel);
                thread::spawn(move || {
                    for i in 0..10 {
                        if (t + i) % 2 == 0 {
                            channel
                                .send(CommandSelector::SetParam, wire::PARAM_STEP_SIZE, 0.5)
                                .unwrap();
                        } else {
                            channel.send(CommandSelector::StartControl, 0, 0.0).unwrap();
                        }
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(writer.overlaps.load(Ordering::SeqCst), 0);
        let writes = writer.recorder.writes.lock().unwrap();
        assert_eq!(writes.len(), 40);
        let mut decoder =
            PacketDecoder::accepting(&[MessageKind::Command, MessageKind::SetParam]);
        for write in writes.iter() {
            let packet = decode_packet(write).unwrap();
            assert_eq!(packet.wire_size(), write.len());
            decoder.extend(write);
        }
        assert_eq!(decoder.by_ref().count(), 40);
        assert_eq!(decoder.stats().skipped_bytes, 0);
    }

    #[test]
    fn sends_are_paced() {
        let delay = Duration::from_millis(15);
        let channel = CommandChannel::new(Recorder::default(), delay);

        let started = Instant::now();
        for _ in 0..3 {
            channel.send(CommandSelector::RequestArray, 0, 0.0).unwrap();
        }
        assert!(started.elapsed() >= delay * 3);
        assert_eq!(channel.pacing_delay(), delay);
    }

    #[test]
    fn short_write_is_reported_and_not_retried() {
        let calls = Arc::new(AtomicUsize::new(0));
        let channel = CommandChannel::new(
            ShortWriter {
                accept: 3,
                calls: Arc::clone(&calls),
            },
            Duration::ZERO,
        );

        let err = channel.send_command(1, 0, 0.0).unwrap_err();
        match err {
            PeerError::TransportWriteFailed(io) => {
                assert_eq!(io.kind(), io::ErrorKind::WriteZero);
                assert!(io.to_string().contains("3 of 4"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn zero_and_failed_writes_are_errors() {
        let channel = CommandChannel::new(
            ShortWriter {
                accept: 0,
                calls: Arc::new(AtomicUsize::new(0)),
            },
            Duration::ZERO,
        );
        assert!(matches!(
            channel.send_command(2, 0, 0.0),
            Err(PeerError::TransportWriteFailed(_))
        ));

        let channel = CommandChannel::new(BrokenWriter, Duration::ZERO);
        match channel.send_command(2, 0, 0.0) {
            Err(PeerError::TransportWriteFailed(io)) => {
                assert_eq!(io.kind(), io::ErrorKind::BrokenPipe)
            }
            other => panic!("unexpected result: {other:?}"),
        }
        // A failed write leaves the channel usable.
        assert!(!channel.is_closed());
    }

    #[test]
    fn terminate_closes_and_raises_shutdown() {
        let recorder = Recorder::default();
        let shutdown = Arc::new(AtomicBool::new(false));
        let channel =
            CommandChannel::with_shutdown(recorder.clone(), Duration::ZERO, Arc::clone(&shutdown));

        assert_eq!(channel.send_command(0, 0, 0.0).unwrap(), Dispatch::Terminated);
        assert!(channel.is_closed());
        assert!(shutdown.load(Ordering::SeqCst));
        assert!(recorder.writes.lock().unwrap().is_empty());

        assert!(matches!(
            channel.send(CommandSelector::StopControl, 0, 0.0),
            Err(PeerError::ChannelClosed)
        ));
        assert!(matches!(
            channel.send(CommandSelector::Terminate, 0, 0.0),
            Err(PeerError::ChannelClosed)
        ));
    }
}
