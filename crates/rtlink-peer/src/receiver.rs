use std::io::ErrorKind;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rtlink_frame::{Packet, PacketDecoder, SampleArray};
use rtlink_transport::{Readiness, WaitReadable};
use tracing::{debug, error, info};

use crate::config::{LinkConfig, MIN_POLL_TIMEOUT};
use crate::convert::{SignalConverter, SignalKind};
use crate::error::{PeerError, Result};
use crate::slot::SlotPublisher;

/// Why the receive loop stopped without an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiveExit {
    /// The shutdown flag was raised.
    Shutdown,
    /// The peer closed the link (a read returned zero bytes).
    PeerClosed,
}

/// One step of the receive loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Step {
    /// Keep looping; carries the number of arrays published.
    Continue(usize),
    Exit(ReceiveExit),
}

struct SignalSink {
    converter: SignalConverter,
    publisher: SlotPublisher,
}

/// Background reception pipeline: wait, read, decode, convert, publish.
pub struct ArrayReceiver<R: WaitReadable> {
    reader: R,
    decoder: PacketDecoder,
    reference: SignalSink,
    error: SignalSink,
    poll_timeout: Option<Duration>,
    shutdown: Arc<AtomicBool>,
}

impl<R: WaitReadable> ArrayReceiver<R> {
    pub fn new(
        reader: R,
        reference: SlotPublisher,
        error: SlotPublisher,
        config: &LinkConfig,
        shutdown: Arc<AtomicBool>,
    ) -> Self {
        Self {
            reader,
            decoder: PacketDecoder::new(),
            reference: SignalSink {
                converter: SignalConverter::new(SignalKind::Reference, config.display_scale),
                publisher: reference,
            },
            error: SignalSink {
                converter: SignalConverter::new(SignalKind::Error, config.display_scale),
                publisher: error,
            },
            poll_timeout: config.poll_timeout.map(|t| t.max(MIN_POLL_TIMEOUT)),
            shutdown,
        }
    }

    /// Run until shutdown, peer close, or a fatal read error.
    pub fn run(mut self) -> Result<ReceiveExit> {
        info!(poll_timeout = ?self.poll_timeout, "receiver started");
        let exit = loop {
            match self.step() {
                Ok(Step::Continue(_)) => {}
                Ok(Step::Exit(exit)) => break Ok(exit),
                Err(err) => {
                    error!(error = %err, "receiver stopped");
                    break Err(err);
                }
            }
        };

        let stats = self.decoder.stats();
        info!(
            exit = ?exit.as_ref().ok(),
            packets = stats.packets,
            skipped_bytes = stats.skipped_bytes,
            misalignment_runs = stats.misalignment_runs,
            "receiver exited"
        );
        exit
    }

    pub(crate) fn step(&mut self) -> Result<Step> {
        if self.shutdown.load(Ordering::SeqCst) {
            return Ok(Step::Exit(ReceiveExit::Shutdown));
        }

        if self.reader.wait_readable(self.poll_timeout)? == Readiness::TimedOut {
            return Ok(Step::Continue(0));
        }

        match self.decoder.read_from(&mut self.reader) {
            Ok(0) => return Ok(Step::Exit(ReceiveExit::PeerClosed)),
            Ok(_) => {}
            Err(err) if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::Interrupted) => {
                return Ok(Step::Continue(0));
            }
            Err(err) => return Err(PeerError::TransportReadFailed(err)),
        }

        let mut published = 0;
        while let Some(packet) = self.decoder.decode_next() {
            match packet {
                Packet::RefArray(samples) => Self::deliver(&mut self.reference, samples),
                Packet::ErrArray(samples) => Self::deliver(&mut self.error, samples),
                other => {
                    debug!(kind = ?other.kind(), "ignoring non-array packet");
                    continue;
                }
            }
            published += 1;
        }
        Ok(Step::Continue(published))
    }

    fn deliver(sink: &mut SignalSink, samples: Box<SampleArray>) {
        let array = sink.converter.convert(samples);
        debug!(
            signal = %array.kind,
            sequence = array.sequence,
            min = array.range.min,
            max = array.range.max,
            "array received"
        );
        sink.publisher.publish(array);
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::io::{self, Read};

    use rtlink_frame::ARRAY_LEN;

    use super::*;
    use crate::slot::{signal_slot, SlotConsumer};

    /// Scripted reader: each entry is one read result.
    struct Script {
        reads: VecDeque<io::Result<Vec<u8>>>,
    }

    impl Script {
        fn new(reads: Vec<io::Result<Vec<u8>>>) -> Self {
            Self {
                reads: reads.into(),
            }
        }
    }

    impl Read for Script {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.reads.pop_front() {
                Some(Ok(mut bytes)) => {
                    let n = bytes.len().min(buf.len());
                    buf[..n].copy_from_slice(&bytes[..n]);
                    if n < bytes.len() {
                        self.reads.push_front(Ok(bytes.split_off(n)));
                    }
                    Ok(n)
                }
                Some(Err(err)) => Err(err),
                None => Ok(0),
            }
        }
    }

    impl WaitReadable for Script {
        fn wait_readable(
            &mut self,
            _timeout: Option<Duration>,
        ) -> rtlink_transport::Result<Readiness> {
            Ok(Readiness::Readable)
        }
    }

    fn receiver(
        reads: Vec<io::Result<Vec<u8>>>,
    ) -> (ArrayReceiver<Script>, SlotConsumer, SlotConsumer) {
        let config = LinkConfig::default().with_slot_wait(Duration::ZERO);
        let (ref_pub, ref_con) = signal_slot(SignalKind::Reference, config.slot_wait);
        let (err_pub, err_con) = signal_slot(SignalKind::Error, config.slot_wait);
        let rx = ArrayReceiver::new(
            Script::new(reads),
            ref_pub,
            err_pub,
            &config,
            Arc::new(AtomicBool::new(false)),
        );
        (rx, ref_con, err_con)
    }

    fn array(packet: Packet) -> Vec<u8> {
        packet.to_bytes().to_vec()
    }

    #[test]
    fn publishes_each_signal_to_its_slot() {
        let mut wire = array(Packet::RefArray(Box::new([0x7FFF; ARRAY_LEN])));
        wire.extend_from_slice(&[0xFF, 0xEE, 0xDD]);
        wire.extend(array(Packet::ErrArray(Box::new([0; ARRAY_LEN]))));

        let (rx, reference, error) = receiver(vec![Ok(wire)]);
        assert_eq!(rx.run().unwrap(), ReceiveExit::PeerClosed);

        let r = reference.try_consume().expect("reference array published");
        assert_eq!(r.voltage[0], 10.0);
        assert_eq!(r.scaled[199], 1004);
        assert_eq!(r.range.max, 10.0);

        let e = error.try_consume().expect("error array published");
        assert_eq!(e.voltage[0], 0.0);
        assert_eq!(e.sequence, 1);
    }

    #[test]
    fn retries_would_block_and_interrupted() {
        let packet = array(Packet::RefArray(Box::new([1; ARRAY_LEN])));
        let (mut rx, reference, _error) = receiver(vec![
            Err(io::Error::from(ErrorKind::WouldBlock)),
            Err(io::Error::from(ErrorKind::Interrupted)),
            Ok(packet[..100].to_vec()),
            Ok(packet[100..].to_vec()),
        ]);

        assert_eq!(rx.step().unwrap(), Step::Continue(0));
        assert_eq!(rx.step().unwrap(), Step::Continue(0));
        assert_eq!(rx.step().unwrap(), Step::Continue(0));
        assert!(reference.try_consume().is_none());
        assert_eq!(rx.step().unwrap(), Step::Continue(1));
        assert!(reference.try_consume().is_some());
        assert_eq!(rx.step().unwrap(), Step::Exit(ReceiveExit::PeerClosed));
    }

    #[test]
    fn other_read_errors_are_fatal() {
        let (rx, _reference, _error) =
            receiver(vec![Err(io::Error::from(ErrorKind::ConnectionReset))]);
        match rx.run() {
            Err(PeerError::TransportReadFailed(err)) => {
                assert_eq!(err.kind(), ErrorKind::ConnectionReset)
            }
            other => panic!("unexpected exit: {other:?}"),
        }
    }

    #[test]
    fn zero_poll_timeout_still_waits() {
        let mut config = LinkConfig::default();
        config.poll_timeout = Some(Duration::ZERO);
        let (ref_pub, _ref_con) = signal_slot(SignalKind::Reference, config.slot_wait);
        let (err_pub, _err_con) = signal_slot(SignalKind::Error, config.slot_wait);
        let rx = ArrayReceiver::new(
            Script::new(Vec::new()),
            ref_pub,
            err_pub,
            &config,
            Arc::new(AtomicBool::new(false)),
        );
        assert_eq!(rx.poll_timeout, Some(MIN_POLL_TIMEOUT));
    }

    #[test]
    fn shutdown_flag_stops_before_reading() {
        let (mut rx, _reference, _error) = receiver(vec![Ok(vec![0xC1])]);
        rx.shutdown.store(true, Ordering::SeqCst);
        assert_eq!(rx.step().unwrap(), Step::Exit(ReceiveExit::Shutdown));
        assert_eq!(rx.decoder.buffered(), 0);
    }

    #[test]
    fn unconsumed_arrays_are_overwritten_in_order() {
        let mut wire = Vec::new();
        for fill in 1..=3 {
            wire.extend(array(Packet::ErrArray(Box::new([fill; ARRAY_LEN]))));
        }
        let (rx, _reference, error) = receiver(vec![Ok(wire)]);
        rx.run().unwrap();

        let latest = error.try_consume().unwrap();
        assert_eq!(latest.raw[0], 3);
        assert_eq!(latest.sequence, 3);
        assert_eq!(error.stats().overwritten, 2);
    }
}
