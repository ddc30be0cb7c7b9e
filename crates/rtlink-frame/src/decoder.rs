use std::io::{ErrorKind, Read};

use tracing::{debug, warn};

use crate::codec::{decode_packet, Packet};
use crate::ring::RingBuffer;
use crate::wire::{MessageKind, MAX_PACKET_SIZE};

/// Receive buffer capacity: two maximum packets, since one read may straddle
/// a packet boundary.
pub const RECV_BUFFER_CAPACITY: usize = 2 * MAX_PACKET_SIZE;

/// Running decoder counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecoderStats {
    /// Complete packets extracted.
    pub packets: u64,
    /// Bytes dropped while resynchronizing.
    pub skipped_bytes: u64,
    /// Distinct misalignment runs (one warning each).
    pub misalignment_runs: u64,
}

/// Extracts packets from an undelimited byte stream.
///
/// Bytes are accumulated in a fixed ring. Whenever the two bytes at the front
/// do not form an accepted message kind, the front is not a packet boundary and
/// exactly one byte is dropped before trying again. A warning is logged once
/// per run of dropped bytes; the run ends when an accepted tag lines up.
pub struct PacketDecoder {
    ring: RingBuffer<RECV_BUFFER_CAPACITY>,
    accepted: Vec<MessageKind>,
    misaligned: bool,
    stats: DecoderStats,
    scratch: [u8; MAX_PACKET_SIZE],
}

impl PacketDecoder {
    /// Decoder for the host side: accepts reference and error arrays.
    pub fn new() -> Self {
        Self::accepting(&[MessageKind::RefArray, MessageKind::ErrArray])
    }

    /// Decoder accepting an explicit set of message kinds.
    ///
    /// `&[MessageKind::RefArray]` decodes the single-array protocol variant;
    /// `&[MessageKind::Command, MessageKind::SetParam]` decodes host traffic on
    /// the coprocessor side.
    pub fn accepting(kinds: &[MessageKind]) -> Self {
        Self {
            ring: RingBuffer::new(),
            accepted: kinds.to_vec(),
            misaligned: false,
            stats: DecoderStats::default(),
            scratch: [0u8; MAX_PACKET_SIZE],
        }
    }

    /// Append bytes; returns how many fit into the receive buffer.
    pub fn extend(&mut self, bytes: &[u8]) -> usize {
        self.ring.extend(bytes)
    }

    /// Perform one `read` directly into the free part of the receive buffer.
    ///
    /// Returns the reader's result unchanged: `Ok(0)` means end of stream and
    /// `WouldBlock`/`Interrupted` are left to the caller. Fails with
    /// `OutOfMemory` if the buffer is full, which cannot happen when
    /// [`PacketDecoder::decode_next`] is drained after every read.
    pub fn read_from<R: Read + ?Sized>(&mut self, reader: &mut R) -> std::io::Result<usize> {
        let slot = self.ring.free_slice_mut();
        if slot.is_empty() {
            return Err(std::io::Error::new(
                ErrorKind::OutOfMemory,
                "receive buffer full",
            ));
        }
        let n = reader.read(slot)?;
        self.ring.commit(n);
        Ok(n)
    }

    /// Extract the next complete packet, if any.
    ///
    /// Returns `None` when fewer than two bytes are buffered or when an
    /// accepted tag is at the front but its packet is still incomplete.
    pub fn decode_next(&mut self) -> Option<Packet> {
        while let Some(tag) = self.ring.peek_u16_le() {
            let kind = match MessageKind::from_tag(tag) {
                Some(kind) if self.accepted.contains(&kind) => kind,
                _ => {
                    if !self.misaligned {
                        warn!("unknown message type 0x{tag:04X} (data may be misaligned)");
                        self.misaligned = true;
                        self.stats.misalignment_runs += 1;
                    }
                    self.ring.advance(1);
                    self.stats.skipped_bytes += 1;
                    continue;
                }
            };
            self.misaligned = false;

            let size = kind.packet_size();
            if self.ring.len() < size {
                return None;
            }

            let frame = &mut self.scratch[..size];
            self.ring.copy_front(frame);
            self.ring.advance(size);

            match decode_packet(frame) {
                Ok(packet) => {
                    self.stats.packets += 1;
                    return Some(packet);
                }
                Err(err) => debug!(error = %err, "dropping undecodable packet"),
            }
        }
        None
    }

    /// Bytes currently buffered.
    pub fn buffered(&self) -> usize {
        self.ring.len()
    }

    /// Counters since creation or the last [`PacketDecoder::reset`].
    pub fn stats(&self) -> DecoderStats {
        self.stats
    }

    /// Discard buffered bytes and counters.
    pub fn reset(&mut self) {
        self.ring.clear();
        self.misaligned = false;
        self.stats = DecoderStats::default();
    }
}

impl Default for PacketDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Iterator for PacketDecoder {
    type Item = Packet;

    fn next(&mut self) -> Option<Packet> {
        self.decode_next()
    }
}
