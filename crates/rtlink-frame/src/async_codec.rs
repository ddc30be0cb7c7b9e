//! `tokio_util::codec` adapter for async hosts.

use std::io;

use bytes::{Buf, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::warn;

use crate::codec::{decode_packet, Packet};
use crate::decoder::DecoderStats;
use crate::error::FrameError;
use crate::wire::{MessageKind, TAG_SIZE};

/// Packet codec with the same one-byte resynchronization as
/// [`PacketDecoder`](crate::PacketDecoder).
#[derive(Debug, Clone)]
pub struct PacketCodec {
    accepted: Vec<MessageKind>,
    misaligned: bool,
    stats: DecoderStats,
}

impl PacketCodec {
    /// Codec for the host side: decodes reference and error arrays.
    pub fn new() -> Self {
        Self::accepting(&[MessageKind::RefArray, MessageKind::ErrArray])
    }

    /// Codec decoding an explicit set of message kinds.
    pub fn accepting(kinds: &[MessageKind]) -> Self {
        Self {
            accepted: kinds.to_vec(),
            misaligned: false,
            stats: DecoderStats::default(),
        }
    }

    /// Counters with the same meaning as [`PacketDecoder::stats`](crate::PacketDecoder::stats).
    pub fn stats(&self) -> DecoderStats {
        self.stats
    }

    fn skip(&mut self, src: &mut BytesMut, count: usize, tag: u16) {
        if !self.misaligned {
            warn!("unknown message type 0x{tag:04X} (data may be misaligned)");
            self.misaligned = true;
            self.stats.misalignment_runs += 1;
        }
        src.advance(count);
        self.stats.skipped_bytes += count as u64;
    }
}

impl Default for PacketCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for PacketCodec {
    type Item = Packet;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Packet>, Self::Error> {
        while src.len() >= TAG_SIZE {
            let tag = u16::from_le_bytes([src[0], src[1]]);
            let kind = match MessageKind::from_tag(tag) {
                Some(kind) if self.accepted.contains(&kind) => kind,
                _ => {
                    self.skip(src, 1, tag);
                    continue;
                }
            };
            self.misaligned = false;

            let size = kind.packet_size();
            if src.len() < size {
                src.reserve(size - src.len());
                return Ok(None);
            }

            let frame = src.split_to(size);
            let packet = decode_packet(&frame).map_err(io::Error::other)?;
            self.stats.packets += 1;
            return Ok(Some(packet));
        }
        Ok(None)
    }

    /// A trailing byte too short to hold a tag is misalignment, not an error.
    /// Only an accepted packet cut off by the end of the stream fails.
    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Packet>, Self::Error> {
        if let Some(packet) = self.decode(src)? {
            return Ok(Some(packet));
        }
        if src.is_empty() {
            return Ok(None);
        }
        if src.len() < TAG_SIZE {
            let (count, tag) = (src.len(), u16::from(src[0]));
            self.skip(src, count, tag);
            return Ok(None);
        }

        // `decode` only stops with a full tag buffered on an accepted kind.
        let tag = u16::from_le_bytes([src[0], src[1]]);
        let needed = MessageKind::from_tag(tag).map_or(TAG_SIZE, MessageKind::packet_size);
        Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            FrameError::Incomplete {
                needed,
                available: src.len(),
            },
        ))
    }
}

impl Encoder<Packet> for PacketCodec {
    type Error = io::Error;

    fn encode(&mut self, item: Packet, dst: &mut BytesMut) -> Result<(), Self::Error> {
        item.encode(dst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use futures_util::{SinkExt, StreamExt};
    use tokio_util::codec::{FramedRead, FramedWrite};

    use super::*;
    use crate::codec::CommandSelector;
    use crate::wire::ARRAY_LEN;

    #[tokio::test]
    async fn framed_read_resyncs() {
        let mut wire = vec![0x00, 0x13, 0x37];
        wire.extend_from_slice(&Packet::RefArray(Box::new([9; ARRAY_LEN])).to_bytes());
        wire.extend_from_slice(&Packet::ErrArray(Box::new([-9; ARRAY_LEN])).to_bytes());

        let mut framed = FramedRead::new(wire.as_slice(), PacketCodec::new());
        let first = framed.next().await.unwrap().unwrap();
        let second = framed.next().await.unwrap().unwrap();

        assert_eq!(first, Packet::RefArray(Box::new([9; ARRAY_LEN])));
        assert_eq!(second, Packet::ErrArray(Box::new([-9; ARRAY_LEN])));
        assert!(framed.next().await.is_none());
        let stats = framed.decoder().stats();
        assert_eq!(stats.skipped_bytes, 3);
        assert_eq!(stats.misalignment_runs, 1);
        assert_eq!(stats.packets, 2);
    }

    #[tokio::test]
    async fn trailing_garbage_at_eof_is_skipped() {
        let mut wire = Packet::RefArray(Box::new([4; ARRAY_LEN])).to_bytes().to_vec();
        wire.push(0xEE);

        let mut framed = FramedRead::new(wire.as_slice(), PacketCodec::new());
        assert_eq!(
            framed.next().await.unwrap().unwrap(),
            Packet::RefArray(Box::new([4; ARRAY_LEN]))
        );
        assert!(framed.next().await.is_none());
        assert_eq!(framed.decoder().stats().skipped_bytes, 1);
        assert_eq!(framed.decoder().stats().misalignment_runs, 1);
    }

    #[tokio::test]
    async fn unknown_tags_before_eof_are_skipped() {
        let mut wire = Packet::ErrArray(Box::new([1; ARRAY_LEN])).to_bytes().to_vec();
        wire.extend_from_slice(&[0x13, 0x37, 0x00]);

        let mut framed = FramedRead::new(wire.as_slice(), PacketCodec::new());
        assert!(framed.next().await.unwrap().is_ok());
        assert!(framed.next().await.is_none());
        assert_eq!(framed.decoder().stats().skipped_bytes, 3);
    }

    #[tokio::test]
    async fn truncated_packet_at_eof_is_an_error() {
        let bytes = Packet::RefArray(Box::new([2; ARRAY_LEN])).to_bytes();

        let mut framed = FramedRead::new(&bytes[..100], PacketCodec::new());
        let err = framed.next().await.unwrap().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
        assert!(err.to_string().contains("need 402"));
    }

    #[tokio::test]
    async fn framed_write_encodes_commands() {
        let mut framed = FramedWrite::new(Vec::new(), PacketCodec::new());
        let packet = CommandSelector::StopExcitation.to_packet(0, 0.0).unwrap();
        framed.send(packet).await.unwrap();

        assert_eq!(framed.get_ref().as_slice(), &[0xA1, 0x00, 0xC2, 0x00]);
    }
}
