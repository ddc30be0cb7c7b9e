//! Tagged packet codec for the host/coprocessor wire protocol.
//!
//! Every packet is a little-endian `u16` message kind followed by the
//! payload for that kind, densely packed:
//! - `Command`  : one `u16` command code
//! - `SetParam` : `u16` parameter id, `f64` value
//! - `RefArray` / `ErrArray`: 200 `i16` samples
//!
//! There are no delimiters or checksums. [`PacketDecoder`] recovers packet
//! boundaries in a byte stream by sliding one byte at a time until a known
//! tag lines up.

#[cfg(feature = "async")]
pub mod async_codec;
pub mod codec;
pub mod decoder;
pub mod error;
pub mod ring;
pub mod wire;

#[cfg(feature = "async")]
pub use async_codec::PacketCodec;
pub use codec::{decode_packet, encode_command, CommandSelector, Packet, SampleArray};
pub use decoder::{DecoderStats, PacketDecoder, RECV_BUFFER_CAPACITY};
pub use error::{FrameError, Result};
pub use ring::RingBuffer;
pub use wire::{MessageKind, ARRAY_LEN, MAX_PACKET_SIZE, TAG_SIZE};
