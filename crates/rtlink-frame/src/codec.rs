use std::fmt;
use std::str::FromStr;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};
use crate::wire::{
    MessageKind, ARRAY_LEN, CMD_START_CONTROL, CMD_START_DAMPING, CMD_START_EXCITATION,
    CMD_START_IDENTIFY, CMD_STOP_CONTROL, CMD_STOP_EXCITATION, CMD_STOP_IDENTIFY, TAG_SIZE,
};

/// One array payload of raw signed samples.
pub type SampleArray = [i16; ARRAY_LEN];

/// A decoded wire packet. Each variant carries only its own payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    /// Control command (one of the `CMD_*` codes).
    Command(u16),
    /// Parameter update. The id is carried verbatim, known or not.
    SetParam { param_id: u16, param_value: f64 },
    /// Reference signal samples.
    RefArray(Box<SampleArray>),
    /// Error signal samples.
    ErrArray(Box<SampleArray>),
}

impl Packet {
    /// Message kind of this packet.
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::Command(_) => MessageKind::Command,
            Self::SetParam { .. } => MessageKind::SetParam,
            Self::RefArray(_) => MessageKind::RefArray,
            Self::ErrArray(_) => MessageKind::ErrArray,
        }
    }

    /// Exact number of bytes this packet occupies on the wire.
    pub fn wire_size(&self) -> usize {
        self.kind().packet_size()
    }

    /// Encode this packet into the wire format.
    ///
    /// ```text
    /// ┌────────────┬──────────────────────────────────────────┐
    /// │ Kind (2B)  │ Payload                                  │
    /// │ u16 LE     │ Command:  code u16                       │
    /// │            │ SetParam: id u16, value f64              │
    /// │            │ Arrays:   200 x i16                      │
    /// └────────────┴──────────────────────────────────────────┘
    /// ```
    pub fn encode(&self, dst: &mut BytesMut) {
        dst.reserve(self.wire_size());
        dst.put_u16_le(self.kind().tag());
        match self {
            Self::Command(code) => dst.put_u16_le(*code),
            Self::SetParam {
                param_id,
                param_value,
            } => {
                dst.put_u16_le(*param_id);
                dst.put_f64_le(*param_value);
            }
            Self::RefArray(samples) | Self::ErrArray(samples) => {
                for sample in samples.iter() {
                    dst.put_i16_le(*sample);
                }
            }
        }
    }

    /// Encode into a freshly allocated buffer.
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.wire_size());
        self.encode(&mut buf);
        buf.freeze()
    }
}

/// Decode exactly one packet from the front of `src`.
///
/// Trailing bytes beyond the packet are ignored.
pub fn decode_packet(src: &[u8]) -> Result<Packet> {
    if src.len() < TAG_SIZE {
        return Err(FrameError::Incomplete {
            needed: TAG_SIZE,
            available: src.len(),
        });
    }

    let tag = u16::from_le_bytes([src[0], src[1]]);
    let kind = MessageKind::from_tag(tag).ok_or(FrameError::UnknownKind(tag))?;
    let size = kind.packet_size();
    if src.len() < size {
        return Err(FrameError::Incomplete {
            needed: size,
            available: src.len(),
        });
    }

    let mut body = &src[TAG_SIZE..size];
    let packet = match kind {
        MessageKind::Command => Packet::Command(body.get_u16_le()),
        MessageKind::SetParam => Packet::SetParam {
            param_id: body.get_u16_le(),
            param_value: body.get_f64_le(),
        },
        MessageKind::RefArray => Packet::RefArray(read_samples(&mut body)),
        MessageKind::ErrArray => Packet::ErrArray(read_samples(&mut body)),
    };
    Ok(packet)
}

fn read_samples(body: &mut &[u8]) -> Box<SampleArray> {
    let mut samples = Box::new([0i16; ARRAY_LEN]);
    for sample in samples.iter_mut() {
        *sample = body.get_i16_le();
    }
    samples
}

/// Logical command selectors, numbered as an operator enters them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum CommandSelector {
    /// Close the link. Never encoded; handled by the command channel.
    Terminate = 0,
    StartExcitation = 1,
    StopExcitation = 2,
    StartControl = 3,
    StopControl = 4,
    StartIdentify = 5,
    StopIdentify = 6,
    SetParam = 7,
    /// Ask the coprocessor for sensor arrays (sent as `START_DAMPING`).
    RequestArray = 8,
}

impl CommandSelector {
    pub const ALL: [CommandSelector; 9] = [
        Self::Terminate,
        Self::StartExcitation,
        Self::StopExcitation,
        Self::StartControl,
        Self::StopControl,
        Self::StartIdentify,
        Self::StopIdentify,
        Self::SetParam,
        Self::RequestArray,
    ];

    /// Kebab-case name used on command lines.
    pub fn name(self) -> &'static str {
        match self {
            Self::Terminate => "terminate",
            Self::StartExcitation => "start-excitation",
            Self::StopExcitation => "stop-excitation",
            Self::StartControl => "start-control",
            Self::StopControl => "stop-control",
            Self::StartIdentify => "start-identify",
            Self::StopIdentify => "stop-identify",
            Self::SetParam => "set-param",
            Self::RequestArray => "request-array",
        }
    }

    /// Build the packet for this selector, `None` for [`CommandSelector::Terminate`].
    pub fn to_packet(self, param_id: u16, param_value: f64) -> Option<Packet> {
        let code = match self {
            Self::Terminate => return None,
            Self::StartExcitation => CMD_START_EXCITATION,
            Self::StopExcitation => CMD_STOP_EXCITATION,
            Self::StartControl => CMD_START_CONTROL,
            Self::StopControl => CMD_STOP_CONTROL,
            Self::StartIdentify => CMD_START_IDENTIFY,
            Self::StopIdentify => CMD_STOP_IDENTIFY,
            Self::RequestArray => CMD_START_DAMPING,
            Self::SetParam => {
                return Some(Packet::SetParam {
                    param_id,
                    param_value,
                })
            }
        };
        Some(Packet::Command(code))
    }
}

impl TryFrom<u16> for CommandSelector {
    type Error = FrameError;

    fn try_from(value: u16) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|selector| *selector as u16 == value)
            .ok_or(FrameError::InvalidCommand(value))
    }
}

impl FromStr for CommandSelector {
    type Err = String;

    /// Accepts either the numeric selector or its kebab-case name.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(value) = s.parse::<u16>() {
            return Self::try_from(value).map_err(|err| err.to_string());
        }
        Self::ALL
            .into_iter()
            .find(|selector| selector.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown command '{s}'"))
    }
}

impl fmt::Display for CommandSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Map a numeric logical command to its packet.
///
/// Fails with [`FrameError::InvalidCommand`] for unknown selectors and for
/// `Terminate`, which has no wire representation.
pub fn encode_command(selector: u16, param_id: u16, param_value: f64) -> Result<Packet> {
    CommandSelector::try_from(selector)?
        .to_packet(param_id, param_value)
        .ok_or(FrameError::InvalidCommand(selector))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::{MSG_COMMAND, PARAM_FREQUENCY, PARAM_STEP_SIZE};

    #[test]
    fn set_param_wire_layout() {
        let packet = encode_command(CommandSelector::SetParam as u16, PARAM_FREQUENCY, 50.0)
            .expect("set-param should encode");
        let bytes = packet.to_bytes();

        let mut expected = vec![0xB1, 0x00, 0x02, 0x00];
        expected.extend_from_slice(&50.0f64.to_le_bytes());
        assert_eq!(bytes.as_ref(), expected.as_slice());
        assert_eq!(bytes.len(), packet.wire_size());

        let decoded = decode_packet(&bytes).expect("set-param should decode");
        assert_eq!(
            decoded,
            Packet::SetParam {
                param_id: 2,
                param_value: 50.0
            }
        );
    }

    #[test]
    fn every_selector_roundtrips() {
        for selector in CommandSelector::ALL {
            if selector == CommandSelector::Terminate {
                continue;
            }
            let packet = encode_command(selector as u16, PARAM_STEP_SIZE, 0.125)
                .expect("selector should encode");
            let decoded = decode_packet(&packet.to_bytes()).expect("packet should decode");
            assert_eq!(decoded.kind(), packet.kind());
            assert_eq!(decoded, packet);
        }
    }

    #[test]
    fn command_packet_is_four_bytes() {
        let packet = encode_command(CommandSelector::RequestArray as u16, 0, 0.0).unwrap();
        assert_eq!(packet.to_bytes().as_ref(), &[0xA1, 0x00, 0xC7, 0x00]);
        assert_eq!(packet.kind().tag(), MSG_COMMAND);
    }

    #[test]
    fn unknown_selectors_rejected() {
        assert_eq!(encode_command(9, 0, 0.0), Err(FrameError::InvalidCommand(9)));
        assert_eq!(
            encode_command(u16::MAX, 0, 0.0),
            Err(FrameError::InvalidCommand(u16::MAX))
        );
        assert_eq!(encode_command(0, 0, 0.0), Err(FrameError::InvalidCommand(0)));
    }

    #[test]
    fn unknown_param_id_is_carried_verbatim() {
        let packet = encode_command(7, 0x7777, -1.5).unwrap();
        let decoded = decode_packet(&packet.to_bytes()).unwrap();
        assert_eq!(
            decoded,
            Packet::SetParam {
                param_id: 0x7777,
                param_value: -1.5
            }
        );
    }

    #[test]
    fn array_samples_are_signed_little_endian() {
        let mut samples = Box::new([0i16; ARRAY_LEN]);
        samples[0] = 0x7FFF;
        samples[1] = -1;
        samples[ARRAY_LEN - 1] = i16::MIN;
        let bytes = Packet::ErrArray(samples.clone()).to_bytes();

        assert_eq!(bytes.len(), 402);
        assert_eq!(&bytes[..6], &[0xC2, 0x00, 0xFF, 0x7F, 0xFF, 0xFF]);
        assert_eq!(decode_packet(&bytes).unwrap(), Packet::ErrArray(samples));
    }

    #[test]
    fn decode_rejects_unknown_and_short_input() {
        assert_eq!(
            decode_packet(&[0x00, 0x00, 0x00, 0x00]),
            Err(FrameError::UnknownKind(0))
        );
        assert_eq!(
            decode_packet(&[0xC1]),
            Err(FrameError::Incomplete {
                needed: 2,
                available: 1
            })
        );
        assert_eq!(
            decode_packet(&[0xB1, 0x00, 0x01, 0x00]),
            Err(FrameError::Incomplete {
                needed: 12,
                available: 4
            })
        );
    }

    #[test]
    fn selector_parses_names_and_numbers() {
        assert_eq!(
            "start-control".parse::<CommandSelector>(),
            Ok(CommandSelector::StartControl)
        );
        assert_eq!("8".parse::<CommandSelector>(), Ok(CommandSelector::RequestArray));
        assert_eq!(
            "Terminate".parse::<CommandSelector>(),
            Ok(CommandSelector::Terminate)
        );
        assert!("42".parse::<CommandSelector>().is_err());
        assert!("launch".parse::<CommandSelector>().is_err());
    }
}
