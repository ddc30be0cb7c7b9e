//! Wire-level constants.
//!
//! Message kinds, command codes and parameter ids are fixed small integers
//! shared with the coprocessor firmware.

/// Size of the message kind tag.
pub const TAG_SIZE: usize = 2;

/// Samples carried by one array packet.
pub const ARRAY_LEN: usize = 200;

/// Encoded size of a `Command` packet.
pub const COMMAND_PACKET_SIZE: usize = TAG_SIZE + 2;

/// Encoded size of a `SetParam` packet (id + f64, no padding).
pub const SET_PARAM_PACKET_SIZE: usize = TAG_SIZE + 2 + 8;

/// Encoded size of a `RefArray`/`ErrArray` packet.
pub const ARRAY_PACKET_SIZE: usize = TAG_SIZE + ARRAY_LEN * 2;

/// Largest packet on the wire.
pub const MAX_PACKET_SIZE: usize = ARRAY_PACKET_SIZE;

/// Host -> coprocessor: control command.
pub const MSG_COMMAND: u16 = 0xA1;
/// Host -> coprocessor: parameter update.
pub const MSG_SET_PARAM: u16 = 0xB1;
/// Coprocessor -> host: reference signal array.
pub const MSG_REF_ARRAY: u16 = 0xC1;
/// Coprocessor -> host: error signal array.
pub const MSG_ERR_ARRAY: u16 = 0xC2;

pub const CMD_START_EXCITATION: u16 = 0xC1;
pub const CMD_STOP_EXCITATION: u16 = 0xC2;
pub const CMD_START_CONTROL: u16 = 0xC3;
pub const CMD_STOP_CONTROL: u16 = 0xC4;
/// Start secondary-path identification.
pub const CMD_START_IDENTIFY: u16 = 0xC5;
/// Stop secondary-path identification.
pub const CMD_STOP_IDENTIFY: u16 = 0xC6;
/// Start damping; also used by the host to request sensor arrays.
pub const CMD_START_DAMPING: u16 = 0xC7;

/// Adaptive filter step size.
pub const PARAM_STEP_SIZE: u16 = 0x01;
/// Excitation frequency.
pub const PARAM_FREQUENCY: u16 = 0x02;

/// Message kind tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum MessageKind {
    Command = MSG_COMMAND,
    SetParam = MSG_SET_PARAM,
    RefArray = MSG_REF_ARRAY,
    ErrArray = MSG_ERR_ARRAY,
}

impl MessageKind {
    /// Map a raw tag to a kind, `None` for values outside the protocol.
    pub fn from_tag(tag: u16) -> Option<Self> {
        match tag {
            MSG_COMMAND => Some(Self::Command),
            MSG_SET_PARAM => Some(Self::SetParam),
            MSG_REF_ARRAY => Some(Self::RefArray),
            MSG_ERR_ARRAY => Some(Self::ErrArray),
            _ => None,
        }
    }

    /// Raw tag value.
    pub fn tag(self) -> u16 {
        self as u16
    }

    /// Total encoded size (tag + payload) of a packet of this kind.
    pub fn packet_size(self) -> usize {
        match self {
            Self::Command => COMMAND_PACKET_SIZE,
            Self::SetParam => SET_PARAM_PACKET_SIZE,
            Self::RefArray | Self::ErrArray => ARRAY_PACKET_SIZE,
        }
    }
}

/// Returns a human-readable name for a command code.
pub fn command_name(code: u16) -> &'static str {
    match code {
        CMD_START_EXCITATION => "START_EXCITATION",
        CMD_STOP_EXCITATION => "STOP_EXCITATION",
        CMD_START_CONTROL => "START_CONTROL",
        CMD_STOP_CONTROL => "STOP_CONTROL",
        CMD_START_IDENTIFY => "START_IDENTIFY",
        CMD_STOP_IDENTIFY => "STOP_IDENTIFY",
        CMD_START_DAMPING => "START_DAMPING",
        _ => "UNKNOWN",
    }
}

/// Returns a human-readable name for a parameter id.
pub fn param_name(id: u16) -> &'static str {
    match id {
        PARAM_STEP_SIZE => "STEP_SIZE",
        PARAM_FREQUENCY => "FREQUENCY",
        _ => "UNKNOWN",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packet_sizes_are_dense() {
        assert_eq!(MessageKind::Command.packet_size(), 4);
        assert_eq!(MessageKind::SetParam.packet_size(), 12);
        assert_eq!(MessageKind::RefArray.packet_size(), 402);
        assert_eq!(MessageKind::ErrArray.packet_size(), 402);
    }

    #[test]
    fn tags_map_both_ways() {
        for kind in [
            MessageKind::Command,
            MessageKind::SetParam,
            MessageKind::RefArray,
            MessageKind::ErrArray,
        ] {
            assert_eq!(MessageKind::from_tag(kind.tag()), Some(kind));
        }
        assert_eq!(MessageKind::from_tag(0x00C3), None);
        assert_eq!(MessageKind::from_tag(0xC100), None);
    }

    #[test]
    fn names_for_known_codes() {
        assert_eq!(command_name(CMD_START_DAMPING), "START_DAMPING");
        assert_eq!(command_name(0x01), "UNKNOWN");
        assert_eq!(param_name(PARAM_FREQUENCY), "FREQUENCY");
    }
}
