/// Errors that can occur during packet encoding/decoding.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FrameError {
    /// The logical command selector is not one the host can transmit.
    #[error("invalid command selector {0}")]
    InvalidCommand(u16),

    /// The message kind tag is not part of the protocol.
    #[error("unknown message kind 0x{0:04X}")]
    UnknownKind(u16),

    /// The buffer ends before the packet does.
    #[error("incomplete packet ({available} bytes, need {needed})")]
    Incomplete { needed: usize, available: usize },
}

pub type Result<T> = std::result::Result<T, FrameError>;
