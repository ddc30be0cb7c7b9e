/// Errors that can occur in link operations.
#[derive(Debug, thiserror::Error)]
pub enum PeerError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] rtlink_transport::TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] rtlink_frame::FrameError),

    /// The logical command selector is not recognized. Nothing was written.
    #[error("invalid command selector {0}")]
    InvalidCommand(u16),

    /// A command write failed or was short. Not retried.
    #[error("transport write failed: {0}")]
    TransportWriteFailed(std::io::Error),

    /// Reading from the link failed; the receive loop has stopped.
    #[error("transport read failed: {0}")]
    TransportReadFailed(std::io::Error),

    /// The command channel was terminated.
    #[error("command channel closed")]
    ChannelClosed,

    /// Spawning the receive thread failed.
    #[error("failed to spawn receiver: {0}")]
    Spawn(std::io::Error),

    /// The receive thread panicked.
    #[error("receiver thread panicked")]
    ReceiverPanicked,

    /// The configuration file could not be read.
    #[error("failed to read link config {}: {source}", path.display())]
    ConfigIo {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Configuration could not be parsed.
    #[error("invalid link config: {0}")]
    Config(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, PeerError>;
