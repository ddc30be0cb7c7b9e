//! Host-side link engine for a real-time coprocessor.
//!
//! rtlink talks to a coprocessor over an rpmsg tty character device. It sends
//! paced control commands and parameter updates, and receives reference and
//! error signal arrays that it converts and hands to a slower consumer.
//!
//! # Crate Structure
//!
//! - [`transport`]: Character-device and loopback byte streams
//! - [`frame`]: Tagged packet codec with stream resynchronization
//! - [`peer`]: Command channel, array receiver and signal slots (behind `peer` feature)

/// Re-export transport types.
pub mod transport {
    pub use rtlink_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use rtlink_frame::*;
}

/// Re-export link engine types (requires `peer` feature).
#[cfg(feature = "peer")]
pub mod peer {
    pub use rtlink_peer::*;
}
