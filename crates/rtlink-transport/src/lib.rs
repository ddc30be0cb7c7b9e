//! Character-device transport for host/coprocessor links.
//!
//! Provides a single stream type over the byte pipes a link can run on:
//! - rpmsg tty character devices (`/dev/ttyRPMSG*`) opened non-blocking
//! - connected socket pairs, used as in-process loopbacks
//!
//! This is the lowest layer of rtlink. Everything else builds on top of
//! the [`DeviceStream`] type provided here.

pub mod error;
pub mod traits;

#[cfg(unix)]
pub mod device;

pub use error::{Result, TransportError};
pub use traits::{DeviceStream, Readiness, WaitReadable};

#[cfg(unix)]
pub use device::DEFAULT_DEVICE_PATH;
