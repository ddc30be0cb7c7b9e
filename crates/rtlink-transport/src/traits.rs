use std::io::{Read, Write};
use std::time::Duration;

use crate::error::Result;

/// Outcome of waiting for inbound data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// Data (or a hangup/error condition) is pending; the next read will not block.
    Readable,
    /// The timeout expired, or the wait was interrupted by a signal.
    TimedOut,
}

/// A byte source that can block until it becomes readable.
///
/// Reads themselves are expected to be non-blocking: after `TimedOut` a read
/// would return `WouldBlock`.
pub trait WaitReadable: Read {
    /// Wait until the source is readable or `timeout` expires (`None` blocks indefinitely).
    fn wait_readable(&mut self, timeout: Option<Duration>) -> Result<Readiness>;
}

/// A connected link stream implementing Read + Write.
///
/// This is the fundamental I/O type handed to the link engine.
/// On a target board it wraps the non-blocking rpmsg tty descriptor;
/// in tests and simulations it wraps one end of a socket pair.
pub struct DeviceStream {
    inner: DeviceStreamInner,
}

enum DeviceStreamInner {
    #[cfg(unix)]
    Device(std::fs::File),
    #[cfg(unix)]
    Socket(std::os::unix::net::UnixStream),
}

impl Read for DeviceStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            #[cfg(unix)]
            DeviceStreamInner::Device(file) => file.read(buf),
            #[cfg(unix)]
            DeviceStreamInner::Socket(stream) => stream.read(buf),
        }
    }
}

impl Write for DeviceStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            #[cfg(unix)]
            DeviceStreamInner::Device(file) => file.write(buf),
            #[cfg(unix)]
            DeviceStreamInner::Socket(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match &mut self.inner {
            #[cfg(unix)]
            DeviceStreamInner::Device(file) => file.flush(),
            #[cfg(unix)]
            DeviceStreamInner::Socket(stream) => stream.flush(),
        }
    }
}

#[cfg(unix)]
impl WaitReadable for DeviceStream {
    fn wait_readable(&mut self, timeout: Option<Duration>) -> Result<Readiness> {
        crate::device::poll_readable(self.raw_fd(), timeout)
    }
}

impl DeviceStream {
    /// Wrap an already-open character device.
    #[cfg(unix)]
    pub(crate) fn from_file(file: std::fs::File) -> Self {
        Self {
            inner: DeviceStreamInner::Device(file),
        }
    }

    /// Wrap a connected Unix stream socket.
    #[cfg(unix)]
    pub(crate) fn from_socket(stream: std::os::unix::net::UnixStream) -> Self {
        Self {
            inner: DeviceStreamInner::Socket(stream),
        }
    }

    /// Create a connected, non-blocking loopback pair.
    ///
    /// Bytes written to one end are readable from the other. Used to run the
    /// link engine against an in-process coprocessor stand-in.
    #[cfg(unix)]
    pub fn pair() -> Result<(Self, Self)> {
        let (a, b) = std::os::unix::net::UnixStream::pair()?;
        a.set_nonblocking(true)?;
        b.set_nonblocking(true)?;
        Ok((Self::from_socket(a), Self::from_socket(b)))
    }

    /// Try to clone this stream (creates a new file descriptor).
    pub fn try_clone(&self) -> Result<Self> {
        match &self.inner {
            #[cfg(unix)]
            DeviceStreamInner::Device(file) => Ok(Self::from_file(file.try_clone()?)),
            #[cfg(unix)]
            DeviceStreamInner::Socket(stream) => Ok(Self::from_socket(stream.try_clone()?)),
        }
    }

    /// Apply raw line settings when the stream is a terminal device.
    ///
    /// Socket pairs carry no line discipline, so this is a no-op for them.
    pub fn configure_raw(&self) -> Result<()> {
        match &self.inner {
            #[cfg(unix)]
            DeviceStreamInner::Device(_) => crate::device::set_tty_raw(self.raw_fd()),
            #[cfg(unix)]
            DeviceStreamInner::Socket(_) => Ok(()),
        }
    }

    /// Transport name for diagnostics.
    pub fn transport_name(&self) -> &'static str {
        match &self.inner {
            #[cfg(unix)]
            DeviceStreamInner::Device(_) => "char-device",
            #[cfg(unix)]
            DeviceStreamInner::Socket(_) => "socket-pair",
        }
    }

    #[cfg(unix)]
    fn raw_fd(&self) -> std::os::fd::RawFd {
        use std::os::fd::AsRawFd;

        match &self.inner {
            DeviceStreamInner::Device(file) => file.as_raw_fd(),
            DeviceStreamInner::Socket(stream) => stream.as_raw_fd(),
        }
    }
}

impl std::fmt::Debug for DeviceStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceStream")
            .field("type", &self.transport_name())
            .finish()
    }
}
