use std::fs::OpenOptions;
use std::os::fd::RawFd;
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;
use std::time::Duration;

use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::traits::{DeviceStream, Readiness};

/// Default rpmsg tty exposed by the remoteproc driver.
pub const DEFAULT_DEVICE_PATH: &str = "/dev/ttyRPMSG0";

impl DeviceStream {
    /// Open a character device for non-blocking read/write.
    ///
    /// The device is opened with `O_NONBLOCK | O_NOCTTY`. Line settings are
    /// left untouched; call [`DeviceStream::configure_raw`] for tty devices.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_NONBLOCK | libc::O_NOCTTY)
            .open(path)
            .map_err(|source| TransportError::Open {
                path: path.to_path_buf(),
                source,
            })?;

        info!(?path, "opened link device");
        Ok(Self::from_file(file))
    }
}

/// Block until `fd` is readable or the timeout expires.
///
/// Hangup and error conditions are reported as readable so that the following
/// read observes them. `EINTR` is reported as `TimedOut`.
pub(crate) fn poll_readable(fd: RawFd, timeout: Option<Duration>) -> Result<Readiness> {
    let timeout_ms = poll_timeout_ms(timeout);
    let mut fds = libc::pollfd {
        fd,
        events: libc::POLLIN,
        revents: 0,
    };

    // SAFETY: `fds` is a valid, writable pollfd and the count passed is 1.
    let rc = unsafe { libc::poll(&mut fds, 1, timeout_ms) };
    if rc < 0 {
        let err = std::io::Error::last_os_error();
        if err.kind() == std::io::ErrorKind::Interrupted {
            return Ok(Readiness::TimedOut);
        }
        return Err(TransportError::Poll(err));
    }
    if rc == 0 {
        return Ok(Readiness::TimedOut);
    }
    Ok(Readiness::Readable)
}

/// `poll(2)` timeout argument. Partial milliseconds round up so that a small
/// nonzero timeout still blocks instead of returning immediately.
fn poll_timeout_ms(timeout: Option<Duration>) -> i32 {
    match timeout {
        Some(timeout) => i32::try_from(timeout.as_nanos().div_ceil(1_000_000)).unwrap_or(i32::MAX),
        None => -1,
    }
}

/// Put a tty into fully raw mode: no input, output or local processing,
/// `VMIN = 0`, `VTIME = 0`, then discard anything already queued.
pub(crate) fn set_tty_raw(fd: RawFd) -> Result<()> {
    // SAFETY: termios is plain old data; tcgetattr fully initialises it on success.
    let mut tty: libc::termios = unsafe { std::mem::zeroed() };

    // SAFETY: `fd` is an open descriptor owned by the caller and `tty` is writable.
    if unsafe { libc::tcgetattr(fd, &mut tty) } < 0 {
        return Err(TransportError::RawMode(std::io::Error::last_os_error()));
    }

    tty.c_iflag = 0;
    tty.c_oflag = 0;
    tty.c_lflag = 0;
    tty.c_cc[libc::VMIN] = 0;
    tty.c_cc[libc::VTIME] = 0;

    // SAFETY: `tty` was initialised by tcgetattr above.
    if unsafe { libc::tcsetattr(fd, libc::TCSANOW, &tty) } < 0 {
        return Err(TransportError::RawMode(std::io::Error::last_os_error()));
    }
    // SAFETY: `fd` is an open tty descriptor.
    if unsafe { libc::tcflush(fd, libc::TCIOFLUSH) } < 0 {
        return Err(TransportError::RawMode(std::io::Error::last_os_error()));
    }

    debug!(fd, "tty raw mode applied");
    Ok(())
}
