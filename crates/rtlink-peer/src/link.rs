use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use rtlink_frame::CommandSelector;
use rtlink_transport::DeviceStream;
use tracing::{debug, info, warn};

use crate::command::{CommandChannel, Dispatch};
use crate::config::LinkConfig;
use crate::convert::SignalKind;
use crate::error::{PeerError, Result};
use crate::receiver::{ArrayReceiver, ReceiveExit};
use crate::slot::{signal_slot, SlotConsumer};

/// An open link to the coprocessor.
///
/// Owns the command channel, the consuming halves of both signal slots and
/// the background receive thread. Dropping the link raises the shutdown flag
/// without waiting; call [`Link::shutdown`] to join the receiver.
pub struct Link {
    commands: Arc<CommandChannel<DeviceStream>>,
    reference: SlotConsumer,
    error: SlotConsumer,
    shutdown: Arc<AtomicBool>,
    receiver: Option<JoinHandle<Result<ReceiveExit>>>,
}

impl Link {
    /// Open the device at `path` and start receiving.
    pub fn open(path: impl AsRef<Path>, config: LinkConfig) -> Result<Self> {
        let stream = DeviceStream::open(path.as_ref())?;
        if config.raw_mode {
            if let Err(err) = stream.configure_raw() {
                warn!(
                    path = %path.as_ref().display(),
                    error = %err,
                    "could not set raw mode, continuing with current line settings"
                );
            }
        }
        Self::from_stream(stream, config)
    }

    /// Start the link engine on an already-open stream.
    pub fn from_stream(stream: DeviceStream, config: LinkConfig) -> Result<Self> {
        let reader = stream.try_clone()?;
        let shutdown = Arc::new(AtomicBool::new(false));

        let (ref_pub, reference) = signal_slot(SignalKind::Reference, config.slot_wait);
        let (err_pub, error) = signal_slot(SignalKind::Error, config.slot_wait);

        let receiver = ArrayReceiver::new(reader, ref_pub, err_pub, &config, Arc::clone(&shutdown));
        let handle = thread::Builder::new()
            .name("rtlink-rx".into())
            .spawn(move || receiver.run())
            .map_err(PeerError::Spawn)?;

        info!(
            transport = stream.transport_name(),
            pacing_delay = ?config.pacing_delay,
            "link started"
        );
        let commands = Arc::new(CommandChannel::with_shutdown(
            stream,
            config.pacing_delay,
            Arc::clone(&shutdown),
        ));

        Ok(Self {
            commands,
            reference,
            error,
            shutdown,
            receiver: Some(handle),
        })
    }

    /// Send a numeric logical command. See [`CommandChannel::send_command`].
    pub fn send_command(&self, selector: u16, param_id: u16, param_value: f64) -> Result<Dispatch> {
        self.commands.send_command(selector, param_id, param_value)
    }

    pub fn send(&self, selector: CommandSelector, param_id: u16, param_value: f64) -> Result<Dispatch> {
        self.commands.send(selector, param_id, param_value)
    }

    /// Shareable handle for issuing commands from other threads.
    pub fn commands(&self) -> Arc<CommandChannel<DeviceStream>> {
        Arc::clone(&self.commands)
    }

    /// Consumer for one signal's latest array.
    pub fn signal(&self, kind: SignalKind) -> &SlotConsumer {
        match kind {
            SignalKind::Reference => &self.reference,
            SignalKind::Error => &self.error,
        }
    }

    /// Whether the receive thread is still running.
    pub fn is_receiving(&self) -> bool {
        self.receiver
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Stop the receiver and wait for it.
    ///
    /// Returns how the receive loop ended. If it had already stopped on a read
    /// error, that error is returned here.
    pub fn shutdown(mut self) -> Result<ReceiveExit> {
        self.shutdown.store(true, Ordering::SeqCst);
        let handle = self.receiver.take().ok_or(PeerError::ChannelClosed)?;
        let exit = handle.join().map_err(|_| PeerError::ReceiverPanicked)?;
        debug!(exit = ?exit.as_ref().ok(), "receiver joined");
        exit
    }
}

impl Drop for Link {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }
}

impl std::fmt::Debug for Link {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Link")
            .field("commands", &self.commands)
            .field("receiving", &self.is_receiving())
            .finish()
    }
}
