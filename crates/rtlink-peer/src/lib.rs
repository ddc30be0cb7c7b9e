//! Host-side link engine.
//!
//! This is the "just works" layer. Open the coprocessor link, issue paced
//! commands from any thread, and drain the latest reference and error
//! arrays from single-slot handoff buffers fed by a background receiver.

pub mod command;
pub mod config;
pub mod convert;
pub mod error;
pub mod link;
pub mod receiver;
pub mod slot;

pub use command::{CommandChannel, Dispatch};
pub use config::LinkConfig;
pub use convert::{
    raw_to_voltage, voltage_to_scaled, DecodedArray, SignalConverter, SignalKind, SignalRange,
};
pub use error::{PeerError, Result};
pub use link::Link;
pub use receiver::{ArrayReceiver, ReceiveExit};
pub use slot::{signal_slot, PublishOutcome, SlotConsumer, SlotPublisher, SlotStats};
