//! Single-slot handoff between the receiver and one consumer.
//!
//! Each signal owns one slot. The publisher holds off for a bounded time while
//! the previous array is still undrained, then overwrites it. A stalled
//! consumer can therefore delay reception by at most the configured wait per
//! array and never stops it.

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tracing::warn;

use crate::convert::{DecodedArray, SignalKind};

/// Whether a publish replaced an array the consumer never saw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    Fresh,
    Overwrote,
}

/// Slot counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SlotStats {
    pub published: u64,
    pub overwritten: u64,
    pub consumed: u64,
}

struct SlotState {
    latest: Option<DecodedArray>,
    stats: SlotStats,
}

struct Shared {
    kind: SignalKind,
    state: Mutex<SlotState>,
    drained: Condvar,
    published: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, SlotState> {
        // The state is plain data; a panicking holder cannot leave it torn.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Create a connected publisher/consumer pair for one signal.
pub fn signal_slot(kind: SignalKind, max_wait: Duration) -> (SlotPublisher, SlotConsumer) {
    let shared = Arc::new(Shared {
        kind,
        state: Mutex::new(SlotState {
            latest: None,
            stats: SlotStats::default(),
        }),
        drained: Condvar::new(),
        published: Condvar::new(),
    });
    (
        SlotPublisher {
            shared: Arc::clone(&shared),
            max_wait,
        },
        SlotConsumer { shared },
    )
}

/// Writing half, owned by the receiver.
pub struct SlotPublisher {
    shared: Arc<Shared>,
    max_wait: Duration,
}

impl SlotPublisher {
    pub fn kind(&self) -> SignalKind {
        self.shared.kind
    }

    /// Publish `array`, replacing whatever is in the slot.
    ///
    /// Waits up to the configured bound for the consumer to drain the
    /// previous array first.
    pub fn publish(&mut self, array: DecodedArray) -> PublishOutcome {
        let guard = self.shared.lock();
        let (mut state, _) = self
            .shared
            .drained
            .wait_timeout_while(guard, self.max_wait, |state| state.latest.is_some())
            .unwrap_or_else(PoisonError::into_inner);

        let outcome = if state.latest.is_some() {
            warn!(
                signal = %self.shared.kind,
                sequence = array.sequence,
                "array processing unfinished, overwriting"
            );
            state.stats.overwritten += 1;
            PublishOutcome::Overwrote
        } else {
            PublishOutcome::Fresh
        };

        state.latest = Some(array);
        state.stats.published += 1;
        drop(state);
        self.shared.published.notify_all();
        outcome
    }
}

impl std::fmt::Debug for SlotPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlotPublisher")
            .field("kind", &self.shared.kind)
            .field("max_wait", &self.max_wait)
            .finish()
    }
}

/// Reading half, owned by the application.
pub struct SlotConsumer {
    shared: Arc<Shared>,
}

impl SlotConsumer {
    pub fn kind(&self) -> SignalKind {
        self.shared.kind
    }

    /// Whether an undrained array is waiting.
    pub fn is_ready(&self) -> bool {
        self.shared.lock().latest.is_some()
    }

    /// Take the latest array without blocking.
    pub fn try_consume(&self) -> Option<DecodedArray> {
        let mut state = self.shared.lock();
        let taken = Self::take(&mut state);
        drop(state);
        if taken.is_some() {
            self.shared.drained.notify_all();
        }
        taken
    }

    /// Take the latest array, waiting up to `timeout` for one to arrive.
    pub fn consume_timeout(&self, timeout: Duration) -> Option<DecodedArray> {
        let deadline = Instant::now() + timeout;
        let mut state = self.shared.lock();
        while state.latest.is_none() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return None;
            }
            state = self
                .shared
                .published
                .wait_timeout(state, remaining)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        let taken = Self::take(&mut state);
        drop(state);
        self.shared.drained.notify_all();
        taken
    }

    pub fn stats(&self) -> SlotStats {
        self.shared.lock().stats
    }

    fn take(state: &mut SlotState) -> Option<DecodedArray> {
        let taken = state.latest.take();
        if taken.is_some() {
            state.stats.consumed += 1;
        }
        taken
    }
}

impl std::fmt::Debug for SlotConsumer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlotConsumer")
            .field("kind", &self.shared.kind)
            .finish()
    }
}
