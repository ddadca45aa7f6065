//! Single-slot blocking hand-off between two threads.
//!
//! [`RendezvousCell`] is the primitive under each leg of a round trip: a
//! producer [`post`](RendezvousCell::post)s exactly one value into an empty
//! slot and wakes exactly one blocked consumer; a consumer
//! [`take`](RendezvousCell::take)s, blocking indefinitely until a value is
//! available, and clears the slot on the way out.
//!
//! Blocking has no timeout by design: the driver side may take arbitrarily
//! long (it performs a full external backward computation), and the
//! documented contract of this primitive is that a stuck counterpart stalls
//! the caller indefinitely. Cancellation is cooperative and travels through
//! the posted value itself (see [`BackwardResult::Terminate`]), never
//! through the cell.
//!
//! The mutex acquire/release pair inside the cell gives the ordering
//! guarantee callers rely on: everything visible to the poster before
//! `post` is visible to the taker after `take` returns.
//!
//! [`BackwardResult::Terminate`]: crate::handoff::BackwardResult::Terminate

use miette::Diagnostic;
use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::slot::SlotState;

/// Which leg of a round trip a cell carries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Leg {
    /// Executor → driver: forward outputs.
    Forward,
    /// Driver → executor: backward inputs.
    Backward,
}

impl fmt::Display for Leg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Leg::Forward => write!(f, "forward"),
            Leg::Backward => write!(f, "backward"),
        }
    }
}

/// Programming-contract violations of the hand-off protocol.
///
/// These are caller bugs, not recoverable conditions: they are surfaced
/// immediately to the offending call and never retried.
#[derive(Debug, Error, Diagnostic)]
pub enum ProtocolError {
    /// A value was posted onto a leg that already holds an unconsumed value.
    #[error("double post on {leg} leg: previous value not yet consumed")]
    #[diagnostic(
        code(gradrelay::rendezvous::occupied),
        help("Each leg carries exactly one value per round trip; the consumer must take the previous value before the next post.")
    )]
    Occupied { leg: Leg },

    /// An operation was attempted in a slot state that does not permit it.
    #[error("{op} is not valid while the task slot is {state}")]
    #[diagnostic(
        code(gradrelay::slot::invalid_transition),
        help("A round trip is strictly post-forward, take-forward, post-backward, take-backward.")
    )]
    InvalidTransition { state: SlotState, op: &'static str },

    /// The task slot reached the absorbing terminated state; no further
    /// posts or takes are valid for that task identifier.
    #[error("task slot is terminated; no further hand-offs are valid")]
    #[diagnostic(
        code(gradrelay::slot::terminated),
        help("Remove the slot from the registry and start a new round trip under a fresh task identifier.")
    )]
    Terminated,
}

/// One leg of the rendezvous: a single-item slot plus the signal needed to
/// block on it.
#[derive(Debug)]
pub struct RendezvousCell<T> {
    leg: Leg,
    pending: Mutex<Option<T>>,
    posted: Condvar,
}

impl<T> RendezvousCell<T> {
    /// An empty cell for the given leg.
    #[must_use]
    pub fn new(leg: Leg) -> Self {
        RendezvousCell {
            leg,
            pending: Mutex::new(None),
            posted: Condvar::new(),
        }
    }

    /// Store `value` into the empty slot and wake exactly one waiter.
    ///
    /// Posting twice without an intervening [`take`](Self::take) is a
    /// protocol violation surfaced as [`ProtocolError::Occupied`].
    pub fn post(&self, value: T) -> Result<(), ProtocolError> {
        let mut pending = self.pending.lock();
        if pending.is_some() {
            tracing::warn!(leg = %self.leg, "double post rejected");
            return Err(ProtocolError::Occupied { leg: self.leg });
        }
        *pending = Some(value);
        tracing::debug!(leg = %self.leg, "value posted");
        self.posted.notify_one();
        Ok(())
    }

    /// Block until a value has been posted, then return it and clear the
    /// slot.
    ///
    /// A second concurrent `take` on the same leg keeps blocking for the
    /// *next* posted value; it never observes a stale one. There is no
    /// timeout.
    pub fn take(&self) -> T {
        self.take_with(|_| {})
    }

    /// Like [`take`](Self::take), but runs `on_take` on the value while the
    /// slot lock is still held.
    ///
    /// No observer can see the slot empty before `on_take` has finished, so
    /// bookkeeping keyed to value delivery (such as a state tag) stays in
    /// step with the slot's occupancy. `on_take` must not block and must not
    /// touch this cell.
    pub fn take_with(&self, on_take: impl FnOnce(&T)) -> T {
        let mut pending = self.pending.lock();
        loop {
            if let Some(value) = pending.take() {
                on_take(&value);
                tracing::debug!(leg = %self.leg, "value taken");
                return value;
            }
            self.posted.wait(&mut pending);
        }
    }

    /// Whether an unconsumed value is currently pending.
    #[must_use]
    pub fn is_occupied(&self) -> bool {
        self.pending.lock().is_some()
    }

    /// The leg this cell carries.
    #[must_use]
    pub fn leg(&self) -> Leg {
        self.leg
    }
}
