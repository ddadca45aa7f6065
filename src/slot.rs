//! Per-task hand-off state: two rendezvous legs plus a state tag.
//!
//! A [`TaskSlot`] owns the forward and backward [`RendezvousCell`]s for one
//! task identifier and enforces the round-trip protocol between them. The
//! state tag makes the legal call sequence explicit:
//!
//! ```text
//! Idle → ForwardPosted → ForwardConsumed → BackwardPosted → Idle
//!                                              └────────→ Terminated
//! ```
//!
//! A completed round trip returns the slot to `Idle`, ready for the next
//! round trip on the same identifier. `Terminated` is absorbing: once the
//! driver answers [`BackwardResult::Terminate`], no further posts or takes
//! are valid and the slot may be removed from the registry.
//!
//! The state mutex is held only across tag checks and updates, never across
//! a blocking take; the blocking itself lives inside the cells. Transitions
//! keyed to value delivery (`ForwardPosted → ForwardConsumed`,
//! `BackwardPosted → Idle | Terminated`) are written under the delivering
//! cell's lock, so no thread can observe an emptied leg paired with a stale
//! tag.

use parking_lot::Mutex;
use std::fmt;

use crate::handoff::{BackwardResult, ForwardResult};
use crate::rendezvous::{Leg, ProtocolError, RendezvousCell};

/// Where a slot currently sits in its round trip.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SlotState {
    /// No round trip in flight.
    Idle,
    /// The executor posted forward outputs; the driver has not taken them.
    ForwardPosted,
    /// The driver took the forward outputs and is computing gradients.
    ForwardConsumed,
    /// The driver posted backward inputs; the executor has not resumed.
    BackwardPosted,
    /// The driver requested termination; absorbing.
    Terminated,
}

impl fmt::Display for SlotState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotState::Idle => write!(f, "idle"),
            SlotState::ForwardPosted => write!(f, "forward-posted"),
            SlotState::ForwardConsumed => write!(f, "forward-consumed"),
            SlotState::BackwardPosted => write!(f, "backward-posted"),
            SlotState::Terminated => write!(f, "terminated"),
        }
    }
}

/// Hand-off state for one task identifier.
///
/// At most one unconsumed [`ForwardResult`] and one unconsumed
/// [`BackwardResult`] exist at any time; the state tag rejects any call
/// that would break the strict post-forward → take-forward → post-backward
/// → take-backward order.
#[derive(Debug)]
pub struct TaskSlot {
    forward: RendezvousCell<ForwardResult>,
    backward: RendezvousCell<BackwardResult>,
    state: Mutex<SlotState>,
}

impl Default for TaskSlot {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskSlot {
    /// A fresh slot in the `Idle` state.
    #[must_use]
    pub fn new() -> Self {
        TaskSlot {
            forward: RendezvousCell::new(Leg::Forward),
            backward: RendezvousCell::new(Leg::Backward),
            state: Mutex::new(SlotState::Idle),
        }
    }

    /// Executor side: post forward outputs, starting a round trip.
    ///
    /// Valid only from `Idle`. Wakes a driver blocked in
    /// [`take_forward`](Self::take_forward).
    pub fn post_forward(&self, result: ForwardResult) -> Result<(), ProtocolError> {
        {
            let mut state = self.state.lock();
            match *state {
                SlotState::Idle => *state = SlotState::ForwardPosted,
                SlotState::Terminated => return Err(ProtocolError::Terminated),
                other => {
                    return Err(ProtocolError::InvalidTransition {
                        state: other,
                        op: "post_forward",
                    })
                }
            }
        }
        self.forward.post(result)
    }

    /// Driver side: block until forward outputs are available, then consume
    /// them.
    ///
    /// The driver may legally call this ahead of the executor: before the
    /// executor posts (the slot is still `Idle`), or straight after its own
    /// [`post_backward`](Self::post_backward), while the previous answer is
    /// still pending for the executor (`BackwardPosted`). Either way it
    /// blocks until the next forward post.
    pub fn take_forward(&self) -> Result<ForwardResult, ProtocolError> {
        {
            let state = self.state.lock();
            match *state {
                SlotState::Idle | SlotState::ForwardPosted | SlotState::BackwardPosted => {}
                SlotState::Terminated => return Err(ProtocolError::Terminated),
                other => {
                    return Err(ProtocolError::InvalidTransition {
                        state: other,
                        op: "take_forward",
                    })
                }
            }
        }
        let result = self
            .forward
            .take_with(|_| *self.state.lock() = SlotState::ForwardConsumed);
        Ok(result)
    }

    /// Driver side: post backward inputs after the external computation.
    ///
    /// Valid only once the forward outputs have been consumed. Wakes the
    /// executor blocked in [`take_backward`](Self::take_backward).
    pub fn post_backward(&self, result: BackwardResult) -> Result<(), ProtocolError> {
        {
            let mut state = self.state.lock();
            match *state {
                SlotState::ForwardConsumed => *state = SlotState::BackwardPosted,
                SlotState::Terminated => return Err(ProtocolError::Terminated),
                other => {
                    return Err(ProtocolError::InvalidTransition {
                        state: other,
                        op: "post_backward",
                    })
                }
            }
        }
        self.backward.post(result)
    }

    /// Executor side: block until the driver answers, then consume the
    /// answer.
    ///
    /// Called immediately after [`post_forward`](Self::post_forward), so
    /// any in-flight state is acceptable on entry. The slot is `Idle` again
    /// (or `Terminated`, if the driver requested termination) the instant
    /// the answer leaves the backward cell; the tag is written under that
    /// cell's lock so a driver looping into the next round trip, or a
    /// removal check, can never observe the delivered answer paired with a
    /// stale tag.
    pub fn take_backward(&self) -> Result<BackwardResult, ProtocolError> {
        {
            let state = self.state.lock();
            match *state {
                SlotState::ForwardPosted
                | SlotState::ForwardConsumed
                | SlotState::BackwardPosted => {}
                SlotState::Terminated => return Err(ProtocolError::Terminated),
                SlotState::Idle => {
                    return Err(ProtocolError::InvalidTransition {
                        state: SlotState::Idle,
                        op: "take_backward",
                    })
                }
            }
        }
        let result = self.backward.take_with(|result| {
            *self.state.lock() = if result.is_terminate() {
                SlotState::Terminated
            } else {
                SlotState::Idle
            };
        });
        Ok(result)
    }

    /// Current position in the round trip.
    #[must_use]
    pub fn state(&self) -> SlotState {
        *self.state.lock()
    }

    /// Whether the slot holds no unconsumed data and no round trip is in
    /// flight, i.e. it is safe to remove from the registry.
    #[must_use]
    pub fn is_drained(&self) -> bool {
        let state = *self.state.lock();
        matches!(state, SlotState::Idle | SlotState::Terminated)
            && !self.forward.is_occupied()
            && !self.backward.is_occupied()
    }
}
