//! Process-wide map from task identifier to hand-off slot.
//!
//! The [`TaskRegistry`] is the one piece of shared state unrelated task
//! identifiers touch concurrently. A single coarse mutex guards map
//! mutation only — lookup, insert, remove — and is never held across a
//! blocking take, so one task's round trip cannot stall another's registry
//! access.
//!
//! Slots are created lazily on first reference and removed once a round
//! trip is fully drained, keeping memory bounded across long multi-task
//! training runs. There is no ambient global instance: the registry is
//! constructed once at start-up (see [`Relay`](crate::relay::Relay)) and a
//! shared handle is injected into both the executor and driver sides.

use miette::Diagnostic;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::sync::Arc;
use thiserror::Error;

use crate::slot::TaskSlot;
use crate::types::TaskId;

/// Errors raised by registry lookups and lifecycle operations.
#[derive(Debug, Error, Diagnostic)]
pub enum RegistryError {
    /// The task identifier has no slot and the calling side must not create
    /// one.
    #[error("no round trip initialized for task `{task_id}`")]
    #[diagnostic(
        code(gradrelay::registry::not_found),
        help("Only the executor side initializes a round trip; check the task identifier.")
    )]
    NotFound { task_id: TaskId },

    /// The slot still holds unconsumed data or a round trip is mid-flight.
    #[error("task `{task_id}` still has an undrained round trip")]
    #[diagnostic(
        code(gradrelay::registry::slot_busy),
        help("Drain both legs of the round trip before removing the slot.")
    )]
    SlotBusy { task_id: TaskId },
}

/// Map of live task slots, keyed by task identifier.
#[derive(Debug, Default)]
pub struct TaskRegistry {
    slots: Mutex<FxHashMap<TaskId, Arc<TaskSlot>>>,
}

impl TaskRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// An empty registry pre-sized for `expected_tasks` concurrent lanes.
    #[must_use]
    pub fn with_capacity(expected_tasks: usize) -> Self {
        TaskRegistry {
            slots: Mutex::new(FxHashMap::with_capacity_and_hasher(
                expected_tasks,
                Default::default(),
            )),
        }
    }

    /// Slot for `task_id`, created under the map lock if absent.
    ///
    /// Safe for concurrent calls with distinct or identical identifiers;
    /// identical identifiers observe the same slot.
    pub fn get_or_create(&self, task_id: &TaskId) -> Arc<TaskSlot> {
        let mut slots = self.slots.lock();
        if let Some(slot) = slots.get(task_id) {
            return Arc::clone(slot);
        }
        tracing::debug!(task = %task_id, "creating task slot");
        let slot = Arc::new(TaskSlot::new());
        slots.insert(task_id.clone(), Arc::clone(&slot));
        slot
    }

    /// Lookup without creation, for the side that must not accidentally
    /// start a round trip nobody initialized.
    #[must_use]
    pub fn get(&self, task_id: &TaskId) -> Option<Arc<TaskSlot>> {
        self.slots.lock().get(task_id).map(Arc::clone)
    }

    /// Delete the slot for `task_id` once its round trip is fully drained.
    ///
    /// Removing an id that has no slot is a no-op (teardown may race with
    /// completion). Removing a slot that still holds unconsumed data or has
    /// a round trip in flight is a caller error, surfaced as
    /// [`RegistryError::SlotBusy`] and leaving the slot in place.
    pub fn remove(&self, task_id: &TaskId) -> Result<(), RegistryError> {
        let mut slots = self.slots.lock();
        match slots.get(task_id) {
            None => Ok(()),
            Some(slot) if slot.is_drained() => {
                slots.remove(task_id);
                tracing::debug!(task = %task_id, "task slot removed");
                Ok(())
            }
            Some(_) => Err(RegistryError::SlotBusy {
                task_id: task_id.clone(),
            }),
        }
    }

    /// Teardown: drop all slots unconditionally.
    ///
    /// Callers must have finished or terminated every round trip first; a
    /// thread still blocked inside a removed slot stays blocked, since the
    /// primitive has no cancellation channel of its own.
    pub fn drain(&self) {
        let mut slots = self.slots.lock();
        let count = slots.len();
        slots.clear();
        if count > 0 {
            tracing::debug!(count, "registry drained");
        }
    }

    /// Number of live slots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.lock().is_empty()
    }
}
