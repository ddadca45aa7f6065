//! Executor- and driver-facing handles over a shared task registry.
//!
//! A [`Relay`] owns the registry for one training runtime. It is built once
//! at start-up and split into two cloneable handles, one per party:
//!
//! - [`ExecutorHandle::suspend`] is the yield point: it posts the forward
//!   outputs, physically blocks the graph-executor thread, and returns the
//!   driver's answer as though the call had simply returned.
//! - [`DriverHandle`] exposes the two narrow driver entry points — take the
//!   next pending forward result, supply the backward result — plus slot
//!   cleanup once a round trip completes.
//!
//! Neither handle grants access to slot internals; the hand-off protocol is
//! enforced underneath by [`TaskSlot`](crate::slot::TaskSlot).
//!
//! # Examples
//!
//! ```rust
//! use gradrelay::bundle::{TensorValue, ValueBundle};
//! use gradrelay::handoff::{BackwardResult, ForwardResult};
//! use gradrelay::relay::{Relay, RelayConfig};
//! use gradrelay::types::TaskId;
//! use std::thread;
//!
//! let relay = Relay::new(RelayConfig::default());
//! let executor = relay.executor_handle();
//! let driver = relay.driver_handle();
//! let task = TaskId::from("step-0");
//!
//! let driver_thread = thread::spawn({
//!     let task = task.clone();
//!     move || {
//!         let forward = driver.take_forward(&task).unwrap();
//!         assert!(forward.is_completed());
//!         let grad = TensorValue::scalar_f32(0.5);
//!         driver
//!             .post_backward(&task, BackwardResult::Resume(ValueBundle::from(vec![grad])))
//!             .unwrap();
//!     }
//! });
//!
//! let outputs = ValueBundle::from(vec![TensorValue::scalar_f32(2.0)]);
//! let answer = executor
//!     .suspend(&task, ForwardResult::Completed(outputs))
//!     .unwrap();
//! assert!(!answer.is_terminate());
//! driver_thread.join().unwrap();
//! ```

use miette::Diagnostic;
use std::sync::Arc;
use thiserror::Error;
use tracing::instrument;

use crate::handoff::{BackwardResult, ForwardResult};
use crate::registry::{RegistryError, TaskRegistry};
use crate::rendezvous::ProtocolError;
use crate::types::TaskId;

/// Errors surfaced by the relay handles.
#[derive(Debug, Error, Diagnostic)]
pub enum RelayError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Registry(#[from] RegistryError),
}

/// Construction-time settings for a [`Relay`].
///
/// `expected_tasks` pre-sizes the registry map for the number of concurrent
/// task lanes the runtime expects (one per executor thread, typically). It
/// resolves from the `GRADRELAY_EXPECTED_TASKS` environment variable when
/// not supplied explicitly.
#[derive(Clone, Debug)]
pub struct RelayConfig {
    pub expected_tasks: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        RelayConfig {
            expected_tasks: Self::expected_tasks_from_env(),
        }
    }
}

impl RelayConfig {
    const DEFAULT_EXPECTED_TASKS: usize = 16;

    fn expected_tasks_from_env() -> usize {
        dotenvy::dotenv().ok();
        std::env::var("GRADRELAY_EXPECTED_TASKS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(Self::DEFAULT_EXPECTED_TASKS)
    }

    #[must_use]
    pub fn with_expected_tasks(mut self, expected_tasks: usize) -> Self {
        self.expected_tasks = expected_tasks;
        self
    }
}

/// Shared rendezvous state for one training runtime.
///
/// Construct once, hand an [`ExecutorHandle`] to the graph executor and a
/// [`DriverHandle`] to the driver, and call [`shutdown`](Self::shutdown) at
/// teardown.
#[derive(Debug)]
pub struct Relay {
    registry: Arc<TaskRegistry>,
}

impl Default for Relay {
    fn default() -> Self {
        Self::new(RelayConfig::default())
    }
}

impl Relay {
    #[must_use]
    pub fn new(config: RelayConfig) -> Self {
        Relay {
            registry: Arc::new(TaskRegistry::with_capacity(config.expected_tasks)),
        }
    }

    /// Handle for the graph-executor side.
    #[must_use]
    pub fn executor_handle(&self) -> ExecutorHandle {
        ExecutorHandle {
            registry: Arc::clone(&self.registry),
        }
    }

    /// Handle for the driver side.
    #[must_use]
    pub fn driver_handle(&self) -> DriverHandle {
        DriverHandle {
            registry: Arc::clone(&self.registry),
        }
    }

    /// The underlying registry, for lifecycle assertions.
    #[must_use]
    pub fn registry(&self) -> &Arc<TaskRegistry> {
        &self.registry
    }

    /// Teardown: drop all slots. Every round trip must already be complete
    /// or terminated.
    pub fn shutdown(&self) {
        self.registry.drain();
    }
}

/// Graph-executor-facing side of the relay.
#[derive(Clone, Debug)]
pub struct ExecutorHandle {
    registry: Arc<TaskRegistry>,
}

impl ExecutorHandle {
    /// The yield point: hand `forward` to the driver and block until it
    /// answers.
    ///
    /// Resolves `task_id` to its slot (creating it on first use), posts the
    /// forward leg, then blocks indefinitely on the backward leg. The
    /// returned [`BackwardResult`] must be interpreted by the caller:
    /// `Resume` values bind positionally to the outputs expected at the
    /// yield node, `Terminate` must abort the in-flight run (see
    /// [`YieldOp`](crate::ops::yield_op::YieldOp)).
    #[instrument(skip(self, forward), fields(task = %task_id), err)]
    pub fn suspend(
        &self,
        task_id: &TaskId,
        forward: ForwardResult,
    ) -> Result<BackwardResult, RelayError> {
        let slot = self.registry.get_or_create(task_id);
        slot.post_forward(forward)?;
        let backward = slot.take_backward()?;
        Ok(backward)
    }
}

/// Driver-facing side of the relay.
#[derive(Clone, Debug)]
pub struct DriverHandle {
    registry: Arc<TaskRegistry>,
}

impl DriverHandle {
    /// Block until the executor posts forward outputs for `task_id`, then
    /// consume them.
    ///
    /// The driver may poll ahead of the executor: the slot is created on
    /// first reference and this call blocks until the matching
    /// [`suspend`](ExecutorHandle::suspend).
    #[instrument(skip(self), fields(task = %task_id), err)]
    pub fn take_forward(&self, task_id: &TaskId) -> Result<ForwardResult, RelayError> {
        let slot = self.registry.get_or_create(task_id);
        let forward = slot.take_forward()?;
        Ok(forward)
    }

    /// Supply the backward result for `task_id`, waking the suspended
    /// executor.
    ///
    /// Unlike [`take_forward`](Self::take_forward), this never creates a
    /// slot: supplying gradients for a round trip nobody initialized is a
    /// caller error.
    #[instrument(skip(self, backward), fields(task = %task_id), err)]
    pub fn post_backward(
        &self,
        task_id: &TaskId,
        backward: BackwardResult,
    ) -> Result<(), RelayError> {
        let slot = self
            .registry
            .get(task_id)
            .ok_or_else(|| RegistryError::NotFound {
                task_id: task_id.clone(),
            })?;
        slot.post_backward(backward)?;
        Ok(())
    }

    /// Remove the slot for a completed round trip, bounding registry memory
    /// across long multi-task runs.
    #[instrument(skip(self), fields(task = %task_id), err)]
    pub fn finish(&self, task_id: &TaskId) -> Result<(), RelayError> {
        self.registry.remove(task_id)?;
        Ok(())
    }
}
