//! # gradrelay: Cross-thread Forward/Backward Rendezvous
//!
//! gradrelay turns a single-threaded tensor-graph executor into a two-party
//! coroutine. One thread runs the forward portion of a compiled graph up to
//! a designated yield node, hands its intermediate outputs to a second
//! thread, physically blocks, and later resumes with values supplied by
//! that second thread — as though the call had simply returned.
//!
//! ## Core Concepts
//!
//! - **Round trip**: one post-forward → take-forward → post-backward →
//!   take-backward cycle for a given task identifier
//! - **Yield point**: the graph operation at which execution suspends to
//!   hand control to the driver
//! - **Driver**: the external party that consumes forward outputs and
//!   supplies backward inputs (e.g. an external gradient computation)
//! - **Task identifier**: opaque key scoping one independent round-trip
//!   lane; distinct identifiers interleave freely
//!
//! Both parties are real, independently scheduled threads. There is no
//! async emulation, no stack switching, and no timeout: a stuck driver
//! stalls the executor indefinitely by design, mirroring the semantics of a
//! synchronous external call. Cancellation is cooperative, via
//! [`BackwardResult::Terminate`](handoff::BackwardResult::Terminate).
//!
//! ## Quick Start
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
//! let task = TaskId::from("micro-step-0");
//!
//! // Driver thread: take forward outputs, compute gradients, answer.
//! let driver_thread = thread::spawn({
//!     let driver = driver.clone();
//!     let task = task.clone();
//!     move || {
//!         let forward = driver.take_forward(&task).unwrap();
//!         let outputs = forward.values().expect("forward pass completed");
//!         let grads: ValueBundle = outputs
//!             .iter()
//!             .map(|v| TensorValue::scalar_f32(v.len() as f32))
//!             .collect();
//!         driver.post_backward(&task, BackwardResult::Resume(grads)).unwrap();
//!     }
//! });
//!
//! // Executor thread: suspend at the yield point, resume with gradients.
//! let forward_outputs = ValueBundle::from(vec![
//!     TensorValue::f32(vec![2], vec![0.5, -0.5]).unwrap(),
//! ]);
//! match executor.suspend(&task, ForwardResult::Completed(forward_outputs)) {
//!     Ok(BackwardResult::Resume(values)) => assert_eq!(values.len(), 1),
//!     Ok(BackwardResult::Terminate) => panic!("driver terminated the run"),
//!     Err(err) => panic!("protocol violation: {err}"),
//! }
//! driver_thread.join().unwrap();
//!
//! // Both legs are drained; release the slot.
//! driver.finish(&task).unwrap();
//! ```
//!
//! ## Error Handling
//!
//! Failure information always crosses the thread boundary as data, never as
//! an unwinding fault: upstream forward failures travel as
//! [`ForwardResult::Failed`](handoff::ForwardResult::Failed), driver-side
//! cancellation as `Terminate`. Misuse of the protocol itself — double
//! posts, hand-offs on terminated tasks — is a programming-contract error
//! ([`ProtocolError`](rendezvous::ProtocolError)) surfaced immediately to
//! the offending call.
//!
//! ## Module Guide
//!
//! - [`types`] - Task identifiers
//! - [`bundle`] - Value transport across the boundary
//! - [`handoff`] - Forward/backward result variants
//! - [`rendezvous`] - The single-slot blocking hand-off cell
//! - [`slot`] - Per-task round-trip state machine
//! - [`registry`] - Task-id → slot map with lifecycle management
//! - [`relay`] - Executor- and driver-facing handles
//! - [`ops`] - Graph-executor-facing operator layer and the external-op
//!   configuration table
//! - [`kernels`] - Reference driver-side gradient kernels
//! - [`telemetry`] - Tracing subscriber setup

pub mod bundle;
pub mod handoff;
pub mod kernels;
pub mod ops;
pub mod registry;
pub mod relay;
pub mod rendezvous;
pub mod slot;
pub mod telemetry;
pub mod types;
