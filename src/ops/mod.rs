//! Graph-executor-facing operator layer.
//!
//! The relay itself is executor-agnostic; this module supplies the thin
//! convention a graph executor invokes it through. An [`Operator`] is one
//! node of a compiled graph: ordered input values in, ordered output values
//! out, synchronously on the executor thread. The yield node
//! ([`yield_op::YieldOp`]) is one operator among many — the only one that
//! blocks.
//!
//! [`config`] holds the static lookup table describing how external
//! autograd-style operators map their arguments across the forward/backward
//! boundary.

pub mod config;
pub mod yield_op;

use miette::Diagnostic;
use std::sync::Arc;
use thiserror::Error;

use crate::bundle::ValueBundle;
use crate::relay::RelayError;
use crate::rendezvous::ProtocolError;
use crate::types::TaskId;

/// Errors raised by operator execution.
#[derive(Debug, Error, Diagnostic)]
pub enum OpError {
    /// The driver answered with fewer or more values than the yield node's
    /// declared outputs.
    #[error("yield node expects {expected} outputs, driver supplied {actual}")]
    #[diagnostic(
        code(gradrelay::ops::output_arity),
        help("Backward inputs bind positionally; the driver must supply exactly one value per declared output.")
    )]
    OutputArity { expected: usize, actual: usize },

    /// The driver requested termination; the in-flight run must abort with
    /// this controlled failure rather than bind outputs.
    #[error("run aborted for task `{task_id}`: driver requested termination")]
    #[diagnostic(
        code(gradrelay::ops::aborted),
        help("Termination is cooperative cancellation, not a protocol error; stop the graph run cleanly.")
    )]
    Aborted { task_id: TaskId },

    /// An operator was invoked without a required input.
    #[error("missing expected input: {what}")]
    #[diagnostic(code(gradrelay::ops::missing_input))]
    MissingInput { what: &'static str },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Relay(#[from] RelayError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Protocol(#[from] ProtocolError),
}

/// Execution context handed to an operator by the graph executor.
///
/// Carries the node's name and the device fence the executor uses to
/// guarantee that device-side computation feeding the inputs has fully
/// completed before values cross a thread boundary. Host-only executors
/// leave the fence unset.
#[derive(Clone)]
pub struct OpContext {
    /// Name of the graph node being executed.
    pub op_name: String,
    fence: Option<Arc<dyn Fn() + Send + Sync>>,
}

impl std::fmt::Debug for OpContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpContext")
            .field("op_name", &self.op_name)
            .field("fence", &self.fence.is_some())
            .finish()
    }
}

impl OpContext {
    pub fn new<S: Into<String>>(op_name: S) -> Self {
        OpContext {
            op_name: op_name.into(),
            fence: None,
        }
    }

    /// Install a device fence to run before any hand-off of input values.
    #[must_use]
    pub fn with_fence(mut self, fence: Arc<dyn Fn() + Send + Sync>) -> Self {
        self.fence = Some(fence);
        self
    }

    /// Wait for outstanding device work, if a fence is installed.
    pub fn synchronize(&self) {
        if let Some(fence) = &self.fence {
            fence();
        }
    }
}

/// One executable node of a compiled graph.
///
/// Operators run synchronously on the executor thread and communicate only
/// through their value bundles; any cross-thread behavior (such as the
/// yield node's suspension) is internal to the operator.
pub trait Operator: Send + Sync {
    fn run(&self, inputs: ValueBundle, ctx: &OpContext) -> Result<ValueBundle, OpError>;
}
