//! The yield node: the operator at which a graph run suspends.
//!
//! From the executor's point of view [`YieldOp`] is an ordinary node — it
//! takes the forward outputs accumulated so far and "returns" the backward
//! inputs. Internally it runs the device fence, posts its inputs on the
//! forward leg, blocks the executor thread, and binds whatever the driver
//! answers positionally to its declared outputs.

use crate::bundle::ValueBundle;
use crate::handoff::{BackwardResult, ForwardResult};
use crate::ops::{OpContext, OpError, Operator};
use crate::relay::ExecutorHandle;
use crate::types::TaskId;

/// Suspension point of a compiled training graph.
#[derive(Clone, Debug)]
pub struct YieldOp {
    task_id: TaskId,
    output_count: usize,
    executor: ExecutorHandle,
}

impl YieldOp {
    /// A yield node for `task_id` expecting `output_count` backward inputs.
    #[must_use]
    pub fn new(task_id: TaskId, output_count: usize, executor: ExecutorHandle) -> Self {
        YieldOp {
            task_id,
            output_count,
            executor,
        }
    }

    /// The task lane this node suspends on.
    #[must_use]
    pub fn task_id(&self) -> &TaskId {
        &self.task_id
    }
}

impl Operator for YieldOp {
    fn run(&self, inputs: ValueBundle, ctx: &OpContext) -> Result<ValueBundle, OpError> {
        // The driver may read these buffers the moment they are posted;
        // outstanding device writes must land first.
        ctx.synchronize();

        tracing::debug!(task = %self.task_id, inputs = inputs.len(), "suspending at yield node");
        let answer = self
            .executor
            .suspend(&self.task_id, ForwardResult::Completed(inputs))?;

        match answer {
            BackwardResult::Resume(values) => {
                if values.len() != self.output_count {
                    return Err(OpError::OutputArity {
                        expected: self.output_count,
                        actual: values.len(),
                    });
                }
                tracing::debug!(task = %self.task_id, outputs = values.len(), "resumed");
                Ok(values)
            }
            BackwardResult::Terminate => {
                tracing::warn!(task = %self.task_id, "driver requested termination");
                Err(OpError::Aborted {
                    task_id: self.task_id.clone(),
                })
            }
        }
    }
}
