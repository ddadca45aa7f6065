//! Results exchanged between the executor and driver threads.
//!
//! Both directions of the rendezvous carry tagged variants rather than
//! status sentinels, so callers are forced to handle every arm explicitly:
//!
//! - [`ForwardResult`]: what the executor hands over at the yield point —
//!   either the forward outputs or a report that the forward pass failed
//!   before reaching the yield node.
//! - [`BackwardResult`]: what the driver hands back — either the backward
//!   inputs to resume with, or a request to terminate the round trip.
//!
//! All failure information crosses the thread boundary as data. The relay
//! has no mechanism to unwind a call stack living on a different thread, so
//! nothing here ever panics across the hand-off.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::bundle::ValueBundle;

/// Structured description of an upstream forward-pass failure.
///
/// Carried inside [`ForwardResult::Failed`] so the driver can inspect what
/// went wrong without the executor throwing across the thread boundary. The
/// optional `cause` chain and free-form `details` mirror how rich error
/// context is usually attached at the point of failure.
///
/// # Examples
///
/// ```rust
/// use gradrelay::handoff::FailureReport;
/// use serde_json::json;
///
/// let report = FailureReport::msg("matmul kernel returned NaN")
///     .with_details(json!({"node": "MatMul_7"}))
///     .with_cause(FailureReport::msg("device out of memory"));
///
/// assert_eq!(report.message, "matmul kernel returned NaN");
/// assert!(report.cause.is_some());
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FailureReport {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cause: Option<Box<FailureReport>>,
    #[serde(default)]
    pub details: serde_json::Value,
}

impl FailureReport {
    /// Create a report with just a message.
    pub fn msg<M: Into<String>>(message: M) -> Self {
        FailureReport {
            message: message.into(),
            cause: None,
            details: serde_json::Value::Null,
        }
    }

    /// Attach free-form JSON details.
    #[must_use]
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }

    /// Chain an underlying cause.
    #[must_use]
    pub fn with_cause(mut self, cause: FailureReport) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }
}

impl fmt::Display for FailureReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for FailureReport {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause.as_ref().map(|c| c as &dyn std::error::Error)
    }
}

/// Forward-leg payload, produced exactly once per round trip by the
/// executor side.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ForwardResult {
    /// The forward graph reached the yield node; here are its outputs.
    Completed(ValueBundle),
    /// The forward pass failed before the yield node. The driver must not
    /// expect any outputs and should short-circuit to posting
    /// [`BackwardResult::Terminate`].
    Failed(FailureReport),
}

impl ForwardResult {
    /// Returns `true` for the [`Completed`](Self::Completed) arm.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        matches!(self, ForwardResult::Completed(_))
    }

    /// Borrow the forward outputs, if the forward pass completed.
    #[must_use]
    pub fn values(&self) -> Option<&ValueBundle> {
        match self {
            ForwardResult::Completed(values) => Some(values),
            ForwardResult::Failed(_) => None,
        }
    }
}

/// Backward-leg payload, produced exactly once per round trip by the
/// driver side.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum BackwardResult {
    /// Resume the suspended graph run, binding these values positionally to
    /// the outputs expected at the yield node.
    Resume(ValueBundle),
    /// Abandon the round trip. The executor must abort the in-flight run
    /// with a controlled failure; there are no values to bind.
    Terminate,
}

impl BackwardResult {
    /// Returns `true` for the [`Terminate`](Self::Terminate) arm.
    #[must_use]
    pub fn is_terminate(&self) -> bool {
        matches!(self, BackwardResult::Terminate)
    }
}
