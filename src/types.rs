//! Core identifier types for the gradrelay rendezvous.
//!
//! A [`TaskId`] scopes one independent forward/backward lane. In practice it
//! names a training micro-step or the executor thread driving it; the relay
//! never generates identifiers itself, it only keys its per-task state by
//! them. Uniqueness is the caller's responsibility.
//!
//! # Examples
//!
//! ```rust
//! use gradrelay::types::TaskId;
//!
//! let by_name = TaskId::from("step-17");
//! let by_thread = TaskId::from(17u64);
//!
//! assert_eq!(by_name.as_str(), "step-17");
//! assert_eq!(by_thread.as_str(), "17");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque, hashable key identifying one forward/backward round trip lane.
///
/// Round trips on the same `TaskId` are strictly sequential; distinct ids
/// may run concurrently without contending beyond the registry's short map
/// lock.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskId(String);

impl TaskId {
    /// Create a task id from anything string-like.
    pub fn new<S: Into<String>>(id: S) -> Self {
        TaskId(id.into())
    }

    /// The identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for TaskId {
    fn from(s: &str) -> Self {
        TaskId(s.to_string())
    }
}

impl From<String> for TaskId {
    fn from(s: String) -> Self {
        TaskId(s)
    }
}

// Thread-scoped callers commonly key round trips by a numeric thread or
// micro-step counter.
impl From<u64> for TaskId {
    fn from(n: u64) -> Self {
        TaskId(n.to_string())
    }
}
