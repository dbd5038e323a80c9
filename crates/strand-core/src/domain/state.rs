//! Job and queue state machines.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Job lifecycle state.
///
/// State transitions:
/// - Created -> Running -> Completed
/// - Created -> Running -> Errored
/// - Created -> Cancelled (explicit cancel, or queue destroy while pending)
///
/// No other transitions are legal. In particular a Running job cannot be
/// cancelled; it always reaches Completed or Errored on its own.
///
/// We intentionally serialize as SCREAMING_SNAKE_CASE to match the
/// host-facing status constants: CREATED / RUNNING / COMPLETED / ERRORED /
/// CANCELLED.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    /// Dispatched, waiting in its queue's pending list.
    Created,

    /// Currently executing on its queue's lane.
    Running,

    /// Body returned normally; the outcome holds the exports payload.
    Completed,

    /// Body failed or panicked; the outcome holds the captured error.
    Errored,

    /// Removed from the pending list before it ever ran.
    Cancelled,
}

impl JobState {
    /// Is this a terminal state (no further transitions)?
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobState::Completed | JobState::Errored | JobState::Cancelled
        )
    }

    /// Is `next` a legal direct successor of `self`?
    pub fn can_transition_to(self, next: JobState) -> bool {
        matches!(
            (self, next),
            (JobState::Created, JobState::Running)
                | (JobState::Created, JobState::Cancelled)
                | (JobState::Running, JobState::Completed)
                | (JobState::Running, JobState::Errored)
        )
    }

    /// The host-facing constant name for this state.
    pub fn as_str(self) -> &'static str {
        match self {
            JobState::Created => "CREATED",
            JobState::Running => "RUNNING",
            JobState::Completed => "COMPLETED",
            JobState::Errored => "ERRORED",
            JobState::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Queue lifecycle: a queue is Active until destroyed, then stays Destroyed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueLifecycle {
    Active,
    Destroyed,
}

impl QueueLifecycle {
    pub fn is_active(self) -> bool {
        matches!(self, QueueLifecycle::Active)
    }
}
