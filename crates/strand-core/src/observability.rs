use serde::{Deserialize, Serialize};

/// Point-in-time job counts for one queue, by state.
///
/// `pending` and `running` describe the present; the terminal counters only
/// ever grow over the queue's lifetime.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueCounts {
    pub pending: usize,
    pub running: usize,
    pub completed: usize,
    pub errored: usize,
    pub cancelled: usize,
}

impl QueueCounts {
    /// Jobs that have reached a terminal state.
    pub fn settled(&self) -> usize {
        self.completed + self.errored + self.cancelled
    }
}
