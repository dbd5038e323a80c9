//! Domain model (ids, state machines, outcomes).

pub mod ids;
pub mod outcome;
pub mod state;

pub use ids::{Id, IdMarker, JobId, QueueId};
pub use outcome::JobOutcome;
pub use state::{JobState, QueueLifecycle};
