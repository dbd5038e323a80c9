//! strand-core
//!
//! A job dispatcher built around isolated execution contexts: callers
//! dispatch closures onto serial queues, feed them data through an explicit
//! JSON boundary, and observe them through handles and callbacks.
//!
//! # Module map
//! - **queue**: dispatch surface, per-queue bookkeeping, lanes, job handles
//! - **registry**: the main-queue singleton and the table of user queues
//! - **main_loop**: host main-loop port plus the standalone fallback loop
//! - **context**: the isolated environment a job body runs inside
//! - **boundary**: the serialize-or-reject payload boundary
//! - **domain**: ids, job states, outcomes
//! - **observability**: per-queue state counters

pub mod boundary;
pub mod context;
pub mod domain;
pub mod error;
pub mod main_loop;
pub mod observability;
pub mod queue;
pub mod registry;

pub use boundary::Payload;
pub use context::ExecutionContext;
pub use domain::{JobId, JobOutcome, JobState, QueueId, QueueLifecycle};
pub use error::{JobError, StrandError};
pub use main_loop::{MainLoopExecutor, StandaloneMainLoop, UnitOfWork};
pub use observability::QueueCounts;
pub use queue::{JobHandle, Queue, QueueKind};
pub use registry::QueueRegistry;
