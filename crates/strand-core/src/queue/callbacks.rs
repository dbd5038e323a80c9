//! Callback storage and deferred invocation.
//!
//! Design:
//! - Registration slots live inside the job record, guarded by its lock.
//! - Invocation never happens under a lock. State transitions collect the
//!   callbacks they owe into a [`Signals`] batch, and the caller fires the
//!   batch after every lock is released.
//! - `then` and `error` are one-shot and consumed on the transition that
//!   owes them; `status` survives across transitions and is shared.

use std::sync::{Arc, Mutex};

use crate::boundary::Payload;
use crate::domain::JobState;
use crate::error::JobError;

/// Success continuation, consumed with the outcome payload.
pub(crate) type ThenFn = Box<dyn FnOnce(Payload) + Send + 'static>;

/// Failure continuation, consumed with the job error.
pub(crate) type ErrorFn = Box<dyn FnOnce(JobError) + Send + 'static>;

/// Observer invoked on every state change. Shared so the slot can keep it
/// while a batch borrows it for one invocation.
pub(crate) type StatusFn = Arc<Mutex<dyn FnMut(JobState) + Send + 'static>>;

/// Registration slots for one job. Re-registering a slot replaces it.
#[derive(Default)]
pub(crate) struct CallbackSet {
    pub(crate) then: Option<ThenFn>,
    pub(crate) status: Option<StatusFn>,
    pub(crate) error: Option<ErrorFn>,
}

/// Callbacks owed by a state transition, captured under the record lock and
/// fired after it is released.
#[derive(Default)]
pub(crate) struct Signals {
    pub(crate) then: Option<(ThenFn, Payload)>,
    pub(crate) error: Option<(ErrorFn, JobError)>,
    pub(crate) status: Option<(StatusFn, JobState)>,
}

impl Signals {
    /// Invoke the collected callbacks. Outcome callbacks run before the
    /// status observer for the same transition.
    pub(crate) fn fire(self) {
        if let Some((then, payload)) = self.then {
            then(payload);
        }
        if let Some((error, err)) = self.error {
            error(err);
        }
        if let Some((status, state)) = self.status {
            let mut observer = status.lock().expect("status callback lock poisoned");
            (*observer)(state);
        }
    }
}
