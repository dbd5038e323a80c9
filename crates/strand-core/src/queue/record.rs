//! Job record: state, body, input, outcome, and callback slots.
//!
//! Design:
//! - This is the single source of truth for one job. Queue structures hold
//!   `Arc<JobCell>` and never duplicate job state.
//! - All state transitions happen here, under the record lock.
//! - Transition methods return the [`Signals`] they owe; the caller fires
//!   them after releasing every lock.

use std::mem;
use std::sync::{Arc, Mutex, Weak};

use super::callbacks::{CallbackSet, ErrorFn, Signals, StatusFn, ThenFn};
use super::{JobBody, QueueCore};
use crate::boundary::Payload;
use crate::domain::{JobId, JobOutcome, JobState};
use crate::error::{JobError, StrandError};

/// Shared cell for one dispatched job.
///
/// The queue keeps a clone while the job is pending or running; handles keep
/// clones for as long as the caller holds them.
pub(crate) struct JobCell {
    id: JobId,
    queue: Weak<QueueCore>,
    record: Mutex<JobRecord>,
}

/// Mutable portion of a job, guarded by the cell lock.
struct JobRecord {
    state: JobState,
    body: Option<JobBody>,
    input: Payload,
    outcome: Option<JobOutcome>,
    callbacks: CallbackSet,
}

impl JobCell {
    pub(crate) fn new(id: JobId, queue: Weak<QueueCore>, body: JobBody) -> Arc<Self> {
        Arc::new(Self {
            id,
            queue,
            record: Mutex::new(JobRecord {
                state: JobState::Created,
                body: Some(body),
                input: Payload::empty(),
                outcome: None,
                callbacks: CallbackSet::default(),
            }),
        })
    }

    pub(crate) fn id(&self) -> JobId {
        self.id
    }

    pub(crate) fn state(&self) -> JobState {
        self.lock().state
    }

    pub(crate) fn queue(&self) -> Option<Arc<QueueCore>> {
        self.queue.upgrade()
    }

    /// Attach the input payload. Only legal before the job starts; the copy
    /// handed to the body is taken at start and never re-read.
    pub(crate) fn set_input(&self, input: Payload) -> Result<(), StrandError> {
        let mut rec = self.lock();
        if rec.state != JobState::Created {
            return Err(StrandError::InvalidOperation(
                "input payload can only be set before the job starts".into(),
            ));
        }
        rec.input = input;
        Ok(())
    }

    /// Register (or replace) the success continuation.
    ///
    /// If the job already completed, the continuation is owed immediately;
    /// if it reached a different terminal state, it will never fire and is
    /// dropped here.
    pub(crate) fn register_then(&self, f: ThenFn) -> Signals {
        let mut rec = self.lock();
        match (&rec.state, &rec.outcome) {
            (JobState::Completed, Some(JobOutcome::Success(payload))) => Signals {
                then: Some((f, payload.clone())),
                ..Signals::default()
            },
            (state, _) if state.is_terminal() => Signals::default(),
            _ => {
                rec.callbacks.then = Some(f);
                Signals::default()
            }
        }
    }

    /// Register (or replace) the failure continuation. Same late-registration
    /// contract as [`JobCell::register_then`].
    pub(crate) fn register_error(&self, f: ErrorFn) -> Signals {
        let mut rec = self.lock();
        match (&rec.state, &rec.outcome) {
            (JobState::Errored, Some(JobOutcome::Failure(err))) => Signals {
                error: Some((f, err.clone())),
                ..Signals::default()
            },
            (state, _) if state.is_terminal() => Signals::default(),
            _ => {
                rec.callbacks.error = Some(f);
                Signals::default()
            }
        }
    }

    /// Register (or replace) the status observer. Transitions that already
    /// happened are not replayed.
    pub(crate) fn register_status(&self, f: StatusFn) {
        self.lock().callbacks.status = Some(f);
    }

    /// Move Created -> Running and hand out what the run needs.
    ///
    /// Returns `None` if the job is no longer startable (e.g. it was
    /// cancelled between being picked and being started).
    pub(crate) fn start(&self) -> Option<(JobBody, Payload, Signals)> {
        let mut rec = self.lock();
        if rec.state != JobState::Created {
            return None;
        }
        let body = rec.body.take()?;
        rec.state = JobState::Running;
        let input = mem::take(&mut rec.input);
        let signals = rec.status_signal(JobState::Running);
        Some((body, input, signals))
    }

    /// Move Running -> Completed with the exported payload.
    pub(crate) fn complete(&self, payload: Payload) -> Signals {
        let mut rec = self.lock();
        if rec.state != JobState::Running {
            return Signals::default();
        }
        rec.state = JobState::Completed;
        let then = rec.callbacks.then.take().map(|f| (f, payload.clone()));
        rec.callbacks.error = None;
        rec.outcome = Some(JobOutcome::Success(payload));
        Signals {
            then,
            ..rec.status_signal(JobState::Completed)
        }
    }

    /// Move Running -> Errored with the failure.
    pub(crate) fn fail(&self, err: JobError) -> Signals {
        let mut rec = self.lock();
        if rec.state != JobState::Running {
            return Signals::default();
        }
        rec.state = JobState::Errored;
        let error = rec.callbacks.error.take().map(|f| (f, err.clone()));
        rec.callbacks.then = None;
        rec.outcome = Some(JobOutcome::Failure(err));
        Signals {
            error,
            ..rec.status_signal(JobState::Errored)
        }
    }

    /// Move Created -> Cancelled. The body is dropped without running and
    /// the outcome continuations can never fire.
    pub(crate) fn mark_cancelled(&self) -> Signals {
        let mut rec = self.lock();
        if rec.state != JobState::Created {
            return Signals::default();
        }
        rec.state = JobState::Cancelled;
        rec.body = None;
        rec.callbacks.then = None;
        rec.callbacks.error = None;
        rec.outcome = Some(JobOutcome::Cancelled);
        rec.status_signal(JobState::Cancelled)
    }

    /// Output payload of a completed job, if any.
    pub(crate) fn output(&self) -> Option<Payload> {
        match &self.lock().outcome {
            Some(JobOutcome::Success(payload)) => Some(payload.clone()),
            _ => None,
        }
    }

    /// Failure of an errored job, if any.
    pub(crate) fn failure(&self) -> Option<JobError> {
        match &self.lock().outcome {
            Some(JobOutcome::Failure(err)) => Some(err.clone()),
            _ => None,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, JobRecord> {
        self.record.lock().expect("job record lock poisoned")
    }
}

impl JobRecord {
    /// Batch holding just the status observer for `state`, if one is set.
    fn status_signal(&self, state: JobState) -> Signals {
        Signals {
            status: self
                .callbacks
                .status
                .as_ref()
                .map(|f| (Arc::clone(f), state)),
            ..Signals::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cell() -> Arc<JobCell> {
        JobCell::new(JobId::generate(), Weak::new(), Box::new(|_| Ok(())))
    }

    #[test]
    fn full_success_lifecycle_collects_signals_in_order() {
        let cell = cell();
        let states: Arc<Mutex<Vec<JobState>>> = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&states);
        cell.register_status(Arc::new(Mutex::new(move |s| seen.lock().unwrap().push(s))));

        let outputs: Arc<Mutex<Vec<Payload>>> = Arc::new(Mutex::new(Vec::new()));
        let then_outputs = Arc::clone(&outputs);
        cell.register_then(Box::new(move |p| then_outputs.lock().unwrap().push(p)))
            .fire();

        let (body, input, signals) = cell.start().unwrap();
        assert!(input.is_empty());
        assert_eq!(cell.state(), JobState::Running);
        signals.fire();
        drop(body);

        let payload = Payload::from_value(serde_json::json!({"n": 1}));
        cell.complete(payload.clone()).fire();

        assert_eq!(cell.state(), JobState::Completed);
        assert_eq!(cell.output(), Some(payload.clone()));
        assert_eq!(
            *states.lock().unwrap(),
            vec![JobState::Running, JobState::Completed]
        );
        assert_eq!(*outputs.lock().unwrap(), vec![payload]);
    }

    #[test]
    fn input_is_frozen_once_started() {
        let cell = cell();
        cell.set_input(Payload::from_value(serde_json::json!({"a": 1})))
            .unwrap();
        let _ = cell.start().unwrap();

        let err = cell.set_input(Payload::empty()).unwrap_err();
        assert!(matches!(err, StrandError::InvalidOperation(_)));
    }

    #[test]
    fn then_after_completion_fires_immediately() {
        let cell = cell();
        let _ = cell.start().unwrap();
        cell.complete(Payload::from_value(serde_json::json!({"done": true})))
            .fire();

        let fired = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&fired);
        cell.register_then(Box::new(move |p| *sink.lock().unwrap() = Some(p)))
            .fire();

        assert_eq!(
            fired.lock().unwrap().as_ref().unwrap().as_value(),
            &serde_json::json!({"done": true})
        );
    }

    #[test]
    fn then_after_a_non_success_terminal_never_fires() {
        let cell = cell();
        let _ = cell.start().unwrap();
        cell.fail(JobError::failed("boom")).fire();

        cell.register_then(Box::new(|_| panic!("must not fire")))
            .fire();
        assert_eq!(cell.failure().unwrap().message(), "boom");
        assert_eq!(cell.output(), None);
    }

    #[test]
    fn re_registering_then_replaces_the_previous_one() {
        let cell = cell();
        let fired: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));

        let first = Arc::clone(&fired);
        cell.register_then(Box::new(move |_| first.lock().unwrap().push("first")))
            .fire();
        let second = Arc::clone(&fired);
        cell.register_then(Box::new(move |_| second.lock().unwrap().push("second")))
            .fire();

        let _ = cell.start().unwrap();
        cell.complete(Payload::empty()).fire();

        assert_eq!(*fired.lock().unwrap(), vec!["second"]);
    }

    #[test]
    fn cancellation_drops_the_body_and_continuations() {
        let cell = cell();
        cell.register_then(Box::new(|_| panic!("must not fire")))
            .fire();

        let states: Arc<Mutex<Vec<JobState>>> = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&states);
        cell.register_status(Arc::new(Mutex::new(move |s| seen.lock().unwrap().push(s))));

        cell.mark_cancelled().fire();

        assert_eq!(cell.state(), JobState::Cancelled);
        assert_eq!(cell.output(), None);
        assert_eq!(cell.failure(), None);
        assert_eq!(*states.lock().unwrap(), vec![JobState::Cancelled]);
        assert!(cell.start().is_none());
    }
}
