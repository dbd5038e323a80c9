//! Job handle: the submitter's view of one dispatched job.
//!
//! Handles are cheap clones over the shared job cell. They stay valid for
//! as long as the caller keeps one, including after the owning queue is
//! destroyed.

use std::sync::{Arc, Mutex};

use serde::Serialize;

use super::record::JobCell;
use crate::boundary::Payload;
use crate::domain::{JobId, JobState};
use crate::error::{JobError, StrandError};

#[derive(Clone)]
pub struct JobHandle {
    cell: Arc<JobCell>,
}

impl JobHandle {
    pub(crate) fn new(cell: Arc<JobCell>) -> Self {
        Self { cell }
    }

    pub fn id(&self) -> JobId {
        self.cell.id()
    }

    /// Current lifecycle state of the job.
    pub fn state(&self) -> JobState {
        self.cell.state()
    }

    /// Output payload, once the job completed.
    pub fn output(&self) -> Option<Payload> {
        self.cell.output()
    }

    /// Failure, once the job errored.
    pub fn failure(&self) -> Option<JobError> {
        self.cell.failure()
    }

    /// Attach the input payload the body will see as its imports.
    ///
    /// The value is encoded at the boundary right here; what the job reads
    /// later is a disconnected copy. Returns the same handle for chaining.
    /// Rejected once the job has started.
    pub fn with<T: Serialize + ?Sized>(&self, input: &T) -> Result<JobHandle, StrandError> {
        let payload = Payload::encode(input)?;
        self.cell.set_input(payload)?;
        Ok(self.clone())
    }

    /// Run `f` with the output when (or if) the job completes.
    ///
    /// Registering after completion fires immediately; after any other
    /// terminal state the callback is dropped. Re-registering replaces the
    /// previous callback.
    pub fn then<F>(&self, f: F)
    where
        F: FnOnce(Payload) + Send + 'static,
    {
        self.cell.register_then(Box::new(f)).fire();
    }

    /// Run `f` with the failure when (or if) the job errors. Same
    /// registration contract as [`JobHandle::then`].
    pub fn error<F>(&self, f: F)
    where
        F: FnOnce(JobError) + Send + 'static,
    {
        self.cell.register_error(Box::new(f)).fire();
    }

    /// Observe every state change from registration onwards. Earlier
    /// transitions are not replayed.
    pub fn status<F>(&self, f: F)
    where
        F: FnMut(JobState) + Send + 'static,
    {
        self.cell.register_status(Arc::new(Mutex::new(f)));
    }

    /// Cancel the job if it is still pending. Running or settled jobs are
    /// unaffected, as is a job whose queue is already gone.
    pub fn cancel(&self) {
        if let Some(queue) = self.cell.queue() {
            queue.cancel(self.cell.id());
        }
    }
}

impl std::fmt::Debug for JobHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobHandle")
            .field("id", &self.cell.id())
            .field("state", &self.cell.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::super::worker::user_lane;
    use super::super::{Queue, QueueCore};
    use super::*;
    use std::time::Duration;
    use tokio::sync::watch;
    use tokio::time::timeout;

    const WAIT: Duration = Duration::from_secs(5);

    fn lane_queue() -> Queue {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let core = QueueCore::new_user(shutdown_tx);
        tokio::spawn(user_lane(Arc::clone(&core), shutdown_rx));
        Queue::new(core)
    }

    /// Parks the queue on a gated job so later dispatches stay pending
    /// until the gate opens.
    fn block_queue(queue: &Queue) -> std::sync::mpsc::Sender<()> {
        let (gate_tx, gate_rx) = std::sync::mpsc::channel::<()>();
        queue
            .dispatch(move |_| {
                let _ = gate_rx.recv();
                Ok(())
            })
            .unwrap();
        gate_tx
    }

    #[derive(Serialize)]
    struct Params {
        n: i64,
    }

    #[tokio::test]
    async fn with_feeds_typed_imports_into_the_body() {
        let queue = lane_queue();
        let gate = block_queue(&queue);

        let handle = queue
            .dispatch(|ctx| {
                let n: i64 = ctx.import("n")?;
                ctx.export("n_plus_one", &(n + 1))?;
                Ok(())
            })
            .unwrap()
            .with(&Params { n: 41 })
            .unwrap();

        let (done_tx, done_rx) = tokio::sync::oneshot::channel();
        handle.then(move |p| {
            let _ = done_tx.send(p);
        });

        gate.send(()).unwrap();
        let output = timeout(WAIT, done_rx).await.unwrap().unwrap();
        assert_eq!(output.as_value(), &serde_json::json!({"n_plus_one": 42}));
    }

    #[tokio::test]
    async fn with_returns_the_same_job_for_chaining() {
        let queue = lane_queue();
        let gate = block_queue(&queue);

        let first = queue.dispatch(|_| Ok(())).unwrap();
        let second = first.with(&Params { n: 1 }).unwrap();
        assert_eq!(first.id(), second.id());

        gate.send(()).unwrap();
    }

    #[tokio::test]
    async fn with_is_rejected_once_the_job_started() {
        let queue = lane_queue();

        let (started_tx, started_rx) = tokio::sync::oneshot::channel();
        let (gate_tx, gate_rx) = std::sync::mpsc::channel::<()>();
        let handle = queue
            .dispatch(move |_| {
                let _ = started_tx.send(());
                let _ = gate_rx.recv();
                Ok(())
            })
            .unwrap();
        timeout(WAIT, started_rx).await.unwrap().unwrap();

        let err = handle.with(&Params { n: 1 }).unwrap_err();
        assert!(matches!(err, StrandError::InvalidOperation(_)));

        gate_tx.send(()).unwrap();
    }

    #[tokio::test]
    async fn with_rejects_unencodable_input() {
        let queue = lane_queue();
        let gate = block_queue(&queue);

        let handle = queue.dispatch(|_| Ok(())).unwrap();
        let mut bad = std::collections::BTreeMap::new();
        bad.insert((1u8, 2u8), "x");

        let err = handle.with(&bad).unwrap_err();
        assert!(matches!(err, StrandError::NotSerializable(_)));

        gate.send(()).unwrap();
    }

    #[tokio::test]
    async fn imports_mutated_inside_the_job_never_reach_the_submitter() {
        let queue = lane_queue();
        let gate = block_queue(&queue);

        let submitted = serde_json::json!({"foo": 1});
        let handle = queue
            .dispatch(|ctx| {
                ctx.imports_mut()["foo"] = serde_json::json!(999);
                let seen: i64 = ctx.import("foo")?;
                ctx.export("seen", &seen)?;
                Ok(())
            })
            .unwrap()
            .with(&submitted)
            .unwrap();

        let (done_tx, done_rx) = tokio::sync::oneshot::channel();
        handle.then(move |p| {
            let _ = done_tx.send(p);
        });

        gate.send(()).unwrap();
        let output = timeout(WAIT, done_rx).await.unwrap().unwrap();

        // The job saw its own mutation; the submitter's value is untouched.
        assert_eq!(output.as_value(), &serde_json::json!({"seen": 999}));
        assert_eq!(submitted, serde_json::json!({"foo": 1}));
    }

    #[tokio::test]
    async fn a_job_that_exports_nothing_completes_with_an_empty_object() {
        let queue = lane_queue();

        let (done_tx, done_rx) = tokio::sync::oneshot::channel();
        queue.dispatch(|_| Ok(())).unwrap().then(move |p| {
            let _ = done_tx.send(p);
        });

        let output = timeout(WAIT, done_rx).await.unwrap().unwrap();
        assert!(output.is_empty());
        assert_eq!(output.as_value(), &serde_json::json!({}));
    }

    #[tokio::test]
    async fn status_observes_every_transition_in_order() {
        let queue = lane_queue();
        let gate = block_queue(&queue);

        let handle = queue.dispatch(|_| Ok(())).unwrap();
        let (state_tx, mut state_rx) = tokio::sync::mpsc::unbounded_channel();
        handle.status(move |state| {
            let _ = state_tx.send(state);
        });

        gate.send(()).unwrap();

        let first = timeout(WAIT, state_rx.recv()).await.unwrap().unwrap();
        let second = timeout(WAIT, state_rx.recv()).await.unwrap().unwrap();
        assert_eq!(first, JobState::Running);
        assert_eq!(second, JobState::Completed);
    }

    #[tokio::test]
    async fn then_after_completion_fires_with_the_retained_output() {
        let queue = lane_queue();

        let (done_tx, done_rx) = tokio::sync::oneshot::channel();
        let handle = queue
            .dispatch(|ctx| {
                ctx.export("k", "v")?;
                Ok(())
            })
            .unwrap();
        let mut done_tx = Some(done_tx);
        handle.status(move |state| {
            if state.is_terminal() {
                if let Some(tx) = done_tx.take() {
                    let _ = tx.send(());
                }
            }
        });
        timeout(WAIT, done_rx).await.unwrap().unwrap();

        // Late registration: the job is already done.
        let (late_tx, late_rx) = tokio::sync::oneshot::channel();
        handle.then(move |p| {
            let _ = late_tx.send(p);
        });
        let output = timeout(WAIT, late_rx).await.unwrap().unwrap();
        assert_eq!(output.as_value(), &serde_json::json!({"k": "v"}));
        assert_eq!(handle.output(), Some(output));
        assert_eq!(handle.failure(), None);
    }

    #[tokio::test]
    async fn cancel_of_a_running_job_is_a_no_op() {
        let queue = lane_queue();

        let (started_tx, started_rx) = tokio::sync::oneshot::channel();
        let (gate_tx, gate_rx) = std::sync::mpsc::channel::<()>();
        let handle = queue
            .dispatch(move |_| {
                let _ = started_tx.send(());
                let _ = gate_rx.recv();
                Ok(())
            })
            .unwrap();
        timeout(WAIT, started_rx).await.unwrap().unwrap();

        handle.cancel();
        assert_eq!(handle.state(), JobState::Running);

        gate_tx.send(()).unwrap();
        let (done_tx, done_rx) = tokio::sync::oneshot::channel();
        handle.then(move |_| {
            let _ = done_tx.send(());
        });
        timeout(WAIT, done_rx).await.unwrap().unwrap();

        assert_eq!(handle.state(), JobState::Completed);
        let counts = queue.counts();
        assert_eq!(counts.completed, 1);
        assert_eq!(counts.cancelled, 0);
    }

    #[tokio::test]
    async fn clones_share_the_underlying_job() {
        let queue = lane_queue();

        let (done_tx, done_rx) = tokio::sync::oneshot::channel();
        let handle = queue
            .dispatch(|ctx| {
                ctx.export("ok", &true)?;
                Ok(())
            })
            .unwrap();
        let clone = handle.clone();
        clone.then(move |_| {
            let _ = done_tx.send(());
        });
        timeout(WAIT, done_rx).await.unwrap().unwrap();

        assert_eq!(handle.state(), JobState::Completed);
        assert_eq!(handle.output(), clone.output());
        assert_eq!(handle.id(), clone.id());
    }
}
