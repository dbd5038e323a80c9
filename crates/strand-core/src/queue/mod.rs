//! Queue module: dispatch surface, per-queue bookkeeping, and lane bindings.
//!
//! Design:
//! - [`QueueCore`] is the shared state behind both the public [`Queue`]
//!   surface and the lane draining it.
//! - Lock order is queue state before job record, never the reverse.
//! - Callbacks always fire with no lock held; transitions collect them into
//!   `Signals` batches and the caller fires the batch after unlocking.

pub(crate) mod callbacks;
mod handle;
mod record;
pub(crate) mod worker;

pub use handle::JobHandle;

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};

use tokio::sync::{Notify, watch};

use crate::boundary::Payload;
use crate::context::ExecutionContext;
use crate::domain::{JobId, JobState, QueueId, QueueLifecycle};
use crate::error::{JobError, StrandError};
use crate::main_loop::MainLoopExecutor;
use crate::observability::QueueCounts;
use callbacks::Signals;
use record::JobCell;

/// Work a job performs inside its isolated execution context.
pub type JobBody =
    Box<dyn FnOnce(&mut ExecutionContext) -> Result<(), JobError> + Send + 'static>;

/// Which lane drains a queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueKind {
    /// The singleton queue whose jobs run on the host main loop.
    Main,
    /// A caller-created queue drained by a lane of its own.
    User,
}

/// How jobs of a queue reach a thread of execution.
enum LaneBinding {
    /// Units of work posted to the host main loop, one job per unit.
    MainLoop(Arc<dyn MainLoopExecutor>),
    /// Dedicated async lane, told to stop through this channel on destroy.
    Worker { shutdown: watch::Sender<bool> },
}

/// Shared state of one queue.
pub(crate) struct QueueCore {
    id: QueueId,
    lane: LaneBinding,
    state: Mutex<QueueState>,
    notify: Notify,
    unregister: OnceLock<Box<dyn Fn(QueueId) + Send + Sync>>,
}

/// Bookkeeping guarded by the queue lock.
struct QueueState {
    lifecycle: QueueLifecycle,
    pending: VecDeque<Arc<JobCell>>,
    running: Option<JobId>,
    /// Main lane only: a pump unit is posted but has not arrived yet.
    pump_scheduled: bool,
    completed: usize,
    errored: usize,
    cancelled: usize,
}

/// A job picked off the queue together with everything its run needs.
pub(crate) struct StartedJob {
    pub(crate) cell: Arc<JobCell>,
    pub(crate) body: JobBody,
    pub(crate) input: Payload,
    pub(crate) signals: Signals,
}

impl QueueCore {
    pub(crate) fn new_main(executor: Arc<dyn MainLoopExecutor>) -> Arc<Self> {
        Self::new(LaneBinding::MainLoop(executor))
    }

    pub(crate) fn new_user(shutdown: watch::Sender<bool>) -> Arc<Self> {
        Self::new(LaneBinding::Worker { shutdown })
    }

    fn new(lane: LaneBinding) -> Arc<Self> {
        Arc::new(Self {
            id: QueueId::generate(),
            lane,
            state: Mutex::new(QueueState {
                lifecycle: QueueLifecycle::Active,
                pending: VecDeque::new(),
                running: None,
                pump_scheduled: false,
                completed: 0,
                errored: 0,
                cancelled: 0,
            }),
            notify: Notify::new(),
            unregister: OnceLock::new(),
        })
    }

    pub(crate) fn id(&self) -> QueueId {
        self.id
    }

    pub(crate) fn kind(&self) -> QueueKind {
        match self.lane {
            LaneBinding::MainLoop(_) => QueueKind::Main,
            LaneBinding::Worker { .. } => QueueKind::User,
        }
    }

    pub(crate) fn is_active(&self) -> bool {
        self.lock().lifecycle.is_active()
    }

    /// Hook called once when the queue is destroyed, so the registry can
    /// drop its entry.
    pub(crate) fn set_unregister(&self, hook: Box<dyn Fn(QueueId) + Send + Sync>) {
        let _ = self.unregister.set(hook);
    }

    /// Append a job and wake the lane.
    pub(crate) fn dispatch(self: &Arc<Self>, body: JobBody) -> Result<JobHandle, StrandError> {
        let cell = JobCell::new(JobId::generate(), Arc::downgrade(self), body);

        let should_pump = {
            let mut state = self.lock();
            if !state.lifecycle.is_active() {
                return Err(StrandError::QueueDestroyed(self.id));
            }
            state.pending.push_back(Arc::clone(&cell));
            let pump = matches!(self.lane, LaneBinding::MainLoop(_))
                && state.running.is_none()
                && !state.pump_scheduled;
            if pump {
                state.pump_scheduled = true;
            }
            pump
        };

        match &self.lane {
            LaneBinding::Worker { .. } => self.notify.notify_one(),
            LaneBinding::MainLoop(_) => {
                if should_pump {
                    self.post_pump();
                }
            }
        }

        tracing::debug!(queue = %self.id, job = %cell.id(), "job dispatched");
        Ok(JobHandle::new(cell))
    }

    /// Drop one pending job. Running or already-settled jobs are left alone.
    pub(crate) fn cancel(&self, id: JobId) {
        let signals = {
            let mut state = self.lock();
            let Some(pos) = state.pending.iter().position(|cell| cell.id() == id) else {
                return;
            };
            let Some(cell) = state.pending.remove(pos) else {
                return;
            };
            let signals = cell.mark_cancelled();
            state.cancelled += 1;
            signals
        };

        tracing::debug!(queue = %self.id, job = %id, "pending job cancelled");
        signals.fire();
    }

    /// Retire the queue: every pending job is cancelled in dispatch order,
    /// the running one (if any) finishes naturally, and the lane stops.
    pub(crate) fn destroy(&self) -> Result<(), StrandError> {
        let LaneBinding::Worker { shutdown } = &self.lane else {
            return Err(StrandError::InvalidOperation(
                "the main queue cannot be destroyed".into(),
            ));
        };

        let drained: Vec<Signals> = {
            let mut state = self.lock();
            if !state.lifecycle.is_active() {
                return Ok(());
            }
            state.lifecycle = QueueLifecycle::Destroyed;
            let pending = std::mem::take(&mut state.pending);
            state.cancelled += pending.len();
            pending.iter().map(|cell| cell.mark_cancelled()).collect()
        };

        let cancelled = drained.len();
        for signals in drained {
            signals.fire();
        }

        // ignore send error: the lane may already be gone
        let _ = shutdown.send(true);

        if let Some(hook) = self.unregister.get() {
            hook(self.id);
        }

        tracing::info!(queue = %self.id, cancelled, "queue destroyed");
        Ok(())
    }

    pub(crate) fn counts(&self) -> QueueCounts {
        let state = self.lock();
        QueueCounts {
            pending: state.pending.len(),
            running: usize::from(state.running.is_some()),
            completed: state.completed,
            errored: state.errored,
            cancelled: state.cancelled,
        }
    }

    /// Pick the next startable job and mark it running.
    fn take_next(&self) -> Option<StartedJob> {
        let mut state = self.lock();
        while let Some(cell) = state.pending.pop_front() {
            if let Some((body, input, signals)) = cell.start() {
                state.running = Some(cell.id());
                return Some(StartedJob {
                    cell,
                    body,
                    input,
                    signals,
                });
            }
        }
        None
    }

    /// A posted pump unit has arrived on the main loop.
    fn pump_arrived(&self) {
        self.lock().pump_scheduled = false;
    }

    /// Record a finished run. Returns whether the main lane owes another
    /// pump unit for jobs still pending.
    fn job_finished(&self, terminal: JobState) -> bool {
        let mut state = self.lock();
        state.running = None;
        match terminal {
            JobState::Completed => state.completed += 1,
            JobState::Errored => state.errored += 1,
            JobState::Cancelled => state.cancelled += 1,
            JobState::Created | JobState::Running => {}
        }
        let repost = matches!(self.lane, LaneBinding::MainLoop(_))
            && !state.pending.is_empty()
            && !state.pump_scheduled;
        if repost {
            state.pump_scheduled = true;
        }
        repost
    }

    fn post_pump(self: &Arc<Self>) {
        if let LaneBinding::MainLoop(executor) = &self.lane {
            executor.post(worker::pump_unit(Arc::clone(self)));
        }
    }

    /// Wait until the lane is poked about new work.
    async fn notified(&self) {
        self.notify.notified().await;
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().expect("queue state lock poisoned")
    }
}

/// Public surface of one queue. Cheap to clone; all clones share state.
#[derive(Clone)]
pub struct Queue {
    core: Arc<QueueCore>,
}

impl Queue {
    pub(crate) fn new(core: Arc<QueueCore>) -> Self {
        Self { core }
    }

    pub fn id(&self) -> QueueId {
        self.core.id()
    }

    pub fn kind(&self) -> QueueKind {
        self.core.kind()
    }

    /// Whether the queue still accepts jobs.
    pub fn is_active(&self) -> bool {
        self.core.is_active()
    }

    /// Submit a job. Jobs of one queue run strictly one at a time, in
    /// dispatch order.
    pub fn dispatch<F>(&self, body: F) -> Result<JobHandle, StrandError>
    where
        F: FnOnce(&mut ExecutionContext) -> Result<(), JobError> + Send + 'static,
    {
        self.core.dispatch(Box::new(body))
    }

    /// Retire this queue. Idempotent; rejected for the main queue.
    pub fn destroy(&self) -> Result<(), StrandError> {
        self.core.destroy()
    }

    /// Point-in-time job counts, by state.
    pub fn counts(&self) -> QueueCounts {
        self.core.counts()
    }
}

impl std::fmt::Debug for Queue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Queue")
            .field("id", &self.core.id())
            .field("kind", &self.core.kind())
            .finish()
    }
}
