//! Lanes: the execution side of a queue.
//!
//! Design:
//! - A user queue gets an async lane that drains it strictly one job at a
//!   time, parking bodies on the blocking pool.
//! - The main queue has no lane of its own: each ready job becomes one unit
//!   of work posted to the host main loop, and the unit re-posts while jobs
//!   are still pending. The loop stays responsive between jobs.
//! - A body that returns an error or panics settles its own job and nothing
//!   else; the lane keeps draining.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tokio::sync::watch;

use super::callbacks::Signals;
use super::record::JobCell;
use super::{JobBody, QueueCore, StartedJob};
use crate::boundary::Payload;
use crate::context::ExecutionContext;
use crate::domain::JobState;
use crate::error::JobError;
use crate::main_loop::UnitOfWork;

/// Drain loop of one user queue. Runs until the queue is destroyed.
pub(crate) async fn user_lane(core: Arc<QueueCore>, mut shutdown_rx: watch::Receiver<bool>) {
    tracing::debug!(queue = %core.id(), "lane started");
    loop {
        if *shutdown_rx.borrow() {
            break;
        }
        let Some(started) = core.take_next() else {
            tokio::select! {
                _ = shutdown_rx.changed() => {}
                _ = core.notified() => {}
            }
            continue;
        };
        run_started(&core, started).await;
    }
    tracing::debug!(queue = %core.id(), "lane stopped");
}

/// Run one picked job to its terminal state.
async fn run_started(core: &Arc<QueueCore>, started: StartedJob) {
    let StartedJob {
        cell,
        body,
        input,
        signals,
    } = started;
    signals.fire();

    let result = match tokio::task::spawn_blocking(move || execute_body(body, input)).await {
        Ok(result) => result,
        Err(join) if join.is_panic() => {
            Err(JobError::Panicked(panic_message(join.into_panic().as_ref())))
        }
        Err(_) => Err(JobError::failed("execution task aborted")),
    };

    let (signals, terminal) = settle(&cell, result);
    core.job_finished(terminal);
    signals.fire();
}

/// One unit of main-loop work: run at most one job, then hand the loop back.
pub(crate) fn pump_unit(core: Arc<QueueCore>) -> UnitOfWork {
    Box::new(move || pump_once(core))
}

fn pump_once(core: Arc<QueueCore>) {
    core.pump_arrived();
    let Some(started) = core.take_next() else {
        return;
    };
    let StartedJob {
        cell,
        body,
        input,
        signals,
    } = started;
    signals.fire();

    let result = execute_body(body, input);
    let (signals, terminal) = settle(&cell, result);
    let repost = core.job_finished(terminal);
    signals.fire();
    if repost {
        core.post_pump();
    }
}

/// Run a body inside a fresh context. Panics are contained here so they
/// settle the job instead of unwinding into the lane.
fn execute_body(body: JobBody, input: Payload) -> Result<Payload, JobError> {
    let mut ctx = ExecutionContext::new(&input);
    match panic::catch_unwind(AssertUnwindSafe(|| body(&mut ctx))) {
        Ok(Ok(())) => Ok(ctx.into_exports()),
        Ok(Err(err)) => Err(err),
        Err(payload) => Err(JobError::Panicked(panic_message(payload.as_ref()))),
    }
}

fn settle(cell: &JobCell, result: Result<Payload, JobError>) -> (Signals, JobState) {
    match result {
        Ok(exports) => (cell.complete(exports), JobState::Completed),
        Err(err) => {
            tracing::warn!(job = %cell.id(), error = %err, "job failed");
            (cell.fail(err), JobState::Errored)
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
