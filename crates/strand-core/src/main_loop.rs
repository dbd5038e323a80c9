//! Main-loop port and the standalone fallback loop.
//!
//! Design:
//! - The engine never owns the host main loop; it only posts units of work
//!   to it through [`MainLoopExecutor`].
//! - Hosts with a real UI/event loop implement the trait over their native
//!   "run this on the main thread" primitive.
//! - Everyone else gets [`StandaloneMainLoop`], a dedicated thread draining
//!   a channel in post order.

use std::sync::Arc;
use std::sync::mpsc;
use std::thread;

/// A closure executed on the host main loop.
pub type UnitOfWork = Box<dyn FnOnce() + Send + 'static>;

/// Where main-queue jobs run.
///
/// Implementations must execute posted units one at a time, in post order,
/// on a single thread; the main queue relies on that for its serial
/// guarantee.
pub trait MainLoopExecutor: Send + Sync {
    /// Hand a unit to the loop. Must not block the caller.
    fn post(&self, unit: UnitOfWork);
}

/// Fallback loop for hosts without one: a named thread draining a channel
/// until every poster is gone.
pub struct StandaloneMainLoop {
    tx: mpsc::Sender<UnitOfWork>,
}

impl StandaloneMainLoop {
    /// Spawn the loop thread and return a poster for it. The thread exits
    /// on its own once all clones of the returned handle are dropped.
    pub fn spawn() -> Arc<Self> {
        let (tx, rx) = mpsc::channel::<UnitOfWork>();
        thread::Builder::new()
            .name("strand-main-loop".into())
            .spawn(move || {
                tracing::debug!("standalone main loop started");
                while let Ok(unit) = rx.recv() {
                    unit();
                }
                tracing::debug!("standalone main loop stopped");
            })
            .expect("failed to spawn main-loop thread");
        Arc::new(Self { tx })
    }
}

impl MainLoopExecutor for StandaloneMainLoop {
    fn post(&self, unit: UnitOfWork) {
        // ignore send error: a stopped loop just drops the unit
        let _ = self.tx.send(unit);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Mutex;
    use std::time::Duration;

    #[test]
    fn units_run_in_post_order_on_the_loop_thread() {
        let main = StandaloneMainLoop::spawn();
        let seen: Arc<Mutex<Vec<usize>>> = Arc::default();
        let threads: Arc<Mutex<HashSet<thread::ThreadId>>> = Arc::default();

        for i in 0..4 {
            let seen = Arc::clone(&seen);
            let threads = Arc::clone(&threads);
            main.post(Box::new(move || {
                seen.lock().unwrap().push(i);
                threads.lock().unwrap().insert(thread::current().id());
            }));
        }

        let (ack_tx, ack_rx) = mpsc::channel();
        main.post(Box::new(move || {
            let _ = ack_tx.send(thread::current().name().map(str::to_string));
        }));

        let name = ack_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(name.as_deref(), Some("strand-main-loop"));
        assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2, 3]);

        let threads = threads.lock().unwrap();
        assert_eq!(threads.len(), 1);
        assert!(!threads.contains(&thread::current().id()));
    }
}
