//! Queue registry: owns the main queue and tracks live user queues.
//!
//! Design:
//! - One registry per engine instance. The main queue is created with the
//!   registry and lives as long as it does.
//! - User-queue lanes are spawned onto the runtime the registry was created
//!   in; destroying a queue unhooks it from the table through a callback so
//!   lookups only ever see live queues.
//! - A process-wide registry is available through [`global`] for hosts that
//!   want exactly one engine without threading it around.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};

use tokio::runtime::Handle;
use tokio::sync::watch;

use crate::domain::QueueId;
use crate::error::StrandError;
use crate::main_loop::{MainLoopExecutor, StandaloneMainLoop};
use crate::queue::{Queue, QueueCore, worker};

/// Handle to one engine instance. Cheap to clone; all clones share state.
#[derive(Clone)]
pub struct QueueRegistry {
    inner: Arc<RegistryInner>,
}

struct RegistryInner {
    runtime: Handle,
    main: Queue,
    user_queues: Mutex<HashMap<QueueId, Queue>>,
}

impl QueueRegistry {
    /// Build a registry whose main queue posts onto `executor`.
    ///
    /// Must be called within a Tokio runtime: user-queue lanes spawn onto
    /// the runtime that is current here.
    pub fn new(executor: Arc<dyn MainLoopExecutor>) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                runtime: Handle::current(),
                main: Queue::new(QueueCore::new_main(executor)),
                user_queues: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Registry for hosts without a main loop of their own: main-queue jobs
    /// run on a [`StandaloneMainLoop`] thread.
    pub fn standalone() -> Self {
        Self::new(StandaloneMainLoop::spawn())
    }

    /// Create a user queue and start its lane.
    pub fn create_queue(&self) -> Queue {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let core = QueueCore::new_user(shutdown_tx);

        let registry = Arc::downgrade(&self.inner);
        core.set_unregister(Box::new(move |id| {
            if let Some(inner) = registry.upgrade() {
                inner.lock_table().remove(&id);
            }
        }));

        self.inner
            .runtime
            .spawn(worker::user_lane(Arc::clone(&core), shutdown_rx));

        let queue = Queue::new(core);
        self.inner.lock_table().insert(queue.id(), queue.clone());
        tracing::info!(queue = %queue.id(), "queue created");
        queue
    }

    /// The singleton main queue of this engine.
    pub fn main_queue(&self) -> Queue {
        self.inner.main.clone()
    }

    /// Look up a live queue by id. Destroyed queues drop out of the table.
    pub fn get(&self, id: QueueId) -> Option<Queue> {
        if id == self.inner.main.id() {
            return Some(self.inner.main.clone());
        }
        self.inner.lock_table().get(&id).cloned()
    }
}

impl RegistryInner {
    fn lock_table(&self) -> std::sync::MutexGuard<'_, HashMap<QueueId, Queue>> {
        self.user_queues.lock().expect("registry table lock poisoned")
    }
}

impl std::fmt::Debug for QueueRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueRegistry")
            .field("main", &self.inner.main.id())
            .field("user_queues", &self.inner.lock_table().len())
            .finish()
    }
}

static GLOBAL: OnceLock<QueueRegistry> = OnceLock::new();

/// Process-wide registry, created with [`QueueRegistry::standalone`] on
/// first use.
///
/// First touch must happen within a Tokio runtime, same as
/// [`QueueRegistry::new`].
pub fn global() -> &'static QueueRegistry {
    GLOBAL.get_or_init(QueueRegistry::standalone)
}

/// Install a host-specific registry as the process-wide one.
///
/// Fails once [`global`] has lazily initialized or a previous install
/// succeeded; install before anything touches the global registry.
pub fn install(registry: QueueRegistry) -> Result<(), StrandError> {
    GLOBAL.set(registry).map_err(|_| {
        StrandError::InvalidOperation("global registry already initialized".into())
    })
}
