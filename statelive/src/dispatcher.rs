use crate::error::panic_message;
use crate::DispatchError;
use std::cell::Cell;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tracing::{debug, error, warn};

type Job = Box<dyn FnOnce() + Send + 'static>;

static NEXT_DISPATCHER_ID: AtomicU64 = AtomicU64::new(1);
static MAIN_DISPATCHER: OnceLock<Dispatcher> = OnceLock::new();

thread_local! {
    static CURRENT_DISPATCHER: Cell<u64> = const { Cell::new(0) };
}

/// The single-threaded execution context every observer callback runs on.
///
/// Jobs run one at a time on a dedicated thread, in the order they were
/// posted. The thread exits once the last handle is dropped.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    id: u64,
    name: String,
    job_tx: UnboundedSender<Job>,
}

impl Dispatcher {
    /// Starts a new dispatcher thread called `name`.
    pub fn spawn(name: impl Into<String>) -> std::io::Result<Self> {
        let name = name.into();
        let id = NEXT_DISPATCHER_ID.fetch_add(1, Ordering::Relaxed);
        let (job_tx, job_rx) = tokio::sync::mpsc::unbounded_channel::<Job>();

        let thread_name = name.clone();
        std::thread::Builder::new()
            .name(name.clone())
            .spawn(move || Self::process_queue(id, thread_name, job_rx))?;

        Ok(Dispatcher {
            inner: Arc::new(DispatcherInner { id, name, job_tx }),
        })
    }

    /// The process-wide default dispatcher, started on first use.
    ///
    /// # Panics
    ///
    /// Panics if the operating system refuses to start the thread.
    pub fn main() -> Dispatcher {
        MAIN_DISPATCHER
            .get_or_init(|| {
                Dispatcher::spawn("statelive-main")
                    .unwrap_or_else(|e| panic!("failed to start the main dispatcher: {e}"))
            })
            .clone()
    }

    fn process_queue(id: u64, name: String, mut job_rx: UnboundedReceiver<Job>) {
        CURRENT_DISPATCHER.with(|current| current.set(id));
        debug!(dispatcher = %name, "dispatcher started");
        while let Some(job) = job_rx.blocking_recv() {
            if let Err(payload) = catch_unwind(AssertUnwindSafe(job)) {
                error!(
                    dispatcher = %name,
                    "dispatched job panicked: {}",
                    panic_message(payload.as_ref())
                );
            }
        }
        debug!(dispatcher = %name, "dispatcher stopped");
    }

    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Whether the calling thread is this dispatcher's thread.
    pub fn is_current(&self) -> bool {
        CURRENT_DISPATCHER.with(|current| current.get() == self.inner.id)
    }

    /// Queues `job` behind everything posted before it.
    pub fn post<F>(&self, job: F) -> Result<(), DispatchError>
    where
        F: FnOnce() + Send + 'static,
    {
        self.inner.job_tx.send(Box::new(job)).map_err(|_| {
            warn!(dispatcher = %self.inner.name, "job posted to a closed dispatcher");
            DispatchError::Closed(self.inner.id)
        })
    }

    /// Runs `f` on the dispatcher and blocks until it returns.
    ///
    /// Runs inline when already on the dispatcher. Prefer
    /// [`invoke_async`](Self::invoke_async) from async code.
    pub fn invoke<R, F>(&self, f: F) -> Result<R, DispatchError>
    where
        R: Send + 'static,
        F: FnOnce() -> R + Send + 'static,
    {
        if self.is_current() {
            return Ok(f());
        }
        let (result_tx, result_rx) = std::sync::mpsc::sync_channel(1);
        self.post(move || {
            let _ = result_tx.send(f());
        })?;
        result_rx.recv().map_err(|_| DispatchError::Dropped)
    }

    /// Runs `f` on the dispatcher and resolves with its result.
    pub async fn invoke_async<R, F>(&self, f: F) -> Result<R, DispatchError>
    where
        R: Send + 'static,
        F: FnOnce() -> R + Send + 'static,
    {
        if self.is_current() {
            return Ok(f());
        }
        let (result_tx, result_rx) = tokio::sync::oneshot::channel();
        self.post(move || {
            let _ = result_tx.send(f());
        })?;
        result_rx.await.map_err(|_| DispatchError::Dropped)
    }

    /// Resolves once every job posted before this call has run.
    pub async fn flush(&self) -> Result<(), DispatchError> {
        self.invoke_async(|| ()).await
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .finish()
    }
}

impl PartialEq for Dispatcher {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for Dispatcher {}
