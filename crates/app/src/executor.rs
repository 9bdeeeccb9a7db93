//! Background executor — one worker thread running a cooperative scheduler.
//!
//! The host calls in from a synchronous control thread that must never wait
//! on network IO. Asynchronous work is handed to the worker through an
//! unbounded channel; the worker spawns each job onto its current-thread
//! tokio runtime in the order it was submitted. Jobs interleave at their
//! await points, so completion order is not submission order.
//!
//! ```text
//! Created ──start()──▶ Running ──stop()──▶ Draining ──▶ Stopped
//! ```
//!
//! Shutdown is signalled on a dedicated channel that the worker selects on
//! alongside the job queue, so `stop()` returns as soon as the worker has
//! dropped its runtime. Jobs still in flight at that point are abandoned.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};
use std::thread::JoinHandle;

use tokio::runtime::Runtime;
use tokio::sync::{mpsc, oneshot};

type Job = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Default name of the worker thread.
pub const WORKER_THREAD_NAME: &str = "rentbridge-worker";

/// Errors from submitting to or managing the executor.
#[derive(Debug, thiserror::Error)]
pub enum ExecutorError {
    /// `start()` has not been called yet.
    #[error("executor is not running")]
    NotRunning,

    /// The executor is stopping or stopped.
    #[error("executor is closed")]
    Closed,

    /// `start()` was called more than once.
    #[error("executor was already started")]
    AlreadyStarted,

    /// The operation was dropped before producing a result.
    #[error("operation abandoned before completion")]
    Abandoned,

    /// The worker runtime or thread could not be created.
    #[error("failed to start worker")]
    Spawn(#[source] std::io::Error),
}

/// Lifecycle phase of a [`BackgroundExecutor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutorState {
    Created,
    Running,
    Draining,
    Stopped,
}

impl fmt::Display for ExecutorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => f.write_str("created"),
            Self::Running => f.write_str("running"),
            Self::Draining => f.write_str("draining"),
            Self::Stopped => f.write_str("stopped"),
        }
    }
}

struct Worker {
    jobs: mpsc::UnboundedSender<Job>,
    shutdown: oneshot::Sender<()>,
    thread: JoinHandle<()>,
}

enum Lifecycle {
    Created,
    Running(Worker),
    Draining,
    Stopped,
}

/// Runs asynchronous operations on a dedicated worker thread.
pub struct BackgroundExecutor {
    thread_name: String,
    lifecycle: Mutex<Lifecycle>,
}

impl Default for BackgroundExecutor {
    fn default() -> Self {
        Self::new(WORKER_THREAD_NAME)
    }
}

impl BackgroundExecutor {
    /// Create an executor whose worker thread will carry `thread_name`.
    #[must_use]
    pub fn new(thread_name: impl Into<String>) -> Self {
        Self {
            thread_name: thread_name.into(),
            lifecycle: Mutex::new(Lifecycle::Created),
        }
    }

    /// Current lifecycle phase.
    #[must_use]
    pub fn state(&self) -> ExecutorState {
        match *self.lock() {
            Lifecycle::Created => ExecutorState::Created,
            Lifecycle::Running(_) => ExecutorState::Running,
            Lifecycle::Draining => ExecutorState::Draining,
            Lifecycle::Stopped => ExecutorState::Stopped,
        }
    }

    /// Spawn the worker thread.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutorError::AlreadyStarted`] unless the executor is fresh,
    /// or [`ExecutorError::Spawn`] if the runtime or thread cannot be created.
    pub fn start(&self) -> Result<(), ExecutorError> {
        let mut lifecycle = self.lock();
        if !matches!(*lifecycle, Lifecycle::Created) {
            return Err(ExecutorError::AlreadyStarted);
        }

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(ExecutorError::Spawn)?;
        let (jobs, job_rx) = mpsc::unbounded_channel();
        let (shutdown, shutdown_rx) = oneshot::channel();

        let thread = std::thread::Builder::new()
            .name(self.thread_name.clone())
            .spawn(move || run_worker(&runtime, job_rx, shutdown_rx))
            .map_err(ExecutorError::Spawn)?;

        *lifecycle = Lifecycle::Running(Worker {
            jobs,
            shutdown,
            thread,
        });
        tracing::debug!(thread = %self.thread_name, "background executor started");
        Ok(())
    }

    /// Schedule `operation` on the worker and return a handle to its result.
    ///
    /// Never blocks.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutorError::NotRunning`] before `start()` and
    /// [`ExecutorError::Closed`] once `stop()` has begun.
    pub fn submit<F>(&self, operation: F) -> Result<PendingOperation<F::Output>, ExecutorError>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        self.enqueue(Box::pin(async move {
            // The submitter may have dropped its handle; nothing to report then.
            let _ = tx.send(operation.await);
        }))?;
        Ok(PendingOperation { rx })
    }

    /// Schedule `operation` without keeping a handle.
    ///
    /// An `Err` result is logged from the worker thread. If the executor is
    /// not accepting work the operation is dropped and that is logged too.
    pub fn spawn_detached<F, E>(&self, label: &'static str, operation: F)
    where
        F: Future<Output = Result<(), E>> + Send + 'static,
        E: std::error::Error + Send + 'static,
    {
        let job = Box::pin(async move {
            if let Err(err) = operation.await {
                tracing::warn!(operation = label, error = %ErrorChain(&err), "background operation failed");
            }
        });
        if let Err(err) = self.enqueue(job) {
            tracing::debug!(operation = label, %err, "operation dropped");
        }
    }

    /// Submit `operation` and block the calling thread until it completes.
    ///
    /// # Errors
    ///
    /// Same as [`submit`](Self::submit), plus [`ExecutorError::Abandoned`] if
    /// the executor stops before the operation finishes.
    ///
    /// # Panics
    ///
    /// Panics when called from inside an asynchronous runtime, including from
    /// a job running on this executor.
    pub fn block_on<F>(&self, operation: F) -> Result<F::Output, ExecutorError>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.submit(operation)?.wait()
    }

    /// Signal shutdown and join the worker thread.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutorError::Closed`] when already stopping or stopped.
    pub fn stop(&self) -> Result<(), ExecutorError> {
        let worker = {
            let mut lifecycle = self.lock();
            match std::mem::replace(&mut *lifecycle, Lifecycle::Draining) {
                Lifecycle::Running(worker) => worker,
                Lifecycle::Created => {
                    *lifecycle = Lifecycle::Stopped;
                    return Ok(());
                }
                previous @ (Lifecycle::Draining | Lifecycle::Stopped) => {
                    *lifecycle = previous;
                    return Err(ExecutorError::Closed);
                }
            }
        };

        let Worker {
            jobs,
            shutdown,
            thread,
        } = worker;
        drop(jobs);
        // The worker may already be gone if its runtime exited on its own.
        let _ = shutdown.send(());
        if thread.join().is_err() {
            tracing::error!(thread = %self.thread_name, "background worker panicked");
        }

        *self.lock() = Lifecycle::Stopped;
        tracing::debug!(thread = %self.thread_name, "background executor stopped");
        Ok(())
    }

    fn enqueue(&self, job: Job) -> Result<(), ExecutorError> {
        match &*self.lock() {
            Lifecycle::Created => Err(ExecutorError::NotRunning),
            Lifecycle::Running(worker) => worker.jobs.send(job).map_err(|_| ExecutorError::Closed),
            Lifecycle::Draining | Lifecycle::Stopped => Err(ExecutorError::Closed),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Lifecycle> {
        self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for BackgroundExecutor {
    fn drop(&mut self) {
        if self.state() == ExecutorState::Running {
            let _ = self.stop();
        }
    }
}

impl fmt::Debug for BackgroundExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackgroundExecutor")
            .field("thread_name", &self.thread_name)
            .field("state", &self.state())
            .finish()
    }
}

fn run_worker(
    runtime: &Runtime,
    mut jobs: mpsc::UnboundedReceiver<Job>,
    mut shutdown: oneshot::Receiver<()>,
) {
    runtime.block_on(async move {
        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => break,
                job = jobs.recv() => match job {
                    Some(job) => {
                        tokio::spawn(job);
                    }
                    None => break,
                },
            }
        }
    });
}

/// Handle to the result of a submitted operation.
///
/// Also a [`Future`], for callers that are themselves asynchronous.
#[must_use = "dropping the handle discards the result"]
pub struct PendingOperation<T> {
    rx: oneshot::Receiver<T>,
}

impl<T> PendingOperation<T> {
    /// Block the calling thread until the result is available.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutorError::Abandoned`] if the operation was dropped.
    ///
    /// # Panics
    ///
    /// Panics when called from inside an asynchronous runtime.
    pub fn wait(self) -> Result<T, ExecutorError> {
        self.rx.blocking_recv().map_err(|_| ExecutorError::Abandoned)
    }

    /// Take the result if it is ready, without blocking.
    pub fn try_take(&mut self) -> Option<Result<T, ExecutorError>> {
        match self.rx.try_recv() {
            Ok(value) => Some(Ok(value)),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => Some(Err(ExecutorError::Abandoned)),
        }
    }
}

impl<T> Future for PendingOperation<T> {
    type Output = Result<T, ExecutorError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|res| res.map_err(|_| ExecutorError::Abandoned))
    }
}

impl<T> fmt::Debug for PendingOperation<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PendingOperation(..)")
    }
}

/// Displays an error followed by its `source()` chain.
pub(crate) struct ErrorChain<'a>(pub &'a (dyn std::error::Error + 'static));

impl fmt::Display for ErrorChain<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)?;
        let mut source = self.0.source();
        while let Some(err) = source {
            write!(f, ": {err}")?;
            source = err.source();
        }
        Ok(())
    }
}
