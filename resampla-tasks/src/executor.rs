//! Completion-driven executor: runs a [`DependentTaskQueue`] on a bounded rayon pool.
use ::std::{
    any::Any,
    num::NonZeroUsize,
    panic::{self, AssertUnwindSafe},
    sync::atomic::{AtomicBool, AtomicUsize, Ordering},
    time::{Duration, Instant},
};

use ::crossbeam_channel::RecvTimeoutError;
use ::tracing::{debug, instrument, trace, warn};

use crate::{CancelToken, DependentTaskQueue, TaskId};

/// How long the orchestrating thread sleeps on the completion channel before re-checking for cancellation
const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// A unit of work the [`Executor`] can run.
pub trait Task: Send {
    type Error: Send;
    /// Run the task. Long running tasks should poll [`TaskContext::should_stop`] and return early when it is set.
    fn run(self, ctx: &TaskContext) -> Result<(), Self::Error>;
}

/// Adapter to use a closure as a [`Task`]
pub struct FnTask<F>(pub F);
impl<F, E> Task for FnTask<F>
where
    F: FnOnce(&TaskContext) -> Result<(), E> + Send,
    E: Send,
{
    type Error = E;
    #[inline]
    fn run(self, ctx: &TaskContext) -> Result<(), E> { (self.0)(ctx) }
}

/// Shared by every task of one [`Executor::run`] call.
#[derive(Debug)]
pub struct TaskContext {
    halted: AtomicBool,
    cancel: CancelToken,
}
impl TaskContext {
    fn new(cancel: CancelToken) -> Self { Self { halted: AtomicBool::new(false), cancel } }
    fn halt(&self) { self.halted.store(true, Ordering::Release); }
    /// Set once the run was cancelled or a peer task failed, remaining work will be discarded.
    #[inline]
    pub fn should_stop(&self) -> bool { self.halted.load(Ordering::Acquire) || self.cancel.is_cancelled() }
}

#[derive(Debug, ::thiserror::Error)]
pub enum RunError<E> {
    /// The [`CancelToken`] was cancelled before every task completed
    #[error("interrupted")]
    Interrupted,
    /// First error returned by a task
    #[error("task failed: {0}")]
    Failed(E),
    #[error("task panicked: {0}")]
    Panicked(String),
    /// Blocked tasks remained after everything runnable finished.
    ///
    /// Dependencies can only name earlier tasks, so a queue built through
    /// [`push_dependent`](crate::DependentTaskQueue::push_dependent) always drains and this is an
    /// invariant check rather than an expected outcome.
    #[error("{remaining} task(s) can never run because their dependencies did not complete")]
    Stalled { remaining: usize },
}
impl<E> RunError<E> {
    #[inline]
    pub fn is_interrupted(&self) -> bool { matches!(self, Self::Interrupted) }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub completed: usize,
    pub total: usize,
    pub elapsed: Duration,
}

enum Outcome<E> {
    Done,
    /// Never started because the run was already halting
    Skipped,
    Failed(E),
    Panicked(String),
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_owned()
    }
}

/// Number of threads to use when `0` is requested
#[inline]
pub fn available_parallelism() -> usize { ::std::thread::available_parallelism().map(NonZeroUsize::get).unwrap_or(1) }

/// Bounded worker pool that drains [`DependentTaskQueue`]s.
///
/// The pool lives as long as the executor and is shared by every [`run`](Self::run),
/// concurrent runs are allowed and only share the worker threads.
pub struct Executor {
    pool: ::rayon::ThreadPool,
    active: AtomicUsize,
}

impl Executor {
    /// Create a pool with `threads` workers, `0` means one per available hardware thread.
    pub fn new(threads: usize) -> Result<Self, ::rayon::ThreadPoolBuildError> {
        let threads = if threads == 0 { available_parallelism() } else { threads };
        let pool = ::rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("resampla-worker-{}", i))
            .build()?;
        debug!(threads, "Executor::new");
        Ok(Self { pool, active: AtomicUsize::new(0) })
    }
    /// Number of worker threads, also the maximum number of tasks in flight per run
    #[inline]
    pub fn threads(&self) -> usize { self.pool.current_num_threads() }
    /// Tasks currently submitted to the pool and not yet finished, across all runs
    #[inline]
    pub fn active_tasks(&self) -> usize { self.active.load(Ordering::SeqCst) }
    /// Run `op` inside the pool, so rayon parallel iterators in it use the executor's threads
    #[inline]
    pub fn install<R: Send>(&self, op: impl FnOnce() -> R + Send) -> R { self.pool.install(op) }
    /// Run every task in `queue`, blocking until the queue drained.
    ///
    /// Runnable tasks are submitted while fewer than [`threads`](Self::threads) are in flight,
    /// each completion releases its dependents and calls `on_complete(completed, total)`.
    ///
    /// On cancellation or the first task failure no further tasks are started, tasks already
    /// running see [`TaskContext::should_stop`], and this returns once all of them finished.
    /// # Errors
    /// See [`RunError`], the first recorded halt reason wins.
    #[instrument(skip_all, level = "trace")]
    pub fn run<T: Task>(
        &self,
        mut queue: DependentTaskQueue<T>,
        cancel: &CancelToken,
        mut on_complete: impl FnMut(usize, usize),
    ) -> Result<RunSummary, RunError<T::Error>> {
        let start = Instant::now();
        let total = queue.total();
        let max_in_flight = self.threads().max(1);
        let ctx = TaskContext::new(cancel.clone());
        let active = &self.active;
        let (tx, rx) = ::crossbeam_channel::unbounded::<(TaskId, Outcome<T::Error>)>();
        trace!(total, max_in_flight, "Executor::run");
        self.pool.in_place_scope(|scope| {
            let mut in_flight = 0usize;
            let mut completed = 0usize;
            let mut halt: Option<RunError<T::Error>> = None;
            loop {
                if halt.is_none() && cancel.is_cancelled() {
                    debug!(completed, total, "cancellation requested");
                    ctx.halt();
                    halt = Some(RunError::Interrupted);
                }
                while halt.is_none() && in_flight < max_in_flight {
                    let Some((id, task)) = queue.take_runnable() else {
                        break;
                    };
                    let tx = tx.clone();
                    let ctx = &ctx;
                    active.fetch_add(1, Ordering::SeqCst);
                    in_flight += 1;
                    scope.spawn(move |_| {
                        let outcome = if ctx.should_stop() {
                            Outcome::Skipped
                        } else {
                            match panic::catch_unwind(AssertUnwindSafe(|| task.run(ctx))) {
                                Ok(Ok(())) => Outcome::Done,
                                Ok(Err(e)) => Outcome::Failed(e),
                                Err(payload) => Outcome::Panicked(panic_message(payload)),
                            }
                        };
                        active.fetch_sub(1, Ordering::SeqCst);
                        // the receiver outlives every task of this scope
                        let _ = tx.send((id, outcome));
                    });
                }
                if in_flight == 0 {
                    break;
                }
                match rx.recv_timeout(POLL_INTERVAL) {
                    Ok((id, outcome)) => {
                        in_flight -= 1;
                        match outcome {
                            Outcome::Done => {
                                let released = queue.complete(id);
                                completed += 1;
                                trace!(task = %id, released = released.len(), "task completed");
                                on_complete(completed, total);
                            }
                            Outcome::Skipped => trace!(task = %id, "task skipped"),
                            Outcome::Failed(e) => {
                                warn!(task = %id, "task failed, halting remaining tasks");
                                ctx.halt();
                                halt.get_or_insert(RunError::Failed(e));
                            }
                            Outcome::Panicked(msg) => {
                                warn!(task = %id, "task panicked: {}", msg);
                                ctx.halt();
                                halt.get_or_insert(RunError::Panicked(msg));
                            }
                        }
                    }
                    Err(RecvTimeoutError::Timeout) => {}
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            }
            if let Some(halt) = halt {
                return Err(halt);
            }
            if !queue.is_empty() {
                return Err(RunError::Stalled { remaining: queue.len() });
            }
            let summary = RunSummary { completed, total, elapsed: start.elapsed() };
            debug!(completed, elapsed = ?summary.elapsed, "Executor::run finished");
            Ok(summary)
        })
    }
}
