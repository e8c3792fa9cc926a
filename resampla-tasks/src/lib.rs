//! Dependency-aware task scheduling for pipelined, stripe-parallel work.
//!
//! A [`DependentTaskQueue`] holds tasks that are either runnable or blocked on other tasks,
//! and an [`Executor`] drains it on a bounded [`rayon`] thread pool, releasing blocked tasks
//! as their dependencies complete.
//!
//! Nothing in here knows about images, the resampler builds its stage graph on top of it.

mod cancel;
mod executor;
mod queue;

pub use crate::cancel::CancelToken;
pub use crate::executor::{available_parallelism, Executor, FnTask, RunError, RunSummary, Task, TaskContext};
pub use crate::queue::{DependentTaskQueue, QueueError, TaskId, TaskState};
