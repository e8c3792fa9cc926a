//! Task queue with explicit "depends on" edges

use ::std::{collections::VecDeque, fmt};

/// Handle of a task inside a [`DependentTaskQueue`], issued in insertion order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(usize);
impl TaskId {
    /// Position of the task in insertion order
    #[inline(always)]
    pub fn index(self) -> usize { self.0 }
}
impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "#{}", self.0) }
}

/// Lifecycle of a queued task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Waiting on at least one unfinished dependency
    Blocked,
    /// All dependencies finished, waiting to be taken
    Runnable,
    /// Taken out of the queue, not yet reported as completed
    Running,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Eq, ::thiserror::Error)]
pub enum QueueError {
    #[error("task depends on {0}, which was never added to this queue")]
    UnknownDependency(TaskId),
}

struct Entry<T> {
    task: Option<T>,
    state: TaskState,
    /// Number of dependencies that have not completed yet
    pending: usize,
    /// Tasks waiting on this one
    dependents: Vec<TaskId>,
}

/// Holds tasks that are either immediately runnable or blocked on a set of other tasks.
///
/// Dependencies can only name tasks added earlier, so the graph is acyclic by construction.
/// Completing a task (see [`complete`](Self::complete)) moves every dependent whose last
/// pending dependency it was into the runnable queue, in insertion order.
pub struct DependentTaskQueue<T> {
    entries: Vec<Entry<T>>,
    runnable: VecDeque<TaskId>,
    blocked: usize,
}

impl<T> Default for DependentTaskQueue<T> {
    fn default() -> Self { Self { entries: Vec::new(), runnable: VecDeque::new(), blocked: 0 } }
}

impl<T> DependentTaskQueue<T> {
    #[inline]
    pub fn new() -> Self { Self::default() }
    #[inline]
    pub fn with_capacity(capacity: usize) -> Self {
        Self { entries: Vec::with_capacity(capacity), runnable: VecDeque::with_capacity(capacity), blocked: 0 }
    }
    /// Add a task with no dependencies, it is runnable immediately.
    pub fn push(&mut self, task: T) -> TaskId {
        let id = TaskId(self.entries.len());
        self.entries.push(Entry { task: Some(task), state: TaskState::Runnable, pending: 0, dependents: Vec::new() });
        self.runnable.push_back(id);
        id
    }
    /// Add a task that only becomes runnable after every task in `dependencies` completed.
    ///
    /// Duplicate dependencies count once, dependencies that already completed are ignored.
    /// # Errors
    /// If a dependency was not issued by this queue.
    pub fn push_dependent<I: IntoIterator<Item = TaskId>>(&mut self, task: T, dependencies: I) -> Result<TaskId, QueueError> {
        let id = TaskId(self.entries.len());
        let mut deps: Vec<TaskId> = dependencies.into_iter().collect();
        deps.sort_unstable();
        deps.dedup();
        if let Some(&unknown) = deps.iter().find(|dep| dep.0 >= id.0) {
            return Err(QueueError::UnknownDependency(unknown));
        }
        let mut pending = 0;
        for dep in deps {
            let entry = &mut self.entries[dep.0];
            if entry.state != TaskState::Completed {
                entry.dependents.push(id);
                pending += 1;
            }
        }
        if pending == 0 {
            self.entries.push(Entry { task: Some(task), state: TaskState::Runnable, pending, dependents: Vec::new() });
            self.runnable.push_back(id);
        } else {
            self.entries.push(Entry { task: Some(task), state: TaskState::Blocked, pending, dependents: Vec::new() });
            self.blocked += 1;
        }
        Ok(id)
    }
    /// Take the oldest runnable task, marking it as running. Never blocks.
    pub fn take_runnable(&mut self) -> Option<(TaskId, T)> {
        while let Some(id) = self.runnable.pop_front() {
            let entry = &mut self.entries[id.0];
            if let Some(task) = entry.task.take() {
                entry.state = TaskState::Running;
                return Some((id, task));
            }
        }
        None
    }
    /// Mark a running task as completed and release the tasks that were only waiting on it.
    ///
    /// Returns the newly runnable tasks. Completing a task twice, or one that was never
    /// taken, releases nothing.
    pub fn complete(&mut self, id: TaskId) -> Vec<TaskId> {
        let Some(entry) = self.entries.get_mut(id.0) else {
            return Vec::new();
        };
        if entry.state != TaskState::Running {
            return Vec::new();
        }
        entry.state = TaskState::Completed;
        let dependents = ::core::mem::take(&mut entry.dependents);
        let mut released = Vec::new();
        for dependent in dependents {
            let entry = &mut self.entries[dependent.0];
            entry.pending -= 1;
            if entry.pending == 0 && entry.state == TaskState::Blocked {
                entry.state = TaskState::Runnable;
                self.blocked -= 1;
                self.runnable.push_back(dependent);
                released.push(dependent);
            }
        }
        released
    }
    #[inline]
    pub fn state(&self, id: TaskId) -> Option<TaskState> { self.entries.get(id.0).map(|e| e.state) }
    #[inline]
    pub fn has_runnable(&self) -> bool { !self.runnable.is_empty() }
    /// Number of tasks not yet taken (blocked and runnable)
    #[inline]
    pub fn len(&self) -> usize { self.blocked + self.runnable.len() }
    #[inline]
    pub fn blocked_len(&self) -> usize { self.blocked }
    /// No task is left to take, running tasks may still be outstanding
    #[inline]
    pub fn is_empty(&self) -> bool { self.len() == 0 }
    /// Total number of tasks ever added
    #[inline]
    pub fn total(&self) -> usize { self.entries.len() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn independent_tasks_are_runnable_in_order() {
        let mut q = DependentTaskQueue::new();
        let a = q.push('a');
        let b = q.push('b');
        assert_eq!(q.len(), 2);
        assert_eq!(q.take_runnable(), Some((a, 'a')));
        assert_eq!(q.take_runnable(), Some((b, 'b')));
        assert_eq!(q.take_runnable(), None);
        assert!(q.is_empty());
    }

    #[test]
    fn dependent_released_after_all_dependencies() {
        let mut q = DependentTaskQueue::new();
        let a = q.push("a");
        let b = q.push("b");
        let c = q.push_dependent("c", [a, b, a]).unwrap();
        assert_eq!(q.state(c), Some(TaskState::Blocked));
        assert_eq!(q.blocked_len(), 1);

        let (first, _) = q.take_runnable().unwrap();
        let (second, _) = q.take_runnable().unwrap();
        assert!(!q.has_runnable());
        assert!(q.complete(first).is_empty());
        assert_eq!(q.state(c), Some(TaskState::Blocked));
        assert_eq!(q.complete(second), vec![c]);
        assert_eq!(q.take_runnable(), Some((c, "c")));
        assert_eq!(q.complete(c), Vec::<TaskId>::new());
        assert_eq!(q.state(c), Some(TaskState::Completed));
    }

    #[test]
    fn completed_dependencies_are_ignored() {
        let mut q = DependentTaskQueue::new();
        let a = q.push(1);
        let (taken, _) = q.take_runnable().unwrap();
        q.complete(taken);
        let b = q.push_dependent(2, [a]).unwrap();
        assert_eq!(q.state(b), Some(TaskState::Runnable));
    }

    #[test]
    fn unknown_dependency_is_rejected() {
        let mut q: DependentTaskQueue<u8> = DependentTaskQueue::new();
        q.push(0);
        let bogus = TaskId(7);
        assert_eq!(q.push_dependent(1, [bogus]), Err(QueueError::UnknownDependency(bogus)));
        assert_eq!(q.total(), 1);
    }

    #[test]
    fn completing_twice_releases_once() {
        let mut q = DependentTaskQueue::new();
        let a = q.push(());
        let b = q.push_dependent((), [a]).unwrap();
        q.take_runnable();
        assert_eq!(q.complete(a), vec![b]);
        assert!(q.complete(a).is_empty());
        assert_eq!(q.len(), 1);
    }
}
