//! Units of work and the one-shot result rendezvous.
//!
//! A detached task owns nothing but its closure. An awaited task also owns the
//! sending half of a single-slot channel; the submitter keeps the receiving
//! half in a [`TaskHandle`]. The worker that runs the task is the only writer
//! and the handle is the only reader, so concurrent waiters never see each
//! other's results.

use super::panic_handler::panic_message;
use crate::error::{Error, Result};
use crossbeam_channel::{Receiver, RecvTimeoutError, TryRecvError};
use std::panic::{catch_unwind, resume_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Global task ID counter
static TASK_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(u64);

impl TaskId {
    fn next() -> Self {
        TaskId(TASK_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// Whether a submitter is waiting on the task's result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskMode {
    Detached,
    Awaited,
}

type Outcome<R> = std::result::Result<R, String>;

/// Internal task representation
pub(crate) struct Task {
    pub(crate) id: TaskId,
    pub(crate) mode: TaskMode,
    pub(crate) spawn_time: Instant,
    func: Box<dyn FnOnce() + Send + 'static>,
}

impl Task {
    /// Fire-and-forget task. Whoever runs it drops it afterwards.
    pub fn detached<F>(f: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Task {
            id: TaskId::next(),
            mode: TaskMode::Detached,
            spawn_time: Instant::now(),
            func: Box::new(f),
        }
    }

    /// Task whose return value is delivered to the returned handle.
    ///
    /// A panic inside `f` is reported to the handle and then resumed so the
    /// worker's panic handler still sees it.
    pub fn awaited<F, R>(f: F) -> (Self, TaskHandle<R>)
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        let (tx, rx) = crossbeam_channel::bounded::<Outcome<R>>(1);
        let id = TaskId::next();

        let func = move || match catch_unwind(AssertUnwindSafe(f)) {
            Ok(value) => {
                let _ = tx.send(Ok(value));
            }
            Err(payload) => {
                let _ = tx.send(Err(panic_message(payload.as_ref())));
                resume_unwind(payload);
            }
        };

        let task = Task {
            id,
            mode: TaskMode::Awaited,
            spawn_time: Instant::now(),
            func: Box::new(func),
        };
        (task, TaskHandle { id, rx })
    }

    /// Execute the task
    pub fn run(self) {
        (self.func)();
    }
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("mode", &self.mode)
            .field("spawn_time", &self.spawn_time)
            .finish()
    }
}

/// Receiving side of an awaited task.
#[derive(Debug)]
pub struct TaskHandle<R> {
    id: TaskId,
    rx: Receiver<Outcome<R>>,
}

impl<R> TaskHandle<R> {
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Block until the task has run and return its value.
    pub fn wait(self) -> Result<R> {
        let id = self.id;
        match self.rx.recv() {
            Ok(outcome) => outcome.map_err(Error::TaskPanicked),
            Err(_) => Err(abandoned(id)),
        }
    }

    /// Like [`wait`](Self::wait) but gives up after `timeout`, returning `None`.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<Result<R>> {
        match self.rx.recv_timeout(timeout) {
            Ok(outcome) => Some(outcome.map_err(Error::TaskPanicked)),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => Some(Err(abandoned(self.id))),
        }
    }

    /// Non-blocking poll. `None` while the task is still queued or running.
    pub fn try_wait(&self) -> Option<Result<R>> {
        match self.rx.try_recv() {
            Ok(outcome) => Some(outcome.map_err(Error::TaskPanicked)),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(abandoned(self.id))),
        }
    }
}

fn abandoned(id: TaskId) -> Error {
    Error::TaskPanicked(format!("task {:?} dropped before it ran", id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;

    #[test]
    fn test_detached_task_runs_closure() {
        let flag = Arc::new(AtomicBool::new(false));
        let task = {
            let flag = flag.clone();
            Task::detached(move || flag.store(true, Ordering::SeqCst))
        };
        assert_eq!(task.mode, TaskMode::Detached);
        task.run();
        assert!(flag.load(Ordering::SeqCst));
    }

    #[test]
    fn test_awaited_task_delivers_value() {
        let (task, handle) = Task::awaited(|| 6 * 7);
        assert_eq!(task.mode, TaskMode::Awaited);
        assert_eq!(task.id, handle.id());
        assert!(handle.try_wait().is_none());

        task.run();
        assert_eq!(handle.wait().unwrap(), 42);
    }

    #[test]
    fn test_dropped_task_unblocks_waiter() {
        let (task, handle) = Task::awaited(|| "never");
        drop(task);
        assert!(matches!(handle.wait(), Err(Error::TaskPanicked(_))));
    }

    #[test]
    fn test_panicking_task_reports_message() {
        let (task, handle) = Task::awaited(|| -> u32 { panic!("boom") });
        let unwound = catch_unwind(AssertUnwindSafe(|| task.run()));
        assert!(unwound.is_err());

        match handle.wait_timeout(Duration::from_secs(1)) {
            Some(Err(Error::TaskPanicked(msg))) => assert_eq!(msg, "boom"),
            other => panic!("unexpected outcome: {:?}", other.map(|r| r.is_ok())),
        }
    }

    #[test]
    fn test_task_ids_are_unique() {
        let a = Task::detached(|| {});
        let b = Task::detached(|| {});
        assert_ne!(a.id, b.id);
    }
}
