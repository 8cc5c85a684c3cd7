// worker loop and per-worker state
use super::task::{Task, TaskMode};
use super::thread_pool::Shared;
use crossbeam_channel::Sender;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Instant;

pub type WorkerId = usize;

/// Where a worker is in its loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WorkerState {
    /// Waiting for work. Safe to tear down.
    Parked = 0,
    /// Running a task. Must not be torn down.
    Executing = 1,
    /// Left its loop after observing teardown.
    Exited = 2,
}

impl WorkerState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => WorkerState::Parked,
            1 => WorkerState::Executing,
            _ => WorkerState::Exited,
        }
    }
}

// state and stats for each worker, shared with the pool
#[derive(Debug)]
pub struct WorkerStatus {
    state: AtomicU8,
    pub tasks_executed: AtomicU64,
    pub tasks_panicked: AtomicU64,
    pub busy_time_ns: AtomicU64,
}

impl WorkerStatus {
    pub(crate) fn new() -> Self {
        Self {
            state: AtomicU8::new(WorkerState::Parked as u8),
            tasks_executed: AtomicU64::new(0),
            tasks_panicked: AtomicU64::new(0),
            busy_time_ns: AtomicU64::new(0),
        }
    }

    pub fn state(&self) -> WorkerState {
        WorkerState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// The worker is parked and may be torn down.
    pub fn is_cancellable(&self) -> bool {
        self.state() == WorkerState::Parked
    }

    fn set(&self, state: WorkerState) {
        self.state.store(state as u8, Ordering::SeqCst);
    }
}

pub(crate) struct Worker {
    pub id: WorkerId,
    pub status: Arc<WorkerStatus>,
}

impl Worker {
    pub fn new(id: WorkerId, status: Arc<WorkerStatus>) -> Self {
        Self { id, status }
    }

    // main loop
    pub fn run(&self, shared: &Shared, ready: Sender<WorkerId>) {
        let mut ready = Some(ready);

        loop {
            self.status.set(WorkerState::Parked);

            if shared.destroying.load(Ordering::SeqCst) {
                break;
            }

            shared.parked.fetch_add(1, Ordering::SeqCst);

            if let Some(ready) = ready.take() {
                let _ = ready.send(self.id);
            }

            {
                let mut guard = shared.work_lock.lock();
                // checked under the signal lock so a broadcast can't slip in
                // between the check and the wait
                if shared.queue.is_empty() && !shared.destroying.load(Ordering::SeqCst) {
                    shared
                        .work_signal
                        .wait_for(&mut guard, shared.park_timeout);
                }
            }

            shared.parked.fetch_sub(1, Ordering::SeqCst);
            shared.executing.fetch_add(1, Ordering::SeqCst);

            if let Some(task) = shared.queue.dequeue() {
                self.execute_task(task, shared);
            }

            shared.executing.fetch_sub(1, Ordering::SeqCst);
        }

        self.status.set(WorkerState::Exited);
        shared.live.fetch_sub(1, Ordering::SeqCst);
        log::trace!("worker {} exited", self.id);
    }

    fn execute_task(&self, task: Task, shared: &Shared) {
        self.status.set(WorkerState::Executing);

        let tid = task.id;
        let mode = task.mode;
        let waited = task.spawn_time.elapsed();
        let start = Instant::now();

        let result = shared.panic_handler.execute(|| task.run());

        let duration_ns = start.elapsed().as_nanos() as u64;
        self.status
            .busy_time_ns
            .fetch_add(duration_ns, Ordering::Relaxed);
        self.status.tasks_executed.fetch_add(1, Ordering::Relaxed);

        match result {
            Ok(()) => log::trace!(
                "worker {} ran {:?} task {:?} (queued {:?}, ran {}ns)",
                self.id,
                mode,
                tid,
                waited,
                duration_ns
            ),
            Err(_) => {
                self.status.tasks_panicked.fetch_add(1, Ordering::Relaxed);
                if mode == TaskMode::Detached {
                    log::warn!("detached task {:?} panicked on worker {}", tid, self.id);
                }
            }
        }
    }
}

#[cfg(target_os = "linux")]
pub(crate) fn pin_thread_to_core(core_id: usize) {
    // SAFETY: cpuset is a plain bitmask owned by this frame; the call only
    // reads it and targets the current thread.
    unsafe {
        let mut cpuset: libc::cpu_set_t = std::mem::zeroed();
        libc::CPU_SET(core_id, &mut cpuset);
        let result = libc::sched_setaffinity(
            0, // current thread
            std::mem::size_of::<libc::cpu_set_t>(),
            &cpuset,
        );
        if result != 0 {
            log::warn!(
                "failed to pin thread {} to core {}",
                std::thread::current().name().unwrap_or("unknown"),
                core_id
            );
        }
    }
}

#[cfg(not(target_os = "linux"))]
pub(crate) fn pin_thread_to_core(core_id: usize) {
    log::debug!("core pinning unsupported on this platform (core {})", core_id);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worker_state_round_trip() {
        let status = WorkerStatus::new();
        assert!(status.is_cancellable());

        status.set(WorkerState::Executing);
        assert_eq!(status.state(), WorkerState::Executing);
        assert!(!status.is_cancellable());

        status.set(WorkerState::Exited);
        assert_eq!(status.state(), WorkerState::Exited);
        assert!(!status.is_cancellable());
    }
}
