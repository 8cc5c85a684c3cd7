//! Fixed-size worker pool over a shared FIFO task queue.
//!
//! Lifecycle: [`ThreadPool::new`] spawns every worker and waits until each
//! has parked once. [`ThreadPool::stop`] refuses further submissions and
//! drains the queue. [`ThreadPool::finalize`] then asks every worker to exit,
//! waits until all have, and joins them.
//!
//! Workers park on a condition variable with a bounded timeout, so teardown
//! never waits much longer than one park interval even without a broadcast.

use super::panic_handler::PanicHandler;
use super::task::{Task, TaskHandle};
use super::worker::{pin_thread_to_core, Worker, WorkerId, WorkerState, WorkerStatus};
use crate::collections::SyncFifoQueue;
use crate::config::{AdmissionPolicy, Config};
use crate::diagnostics;
use crate::error::{Error, Result};
use crate::util::Backoff;
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};
use std::time::{Duration, Instant};

/// State shared between the pool handle and its workers.
pub(crate) struct Shared {
    pub queue: SyncFifoQueue<Task>,
    pub running: AtomicBool,
    // cooperative teardown token
    pub destroying: AtomicBool,
    pub executing: AtomicUsize,
    pub parked: AtomicUsize,
    pub live: AtomicUsize,
    // submitters between the run-flag check and the enqueue
    pub submitting: AtomicUsize,
    pub work_lock: Mutex<()>,
    pub work_signal: Condvar,
    pub park_timeout: Duration,
    pub panic_handler: PanicHandler,
}

impl Shared {
    /// Wake every parked worker.
    pub fn broadcast(&self) {
        let _guard = self.work_lock.lock();
        self.work_signal.notify_all();
    }
}

struct WorkerHandle {
    id: WorkerId,
    thread: Option<JoinHandle<()>>,
}

/// Decrements the in-flight submission count when dropped.
struct SubmitGuard<'a>(&'a AtomicUsize);

impl Drop for SubmitGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Point-in-time view of the pool's counters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolStats {
    pub workers: usize,
    pub executing: usize,
    pub parked: usize,
    pub pending: usize,
    pub queue_capacity: usize,
    pub tasks_executed: u64,
    pub tasks_panicked: u64,
    pub per_worker: Vec<WorkerSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerSnapshot {
    pub id: WorkerId,
    pub state: WorkerState,
    pub tasks_executed: u64,
    pub tasks_panicked: u64,
    pub busy_time_ns: u64,
}

pub struct ThreadPool {
    shared: Arc<Shared>,
    workers: Mutex<Vec<WorkerHandle>>,
    statuses: Vec<Arc<WorkerStatus>>,
    thread_ids: Vec<ThreadId>,
    num_threads: usize,
    admission: AdmissionPolicy,
    finalized: AtomicBool,
}

impl ThreadPool {
    /// Pool with `worker_count` workers and default settings otherwise.
    pub fn new(worker_count: usize) -> Result<Self> {
        let config = Config::builder().num_threads(worker_count).build()?;
        Self::with_config(&config)
    }

    pub fn with_config(config: &Config) -> Result<Self> {
        config.validate()?;

        let num_threads = config.worker_threads();
        if num_threads == 0 {
            return Err(Error::config("need at least 1 thread"));
        }

        let queue = SyncFifoQueue::with_capacity(config.queue_prealloc());
        queue.set_destroy_hook(|task: Task| {
            log::warn!("dropping task {:?} that never ran", task.id);
        });

        let shared = Arc::new(Shared {
            queue,
            running: AtomicBool::new(false),
            destroying: AtomicBool::new(false),
            executing: AtomicUsize::new(0),
            parked: AtomicUsize::new(0),
            live: AtomicUsize::new(0),
            submitting: AtomicUsize::new(0),
            work_lock: Mutex::new(()),
            work_signal: Condvar::new(),
            park_timeout: config.park_timeout,
            panic_handler: PanicHandler::new(config.panic_strategy),
        });

        let (ready_tx, ready_rx) = crossbeam_channel::bounded(num_threads);
        let mut handles = Vec::with_capacity(num_threads);
        let mut statuses = Vec::with_capacity(num_threads);

        for id in 0..num_threads {
            let status = Arc::new(WorkerStatus::new());
            let worker = Worker::new(id, status.clone());
            let shared_clone = shared.clone();
            let ready = ready_tx.clone();
            let pin_workers = config.pin_workers;

            let mut builder =
                thread::Builder::new().name(format!("{}-{}", config.thread_name_prefix, id));
            if let Some(stack_size) = config.stack_size {
                builder = builder.stack_size(stack_size);
            }

            shared.live.fetch_add(1, Ordering::SeqCst);
            let spawned = builder.spawn(move || {
                if pin_workers {
                    pin_thread_to_core(id);
                }
                worker.run(&shared_clone, ready);
            });

            match spawned {
                Ok(thread) => {
                    handles.push(WorkerHandle {
                        id,
                        thread: Some(thread),
                    });
                    statuses.push(status);
                }
                Err(source) => {
                    shared.live.fetch_sub(1, Ordering::SeqCst);
                    log::error!("failed to spawn worker {}: {}", id, source);
                    abort_startup(&shared, handles);
                    return Err(Error::Spawn { id, source });
                }
            }
        }
        drop(ready_tx);

        shared.running.store(true, Ordering::SeqCst);

        // every worker reports once it has parked for the first time
        for _ in 0..num_threads {
            if ready_rx.recv().is_err() {
                shared.running.store(false, Ordering::SeqCst);
                abort_startup(&shared, handles);
                return Err(Error::teardown("worker exited during startup"));
            }
        }

        let thread_ids = handles
            .iter()
            .filter_map(|h| h.thread.as_ref().map(|t| t.thread().id()))
            .collect();

        diagnostics::emit(
            "pool.init",
            log::Level::Debug,
            &format!(
                "{} workers, queue capacity {}",
                num_threads,
                shared.queue.capacity()
            ),
        );

        Ok(Self {
            shared,
            workers: Mutex::new(handles),
            statuses,
            thread_ids,
            num_threads,
            admission: config.admission,
            finalized: AtomicBool::new(false),
        })
    }

    /// Run `f` on some worker without waiting for it.
    pub fn execute<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let _guard = self.begin_submit()?;
        self.dispatch(Task::detached(f));
        Ok(())
    }

    /// Queue `f` and return a handle to its eventual result.
    pub fn submit<F, R>(&self, f: F) -> Result<TaskHandle<R>>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        let _guard = self.begin_submit()?;
        let (task, handle) = Task::awaited(f);
        self.dispatch(task);
        Ok(handle)
    }

    /// Queue `f` and block until a worker has run it.
    pub fn wait_for_result<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        self.submit(f)?.wait()
    }

    /// Poll until at least one worker is not executing, for at most `limit`.
    ///
    /// Returns whether an idle worker was observed.
    pub fn wait_for_availability(&self, limit: Duration) -> bool {
        let deadline = Instant::now() + limit;
        let mut backoff = Backoff::new();
        loop {
            if self.running_now() < self.num_threads {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            backoff.snooze();
        }
    }

    /// Block until the queue is empty and every live worker is parked.
    pub fn sync(&self) -> Result<()> {
        self.reject_worker_thread("sync")?;

        let mut backoff = Backoff::new();
        while self.shared.submitting.load(Ordering::SeqCst) > 0
            || !self.shared.queue.is_empty()
            || self.shared.executing.load(Ordering::SeqCst) > 0
        {
            backoff.snooze();
        }

        backoff.reset();
        while self
            .statuses
            .iter()
            .any(|s| s.state() == WorkerState::Executing)
        {
            backoff.snooze();
        }
        Ok(())
    }

    /// Refuse new submissions and wait for queued work to finish.
    pub fn stop(&self) -> Result<()> {
        if self.shared.running.swap(false, Ordering::SeqCst) {
            log::debug!("stopping pool of {} workers", self.num_threads);
        }
        self.sync()
    }

    /// Tear the workers down. The pool must be stopped first.
    pub fn finalize(&self) -> Result<()> {
        if self.shared.running.load(Ordering::SeqCst) {
            return Err(Error::StillRunning);
        }
        self.reject_worker_thread("finalize")?;
        if self.finalized.swap(true, Ordering::SeqCst) {
            return Err(Error::AlreadyFinalized);
        }

        // a concurrent stop() may still be draining
        self.sync()?;

        let torn_down = self.teardown_workers();
        debug_assert_eq!(torn_down, self.num_threads);
        if torn_down != self.num_threads {
            return Err(Error::teardown(format!(
                "tore down {} of {} workers",
                torn_down, self.num_threads
            )));
        }

        let leftovers = self.shared.queue.drain();
        if !leftovers.is_empty() {
            log::warn!("{} queued tasks dropped at finalize", leftovers.len());
        }

        diagnostics::emit(
            "pool.finalize",
            log::Level::Debug,
            &format!("{} workers joined", torn_down),
        );
        Ok(())
    }

    /// Configured number of workers.
    pub fn workers(&self) -> usize {
        self.num_threads
    }

    /// Workers currently executing a task.
    pub fn running_now(&self) -> usize {
        self.shared.executing.load(Ordering::SeqCst)
    }

    /// Workers currently parked on the work signal.
    pub fn parked_now(&self) -> usize {
        self.shared.parked.load(Ordering::SeqCst)
    }

    /// Tasks queued but not yet picked up.
    pub fn pending(&self) -> usize {
        self.shared.queue.len()
    }

    pub fn queue_capacity(&self) -> usize {
        self.shared.queue.capacity()
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized.load(Ordering::SeqCst)
    }

    pub fn worker_state(&self, id: WorkerId) -> Option<WorkerState> {
        self.statuses.get(id).map(|s| s.state())
    }

    pub fn stats(&self) -> PoolStats {
        let per_worker: Vec<WorkerSnapshot> = self
            .statuses
            .iter()
            .enumerate()
            .map(|(id, s)| WorkerSnapshot {
                id,
                state: s.state(),
                tasks_executed: s.tasks_executed.load(Ordering::Relaxed),
                tasks_panicked: s.tasks_panicked.load(Ordering::Relaxed),
                busy_time_ns: s.busy_time_ns.load(Ordering::Relaxed),
            })
            .collect();

        PoolStats {
            workers: self.num_threads,
            executing: self.running_now(),
            parked: self.parked_now(),
            pending: self.pending(),
            queue_capacity: self.queue_capacity(),
            tasks_executed: per_worker.iter().map(|w| w.tasks_executed).sum(),
            tasks_panicked: per_worker.iter().map(|w| w.tasks_panicked).sum(),
            per_worker,
        }
    }

    fn begin_submit(&self) -> Result<SubmitGuard<'_>> {
        self.shared.submitting.fetch_add(1, Ordering::SeqCst);
        let guard = SubmitGuard(&self.shared.submitting);
        if !self.shared.running.load(Ordering::SeqCst) {
            return Err(Error::NotRunning);
        }
        Ok(guard)
    }

    fn dispatch(&self, task: Task) {
        if let AdmissionPolicy::WaitForIdle { poll_limit } = self.admission {
            if !self.wait_for_availability(poll_limit) {
                log::trace!("no idle worker after {:?}, queueing {:?}", poll_limit, task.id);
            }
        }
        self.shared.queue.enqueue(task);
        self.shared.broadcast();
    }

    fn on_worker_thread(&self) -> bool {
        let me = thread::current().id();
        self.thread_ids.contains(&me)
    }

    fn reject_worker_thread(&self, op: &str) -> Result<()> {
        if self.on_worker_thread() {
            return Err(Error::teardown(format!(
                "{} called from one of the pool's own workers",
                op
            )));
        }
        Ok(())
    }

    /// Raise the teardown token, wait for every worker to leave its loop and
    /// join them. Returns the number of workers joined.
    fn teardown_workers(&self) -> usize {
        self.shared.destroying.store(true, Ordering::SeqCst);

        let mut backoff = Backoff::new();
        while self.shared.live.load(Ordering::SeqCst) > 0 {
            self.shared.broadcast();
            backoff.snooze();
        }

        let mut torn_down = 0;
        for handle in self.workers.lock().iter_mut() {
            if let Some(thread) = handle.thread.take() {
                if thread.join().is_err() {
                    log::error!("worker {} panicked outside a task", handle.id);
                }
                torn_down += 1;
            }
        }
        torn_down
    }
}

impl std::fmt::Debug for ThreadPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadPool")
            .field("workers", &self.num_threads)
            .field("running", &self.is_running())
            .field("executing", &self.running_now())
            .field("pending", &self.pending())
            .field("finalized", &self.is_finalized())
            .finish()
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        if self.is_finalized() {
            return;
        }

        if self.on_worker_thread() {
            // can't join ourselves; let the workers exit on their own
            self.shared.running.store(false, Ordering::SeqCst);
            self.shared.destroying.store(true, Ordering::SeqCst);
            self.shared.broadcast();
            return;
        }

        if let Err(e) = self.stop().and_then(|_| self.finalize()) {
            log::error!("pool teardown on drop failed: {}", e);
        }
    }
}

/// Stop and join workers spawned before a failed startup.
fn abort_startup(shared: &Shared, handles: Vec<WorkerHandle>) {
    shared.destroying.store(true, Ordering::SeqCst);
    shared.broadcast();
    for handle in handles {
        if let Some(thread) = handle.thread {
            let _ = thread.join();
        }
    }
}
