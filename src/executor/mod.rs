//! Task execution infrastructure.
//!
//! This module provides the thread pool, its workers, the task and result
//! handle types, and panic isolation for task bodies.

pub mod panic_handler;
pub mod task;
pub mod thread_pool;
pub mod worker;

pub use panic_handler::{PanicHandler, PanicInfo, PanicStrategy};
pub use task::{TaskHandle, TaskId, TaskMode};
pub use thread_pool::{PoolStats, ThreadPool, WorkerSnapshot};
pub use worker::{WorkerId, WorkerState};

pub(crate) use task::Task;
