pub use crate::collections::{FifoQueue, NodeHandle, NodeStore, SyncFifoQueue};
pub use crate::config::{AdmissionPolicy, Config, ConfigBuilder};
pub use crate::error::{Error, Result};
pub use crate::executor::{PanicStrategy, PoolStats, TaskHandle, ThreadPool, WorkerState};
pub use crate::hardware::HardwareProbe;
pub use crate::{init, init_with_config, shutdown};
