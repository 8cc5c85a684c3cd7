use crate::config::Config;
use crate::error::{Error, Result};
use crate::executor::ThreadPool;
use crate::hardware::HardwareProbe;
use parking_lot::RwLock;
use std::sync::Arc;

/// Process-wide pool plus the hardware it was sized for.
#[derive(Debug)]
pub struct Runtime {
    pool: ThreadPool,
    hardware: HardwareProbe,
    config: Config,
}

impl Runtime {
    pub fn new(mut config: Config) -> Result<Self> {
        config.validate()?;

        let hardware = HardwareProbe::init();
        if config.num_threads.is_none() {
            config.num_threads = Some(hardware.suggested_workers());
        }

        let pool = ThreadPool::with_config(&config)?;

        Ok(Self {
            pool,
            hardware,
            config,
        })
    }

    pub fn pool(&self) -> &ThreadPool {
        &self.pool
    }

    pub fn hardware(&self) -> &HardwareProbe {
        &self.hardware
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Stop and finalize the pool, then release the hardware probe.
    pub fn close(&self) -> Result<()> {
        self.pool.stop()?;
        self.pool.finalize()?;
        self.hardware.finalize();
        Ok(())
    }
}

// Global runtime for simple API
static GLOBAL_RUNTIME: RwLock<Option<Arc<Runtime>>> = RwLock::new(None);

pub fn init() -> Result<()> {
    init_with_config(Config::default())
}

pub fn init_with_config(config: Config) -> Result<()> {
    let mut runtime = GLOBAL_RUNTIME.write();

    if runtime.is_some() {
        return Err(Error::AlreadyInitialized);
    }

    *runtime = Some(Arc::new(Runtime::new(config)?));
    Ok(())
}

pub fn current() -> Result<Arc<Runtime>> {
    GLOBAL_RUNTIME
        .read()
        .as_ref()
        .cloned()
        .ok_or(Error::NotInitialized)
}

/// Fire-and-forget on the global pool.
pub fn execute<F>(f: F) -> Result<()>
where
    F: FnOnce() + Send + 'static,
{
    current()?.pool().execute(f)
}

/// Submit-and-wait on the global pool.
pub fn wait_for_result<F, R>(f: F) -> Result<R>
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    current()?.pool().wait_for_result(f)
}

/// Tear down the global runtime. A no-op when none is installed.
pub fn shutdown() -> Result<()> {
    let runtime = GLOBAL_RUNTIME.write().take();
    match runtime {
        Some(rt) => rt.close(),
        None => Ok(()),
    }
}
