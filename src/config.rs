use crate::error::{Error, Result};
use crate::executor::PanicStrategy;
use std::time::Duration;

/// Upper bound on the worker count accepted by [`Config::validate`].
pub const MAX_THREADS: usize = 1024;

/// How submitters behave when every worker is busy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionPolicy {
    /// Enqueue right away and let the queue absorb the burst.
    Immediate,

    /// Poll with backoff until a worker is idle, giving up after
    /// `poll_limit` and enqueueing anyway.
    WaitForIdle { poll_limit: Duration },
}

impl Default for AdmissionPolicy {
    fn default() -> Self {
        AdmissionPolicy::WaitForIdle {
            poll_limit: Duration::from_millis(2),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub num_threads: Option<usize>,
    pub thread_name_prefix: String,
    pub stack_size: Option<usize>,
    pub pin_workers: bool,

    /// Longest a parked worker sleeps before re-checking for teardown.
    pub park_timeout: Duration,

    /// Queue slots preallocated per worker.
    pub queue_prealloc_factor: usize,

    pub admission: AdmissionPolicy,
    pub panic_strategy: PanicStrategy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            num_threads: None,
            thread_name_prefix: "spindle-worker".to_string(),
            stack_size: Some(2 * 1024 * 1024),
            pin_workers: false,
            park_timeout: Duration::from_millis(10),
            queue_prealloc_factor: 1,
            admission: AdmissionPolicy::default(),
            panic_strategy: PanicStrategy::default(),
        }
    }
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(n) = self.num_threads {
            if n == 0 {
                return Err(Error::config("num_threads must be > 0"));
            }
            if n > MAX_THREADS {
                return Err(Error::config(format!(
                    "num_threads too large (max {})",
                    MAX_THREADS
                )));
            }
        }

        if self.park_timeout.is_zero() {
            return Err(Error::config("park_timeout must be > 0"));
        }

        if self.queue_prealloc_factor == 0 {
            return Err(Error::config("queue_prealloc_factor must be > 0"));
        }

        if self.thread_name_prefix.contains('\0') {
            return Err(Error::config("thread_name_prefix must not contain NUL"));
        }

        if let Some(0) = self.stack_size {
            return Err(Error::config("stack_size must be > 0"));
        }

        Ok(())
    }

    pub fn worker_threads(&self) -> usize {
        self.num_threads.unwrap_or_else(num_cpus::get)
    }

    pub fn queue_prealloc(&self) -> usize {
        self.worker_threads() * self.queue_prealloc_factor
    }
}

#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn num_threads(mut self, n: usize) -> Self {
        self.config.num_threads = Some(n);
        self
    }

    pub fn thread_name_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.config.thread_name_prefix = prefix.into();
        self
    }

    pub fn stack_size(mut self, size: usize) -> Self {
        self.config.stack_size = Some(size);
        self
    }

    pub fn pin_workers(mut self, pin: bool) -> Self {
        self.config.pin_workers = pin;
        self
    }

    pub fn park_timeout(mut self, timeout: Duration) -> Self {
        self.config.park_timeout = timeout;
        self
    }

    pub fn queue_prealloc_factor(mut self, factor: usize) -> Self {
        self.config.queue_prealloc_factor = factor;
        self
    }

    pub fn admission(mut self, policy: AdmissionPolicy) -> Self {
        self.config.admission = policy;
        self
    }

    pub fn panic_strategy(mut self, strategy: PanicStrategy) -> Self {
        self.config.panic_strategy = strategy;
        self
    }

    pub fn build(self) -> Result<Config> {
        self.config.validate()?;
        Ok(self.config)
    }
}
