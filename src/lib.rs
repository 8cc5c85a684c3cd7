//! Spindle - a fixed-size worker thread pool
//!
//! Workers park on a shared FIFO queue and wake when tasks arrive. Tasks are
//! either fire-and-forget or awaited through a [`TaskHandle`]. The queue sits
//! on an arena-backed doubly linked node store that can be used on its own.
//!
//! # Quick Start
//!
//! ```no_run
//! use spindle::prelude::*;
//!
//! let pool = ThreadPool::new(4).unwrap();
//!
//! pool.execute(|| println!("fire and forget")).unwrap();
//! let answer = pool.wait_for_result(|| 6 * 7).unwrap();
//! assert_eq!(answer, 42);
//!
//! pool.stop().unwrap();
//! pool.finalize().unwrap();
//! ```
//!
//! # Features
//!
//! - **Fixed Worker Set**: Workers are started once and parked when idle
//! - **Awaited Tasks**: Submit a closure and block on its return value
//! - **Cooperative Teardown**: Stop, drain and join without cancelling running work
//! - **Panic Isolation**: A panicking task never takes its worker down
//! - **Collections**: FIFO queue and node store usable outside the pool

#![warn(missing_debug_implementations)]

pub mod collections;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod executor;
pub mod hardware;
pub mod prelude;
pub mod runtime;
pub mod util;

// Re-export key types at crate root
pub use config::{AdmissionPolicy, Config, ConfigBuilder};
pub use error::{Error, Result};
pub use executor::{TaskHandle, ThreadPool};
pub use runtime::{init, init_with_config, shutdown};
