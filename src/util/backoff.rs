//! Backoff for the pool's polling loops (drain, admission, teardown).

use std::hint::spin_loop;
use std::thread;
use std::time::Duration;

/// Spin, then yield, then sleep with a doubling interval capped at
/// [`Backoff::MAX_SLEEP`].
#[derive(Debug, Default)]
pub struct Backoff {
    step: u32,
}

impl Backoff {
    const SPIN_LIMIT: u32 = 6;
    const YIELD_LIMIT: u32 = 10;
    const MIN_SLEEP: Duration = Duration::from_micros(10);

    /// Longest single sleep taken by [`snooze`](Self::snooze).
    pub const MAX_SLEEP: Duration = Duration::from_millis(1);

    pub fn new() -> Self {
        Self { step: 0 }
    }

    pub fn reset(&mut self) {
        self.step = 0;
    }

    /// Wait for another thread to make progress.
    pub fn snooze(&mut self) {
        if self.step <= Self::SPIN_LIMIT {
            for _ in 0..(1u32 << self.step) {
                spin_loop();
            }
        } else if self.step <= Self::YIELD_LIMIT {
            thread::yield_now();
        } else {
            thread::sleep(self.sleep_interval());
        }
        self.step = self.step.saturating_add(1);
    }

    fn sleep_interval(&self) -> Duration {
        let exp = (self.step - Self::YIELD_LIMIT - 1).min(7);
        (Self::MIN_SLEEP * (1 << exp)).min(Self::MAX_SLEEP)
    }
}
