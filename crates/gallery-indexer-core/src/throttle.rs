use crate::cancel::CancellationToken;
use std::thread;
use std::time::{Duration, Instant};

/// Granularity at which a pause re-checks the cancellation token.
const SLEEP_SLICE: Duration = Duration::from_millis(250);

/// Blocks the scanning thread for a throttle pause.
pub trait Sleeper: Send + Sync {
    /// Sleeps for `duration` unless `cancel` fires first.
    /// Returns false if the pause was cut short by cancellation.
    fn sleep(&self, duration: Duration, cancel: &CancellationToken) -> bool;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration, cancel: &CancellationToken) -> bool {
        let deadline = Instant::now() + duration;
        loop {
            if cancel.is_cancelled() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            thread::sleep((deadline - now).min(SLEEP_SLICE));
        }
    }
}

/// What the scanner should do after recording a processed file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThrottleDecision {
    Continue,
    Pause(Duration),
}

/// Pause-after-N-files policy.
///
/// The counter is global to one run: recursion depth does not reset it.
/// Only a pause resets it back to zero.
#[derive(Debug, Clone)]
pub struct Throttle {
    pause_after: u64,
    pause: Duration,
    since_pause: u64,
}

impl Throttle {
    pub fn new(pause_after: u64, pause: Duration) -> Self {
        Self {
            pause_after: pause_after.max(1),
            pause,
            since_pause: 0,
        }
    }

    /// Records one processed file and reports whether a pause is due now.
    pub fn record_file(&mut self) -> ThrottleDecision {
        self.since_pause += 1;
        if self.since_pause >= self.pause_after {
            self.since_pause = 0;
            ThrottleDecision::Pause(self.pause)
        } else {
            ThrottleDecision::Continue
        }
    }
}
