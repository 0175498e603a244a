//! Time source for the fixed pauses of the boot sequence.
use std::{thread, time::Duration};

use crate::constants::PARK_INTERVAL;

/// Blocking sleeps used by the supervisor and the pre-loop gates.
pub trait Clock {
    /// Blocks for `duration`. Not cancellable once entered.
    fn sleep(&self, duration: Duration);

    /// Blocks forever. Used after a halt that needs operator intervention.
    fn park(&self) -> ! {
        loop {
            self.sleep(PARK_INTERVAL);
        }
    }
}

/// Wall-clock implementation backed by [`std::thread::sleep`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn sleep(&self, duration: Duration) {
        thread::sleep(duration);
    }
}
