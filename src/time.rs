// src/time.rs
//
// Time is only ever observed through an injected clock. Nothing in the crate
// reads a global clock on its own, which keeps time-based waits fully
// deterministic under test.

use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant};

use crate::task::{Step, Task};

/// A monotonic clock measured from an arbitrary epoch.
pub trait SteadyClock {
    fn now(&self) -> Duration;
}

/// Production clock backed by `std::time::Instant`.
pub struct InstantClock {
    origin: Instant,
}

impl InstantClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for InstantClock {
    fn default() -> Self {
        Self::new()
    }
}

impl SteadyClock for InstantClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Test clock advanced by hand.
#[derive(Default)]
pub struct ManualClock {
    now: Cell<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }

    pub fn set(&self, to: Duration) {
        self.now.set(to);
    }
}

impl SteadyClock for ManualClock {
    fn now(&self) -> Duration {
        self.now.get()
    }
}

/// Completes once `duration` has elapsed on `clock`, measured from the task's
/// first resume.
pub fn delay(duration: Duration, clock: Rc<dyn SteadyClock>) -> Task<()> {
    let mut started: Option<Duration> = None;
    Task::from_fn(move || {
        let now = clock.now();
        let start = *started.get_or_insert(now);
        if now.saturating_sub(start) >= duration {
            Step::Done(())
        } else {
            Step::Pending
        }
    })
}
