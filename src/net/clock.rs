//! Where the channel gets its timestamps from.
//!
//! The connection core only samples the current time and passes the
//! instant on to the scheduler, which uses it for its own timeout and
//! retry accounting. [`SystemClock`] is the real thing, [`FakeClock`] lets
//! tests move time by hand.

#![warn(missing_docs)]

use std::fmt::Debug;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

//------------ Clock ---------------------------------------------------------

/// A source of instants handed to the scheduler.
pub trait Clock: Clone {
    /// The instant type produced by [`now`][Self::now].
    type Instant: Clone + Debug;

    /// Creates a clock.
    fn new() -> Self;

    /// Samples the current time.
    fn now(&self) -> Self::Instant;
}

//------------ SystemClock ---------------------------------------------------

/// The monotonic system clock.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    type Instant = Instant;

    fn new() -> Self {
        SystemClock
    }

    fn now(&self) -> Instant {
        Instant::now()
    }
}

//------------ FakeClock -----------------------------------------------------

/// A clock that only moves when told to.
///
/// Clones share their time, so a test can keep one handle and advance the
/// clock the channel samples.
#[derive(Clone, Debug, Default)]
pub struct FakeClock {
    offset: Arc<Mutex<Duration>>,
}

impl FakeClock {
    /// Moves the clock forward by `step`, saturating at the maximum.
    pub fn adjust_time(&self, step: Duration) {
        let mut offset =
            self.offset.lock().unwrap_or_else(PoisonError::into_inner);
        *offset = offset.saturating_add(step);
    }
}

impl Clock for FakeClock {
    type Instant = FakeInstant;

    fn new() -> Self {
        Self::default()
    }

    fn now(&self) -> FakeInstant {
        let offset =
            self.offset.lock().unwrap_or_else(PoisonError::into_inner);
        FakeInstant(*offset)
    }
}

//------------ FakeInstant ---------------------------------------------------

/// An instant of a [`FakeClock`].
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct FakeInstant(Duration);

impl FakeInstant {
    /// Returns how far the clock had been advanced when sampled.
    pub fn since_start(self) -> Duration {
        self.0
    }
}

//============ Testing =======================================================
