//! Clock
//!
//! Time source for TTL bookkeeping and for the calendar date embedded in
//! quota keys. Tests swap in [`MockClock`] to control both.

use chrono::NaiveDate;
use std::fmt::Debug;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Port for obtaining the current time and date
pub trait Clock: Send + Sync + Debug {
    /// Monotonic instant used for expiry
    fn now(&self) -> Instant;

    /// Current calendar date in the service's local timezone
    fn today(&self) -> NaiveDate;
}

/// System clock using `Instant::now()` and `chrono::Local`
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl SystemClock {
    /// Create a new system clock
    pub fn new() -> Self {
        Self
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn today(&self) -> NaiveDate {
        chrono::Local::now().date_naive()
    }
}

#[derive(Debug)]
struct MockTime {
    instant: Instant,
    date: NaiveDate,
}

/// Controllable clock for tests.
///
/// Clones share the same underlying time, so advancing one advances all.
#[derive(Debug, Clone)]
pub struct MockClock {
    current: Arc<Mutex<MockTime>>,
}

impl MockClock {
    /// Create a mock clock starting at `start` on `date`
    pub fn new(start: Instant, date: NaiveDate) -> Self {
        Self {
            current: Arc::new(Mutex::new(MockTime {
                instant: start,
                date,
            })),
        }
    }

    /// Mock clock starting now, on today's local date
    pub fn starting_now() -> Self {
        Self::new(Instant::now(), chrono::Local::now().date_naive())
    }

    /// Advance the monotonic clock by `duration`
    pub fn advance(&self, duration: Duration) {
        let mut time = self.current.lock().expect("MockClock mutex poisoned");
        time.instant += duration;
    }

    /// Set the calendar date
    pub fn set_date(&self, date: NaiveDate) {
        let mut time = self.current.lock().expect("MockClock mutex poisoned");
        time.date = date;
    }
}

impl Clock for MockClock {
    fn now(&self) -> Instant {
        self.current.lock().expect("MockClock mutex poisoned").instant
    }

    fn today(&self) -> NaiveDate {
        self.current.lock().expect("MockClock mutex poisoned").date
    }
}
