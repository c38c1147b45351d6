//! Injected time source for all kernel services.
//!
//! No service reads the wall clock directly; every service receives a
//! `Clock` so that posting, audit, and period close are deterministic under
//! test and replay.

use std::collections::VecDeque;
use std::sync::Mutex;

use chrono::{DateTime, NaiveDate, Utc};

/// A source of the current instant.
pub trait Clock: Send + Sync {
    /// The current instant.
    fn now(&self) -> DateTime<Utc>;

    /// The current date, derived from [`Clock::now`].
    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }
}

/// Production clock backed by the system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Test clock that always returns one fixed instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
    instant: DateTime<Utc>,
}

impl FixedClock {
    /// Creates a clock frozen at `instant`.
    #[must_use]
    pub const fn new(instant: DateTime<Utc>) -> Self {
        Self { instant }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.instant
    }
}

/// Test clock that returns supplied instants in order.
///
/// After the queue is exhausted it keeps returning the last supplied
/// instant rather than failing, so long test flows keep a stable "current"
/// time once the scripted sequence runs out.
#[derive(Debug)]
pub struct SequentialClock {
    queue: Mutex<VecDeque<DateTime<Utc>>>,
    last: Mutex<DateTime<Utc>>,
}

impl SequentialClock {
    /// Creates a clock that yields `instants` in order.
    ///
    /// # Panics
    ///
    /// Panics if `instants` is empty.
    #[must_use]
    pub fn new(instants: Vec<DateTime<Utc>>) -> Self {
        assert!(
            !instants.is_empty(),
            "SequentialClock requires at least one instant"
        );
        let last = instants[0];
        Self {
            queue: Mutex::new(instants.into()),
            last: Mutex::new(last),
        }
    }
}

impl Clock for SequentialClock {
    fn now(&self) -> DateTime<Utc> {
        let mut queue = self.queue.lock().expect("clock queue poisoned");
        let mut last = self.last.lock().expect("clock state poisoned");
        if let Some(next) = queue.pop_front() {
            *last = next;
        }
        *last
    }
}
