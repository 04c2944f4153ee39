//! Time source abstraction.
//!
//! The cycle driver asks a [`TimeSource`] for "now" instead of reading the
//! clock directly, so tests can pin the instant a cycle is computed for.

use chrono::{DateTime, Local};
use std::sync::Mutex;

pub trait TimeSource: Send {
    fn now(&self) -> DateTime<Local>;
}

/// Wall-clock time.
pub struct RealTimeSource;

impl TimeSource for RealTimeSource {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// A settable clock for tests.
pub struct FixedTimeSource {
    current: Mutex<DateTime<Local>>,
}

impl FixedTimeSource {
    pub fn new(at: DateTime<Local>) -> Self {
        Self {
            current: Mutex::new(at),
        }
    }

    pub fn set(&self, at: DateTime<Local>) {
        if let Ok(mut current) = self.current.lock() {
            *current = at;
        }
    }

    pub fn advance(&self, by: chrono::Duration) {
        if let Ok(mut current) = self.current.lock() {
            *current += by;
        }
    }
}

impl TimeSource for FixedTimeSource {
    fn now(&self) -> DateTime<Local> {
        match self.current.lock() {
            Ok(current) => *current,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

impl<T: TimeSource + Sync> TimeSource for std::sync::Arc<T> {
    fn now(&self) -> DateTime<Local> {
        (**self).now()
    }
}
