//! Named moments of the current day.
//!
//! Base moments arrive from the sun sensor as time windows (`dawn`,
//! `sunrise`, `sunset`, ...). Each window contributes two entries,
//! `<name>.begin` and `<name>.end`. Configured [`MomentShift`] requests then
//! add derived entries: a base entry moved by a number of minutes and stored
//! under the base name with the request's tag appended.

use chrono::{DateTime, Local, TimeDelta};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::sensor::TimeWindow;

/// A derived moment: `moment` shifted by `shift` minutes, stored as `moment + tag`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MomentShift {
    pub moment: String,
    #[serde(default)]
    pub shift: i64,
    pub tag: String,
}

impl MomentShift {
    pub fn key(&self) -> String {
        format!("{}{}", self.moment, self.tag)
    }
}

/// Lookup table from moment name to absolute time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Moments(HashMap<String, DateTime<Local>>);

impl Moments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the base table from sun sensor time windows.
    pub fn from_time_windows(windows: &[TimeWindow]) -> Self {
        let mut moments = Self::new();
        for window in windows {
            moments.insert(format!("{}.begin", window.name), window.begin);
            moments.insert(format!("{}.end", window.name), window.end);
        }
        moments
    }

    pub fn insert(&mut self, name: impl Into<String>, at: DateTime<Local>) {
        self.0.insert(name.into(), at);
    }

    pub fn get(&self, name: &str) -> Option<DateTime<Local>> {
        self.0.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Result of [`resolve`]: the extended table plus the requests that were dropped.
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    pub moments: Moments,
    pub unresolved: Vec<String>,
}

/// Extend `base` with every shift request whose base moment exists.
///
/// Shifts only ever reference base moments, never other derived ones, so the
/// result does not depend on the order of `shifts`. Requests naming an unknown
/// moment, or whose shift leaves the representable time range, are left out
/// of the table and listed in [`Resolution::unresolved`].
pub fn resolve(base: &Moments, shifts: &[MomentShift]) -> Resolution {
    let mut moments = base.clone();
    let mut unresolved = Vec::new();

    for shift in shifts {
        let shifted = base.get(&shift.moment).and_then(|at| {
            TimeDelta::try_minutes(shift.shift).and_then(|delta| at.checked_add_signed(delta))
        });
        match shifted {
            Some(at) => moments.insert(shift.key(), at),
            None => unresolved.push(shift.moment.clone()),
        }
    }

    Resolution {
        moments,
        unresolved,
    }
}
