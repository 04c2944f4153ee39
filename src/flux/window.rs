//! Light-time windows and selection of the active one.
//!
//! A window spans two named moments and carries the CT/BRI curves to apply
//! across it. Only the local time of day of the resolved bounds matters, so a
//! window describes a range that recurs every day; when the end falls earlier
//! in the day than the start, the range wraps across midnight.
//!
//! Such a window is accepted as is. It covers the late part of one day and the
//! early part of the next, for example from `sunset.end` to `sunrise.begin`,
//! even though the resolved start lies after the resolved end on the calendar.

use chrono::{DateTime, Local, Timelike};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::cmp::Ordering;

use super::curve::Curve;
use super::moments::Moments;
use crate::constants::{DARK, FALLBACK_DARKNESS, FALLBACK_SIGNAL, SECONDS_PER_DAY};

/// One configured light-time window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LightTime {
    /// Moment name opening the window, e.g. `"sunrise.begin"`.
    pub start: String,
    /// Moment name closing the window.
    pub end: String,
    /// Darkness classification; only `"dark"` changes engine behavior.
    pub darkness: String,
    pub ct: Curve,
    pub bri: Curve,
}

impl LightTime {
    /// Window used when nothing else contains "now": flat curves at the
    /// fallback level and an `"unknown"` darkness classification.
    pub fn fallback() -> Self {
        Self {
            start: String::new(),
            end: String::new(),
            darkness: FALLBACK_DARKNESS.to_string(),
            ct: Curve::constant(FALLBACK_SIGNAL),
            bri: Curve::constant(FALLBACK_SIGNAL),
        }
    }

    pub fn is_dark(&self) -> bool {
        self.darkness == DARK
    }

    /// Look up both bounds; `None` when either moment is missing.
    pub fn resolve(&self, moments: &Moments) -> Option<ResolvedWindow> {
        Some(ResolvedWindow {
            start: moments.get(&self.start)?,
            end: moments.get(&self.end)?,
        })
    }
}

/// Absolute bounds of a window for today.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedWindow {
    pub start: DateTime<Local>,
    pub end: DateTime<Local>,
}

impl ResolvedWindow {
    fn start_seconds(&self) -> i64 {
        seconds_of_day(self.start)
    }

    fn end_seconds(&self) -> i64 {
        seconds_of_day(self.end)
    }

    /// A window whose bounds share the same second of the day spans nothing.
    pub fn is_empty(&self) -> bool {
        self.start_seconds() == self.end_seconds()
    }

    /// Whether `now` lies within `[start, end]` by time of day.
    ///
    /// Sub-second precision is discarded, which makes the end inclusive of
    /// its whole terminal second.
    pub fn contains(&self, now: DateTime<Local>) -> bool {
        let (start, end, t) = (
            self.start_seconds(),
            self.end_seconds(),
            seconds_of_day(now),
        );

        match start.cmp(&end) {
            Ordering::Less => t >= start && t <= end,
            Ordering::Greater => t >= start || t <= end,
            Ordering::Equal => false,
        }
    }

    /// Normalized position of `now` in the window, floored to two decimals.
    pub fn position(&self, now: DateTime<Local>) -> f64 {
        let start = self.start_seconds();
        let mut end = self.end_seconds();
        let mut t = seconds_of_day(now);

        if end < start {
            end += SECONDS_PER_DAY;
            if t < start {
                t += SECONDS_PER_DAY;
            }
        }

        truncated_position(t - start, end - start)
    }
}

fn seconds_of_day(at: DateTime<Local>) -> i64 {
    i64::from(at.time().num_seconds_from_midnight())
}

/// `elapsed / span` floored to hundredths, computed in integers so that
/// values like 0.29 are not lost to binary rounding. A non-positive span
/// yields `0.0`.
pub fn truncated_position(elapsed: i64, span: i64) -> f64 {
    if span <= 0 {
        return 0.0;
    }
    let hundredths = (elapsed * 100).div_euclid(span);
    hundredths as f64 / 100.0
}

/// The window chosen for a cycle.
#[derive(Debug, Clone)]
pub struct Selection<'a> {
    /// Index into the configured list; `None` for the fallback window.
    pub index: Option<usize>,
    pub window: Cow<'a, LightTime>,
    /// Position inside the window in `{0.00, 0.01, ..., 1.00}`.
    pub x: f64,
    /// Windows that could not be resolved against the moment table.
    pub unresolved: Vec<usize>,
}

impl Selection<'_> {
    pub fn fallback(unresolved: Vec<usize>) -> Self {
        Selection {
            index: None,
            window: Cow::Owned(LightTime::fallback()),
            x: 0.0,
            unresolved,
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.index.is_none()
    }
}

/// Pick the first window, in declared order, that contains `now`.
///
/// Windows with a missing moment, or with empty bounds, are skipped. When no
/// window matches the fallback window is returned at position `0.0`.
pub fn select<'a>(windows: &'a [LightTime], moments: &Moments, now: DateTime<Local>) -> Selection<'a> {
    let mut unresolved = Vec::new();

    for (index, window) in windows.iter().enumerate() {
        let Some(resolved) = window.resolve(moments) else {
            unresolved.push(index);
            continue;
        };
        if resolved.is_empty() || !resolved.contains(now) {
            continue;
        }

        return Selection {
            index: Some(index),
            window: Cow::Borrowed(window),
            x: resolved.position(now).clamp(0.0, 1.0),
            unresolved,
        };
    }

    Selection::fallback(unresolved)
}
