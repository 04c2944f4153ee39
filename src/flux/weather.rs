//! Cloud-cover adjustment of the raw window signal.
//!
//! Buckets split the cloud fraction into half-open ranges, each carrying a
//! signed percentage for CT and BRI. A non-negative percentage pushes the
//! value toward 1.0 by that share of the remaining headroom; a negative one
//! pulls it toward 0.0 by that share of the value itself (`v + pct * v`).
//! Percentage adjustments are skipped in dark windows. Brightness also gets
//! an unconditional lift proportional to the cloud fraction.

use serde::{Deserialize, Serialize};

use super::Signal;
use crate::constants::{CLOUD_BRIGHTNESS_BOOST, NEUTRAL_CLOUDS_MAX};

/// Half-open range `[min, max)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MinMax {
    pub min: f64,
    pub max: f64,
}

impl MinMax {
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value < self.max
    }
}

/// Cloud-fraction bucket with its signed CT/BRI percentages.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeatherBucket {
    pub clouds: MinMax,
    #[serde(default)]
    pub ct_pct: f64,
    #[serde(default)]
    pub bri_pct: f64,
}

impl WeatherBucket {
    /// Zero-adjustment bucket used when no configured bucket matches.
    pub const fn neutral() -> Self {
        Self {
            clouds: MinMax {
                min: 0.0,
                max: NEUTRAL_CLOUDS_MAX,
            },
            ct_pct: 0.0,
            bri_pct: 0.0,
        }
    }
}

/// First bucket, in configured order, whose range contains `clouds`.
pub fn select_bucket(buckets: &[WeatherBucket], clouds: f64) -> WeatherBucket {
    buckets
        .iter()
        .find(|bucket| bucket.clouds.contains(clouds))
        .copied()
        .unwrap_or(WeatherBucket::neutral())
}

/// Apply a signed percentage to a normalized value.
pub fn adjust(value: f64, pct: f64) -> f64 {
    if pct >= 0.0 {
        value + pct * (1.0 - value)
    } else {
        value + pct * value
    }
}

/// Blend the raw window signal with the current cloud cover.
pub fn blend(raw: Signal, dark: bool, clouds: f64, bucket: &WeatherBucket) -> Signal {
    let mut ct = raw.ct;
    let mut bri = raw.bri + clouds * CLOUD_BRIGHTNESS_BOOST * (1.0 - raw.bri);

    if !dark {
        ct = adjust(ct, bucket.ct_pct);
        bri = adjust(bri, bucket.bri_pct);
    }

    Signal { ct, bri }
}
