//! The circadian signal pipeline.
//!
//! This module turns the latest configuration and sensor snapshots into a
//! normalized color-temperature/brightness [`Signal`] for the current instant:
//!
//! 1. [`moments::resolve`] extends the sun moments with configured shifts
//! 2. [`window::select`] finds the active light-time window and the position in it
//! 3. the window's curves give the raw signal at that position
//! 4. [`weather::blend`] applies the cloud-cover bucket
//! 5. the active [`season::Season`] remaps the result
//!
//! Everything here is pure; smoothing and publishing live in `core`.
//!
//! CT runs from 0.0 (coldest) to 1.0 (warmest) and BRI from 0.0 (very dim)
//! to 1.0 (very bright). Light types map these onto their device ranges.

pub mod curve;
pub mod moments;
pub mod season;
pub mod weather;
pub mod window;

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use crate::constants::{LIGHT_SENSOR_PREFIX, MAXIMUM_MOMENT_SHIFT_MINUTES};
use curve::Curve;
use moments::{MomentShift, Moments};
use season::Season;
use weather::{MinMax, WeatherBucket};
use window::LightTime;

/// Normalized color temperature and brightness.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Signal {
    pub ct: f64,
    pub bri: f64,
}

impl Signal {
    pub const fn new(ct: f64, bri: f64) -> Self {
        Self { ct, bri }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CT {:.3} / BRI {:.3}", self.ct, self.bri)
    }
}

/// Device families that receive their own output message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LightKind {
    /// Philips Hue bridge lamps.
    Hue,
    /// Yeelight lamps.
    Yee,
    /// Zigbee lamps behind a ConBee gateway.
    Conbee,
}

impl LightKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LightKind::Hue => "hue",
            LightKind::Yee => "yee",
            LightKind::Conbee => "conbee",
        }
    }

    /// Sensor name carried inside the output payload.
    pub fn sensor_name(&self) -> String {
        format!("{LIGHT_SENSOR_PREFIX}{}", self.as_str())
    }

    /// Output topic below `prefix`.
    pub fn topic(&self, prefix: &str) -> String {
        format!("{prefix}{}/", self.as_str())
    }
}

impl fmt::Display for LightKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Final per-device curves applied at fan-out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LightType {
    #[serde(rename = "name")]
    pub kind: LightKind,
    pub ct: Curve,
    pub bri: Curve,
}

impl LightType {
    pub fn apply(&self, signal: Signal) -> Signal {
        Signal {
            ct: self.ct.evaluate(signal.ct),
            bri: self.bri.evaluate(signal.bri),
        }
    }
}

/// Engine configuration, received as one JSON message and replaced wholesale.
///
/// ```json
/// {
///   "moments":    [{"moment": "sunset.begin", "shift": -30, "tag": ".early"}],
///   "lighttime":  [{"start": "sunrise.begin", "end": "sunset.begin.early",
///                   "darkness": "light", "ct": [{"x":0,"y":0.4},{"x":1,"y":0.1}],
///                   "bri": [{"x":0,"y":0.6},{"x":1,"y":1.0}]}],
///   "weather":    [{"clouds": {"min": 0.5, "max": 1.0}, "ct_pct": 0.3, "bri_pct": 0.1}],
///   "seasons":    [{"name": "winter", "ct": [...], "bri": [...]}],
///   "lighttypes": [{"name": "hue", "ct": [{"x":0,"y":153},{"x":1,"y":500}], "bri": [...]}]
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FluxConfig {
    #[serde(default)]
    pub moments: Vec<MomentShift>,
    #[serde(default)]
    pub lighttime: Vec<LightTime>,
    #[serde(default)]
    pub weather: Vec<WeatherBucket>,
    #[serde(default)]
    pub seasons: Vec<Season>,
    #[serde(default)]
    pub lighttypes: Vec<LightType>,
}

impl FluxConfig {
    /// Parse and validate a configuration payload.
    pub fn from_json(payload: &str) -> Result<Self> {
        let config: FluxConfig =
            serde_json::from_str(payload).context("Failed to parse flux configuration")?;
        config
            .validate()
            .context("Rejected invalid flux configuration")?;
        Ok(config)
    }

    /// Check every record so that a cycle can never see malformed data.
    pub fn validate(&self) -> Result<()> {
        for shift in &self.moments {
            if shift.moment.is_empty() {
                anyhow::bail!("moment shift is missing its base moment name");
            }
            if shift.tag.is_empty() {
                anyhow::bail!(
                    "moment shift of '{}' needs a tag, otherwise it would overwrite its base",
                    shift.moment
                );
            }
            if shift.shift.unsigned_abs() > MAXIMUM_MOMENT_SHIFT_MINUTES.unsigned_abs() {
                anyhow::bail!(
                    "moment shift of '{}' ({} min) exceeds {} minutes",
                    shift.moment,
                    shift.shift,
                    MAXIMUM_MOMENT_SHIFT_MINUTES
                );
            }
        }

        for (index, window) in self.lighttime.iter().enumerate() {
            if window.start.is_empty() || window.end.is_empty() {
                anyhow::bail!("lighttime[{index}] needs both a start and an end moment");
            }
            window.ct.validate(&format!("lighttime[{index}] ct"))?;
            window.bri.validate(&format!("lighttime[{index}] bri"))?;
        }

        for (index, bucket) in self.weather.iter().enumerate() {
            let MinMax { min, max } = bucket.clouds;
            if min.is_nan() || max.is_nan() || min >= max {
                anyhow::bail!("weather[{index}] cloud range [{min}, {max}) is empty");
            }
            for (label, pct) in [("ct_pct", bucket.ct_pct), ("bri_pct", bucket.bri_pct)] {
                if !(-1.0..=1.0).contains(&pct) {
                    anyhow::bail!("weather[{index}] {label} ({pct}) must be between -1 and 1");
                }
            }
        }

        let mut season_names = HashSet::new();
        for season in &self.seasons {
            if !season_names.insert(season.name.as_str()) {
                anyhow::bail!("season '{}' is defined more than once", season.name);
            }
            season.ct.validate(&format!("season '{}' ct", season.name))?;
            season.bri.validate(&format!("season '{}' bri", season.name))?;
        }

        let mut kinds = HashSet::new();
        for light in &self.lighttypes {
            if !kinds.insert(light.kind) {
                anyhow::bail!("light type '{}' is defined more than once", light.kind);
            }
            light.ct.validate(&format!("light type '{}' ct", light.kind))?;
            light.bri.validate(&format!("light type '{}' bri", light.kind))?;
        }

        Ok(())
    }
}

/// Everything one pass of the pipeline produced, stage by stage.
#[derive(Debug, Clone)]
pub struct Computation {
    /// Index of the active window, `None` when the fallback window was used.
    pub window: Option<usize>,
    pub darkness: String,
    pub x: f64,
    pub clouds: f64,
    pub bucket: WeatherBucket,
    pub raw: Signal,
    pub blended: Signal,
    pub remapped: Signal,
    /// Shift requests whose base moment was missing.
    pub unresolved_moments: Vec<String>,
    /// Windows whose moments were missing.
    pub unresolved_windows: Vec<usize>,
}

/// Run the pipeline for `now`.
///
/// `season` is `None` when the active season name is not configured; the
/// seasonal stage is then skipped. `clouds` outside `[0, 1]` is clamped and
/// a non-finite value counts as a clear sky.
pub fn compute(
    config: &FluxConfig,
    sun: &Moments,
    season: Option<&Season>,
    clouds: f64,
    now: DateTime<Local>,
) -> Computation {
    let resolution = moments::resolve(sun, &config.moments);
    let selection = window::select(&config.lighttime, &resolution.moments, now);

    let raw = Signal {
        ct: selection.window.ct.evaluate(selection.x),
        bri: selection.window.bri.evaluate(selection.x),
    };

    let clouds = if clouds.is_finite() {
        clouds.clamp(0.0, 1.0)
    } else {
        0.0
    };
    let bucket = weather::select_bucket(&config.weather, clouds);
    let blended = weather::blend(raw, selection.window.is_dark(), clouds, &bucket);

    let remapped = match season {
        Some(season) => season.remap(blended),
        None => blended,
    };

    Computation {
        window: selection.index,
        darkness: selection.window.darkness.clone(),
        x: selection.x,
        clouds,
        bucket,
        raw,
        blended,
        remapped,
        unresolved_moments: resolution.unresolved,
        unresolved_windows: selection.unresolved,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32, minute: u32) -> DateTime<Local> {
        Local
            .with_ymd_and_hms(2024, 9, 2, hour, minute, 0)
            .single()
            .unwrap()
    }

    const CONFIG: &str = r#"{
        "moments": [{"moment": "morning.begin", "shift": 60, "tag": ".late"}],
        "lighttime": [
            {"start": "morning.begin", "end": "morning.end", "darkness": "light",
             "ct": [{"x": 0.0, "y": 0.2}, {"x": 1.0, "y": 0.2}],
             "bri": [{"x": 0.0, "y": 0.0}, {"x": 1.0, "y": 1.0}]},
            {"start": "evening.begin", "end": "evening.end", "darkness": "dark",
             "ct": [{"x": 0.0, "y": 0.9}],
             "bri": [{"x": 0.0, "y": 0.1}]}
        ],
        "weather": [
            {"clouds": {"min": 0.0, "max": 0.5}, "ct_pct": 0.0, "bri_pct": 0.0},
            {"clouds": {"min": 0.5, "max": 1.0}, "ct_pct": 0.3, "bri_pct": 0.0}
        ],
        "seasons": [
            {"name": "spring", "ct": [{"x": 0.0, "y": 0.0}, {"x": 1.0, "y": 1.0}],
             "bri": [{"x": 0.0, "y": 0.0}, {"x": 1.0, "y": 1.0}]}
        ],
        "lighttypes": [
            {"name": "hue", "ct": [{"x": 0.0, "y": 153.0}, {"x": 1.0, "y": 500.0}],
             "bri": [{"x": 0.0, "y": 1.0}, {"x": 1.0, "y": 254.0}]}
        ]
    }"#;

    fn sun() -> Moments {
        let mut sun = Moments::new();
        sun.insert("morning.begin", at(6, 0));
        sun.insert("morning.end", at(8, 0));
        sun.insert("evening.begin", at(20, 0));
        sun.insert("evening.end", at(23, 0));
        sun
    }

    #[test]
    fn test_parse_full_config() {
        let config = FluxConfig::from_json(CONFIG).unwrap();

        assert_eq!(config.lighttime.len(), 2);
        assert_eq!(config.weather.len(), 2);
        assert_eq!(config.lighttypes[0].kind, LightKind::Hue);
        assert_eq!(config.moments[0].key(), "morning.begin.late");
    }

    #[test]
    fn test_missing_lists_default_to_empty() {
        let config = FluxConfig::from_json("{}").unwrap();
        assert_eq!(config, FluxConfig::default());
    }

    #[test]
    fn test_rejects_invalid_config() {
        let bad_curve = r#"{"lighttime": [{"start": "a", "end": "b", "darkness": "light",
            "ct": [{"x": 0.5, "y": 0.0}, {"x": 0.2, "y": 1.0}], "bri": [{"x": 0.0, "y": 0.0}]}]}"#;
        assert!(FluxConfig::from_json(bad_curve).is_err());

        let bad_range = r#"{"weather": [{"clouds": {"min": 0.6, "max": 0.2}, "ct_pct": 0.1}]}"#;
        assert!(FluxConfig::from_json(bad_range).is_err());

        let duplicate_light = r#"{"lighttypes": [
            {"name": "yee", "ct": [{"x": 0.0, "y": 0.0}], "bri": [{"x": 0.0, "y": 0.0}]},
            {"name": "yee", "ct": [{"x": 0.0, "y": 0.0}], "bri": [{"x": 0.0, "y": 0.0}]}]}"#;
        assert!(FluxConfig::from_json(duplicate_light).is_err());

        let unknown_light = r#"{"lighttypes": [
            {"name": "wemo", "ct": [{"x": 0.0, "y": 0.0}], "bri": [{"x": 0.0, "y": 0.0}]}]}"#;
        assert!(FluxConfig::from_json(unknown_light).is_err());

        let untagged_shift = r#"{"moments": [{"moment": "dawn.begin", "shift": 5, "tag": ""}]}"#;
        assert!(FluxConfig::from_json(untagged_shift).is_err());

        let huge_shift =
            r#"{"moments": [{"moment": "day.begin", "shift": 1000000000000, "tag": ".x"}]}"#;
        assert!(FluxConfig::from_json(huge_shift).is_err());
        let past_a_day = r#"{"moments": [{"moment": "day.begin", "shift": -1441, "tag": ".x"}]}"#;
        assert!(FluxConfig::from_json(past_a_day).is_err());
        let one_day = r#"{"moments": [{"moment": "day.begin", "shift": -1440, "tag": ".x"}]}"#;
        assert!(FluxConfig::from_json(one_day).is_ok());

        assert!(FluxConfig::from_json("not json").is_err());
    }

    #[test]
    fn test_flat_window_scenario() {
        let config = FluxConfig::from_json(CONFIG).unwrap();
        let spring = season::find(&config.seasons, "spring");

        let computation = compute(&config, &sun(), spring, 0.0, at(7, 0));

        assert_eq!(computation.window, Some(0));
        assert_eq!(computation.x, 0.5);
        assert!((computation.raw.ct - 0.2).abs() < 1e-9);
        assert!((computation.remapped.ct - 0.2).abs() < 1e-9);
        assert!((computation.remapped.bri - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_cloudy_window_scenario() {
        let config = FluxConfig::from_json(CONFIG).unwrap();

        let computation = compute(&config, &sun(), None, 0.8, at(7, 0));

        assert!((computation.blended.ct - 0.44).abs() < 1e-9);
        assert_eq!(computation.bucket.ct_pct, 0.3);
    }

    #[test]
    fn test_dark_window_ignores_bucket() {
        let config = FluxConfig::from_json(CONFIG).unwrap();

        let computation = compute(&config, &sun(), None, 0.8, at(21, 0));

        assert_eq!(computation.darkness, "dark");
        assert!((computation.blended.ct - 0.9).abs() < 1e-9);
        // 0.1 + 0.8 * 0.1 * 0.9
        assert!((computation.blended.bri - 0.172).abs() < 1e-9);
    }

    #[test]
    fn test_no_window_uses_fallback() {
        let config = FluxConfig::from_json(CONFIG).unwrap();

        let computation = compute(&config, &sun(), None, 0.0, at(12, 0));

        assert_eq!(computation.window, None);
        assert_eq!(computation.darkness, "unknown");
        assert_eq!(computation.raw, Signal::new(0.5, 0.5));
        assert!(computation.remapped.ct.is_finite());
    }

    #[test]
    fn test_missing_sun_moments_are_reported() {
        let config = FluxConfig::from_json(CONFIG).unwrap();

        let computation = compute(&config, &Moments::new(), None, 0.0, at(7, 0));

        assert_eq!(computation.window, None);
        assert_eq!(computation.unresolved_windows, vec![0, 1]);
        assert_eq!(computation.unresolved_moments, vec!["morning.begin"]);
    }

    #[test]
    fn test_out_of_range_clouds_are_clamped() {
        let config = FluxConfig::from_json(CONFIG).unwrap();

        assert_eq!(compute(&config, &sun(), None, 3.0, at(7, 0)).clouds, 1.0);
        assert_eq!(compute(&config, &sun(), None, f64::NAN, at(7, 0)).clouds, 0.0);
    }

    #[test]
    fn test_light_kind_naming() {
        assert_eq!(LightKind::Yee.sensor_name(), "sensor.light.yee");
        assert_eq!(LightKind::Hue.topic("state/light/"), "state/light/hue/");
    }
}
