//! Daemon settings for flux.
//!
//! Settings control how the daemon itself runs: where the bus socket lives,
//! how often a cycle runs, how deep the smoothing filter is and which topics
//! are read and written. They are distinct from the engine configuration
//! (windows, curves, buckets, seasons, light types), which arrives at runtime
//! as a bus message and is handled by [`crate::flux::FluxConfig`].
//!
//! ## Settings Source
//!
//! `flux.toml` is read from `$XDG_CONFIG_HOME/flux/` (through
//! `dirs::config_dir()`), or from the directory given with `--config`. A
//! missing file is not an error: every field is optional and falls back to
//! the matching constant in [`crate::constants`].
//!
//! ```toml
//! #[Timing]
//! update_interval = 10        # Seconds between cycles (1-300)
//! smoothing_samples = 30      # Moving-average depth per channel (1-1000)
//! default_season = "spring"   # Season used until a season reading arrives
//!
//! #[Bus]
//! socket_path = "/run/user/1000/flux-bus.sock"
//!
//! #[Topics]
//! config_topic = "config/flux/"
//! weather_topic = "state/sensor/clouds/"
//! sun_topic = "state/sensor/sun/"
//! season_topic = "state/sensor/season/"
//! light_topic_prefix = "state/light/"
//! darkness_topic = "state/light/darkorlight/"
//! ```

pub mod loading;
pub mod validation;

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::constants::*;

pub use loading::{get_config_path, get_custom_config_dir, load, load_from_path, set_config_dir};

/// Contents of `flux.toml`. Unset fields take their defaults through the
/// accessor methods.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    /// Bus socket location; defaults to the user runtime directory.
    pub socket_path: Option<PathBuf>,
    pub update_interval: Option<u64>, // seconds
    pub smoothing_samples: Option<usize>,
    pub default_season: Option<String>,
    pub config_topic: Option<String>,
    pub weather_topic: Option<String>,
    pub sun_topic: Option<String>,
    pub season_topic: Option<String>,
    pub light_topic_prefix: Option<String>,
    pub darkness_topic: Option<String>,
}

impl Settings {
    pub fn update_interval(&self) -> Duration {
        Duration::from_secs(self.update_interval.unwrap_or(DEFAULT_UPDATE_INTERVAL))
    }

    pub fn smoothing_samples(&self) -> usize {
        self.smoothing_samples.unwrap_or(DEFAULT_SMOOTHING_SAMPLES)
    }

    pub fn default_season(&self) -> &str {
        self.default_season.as_deref().unwrap_or(DEFAULT_SEASON)
    }

    pub fn config_topic(&self) -> &str {
        self.config_topic.as_deref().unwrap_or(DEFAULT_CONFIG_TOPIC)
    }

    pub fn weather_topic(&self) -> &str {
        self.weather_topic.as_deref().unwrap_or(DEFAULT_WEATHER_TOPIC)
    }

    pub fn sun_topic(&self) -> &str {
        self.sun_topic.as_deref().unwrap_or(DEFAULT_SUN_TOPIC)
    }

    pub fn season_topic(&self) -> &str {
        self.season_topic.as_deref().unwrap_or(DEFAULT_SEASON_TOPIC)
    }

    pub fn light_topic_prefix(&self) -> &str {
        self.light_topic_prefix
            .as_deref()
            .unwrap_or(DEFAULT_LIGHT_TOPIC_PREFIX)
    }

    pub fn darkness_topic(&self) -> &str {
        self.darkness_topic
            .as_deref()
            .unwrap_or(DEFAULT_DARKNESS_TOPIC)
    }

    /// Print the effective settings as a log block.
    pub fn log_settings(&self, source: Option<&PathBuf>) {
        match source {
            Some(path) => log_block_start!("Loaded settings from {}", path.display()),
            None => log_block_start!("No settings file found, using defaults"),
        }
        log_indented!("Update interval: {}s", self.update_interval().as_secs());
        log_indented!("Smoothing samples: {}", self.smoothing_samples());
        log_indented!("Default season: {}", self.default_season());
        if let Some(ref socket_path) = self.socket_path {
            log_indented!("Bus socket: {}", socket_path.display());
        }
        log_indented!(
            "Inbound topics: {}, {}, {}, {}",
            self.config_topic(),
            self.weather_topic(),
            self.sun_topic(),
            self.season_topic()
        );
        log_indented!(
            "Outbound topics: {}<light>/, {}",
            self.light_topic_prefix(),
            self.darkness_topic()
        );
    }
}
