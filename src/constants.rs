//! Default values and validation limits shared across flux.
//!
//! Settings fields are all optional; whenever one is missing the matching
//! `DEFAULT_*` constant is used. The `MINIMUM_*`/`MAXIMUM_*` pairs bound what
//! the settings validator accepts.

// # Cycle timing

/// Seconds between two computation cycles.
pub const DEFAULT_UPDATE_INTERVAL: u64 = 10;
pub const MINIMUM_UPDATE_INTERVAL: u64 = 1;
pub const MAXIMUM_UPDATE_INTERVAL: u64 = 300;

// # Smoothing

/// Depth of the moving average applied to each output channel.
pub const DEFAULT_SMOOTHING_SAMPLES: usize = 30;
pub const MINIMUM_SMOOTHING_SAMPLES: usize = 1;
pub const MAXIMUM_SMOOTHING_SAMPLES: usize = 1000;

// # Season

/// Season assumed until the first season reading arrives.
pub const DEFAULT_SEASON: &str = "spring";

// # Topics

pub const DEFAULT_CONFIG_TOPIC: &str = "config/flux/";
pub const DEFAULT_WEATHER_TOPIC: &str = "state/sensor/clouds/";
pub const DEFAULT_SUN_TOPIC: &str = "state/sensor/sun/";
pub const DEFAULT_SEASON_TOPIC: &str = "state/sensor/season/";
pub const DEFAULT_LIGHT_TOPIC_PREFIX: &str = "state/light/";
pub const DEFAULT_DARKNESS_TOPIC: &str = "state/light/darkorlight/";

// # Sensor attribute names

pub const CLOUDS_ATTRIBUTE: &str = "clouds";
pub const SEASON_ATTRIBUTE: &str = "season";
pub const DARKNESS_SENSOR_NAME: &str = "sensor.light.darkorlight";
pub const LIGHT_SENSOR_PREFIX: &str = "sensor.light.";

// # Engine

/// Darkness classification that suppresses the weather percentage adjustments.
pub const DARK: &str = "dark";

/// Darkness classification reported when no window contains "now".
pub const FALLBACK_DARKNESS: &str = "unknown";

/// CT and BRI produced by the fallback window when no window contains "now".
pub const FALLBACK_SIGNAL: f64 = 0.5;

/// Upper bound of the neutral weather bucket used when no bucket matches.
pub const NEUTRAL_CLOUDS_MAX: f64 = 0.001;

/// Extra brightness applied at full cloud cover, as a fraction of the remaining headroom.
pub const CLOUD_BRIGHTNESS_BOOST: f64 = 0.1;

/// Largest accepted moment shift in either direction, in minutes (one day).
pub const MAXIMUM_MOMENT_SHIFT_MINUTES: i64 = 24 * 60;

pub const SECONDS_PER_DAY: i64 = 24 * 60 * 60;

// # Bus

pub const BUS_SOCKET_NAME: &str = "flux-bus.sock";

/// Poll period of the bus thread between socket checks.
pub const BUS_POLL_INTERVAL_MS: u64 = 10;

// # Exit codes

pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;
