//! Topic names used by the driver, resolved once from settings.

use crate::config::Settings;
use crate::flux::LightKind;

/// Inbound message kinds the driver reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Config,
    Weather,
    Sun,
    Season,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topics {
    pub config: String,
    pub weather: String,
    pub sun: String,
    pub season: String,
    pub light_prefix: String,
    pub darkness: String,
}

impl Topics {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            config: settings.config_topic().to_string(),
            weather: settings.weather_topic().to_string(),
            sun: settings.sun_topic().to_string(),
            season: settings.season_topic().to_string(),
            light_prefix: settings.light_topic_prefix().to_string(),
            darkness: settings.darkness_topic().to_string(),
        }
    }

    /// Map an inbound topic to its handler. A trailing slash is optional.
    pub fn route(&self, topic: &str) -> Option<Route> {
        let topic = normalize(topic);
        [
            (&self.config, Route::Config),
            (&self.weather, Route::Weather),
            (&self.sun, Route::Sun),
            (&self.season, Route::Season),
        ]
        .into_iter()
        .find(|(candidate, _)| normalize(candidate) == topic)
        .map(|(_, route)| route)
    }

    /// Output topic for one light kind.
    pub fn light(&self, kind: LightKind) -> String {
        kind.topic(&self.light_prefix)
    }
}

impl Default for Topics {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

fn normalize(topic: &str) -> &str {
    topic.trim_end_matches('/')
}
