//! The cycle driver.
//!
//! `Core` owns every piece of runtime state: the engine configuration, the
//! latest sun/weather/season snapshots and the two smoothing filters. It
//! reacts to two event sources on a single thread:
//!
//! - bus events (configuration and sensor messages, connection changes,
//!   shutdown), arriving on an `mpsc` channel
//! - a fixed timer that runs one computation cycle per interval
//!
//! The loop waits with `recv_timeout` until whichever comes first, so a busy
//! bus never postpones a cycle and a cycle never drops a message. Each event
//! is handled to completion, including all of a cycle's publish calls, before
//! the next one is taken.
//!
//! Message handlers only replace snapshots; the filters advance only on a
//! timer tick, so redelivering an identical snapshot changes nothing.

pub mod publish;
pub mod smoothing;
pub mod topics;

use anyhow::Result;
use chrono::{DateTime, Local};
use std::ops::ControlFlow;
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::time::{Duration, Instant};

use crate::bus::Event;
use crate::config::Settings;
use crate::constants::{CLOUDS_ATTRIBUTE, SEASON_ATTRIBUTE};
use crate::flux::moments::Moments;
use crate::flux::{self, Computation, FluxConfig, Signal, season};
use crate::sensor::SensorState;
use crate::time_source::TimeSource;
use publish::{Outputs, Publisher};
use smoothing::MovingAverage;
use topics::{Route, Topics};

/// Whether the driver has enough data to run a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    /// Configuration or sun moments still missing; ticks are no-ops.
    Uninitialized,
    /// Both present; every tick runs a full cycle.
    Ready,
}

/// Parameters for creating a Core instance.
pub struct CoreParams {
    pub settings: Settings,
    pub publisher: Box<dyn Publisher>,
    pub time_source: Box<dyn TimeSource>,
    pub debug_enabled: bool,
}

/// What one cycle computed and published.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub at: DateTime<Local>,
    pub computation: Computation,
    pub smoothed: Signal,
    pub outputs: Outputs,
}

pub struct Core {
    topics: Topics,
    interval: Duration,
    config: Option<FluxConfig>,
    sun: Option<Moments>,
    clouds: f64,
    season: String,
    connected: bool,
    ct_filter: MovingAverage,
    bri_filter: MovingAverage,
    publisher: Box<dyn Publisher>,
    time_source: Box<dyn TimeSource>,
    debug_enabled: bool,
    // Last season name reported as unconfigured, so the warning is printed once
    reported_season: Option<String>,
    last_darkness: Option<String>,
}

impl Core {
    pub fn new(params: CoreParams) -> Self {
        let samples = params.settings.smoothing_samples();

        Self {
            topics: Topics::from_settings(&params.settings),
            interval: params.settings.update_interval(),
            config: None,
            sun: None,
            clouds: 0.0,
            season: params.settings.default_season().to_string(),
            connected: false,
            ct_filter: MovingAverage::new(samples),
            bri_filter: MovingAverage::new(samples),
            publisher: params.publisher,
            time_source: params.time_source,
            debug_enabled: params.debug_enabled,
            reported_season: None,
            last_darkness: None,
        }
    }

    pub fn state(&self) -> DriverState {
        if self.config.is_some() && self.sun.is_some() {
            DriverState::Ready
        } else {
            DriverState::Uninitialized
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn clouds(&self) -> f64 {
        self.clouds
    }

    pub fn season(&self) -> &str {
        &self.season
    }

    pub fn config(&self) -> Option<&FluxConfig> {
        self.config.as_ref()
    }

    /// Serve events and timer ticks until shutdown or until every event
    /// sender is gone.
    pub fn run(mut self, events: &Receiver<Event>) -> Result<()> {
        log_block_start!(
            "Waiting for configuration on {} (cycle every {}s)",
            self.topics.config,
            self.interval.as_secs()
        );

        let mut next_tick = Instant::now() + self.interval;

        loop {
            let now = Instant::now();
            if now >= next_tick {
                let at = self.time_source.now();
                self.tick(at);
                next_tick += self.interval;
                if next_tick <= now {
                    // Fell more than one interval behind; do not replay missed cycles
                    next_tick = now + self.interval;
                }
                continue;
            }

            match events.recv_timeout(next_tick - now) {
                Ok(event) => {
                    if self.handle_event(event).is_break() {
                        break;
                    }
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    if self.debug_enabled {
                        log_debug!("Event channel closed");
                    }
                    break;
                }
            }
        }

        log_block_start!("Shutting down flux...");
        Ok(())
    }

    /// Apply one bus event. Returns `Break` on shutdown.
    pub fn handle_event(&mut self, event: Event) -> ControlFlow<()> {
        match event {
            Event::Message { topic, payload } => match self.topics.route(&topic) {
                Some(Route::Config) => self.on_config(&payload),
                Some(Route::Weather) => self.on_weather(&payload),
                Some(Route::Sun) => self.on_sun(&payload),
                Some(Route::Season) => self.on_season(&payload),
                None => {
                    if self.debug_enabled {
                        log_debug!("Ignoring message on unhandled topic '{topic}'");
                    }
                }
            },
            Event::Connected => {
                self.connected = true;
                log_info!("Bus client connected");
            }
            Event::Disconnected => {
                self.connected = false;
                log_pipe!();
                log_warning!("Bus client disconnected, keeping last known state");
            }
            Event::Shutdown => return ControlFlow::Break(()),
        }
        ControlFlow::Continue(())
    }

    /// Run one computation cycle for `now` and publish the results.
    ///
    /// Returns `None` without touching any state while uninitialized.
    pub fn tick(&mut self, now: DateTime<Local>) -> Option<CycleReport> {
        let (Some(config), Some(sun)) = (&self.config, &self.sun) else {
            if self.debug_enabled {
                log_debug!(
                    "Skipping cycle, still waiting for {}",
                    match (&self.config, &self.sun) {
                        (None, None) => "configuration and sun moments",
                        (None, Some(_)) => "configuration",
                        _ => "sun moments",
                    }
                );
            }
            return None;
        };

        let active_season = season::find(&config.seasons, &self.season);
        match active_season {
            Some(_) => self.reported_season = None,
            None if self.reported_season.as_deref() != Some(self.season.as_str()) => {
                log_pipe!();
                log_warning!(
                    "Season '{}' is not configured, skipping seasonal adjustment",
                    self.season
                );
                self.reported_season = Some(self.season.clone());
            }
            None => {}
        }

        let computation = flux::compute(config, sun, active_season, self.clouds, now);

        let smoothed = Signal {
            ct: self.ct_filter.sample(computation.remapped.ct),
            bri: self.bri_filter.sample(computation.remapped.bri),
        };

        let outputs = publish::fan_out(
            &config.lighttypes,
            smoothed,
            &computation.darkness,
            &self.topics,
            self.publisher.as_mut(),
        );

        if self.last_darkness.as_deref() != Some(computation.darkness.as_str()) {
            log_block_start!("Light period is now '{}'", computation.darkness);
            log_decorated!("Output: {}", smoothed);
            self.last_darkness = Some(computation.darkness.clone());
        }

        if self.debug_enabled {
            log_cycle(&computation, smoothed, &outputs);
        }

        Some(CycleReport {
            at: now,
            computation,
            smoothed,
            outputs,
        })
    }

    fn on_config(&mut self, payload: &str) {
        let config = match FluxConfig::from_json(payload) {
            Ok(config) => config,
            Err(e) => {
                log_pipe!();
                log_warning!("Ignoring configuration update: {e:#}");
                return;
            }
        };

        let was_ready = self.state() == DriverState::Ready;

        log_block_start!("Configuration updated");
        log_indented!(
            "{} light windows, {} moment shifts",
            config.lighttime.len(),
            config.moments.len()
        );
        log_indented!(
            "{} weather buckets, {} seasons, {} light types",
            config.weather.len(),
            config.seasons.len(),
            config.lighttypes.len()
        );
        self.config = Some(config);
        // A new configuration may define the season that was missing before
        self.reported_season = None;

        if !was_ready && self.state() == DriverState::Ready {
            log_info!("Configuration and sun moments received, cycles are running");
        }
    }

    fn on_weather(&mut self, payload: &str) {
        match SensorState::from_json(payload) {
            Ok(sensor) => {
                self.clouds = sensor.get_float(CLOUDS_ATTRIBUTE, 0.0);
                if self.debug_enabled {
                    log_debug!("Cloud cover: {:.2}", self.clouds);
                }
            }
            Err(e) => {
                log_pipe!();
                log_warning!("Ignoring weather update: {e:#}");
            }
        }
    }

    fn on_sun(&mut self, payload: &str) {
        match SensorState::from_json(payload) {
            Ok(sensor) => {
                let was_ready = self.state() == DriverState::Ready;
                let moments = Moments::from_time_windows(&sensor.timewindows);
                if self.debug_enabled {
                    log_debug!("Sun moments updated: {} entries", moments.len());
                }
                self.sun = Some(moments);

                if !was_ready && self.state() == DriverState::Ready {
                    log_info!("Configuration and sun moments received, cycles are running");
                }
            }
            Err(e) => {
                log_pipe!();
                log_warning!("Ignoring sun update: {e:#}");
            }
        }
    }

    fn on_season(&mut self, payload: &str) {
        match season_name(payload) {
            Some(name) => {
                if name != self.season {
                    log_block_start!("Season changed to '{name}'");
                    self.season = name;
                }
            }
            None => {
                log_pipe!();
                log_warning!("Ignoring season update without a season name");
            }
        }
    }
}

/// Extract the season name from a season message.
///
/// Accepts a sensor record with a `season` value, a JSON string, or the bare
/// name as plain text.
fn season_name(payload: &str) -> Option<String> {
    if let Ok(sensor) = SensorState::from_json(payload) {
        return sensor
            .get_value(SEASON_ATTRIBUTE)
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string);
    }

    if let Ok(name) = serde_json::from_str::<String>(payload) {
        let name = name.trim();
        return (!name.is_empty()).then(|| name.to_string());
    }

    let name = payload.trim();
    let plain = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_alphanumeric() || c == '-' || c == '_');
    plain.then(|| name.to_string())
}

fn log_cycle(computation: &Computation, smoothed: Signal, outputs: &Outputs) {
    let window = computation
        .window
        .map_or_else(|| "fallback".to_string(), |index| format!("#{index}"));
    log_debug!(
        "Window {window} ({}) at x = {:.2}, clouds {:.2}",
        computation.darkness,
        computation.x,
        computation.clouds
    );
    log_indented!("Raw: {}", computation.raw);
    log_indented!("Weather: {}", computation.blended);
    log_indented!("Season: {}", computation.remapped);
    log_indented!("Smoothed: {}", smoothed);
    for light in &outputs.lights {
        log_indented!("{}: CT {} BRI {}", light.name, light.ct, light.bri);
    }
    if !computation.unresolved_moments.is_empty() {
        log_indented!(
            "Unknown base moments: {}",
            computation.unresolved_moments.join(", ")
        );
    }
    if !computation.unresolved_windows.is_empty() {
        log_indented!(
            "Windows with unknown moments: {:?}",
            computation.unresolved_windows
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time_source::FixedTimeSource;
    use chrono::TimeZone;
    use publish::MockPublisher;
    use std::sync::{Arc, Mutex};

    fn at(hour: u32, minute: u32) -> DateTime<Local> {
        Local
            .with_ymd_and_hms(2024, 10, 3, hour, minute, 0)
            .single()
            .unwrap()
    }

    const CONFIG: &str = r#"{
        "lighttime": [
            {"start": "day.begin", "end": "day.end", "darkness": "light",
             "ct": [{"x": 0.0, "y": 0.0}, {"x": 1.0, "y": 1.0}],
             "bri": [{"x": 0.0, "y": 1.0}, {"x": 1.0, "y": 1.0}]}
        ],
        "weather": [{"clouds": {"min": 0.5, "max": 1.0}, "ct_pct": 0.3, "bri_pct": 0.0}],
        "seasons": [
            {"name": "spring", "ct": [{"x": 0.0, "y": 0.0}, {"x": 1.0, "y": 1.0}],
             "bri": [{"x": 0.0, "y": 0.0}, {"x": 1.0, "y": 1.0}]}
        ],
        "lighttypes": [
            {"name": "hue", "ct": [{"x": 0.0, "y": 0.0}, {"x": 1.0, "y": 100.0}],
             "bri": [{"x": 0.0, "y": 0.0}, {"x": 1.0, "y": 100.0}]}
        ]
    }"#;

    fn sun_payload() -> String {
        format!(
            r#"{{"name": "sun", "timewindows": [{{"name": "day", "begin": "{}", "end": "{}"}}]}}"#,
            at(8, 0).to_rfc3339(),
            at(18, 0).to_rfc3339()
        )
    }

    fn message(topic: &str, payload: &str) -> Event {
        Event::Message {
            topic: topic.to_string(),
            payload: payload.to_string(),
        }
    }

    /// Publisher recording every call.
    #[derive(Clone, Default)]
    struct Recorder(Arc<Mutex<Vec<(String, String)>>>);

    impl Publisher for Recorder {
        fn publish(&mut self, topic: &str, payload: String) -> Result<()> {
            self.0.lock().unwrap().push((topic.to_string(), payload));
            Ok(())
        }
    }

    impl Recorder {
        fn take(&self) -> Vec<(String, String)> {
            std::mem::take(&mut *self.0.lock().unwrap())
        }
    }

    fn core_with(publisher: Box<dyn Publisher>, samples: usize) -> Core {
        crate::logger::Log::set_enabled(false);
        Core::new(CoreParams {
            settings: Settings {
                smoothing_samples: Some(samples),
                ..Default::default()
            },
            publisher,
            time_source: Box::new(FixedTimeSource::new(at(13, 0))),
            debug_enabled: false,
        })
    }

    fn ready_core(samples: usize) -> (Core, Recorder) {
        let recorder = Recorder::default();
        let mut core = core_with(Box::new(recorder.clone()), samples);
        let _ = core.handle_event(message("config/flux/", CONFIG));
        let _ = core.handle_event(message("state/sensor/sun/", &sun_payload()));
        (core, recorder)
    }

    #[test]
    fn test_no_publish_while_uninitialized() {
        let mut publisher = MockPublisher::new();
        publisher.expect_publish().never();
        let mut core = core_with(Box::new(publisher), 30);

        assert_eq!(core.state(), DriverState::Uninitialized);
        assert!(core.tick(at(13, 0)).is_none());

        let _ = core.handle_event(message("config/flux/", CONFIG));
        assert_eq!(core.state(), DriverState::Uninitialized);
        assert!(core.tick(at(13, 0)).is_none());
    }

    #[test]
    fn test_sun_without_config_stays_uninitialized() {
        let mut publisher = MockPublisher::new();
        publisher.expect_publish().never();
        let mut core = core_with(Box::new(publisher), 30);

        let _ = core.handle_event(message("state/sensor/sun/", &sun_payload()));
        assert_eq!(core.state(), DriverState::Uninitialized);
        assert!(core.tick(at(13, 0)).is_none());
    }

    #[test]
    fn test_ready_cycle_publishes_lights_and_darkness() {
        let (mut core, recorder) = ready_core(30);
        assert_eq!(core.state(), DriverState::Ready);

        let report = core.tick(at(13, 0)).unwrap();

        assert_eq!(report.computation.window, Some(0));
        assert_eq!(report.computation.x, 0.5);
        assert_eq!(report.outputs.lights[0].ct, 50);
        assert_eq!(report.outputs.lights[0].bri, 100);

        let published = recorder.take();
        assert_eq!(published.len(), 2);
        assert_eq!(published[0].0, "state/light/hue/");
        assert_eq!(published[0].1, r#"{"name":"sensor.light.hue","CT":50,"BRI":100}"#);
        assert_eq!(published[1].0, "state/light/darkorlight/");
        assert!(published[1].1.contains(r#""DarkOrLight":"light""#));
    }

    #[test]
    fn test_invalid_config_keeps_previous() {
        let (mut core, _recorder) = ready_core(30);

        let _ = core.handle_event(message("config/flux/", "{\"lighttime\": 12}"));

        assert_eq!(core.state(), DriverState::Ready);
        assert_eq!(core.config().unwrap().lighttime.len(), 1);
    }

    #[test]
    fn test_out_of_range_shift_is_rejected_and_cycles_continue() {
        let (mut core, recorder) = ready_core(30);

        let _ = core.handle_event(message(
            "config/flux/",
            r#"{"moments": [{"moment": "day.begin", "shift": 1000000000000, "tag": ".x"}]}"#,
        ));

        assert!(core.config().unwrap().moments.is_empty());
        assert_eq!(core.config().unwrap().lighttime.len(), 1);
        assert!(core.tick(at(13, 0)).is_some());
        assert_eq!(recorder.take().len(), 2);
    }

    #[test]
    fn test_malformed_weather_keeps_previous_clouds() {
        let (mut core, _recorder) = ready_core(30);

        let _ = core.handle_event(message(
            "state/sensor/clouds/",
            r#"{"name": "w", "floats": [{"name": "clouds", "value": 0.8}]}"#,
        ));
        assert_eq!(core.clouds(), 0.8);

        let _ = core.handle_event(message("state/sensor/clouds/", "{not json"));
        assert_eq!(core.clouds(), 0.8);

        let report = core.tick(at(13, 0)).unwrap();
        // 0.5 pushed 30% toward 1.0
        assert!((report.computation.blended.ct - 0.65).abs() < 1e-9);
    }

    #[test]
    fn test_disconnect_keeps_snapshots() {
        let (mut core, recorder) = ready_core(30);

        let _ = core.handle_event(Event::Connected);
        assert!(core.is_connected());
        let _ = core.handle_event(Event::Disconnected);
        assert!(!core.is_connected());

        assert_eq!(core.state(), DriverState::Ready);
        assert!(core.tick(at(13, 0)).is_some());
        assert_eq!(recorder.take().len(), 2);
    }

    #[test]
    fn test_redelivered_snapshot_leaves_output_unchanged() {
        let (mut core, _recorder) = ready_core(5);
        let weather = r#"{"name": "w", "floats": [{"name": "clouds", "value": 0.6}]}"#;
        let _ = core.handle_event(message("state/sensor/clouds/", weather));

        let first = core.tick(at(13, 0)).unwrap();

        let _ = core.handle_event(message("state/sensor/clouds/", weather));
        let _ = core.handle_event(message("state/sensor/sun/", &sun_payload()));
        let _ = core.handle_event(message("state/sensor/season/", "spring"));

        let second = core.tick(at(13, 0)).unwrap();
        assert_eq!(first.outputs, second.outputs);
        assert_eq!(first.smoothed, second.smoothed);
    }

    #[test]
    fn test_smoothing_spans_ticks() {
        let (mut core, _recorder) = ready_core(2);

        let first = core.tick(at(8, 0)).unwrap();
        assert_eq!(first.smoothed.ct, 0.0);

        let second = core.tick(at(18, 0)).unwrap();
        // Mean of 0.0 and 1.0
        assert!((second.smoothed.ct - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_unknown_season_skips_seasonal_stage() {
        let (mut core, _recorder) = ready_core(1);

        let _ = core.handle_event(message(
            "state/sensor/season/",
            r#"{"name": "s", "values": [{"name": "season", "value": "monsoon"}]}"#,
        ));
        assert_eq!(core.season(), "monsoon");

        let report = core.tick(at(13, 0)).unwrap();
        assert_eq!(report.computation.remapped, report.computation.blended);
    }

    #[test]
    fn test_unhandled_topic_is_ignored() {
        let mut publisher = MockPublisher::new();
        publisher.expect_publish().never();
        let mut core = core_with(Box::new(publisher), 30);

        assert!(core
            .handle_event(message("state/sensor/rain/", "{}"))
            .is_continue());
        assert_eq!(core.state(), DriverState::Uninitialized);
    }

    #[test]
    fn test_shutdown_breaks() {
        let mut publisher = MockPublisher::new();
        publisher.expect_publish().never();
        let mut core = core_with(Box::new(publisher), 30);

        assert!(core.handle_event(Event::Shutdown).is_break());
    }

    #[test]
    fn test_run_returns_on_shutdown() {
        let (core, _recorder) = ready_core(30);
        let (sender, receiver) = std::sync::mpsc::channel();
        sender.send(Event::Shutdown).unwrap();

        assert!(core.run(&receiver).is_ok());
    }

    #[test]
    fn test_run_returns_when_senders_are_gone() {
        let (core, _recorder) = ready_core(30);
        let (sender, receiver) = std::sync::mpsc::channel::<Event>();
        drop(sender);

        assert!(core.run(&receiver).is_ok());
    }

    #[test]
    fn test_season_name_formats() {
        assert_eq!(
            season_name(r#"{"name": "s", "values": [{"name": "season", "value": "winter"}]}"#),
            Some("winter".to_string())
        );
        assert_eq!(season_name(r#""autumn""#), Some("autumn".to_string()));
        assert_eq!(season_name("summer\n"), Some("summer".to_string()));
        assert_eq!(season_name(r#"{"name": "s"}"#), None);
        assert_eq!(season_name("{broken"), None);
        assert_eq!(season_name(""), None);
    }
}
