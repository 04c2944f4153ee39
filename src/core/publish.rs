//! Fan-out of the smoothed signal to every configured light type.

use anyhow::{Context, Result};
use serde::Serialize;

use super::topics::Topics;
use crate::constants::DARKNESS_SENSOR_NAME;
use crate::flux::{LightType, Signal};
use crate::sensor::{DarknessState, LightState};

/// Outbound side of the message bus.
///
/// Implementations must not block the driver for long; a failed publish is
/// logged by the caller and the cycle carries on.
#[cfg_attr(test, mockall::automock)]
pub trait Publisher {
    fn publish(&mut self, topic: &str, payload: String) -> Result<()>;
}

/// Records produced by one fan-out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outputs {
    pub lights: Vec<LightState>,
    pub darkness: DarknessState,
}

/// Map `smoothed` through each light type's curves, floor to integers and
/// publish; then publish the darkness classification once.
pub fn fan_out(
    lighttypes: &[LightType],
    smoothed: Signal,
    darkness: &str,
    topics: &Topics,
    publisher: &mut dyn Publisher,
) -> Outputs {
    let mut lights = Vec::with_capacity(lighttypes.len());

    for light in lighttypes {
        let device = light.apply(smoothed);
        let state = LightState {
            name: light.kind.sensor_name(),
            ct: device.ct.floor() as i64,
            bri: device.bri.floor() as i64,
        };

        if let Err(e) = send(publisher, &topics.light(light.kind), &state) {
            log_warning!("Failed to publish {} output: {e:#}", light.kind);
        }
        lights.push(state);
    }

    let darkness = DarknessState {
        name: DARKNESS_SENSOR_NAME.to_string(),
        darkness: darkness.to_string(),
    };
    if let Err(e) = send(publisher, &topics.darkness, &darkness) {
        log_warning!("Failed to publish darkness state: {e:#}");
    }

    Outputs { lights, darkness }
}

fn send<T: Serialize>(publisher: &mut dyn Publisher, topic: &str, record: &T) -> Result<()> {
    let payload = serde_json::to_string(record).context("Failed to serialize output record")?;
    publisher.publish(topic, payload)
}
