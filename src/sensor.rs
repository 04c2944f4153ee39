//! Sensor records exchanged over the message bus.
//!
//! Inbound sensor messages (weather, sun, season) share one loose record
//! format, [`SensorState`]: a name plus optional lists of string, float and
//! time-window attributes. Outbound messages are small fixed records.

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// Named string attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueAttr {
    pub name: String,
    pub value: String,
}

/// Named numeric attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FloatAttr {
    pub name: String,
    pub value: f64,
}

/// Named span of time, e.g. the `sunrise` window from the sun sensor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub name: String,
    pub begin: DateTime<Local>,
    pub end: DateTime<Local>,
}

/// Generic sensor record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SensorState {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<DateTime<Local>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<ValueAttr>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub floats: Vec<FloatAttr>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub timewindows: Vec<TimeWindow>,
}

impl SensorState {
    pub fn from_json(payload: &str) -> Result<Self> {
        serde_json::from_str(payload).context("Failed to parse sensor state")
    }

    /// Float attribute `name`, or `default` when absent.
    pub fn get_float(&self, name: &str, default: f64) -> f64 {
        self.floats
            .iter()
            .find(|attr| attr.name == name)
            .map_or(default, |attr| attr.value)
    }

    /// String attribute `name`, if present.
    pub fn get_value(&self, name: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|attr| attr.name == name)
            .map(|attr| attr.value.as_str())
    }
}

/// Output for one light type: device-range CT and BRI, floored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LightState {
    pub name: String,
    #[serde(rename = "CT")]
    pub ct: i64,
    #[serde(rename = "BRI")]
    pub bri: i64,
}

/// Output carrying the darkness classification of the active window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DarknessState {
    pub name: String,
    #[serde(rename = "DarkOrLight")]
    pub darkness: String,
}
