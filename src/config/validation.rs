//! Settings validation.

use anyhow::Result;
use std::collections::HashSet;

use super::Settings;
use crate::constants::*;

/// Reject settings the daemon cannot run with.
pub fn validate_settings(settings: &Settings) -> Result<()> {
    if let Some(interval) = settings.update_interval
        && !(MINIMUM_UPDATE_INTERVAL..=MAXIMUM_UPDATE_INTERVAL).contains(&interval)
    {
        anyhow::bail!(
            "update_interval ({} s) must be between {} and {} seconds",
            interval,
            MINIMUM_UPDATE_INTERVAL,
            MAXIMUM_UPDATE_INTERVAL
        );
    }

    if let Some(samples) = settings.smoothing_samples
        && !(MINIMUM_SMOOTHING_SAMPLES..=MAXIMUM_SMOOTHING_SAMPLES).contains(&samples)
    {
        anyhow::bail!(
            "smoothing_samples ({}) must be between {} and {}",
            samples,
            MINIMUM_SMOOTHING_SAMPLES,
            MAXIMUM_SMOOTHING_SAMPLES
        );
    }

    if settings.default_season().trim().is_empty() {
        anyhow::bail!("default_season cannot be empty");
    }

    if let Some(ref socket_path) = settings.socket_path
        && socket_path.as_os_str().is_empty()
    {
        anyhow::bail!("socket_path cannot be empty");
    }

    let inbound = [
        ("config_topic", settings.config_topic()),
        ("weather_topic", settings.weather_topic()),
        ("sun_topic", settings.sun_topic()),
        ("season_topic", settings.season_topic()),
    ];
    let outbound = [
        ("light_topic_prefix", settings.light_topic_prefix()),
        ("darkness_topic", settings.darkness_topic()),
    ];

    for (field, topic) in inbound.iter().chain(outbound.iter()) {
        if topic.trim().trim_end_matches('/').is_empty() {
            anyhow::bail!("{field} cannot be empty");
        }
    }

    let mut seen = HashSet::new();
    for (field, topic) in inbound {
        if !seen.insert(topic.trim_end_matches('/')) {
            anyhow::bail!("{field} '{topic}' is already used by another inbound topic");
        }
    }

    Ok(())
}
