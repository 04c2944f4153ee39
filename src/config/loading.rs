//! Settings file discovery and loading.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use super::Settings;
use super::validation::validate_settings;

const SETTINGS_FILE_NAME: &str = "flux.toml";

/// Settings directory chosen with `--config`, set once at startup.
static CONFIG_DIR: OnceLock<Option<PathBuf>> = OnceLock::new();

/// Set the settings directory for the current process.
/// Can only be called once; later calls return an error.
pub fn set_config_dir(dir: Option<String>) -> Result<()> {
    CONFIG_DIR
        .set(dir.map(PathBuf::from))
        .map_err(|_| anyhow::anyhow!("Configuration directory already set"))
}

/// The custom settings directory, if one was set.
pub fn get_custom_config_dir() -> Option<PathBuf> {
    CONFIG_DIR.get().and_then(|d| d.clone())
}

/// Path of `flux.toml`, whether or not it exists.
pub fn get_config_path() -> Result<PathBuf> {
    if let Some(custom_dir) = get_custom_config_dir() {
        return Ok(custom_dir.join(SETTINGS_FILE_NAME));
    }

    let config_dir = dirs::config_dir().context("Could not determine config directory")?;
    Ok(config_dir.join("flux").join(SETTINGS_FILE_NAME))
}

/// Load settings from the default location.
///
/// Returns the settings together with the file they came from; when no file
/// exists the defaults are returned with `None`.
pub fn load() -> Result<(Settings, Option<PathBuf>)> {
    let path = get_config_path()?;

    if !path.exists() {
        return Ok((Settings::default(), None));
    }

    let settings = load_from_path(&path)?;
    Ok((settings, Some(path)))
}

/// Load and validate settings from a specific file, which must exist.
pub fn load_from_path(path: &Path) -> Result<Settings> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read settings from {}", private_path(path)))?;

    let settings: Settings = toml::from_str(&content)
        .with_context(|| format!("Failed to parse settings from {}", private_path(path)))?;

    validate_settings(&settings)
        .with_context(|| format!("Invalid settings in {}", private_path(path)))?;

    Ok(settings)
}

/// Replace the home directory prefix with `~` for display.
pub fn private_path(path: &Path) -> String {
    if let Some(home) = dirs::home_dir()
        && let Ok(relative) = path.strip_prefix(&home)
    {
        return format!("~/{}", relative.display());
    }
    path.display().to_string()
}
