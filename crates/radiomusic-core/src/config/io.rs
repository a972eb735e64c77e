//! YAML configuration I/O
//!
//! Works with any serde type. Loading never fails: a missing or broken file
//! falls back to `T::default()` so the player can always start.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;

/// Load a configuration from a YAML file
///
/// Missing files yield the default silently; unreadable or unparseable files
/// yield the default with a warning.
///
/// ```ignore
/// let config: PlayerConfig = load_config(&default_config_path("player.yaml"));
/// ```
pub fn load_config<T>(path: &Path) -> T
where
    T: DeserializeOwned + Default,
{
    if !path.exists() {
        log::info!("No config at {:?}, using defaults", path);
        return T::default();
    }

    let parsed = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {:?}", path))
        .and_then(|contents| {
            serde_yaml::from_str::<T>(&contents).with_context(|| format!("Failed to parse {:?}", path))
        });

    match parsed {
        Ok(config) => {
            log::info!("Loaded config from {:?}", path);
            config
        }
        Err(e) => {
            log::warn!("{:#}, using defaults", e);
            T::default()
        }
    }
}

/// Save a configuration to a YAML file, creating parent directories
pub fn save_config<T>(config: &T, path: &Path) -> Result<()>
where
    T: Serialize,
{
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config directory {:?}", parent))?;
    }

    let yaml = serde_yaml::to_string(config).context("Failed to serialize config")?;
    std::fs::write(path, yaml).with_context(|| format!("Failed to write {:?}", path))?;

    log::info!("Saved config to {:?}", path);
    Ok(())
}
