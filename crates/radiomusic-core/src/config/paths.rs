//! Standard RadioMusic locations

use std::path::PathBuf;

/// Directory holding RadioMusic configuration
///
/// Returns: `<config dir>/radiomusic` (e.g. `~/.config/radiomusic` on Linux)
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("radiomusic")
}

/// Path of a named config file inside [`default_config_dir`]
pub fn default_config_path(filename: &str) -> PathBuf {
    default_config_dir().join(filename)
}

/// Patch storage directory, where saved banks are copied
///
/// Returns: `<data dir>/radiomusic/patch`
pub fn default_patch_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("radiomusic")
        .join("patch")
}

/// Default sample root when none is configured
///
/// Returns: `~/Music/radiomusic`
pub fn default_sample_root() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("Music")
        .join("radiomusic")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_path_is_inside_config_dir() {
        let path = default_config_path("player.yaml");
        assert!(path.ends_with("radiomusic/player.yaml"));
        assert!(path.starts_with(default_config_dir()));
    }

    #[test]
    fn test_patch_dir_name() {
        assert!(default_patch_dir().ends_with("radiomusic/patch"));
    }
}
