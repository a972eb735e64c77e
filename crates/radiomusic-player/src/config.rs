//! Player configuration
//!
//! Stored as YAML at `~/.config/radiomusic/config.yaml`:
//!
//! ```yaml
//! patch_dir: /home/user/.local/share/radiomusic/patch
//! buffer_size: 256
//! module:
//!   rootDir: /home/user/Music/radiomusic
//!   loopingEnabled: true
//!   crossfadeEnabled: true
//!   currentBank: 0
//! ```

use std::path::PathBuf;

use radiomusic_core::config::{default_config_path, default_patch_dir, default_sample_root};
use radiomusic_core::ModuleSettings;
use serde::{Deserialize, Serialize};

/// File name of the player config inside the config directory
pub const CONFIG_FILE: &str = "config.yaml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Where "save" copies the current bank
    pub patch_dir: PathBuf,
    /// Output buffer size in frames; device default when absent
    pub buffer_size: Option<u32>,
    /// Module state restored on startup and saved on quit
    pub module: ModuleSettings,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            patch_dir: default_patch_dir(),
            buffer_size: None,
            module: ModuleSettings {
                root_dir: default_sample_root().to_string_lossy().into_owned(),
                ..Default::default()
            },
        }
    }
}

/// Config path, overridable with `RADIOMUSIC_CONFIG`
pub fn config_path() -> PathBuf {
    std::env::var_os("RADIOMUSIC_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|| default_config_path(CONFIG_FILE))
}
