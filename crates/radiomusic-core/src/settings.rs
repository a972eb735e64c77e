//! Persisted module state
//!
//! Saved as a flat JSON record. Restoring applies the record as a patch:
//! keys that are missing or have the wrong type keep their current value.

use serde::{Deserialize, Serialize};

/// Settings that survive a host session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ModuleSettings {
    /// Play multichannel files on two outputs instead of summing to mono
    pub stereo_output_mode: bool,
    /// Start knob controls playback speed instead of start position
    pub pitch_mode: bool,
    pub looping_enabled: bool,
    pub crossfade_enabled: bool,
    /// Sort directory entries by name when scanning
    pub sort_files: bool,
    /// Accept files regardless of extension
    pub allow_all_files: bool,
    pub root_dir: String,
    pub current_bank: usize,
}

impl Default for ModuleSettings {
    fn default() -> Self {
        Self {
            stereo_output_mode: false,
            pitch_mode: false,
            looping_enabled: true,
            crossfade_enabled: true,
            sort_files: false,
            allow_all_files: false,
            root_dir: String::new(),
            current_bank: 0,
        }
    }
}

/// Field-by-field optional view of [`ModuleSettings`]
#[derive(Debug)]
struct SettingsPatch {
    stereo_output_mode: Option<bool>,
    pitch_mode: Option<bool>,
    looping_enabled: Option<bool>,
    crossfade_enabled: Option<bool>,
    sort_files: Option<bool>,
    allow_all_files: Option<bool>,
    root_dir: Option<String>,
    current_bank: Option<usize>,
}

/// Decode one field, treating a type mismatch as absent
fn field<T: serde::de::DeserializeOwned>(record: &serde_json::Value, key: &str) -> Option<T> {
    record
        .get(key)
        .and_then(|v| serde_json::from_value(v.clone()).ok())
}

impl SettingsPatch {
    fn from_record(record: &serde_json::Value) -> Self {
        Self {
            stereo_output_mode: field(record, "stereoOutputMode"),
            pitch_mode: field(record, "pitchMode"),
            looping_enabled: field(record, "loopingEnabled"),
            crossfade_enabled: field(record, "crossfadeEnabled"),
            sort_files: field(record, "sortFiles"),
            allow_all_files: field(record, "allowAllFiles"),
            root_dir: field(record, "rootDir"),
            current_bank: field(record, "currentBank"),
        }
    }
}

impl ModuleSettings {
    /// Serialize to a JSON record
    pub fn to_json(&self) -> serde_json::Value {
        // A struct of plain fields always serializes
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    /// Overwrite every field present in `record`
    pub fn apply_json(&mut self, record: &serde_json::Value) {
        let patch = SettingsPatch::from_record(record);

        macro_rules! apply {
            ($($name:ident),*) => {
                $(if let Some(value) = patch.$name {
                    self.$name = value;
                })*
            };
        }
        apply!(
            stereo_output_mode,
            pitch_mode,
            looping_enabled,
            crossfade_enabled,
            sort_files,
            allow_all_files,
            root_dir,
            current_bank
        );
    }

    /// Parse a JSON string and apply it
    pub fn apply_json_str(&mut self, json: &str) -> Result<(), serde_json::Error> {
        let record: serde_json::Value = serde_json::from_str(json)?;
        self.apply_json(&record);
        Ok(())
    }
}
