//! Configuration file handling
//!
//! YAML persistence for host-side configuration and the standard locations
//! used by RadioMusic (config file, sample root, patch storage).

mod io;
mod paths;

pub use io::{load_config, save_config};
pub use paths::{default_config_dir, default_config_path, default_patch_dir, default_sample_root};
