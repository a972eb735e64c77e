//! Copying the current bank next to the saved host state
//!
//! A saved bank lives in `<patch dir>/audiopool`. When that folder exists and
//! holds files it is preferred over the configured root on restore, so a
//! session can be moved to another machine with its samples.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::StorageError;

/// Name of the bank folder inside the patch directory
pub const PATCH_FOLDER: &str = "audiopool";

/// Location of the saved bank for `patch_dir`
pub fn patch_folder(patch_dir: &Path) -> PathBuf {
    patch_dir.join(PATCH_FOLDER)
}

/// Copy `files` into `<patch_dir>/audiopool`, replacing what was there
///
/// Files are staged in a sibling folder first, so saving a bank that is
/// already played from the patch folder does not delete its own sources.
pub fn save_bank(files: &[PathBuf], patch_dir: &Path) -> Result<PathBuf, StorageError> {
    if files.is_empty() {
        return Err(StorageError::NoBank);
    }

    let target = patch_folder(patch_dir);
    let staging = patch_dir.join(format!("{}.partial", PATCH_FOLDER));

    if staging.exists() {
        fs::remove_dir_all(&staging)?;
    }
    fs::create_dir_all(&staging)?;

    for file in files {
        let name = file
            .file_name()
            .ok_or_else(|| StorageError::InvalidPath(file.clone()))?;
        fs::copy(file, staging.join(name))?;
    }

    if target.exists() {
        fs::remove_dir_all(&target)?;
    }
    fs::rename(&staging, &target)?;

    log::info!("Saved {} files to {:?}", files.len(), target);
    Ok(target)
}

/// The saved bank folder, if it exists and holds at least one entry
pub fn preferred_root(patch_dir: &Path) -> Option<PathBuf> {
    let folder = patch_folder(patch_dir);
    let mut entries = fs::read_dir(&folder).ok()?;
    entries.next().is_some().then_some(folder)
}
