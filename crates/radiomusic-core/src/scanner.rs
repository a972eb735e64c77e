//! Sample root scanning
//!
//! Groups the files below a root directory into banks:
//!
//! ```text
//! root/
//! ├── x.wav          bank 0  [x.wav]          (loose files, always first)
//! ├── A/1.wav        bank 1  [A/1.wav, A/2.wav]
//! ├── A/2.wav
//! ├── A/deep/z.wav   skipped (deeper than MAX_DIR_DEPTH)
//! └── B/1.raw        bank 2  [B/1.raw]
//! ```
//!
//! Scanning never fails. An unreadable root produces an empty result.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::types::{MAX_DIR_DEPTH, MAX_NUM_BANKS};

/// File extensions recognized as audio (compared case-insensitively)
pub const AUDIO_EXTENSIONS: &[&str] = &["wav", "raw", "flac", "mp3"];

/// Directory name prefixes that are never scanned (OS and archive metadata)
const BLACKLISTED_PREFIXES: &[&str] = &[".", "SPOTL", "TRASH", "__MACOSX"];

/// One directory's playable files, in scan order
pub type Bank = Vec<PathBuf>;

/// Ordered list of banks, replaced wholesale on every scan
pub type ScanResult = Vec<Bank>;

/// How directory entries are selected and ordered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanOptions {
    /// Sort entries by file name instead of filesystem order
    pub sort: bool,
    /// Keep only files with a recognized audio extension
    pub audio_only: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            sort: false,
            audio_only: true,
        }
    }
}

/// Check whether a path has a recognized audio extension
pub fn is_audio_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            AUDIO_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
        .unwrap_or(false)
}

fn is_blacklisted(name: &str) -> bool {
    BLACKLISTED_PREFIXES.iter().any(|prefix| name.starts_with(prefix))
}

/// Scan `root` into banks
pub fn scan(root: &Path, options: ScanOptions) -> ScanResult {
    let mut banks = ScanResult::new();
    scan_dir(root, 0, options, &mut banks);
    log::info!("Scanned {:?}: {} banks", root, banks.len());
    banks
}

fn scan_dir(dir: &Path, depth: usize, options: ScanOptions, banks: &mut ScanResult) {
    let mut walker = WalkDir::new(dir).min_depth(1).max_depth(1).follow_links(true);
    if options.sort {
        walker = walker.sort_by_file_name();
    }

    let mut files = Bank::new();
    let mut subdirs = Vec::new();

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if e.depth() == 0 => {
                log::warn!("Cannot read directory {:?}: {}", dir, e);
                return;
            }
            Err(e) => {
                log::warn!("Skipping unreadable entry in {:?}: {}", dir, e);
                continue;
            }
        };

        let name = entry.file_name().to_string_lossy();
        let file_type = entry.file_type();

        if file_type.is_dir() {
            if is_blacklisted(&name) {
                log::debug!("Skipping blacklisted directory {:?}", entry.path());
            } else {
                subdirs.push(entry.into_path());
            }
        } else if file_type.is_file() {
            if name.starts_with('.') {
                continue;
            }
            if !options.audio_only || is_audio_file(entry.path()) {
                files.push(entry.into_path());
            }
        }
    }

    if !files.is_empty() {
        log::debug!("Bank {}: {:?} ({} files)", banks.len(), dir, files.len());
        banks.push(files);
    }

    for (i, subdir) in subdirs.iter().enumerate() {
        if banks.len() >= MAX_NUM_BANKS {
            log::info!(
                "Bank limit of {} reached, ignoring {} remaining directories in {:?}",
                MAX_NUM_BANKS,
                subdirs.len() - i,
                dir
            );
            return;
        }
        if depth + 1 > MAX_DIR_DEPTH {
            log::warn!("Skipping {:?}: deeper than {} levels", subdir, MAX_DIR_DEPTH);
            continue;
        }
        scan_dir(subdir, depth + 1, options, banks);
    }
}
