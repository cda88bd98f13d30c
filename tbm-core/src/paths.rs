//! Default filesystem layout for tbm.
//!
//! Everything tbm touches lives in one of four places:
//!
//! - Bucket: `./bucket/` (one `<id>.json` manifest per package)
//! - Cache: `{temp}/<id>/` (scratch directory per package install)
//! - Binaries: `~/.local/bin/`
//! - Folder root: `~/.local/`
//!
//! These are only defaults; [`crate::Settings`] can override each of them.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Directory holding manifests, relative to the working directory.
pub const DEFAULT_BUCKET_DIR: &str = "bucket";

/// Default location of the external extraction utility.
pub const DEFAULT_EXTRACTOR: &str = "/usr/local/bin/extract.sh";

/// Subdirectory name under the user config dir.
const TBM_CONFIG_DIR: &str = "tbm";

// ============================================================================
// Path Resolution
// ============================================================================

/// Returns the user's home directory.
///
/// # Errors
///
/// Returns an error if the home directory cannot be determined. tbm treats
/// this as fatal since the binaries and folder destinations hang off it.
pub fn home_dir() -> Result<PathBuf> {
    dirs::home_dir().context("Could not determine the home directory")
}

/// Returns the default binaries directory: `~/.local/bin/`.
pub fn default_bin_dir() -> Result<PathBuf> {
    Ok(home_dir()?.join(".local").join("bin"))
}

/// Returns the default install root for folder mappings: `~/.local/`.
pub fn default_folder_root() -> Result<PathBuf> {
    Ok(home_dir()?.join(".local"))
}

/// Returns the default cache root that holds per-package scratch directories.
pub fn default_cache_dir() -> PathBuf {
    std::env::temp_dir()
}

/// Returns the path of the settings file: `{config}/tbm/settings.json`.
///
/// Returns `None` on platforms without a config directory.
pub fn settings_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(TBM_CONFIG_DIR).join("settings.json"))
}

/// Returns the scratch directory for a package under a cache root.
///
/// Path: `{cache}/<id>/`
pub fn work_dir(cache_dir: &Path, id: &str) -> PathBuf {
    cache_dir.join(id)
}

/// Ensures every directory in `dirs` exists.
///
/// # Errors
///
/// Returns an error if any directory cannot be created (e.g., permission issues).
pub fn ensure_dirs_exist(dirs: &[&Path]) -> Result<()> {
    for dir in dirs {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
    }

    Ok(())
}
