//! Runtime settings for tbm.
//!
//! Settings are read from an optional JSON file. Every field in the file is
//! optional; anything left out falls back to the built-in layout from
//! [`crate::paths`].

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

use crate::paths;

// =============================================================================
// Defaults
// =============================================================================

/// Maximum number of version checks in flight at once.
pub const CONCURRENCY: usize = 10;

/// Architecture entry used when none is configured.
pub const DEFAULT_ARCHITECTURE: &str = "x64";

/// Browser-like identification sent with checkver requests.
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:124.0) Gecko/20100101 Firefox/124.0";

const DEFAULT_CHECK_TIMEOUT_SECS: u64 = 30;
const DEFAULT_DOWNLOAD_TIMEOUT_SECS: u64 = 600;
const DEFAULT_EXTRACT_TIMEOUT_SECS: u64 = 300;

// =============================================================================
// Settings
// =============================================================================

/// Resolved settings. Every path here is concrete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Directory containing `<id>.json` manifests.
    pub bucket_dir: PathBuf,
    /// Root for per-package scratch directories.
    pub cache_dir: PathBuf,
    /// Destination directory for bin mappings.
    pub bin_dir: PathBuf,
    /// Destination root for folder mappings.
    pub folder_root: PathBuf,
    /// External extraction utility, invoked as `<extractor> <asset_name>`.
    pub extractor: PathBuf,
    /// Architecture entry selected from each manifest.
    pub architecture: String,
    /// Version checks allowed to run at once.
    pub concurrency: usize,
    pub check_timeout_secs: u64,
    pub download_timeout_secs: u64,
    pub extract_timeout_secs: u64,
    /// User-Agent header for checkver requests.
    pub user_agent: String,
}

/// On-disk shape of the settings file: all fields optional.
#[derive(Debug, Clone, Default, Deserialize)]
struct SettingsFile {
    bucket_dir: Option<PathBuf>,
    cache_dir: Option<PathBuf>,
    bin_dir: Option<PathBuf>,
    folder_root: Option<PathBuf>,
    extractor: Option<PathBuf>,
    architecture: Option<String>,
    concurrency: Option<usize>,
    check_timeout_secs: Option<u64>,
    download_timeout_secs: Option<u64>,
    extract_timeout_secs: Option<u64>,
    user_agent: Option<String>,
}

impl Settings {
    /// Builds the default settings.
    ///
    /// # Errors
    ///
    /// Fails if the home directory cannot be resolved.
    pub fn with_defaults() -> Result<Self> {
        Ok(Self {
            bucket_dir: PathBuf::from(paths::DEFAULT_BUCKET_DIR),
            cache_dir: paths::default_cache_dir(),
            bin_dir: paths::default_bin_dir()?,
            folder_root: paths::default_folder_root()?,
            extractor: PathBuf::from(paths::DEFAULT_EXTRACTOR),
            architecture: DEFAULT_ARCHITECTURE.to_string(),
            concurrency: CONCURRENCY,
            check_timeout_secs: DEFAULT_CHECK_TIMEOUT_SECS,
            download_timeout_secs: DEFAULT_DOWNLOAD_TIMEOUT_SECS,
            extract_timeout_secs: DEFAULT_EXTRACT_TIMEOUT_SECS,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        })
    }

    /// Loads settings from the default settings path, if any.
    pub fn load() -> Result<Self> {
        match paths::settings_path() {
            Some(path) => Self::load_from(&path),
            None => Self::with_defaults(),
        }
    }

    /// Loads settings from a specific file.
    ///
    /// A missing file yields the defaults. A file that cannot be parsed is
    /// logged and ignored.
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut settings = Self::with_defaults()?;

        if !path.exists() {
            debug!("Settings not found at {}, using defaults", path.display());
            return Ok(settings);
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings from {}", path.display()))?;

        match serde_json::from_str::<SettingsFile>(&content) {
            Ok(file) => settings.apply(file),
            Err(e) => {
                warn!(
                    path = %path.display(),
                    error = %e,
                    "Failed to parse settings, using defaults"
                );
            }
        }

        settings.validate();
        Ok(settings)
    }

    fn apply(&mut self, file: SettingsFile) {
        if let Some(v) = file.bucket_dir {
            self.bucket_dir = v;
        }
        if let Some(v) = file.cache_dir {
            self.cache_dir = v;
        }
        if let Some(v) = file.bin_dir {
            self.bin_dir = v;
        }
        if let Some(v) = file.folder_root {
            self.folder_root = v;
        }
        if let Some(v) = file.extractor {
            self.extractor = v;
        }
        if let Some(v) = file.architecture {
            self.architecture = v;
        }
        if let Some(v) = file.concurrency {
            self.concurrency = v;
        }
        if let Some(v) = file.check_timeout_secs {
            self.check_timeout_secs = v;
        }
        if let Some(v) = file.download_timeout_secs {
            self.download_timeout_secs = v;
        }
        if let Some(v) = file.extract_timeout_secs {
            self.extract_timeout_secs = v;
        }
        if let Some(v) = file.user_agent {
            self.user_agent = v;
        }
    }

    /// Clamp settings to usable values.
    pub fn validate(&mut self) {
        self.concurrency = self.concurrency.max(1);
        self.check_timeout_secs = self.check_timeout_secs.max(1);
        self.download_timeout_secs = self.download_timeout_secs.max(1);
        self.extract_timeout_secs = self.extract_timeout_secs.max(1);

        if self.architecture.trim().is_empty() {
            self.architecture = DEFAULT_ARCHITECTURE.to_string();
        }
    }

    pub fn check_timeout(&self) -> Duration {
        Duration::from_secs(self.check_timeout_secs)
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }

    pub fn extract_timeout(&self) -> Duration {
        Duration::from_secs(self.extract_timeout_secs)
    }
}
