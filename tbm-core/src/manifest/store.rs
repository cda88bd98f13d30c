//! Manifest persistence.
//!
//! Manifests live in a bucket directory as `<id>.json`. Loading yields two
//! views of the same document: the raw manifest, and a resolved copy where
//! every `<version>` token has been replaced with the raw manifest's current
//! version before parsing.

use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

use super::types::{Manifest, VERSION_PLACEHOLDER};

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur while reading or writing manifests.
#[derive(Debug, Error)]
pub enum ManifestError {
    /// No `<id>.json` in the bucket. Callers usually skip the package.
    #[error("manifest not found: {0}")]
    NotFound(String),

    #[error("manifest already exists: {0}")]
    AlreadyExists(String),

    #[error("IO error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid manifest {id}: {source}")]
    Parse {
        id: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize manifest: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("invalid bucket path: {0}")]
    Pattern(#[from] glob::PatternError),
}

impl ManifestError {
    fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    /// True when the manifest simply does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

// ============================================================================
// Loaded Manifest
// ============================================================================

/// Both views of a manifest read from disk.
#[derive(Debug, Clone)]
pub struct LoadedManifest {
    /// The document as stored. Its `version` is compared and rewritten on update.
    pub raw: Manifest,
    /// The document with `<version>` substituted by `raw.version`.
    pub resolved: Manifest,
}

// ============================================================================
// Manifest Store
// ============================================================================

/// Reads and writes `<id>.json` manifests in a bucket directory.
#[derive(Debug, Clone)]
pub struct ManifestStore {
    bucket_dir: PathBuf,
}

impl ManifestStore {
    pub fn new(bucket_dir: impl Into<PathBuf>) -> Self {
        Self {
            bucket_dir: bucket_dir.into(),
        }
    }

    pub fn bucket_dir(&self) -> &Path {
        &self.bucket_dir
    }

    /// Returns the path of the manifest for `id`.
    pub fn manifest_path(&self, id: &str) -> PathBuf {
        self.bucket_dir.join(format!("{id}.json"))
    }

    /// Checks whether a manifest for `id` exists.
    pub fn contains(&self, id: &str) -> bool {
        self.manifest_path(id).is_file()
    }

    /// Lists the ids of all manifests in the bucket, sorted.
    pub fn discover(&self) -> Result<Vec<String>, ManifestError> {
        let dir = glob::Pattern::escape(&self.bucket_dir.to_string_lossy());
        let pattern = format!("{dir}/*.json");

        let mut ids: Vec<String> = glob::glob(&pattern)?
            .filter_map(|entry| entry.ok())
            .filter_map(|path| {
                path.file_stem()
                    .and_then(|stem| stem.to_str())
                    .map(str::to_string)
            })
            .collect();
        ids.sort();

        debug!(bucket = %self.bucket_dir.display(), count = ids.len(), "Discovered manifests");
        Ok(ids)
    }

    /// Loads the manifest for `id`.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError::NotFound`] if the file is absent, or a parse
    /// error if either view is not a valid manifest.
    pub fn load(&self, id: &str) -> Result<LoadedManifest, ManifestError> {
        let path = self.manifest_path(id);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(ManifestError::NotFound(id.to_string()))
            }
            Err(e) => return Err(ManifestError::io(&path, e)),
        };

        let raw: Manifest = serde_json::from_str(&content).map_err(|source| {
            ManifestError::Parse {
                id: id.to_string(),
                source,
            }
        })?;

        let substituted = substitute_version(&content, &raw.version);
        let resolved: Manifest =
            serde_json::from_str(&substituted).map_err(|source| ManifestError::Parse {
                id: id.to_string(),
                source,
            })?;

        Ok(LoadedManifest { raw, resolved })
    }

    /// Writes `manifest` as `<id>.json`, replacing any existing file.
    ///
    /// The document is written to a sibling temp file first and renamed into
    /// place, so a failed write never leaves a truncated manifest behind.
    pub fn save(&self, manifest: &Manifest, id: &str) -> Result<(), ManifestError> {
        fs::create_dir_all(&self.bucket_dir)
            .map_err(|e| ManifestError::io(&self.bucket_dir, e))?;

        let path = self.manifest_path(id);
        let tmp_path = self.bucket_dir.join(format!("{id}.json.tmp"));
        let bytes = to_pretty_json(manifest)?;

        fs::write(&tmp_path, bytes).map_err(|e| ManifestError::io(&tmp_path, e))?;
        if let Err(e) = fs::rename(&tmp_path, &path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(ManifestError::io(&path, e));
        }

        debug!(package = %id, path = %path.display(), "Manifest saved");
        Ok(())
    }

    /// Like [`ManifestStore::save`] but refuses to replace an existing manifest.
    pub fn create(&self, manifest: &Manifest, id: &str) -> Result<(), ManifestError> {
        if self.contains(id) {
            return Err(ManifestError::AlreadyExists(id.to_string()));
        }
        self.save(manifest, id)
    }
}

// ============================================================================
// Text Helpers
// ============================================================================

/// Replaces every `<version>` token in a manifest's text with `version`.
///
/// The version is JSON-escaped first so that the result stays a valid
/// document whatever characters the version contains.
pub fn substitute_version(text: &str, version: &str) -> String {
    let quoted = serde_json::to_string(version).unwrap_or_else(|_| format!("\"{version}\""));
    let escaped = &quoted[1..quoted.len() - 1];
    text.replace(VERSION_PLACEHOLDER, escaped)
}

/// Serialises a manifest with 4-space indentation and a trailing newline.
///
/// serde_json leaves `&`, `<` and `>` unescaped, and the manifest's maps are
/// ordered, so output is byte-stable for a given manifest.
pub fn to_pretty_json(manifest: &Manifest) -> Result<Vec<u8>, serde_json::Error> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    manifest.serialize(&mut serializer)?;
    buf.push(b'\n');
    Ok(buf)
}
