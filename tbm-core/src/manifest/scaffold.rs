//! Manifest scaffolding from a GitHub release download URL.
//!
//! Given one concrete asset URL such as
//! `https://github.com/BurntSushi/ripgrep/releases/download/v14.1.0/ripgrep-14.1.0-x86_64-unknown-linux-musl.tar.gz`
//! this builds a starter manifest: the version is lifted out of the tag and
//! replaced by `<version>` in the URL and asset name, and checkver points at
//! the repository's releases page.

use std::collections::BTreeMap;
use thiserror::Error;
use url::Url;

use super::types::{ArchSpec, Checkver, Manifest, VERSION_PLACEHOLDER};
use crate::config::DEFAULT_ARCHITECTURE;

#[derive(Debug, Error)]
pub enum ScaffoldError {
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("not a GitHub release download URL: {0}")]
    NotAReleaseUrl(String),

    #[error("release tag carries no version: {0}")]
    MissingVersion(String),
}

/// Archive extensions the extraction utility is expected to handle.
const ARCHIVE_EXTENSIONS: &[&str] = &[".tar.gz", ".tgz", ".tar.xz", ".zip"];

/// True when a release asset name looks like an archive that needs extracting.
pub fn is_archive(name: &str) -> bool {
    let lower = name.to_lowercase();
    ARCHIVE_EXTENSIONS.iter().any(|ext| lower.ends_with(*ext))
}

// ============================================================================
// Scaffold
// ============================================================================

/// A generated manifest together with the package id it should be saved as.
#[derive(Debug, Clone)]
pub struct Scaffold {
    pub id: String,
    pub manifest: Manifest,
}

/// Builds a starter manifest from a GitHub release asset URL.
pub fn scaffold_from_release_url(example_url: &str) -> Result<Scaffold, ScaffoldError> {
    let url = Url::parse(example_url)?;
    let not_release = || ScaffoldError::NotAReleaseUrl(example_url.to_string());

    if url.host_str() != Some("github.com") {
        return Err(not_release());
    }

    let segments: Vec<&str> = url
        .path_segments()
        .map(|s| s.filter(|seg| !seg.is_empty()).collect())
        .unwrap_or_default();

    let [owner, name, "releases", "download", tag, asset] = segments.as_slice() else {
        return Err(not_release());
    };

    let version = tag.strip_prefix('v').unwrap_or(*tag);
    if version.is_empty() {
        return Err(ScaffoldError::MissingVersion(tag.to_string()));
    }

    let arch = ArchSpec {
        url: example_url.replace(version, VERSION_PLACEHOLDER),
        asset_name: asset.replace(version, VERSION_PLACEHOLDER),
        extract: is_archive(asset),
        bin: BTreeMap::from([(name.to_string(), name.to_string())]),
        folder: BTreeMap::new(),
    };

    let checkver = Checkver {
        url: format!("https://github.com/{owner}/{name}/releases"),
        pattern: format!(
            r#"href="/{}/{}/tree/v(.*?)""#,
            regex::escape(owner),
            regex::escape(name)
        ),
        extra: BTreeMap::new(),
    };

    let manifest = Manifest {
        example_url: example_url.to_string(),
        version: version.to_string(),
        architecture: BTreeMap::from([(DEFAULT_ARCHITECTURE.to_string(), arch)]),
        checkver,
    };

    Ok(Scaffold {
        id: name.to_string(),
        manifest,
    })
}
