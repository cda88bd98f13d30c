//! Manifest document types.
//!
//! A manifest describes one package: the version tbm last saw, where to
//! download each architecture's asset, how to deploy it, and how to detect
//! the next version. Maps are ordered so that re-serialising a manifest is
//! stable and diffs stay readable.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

/// Token inside a manifest that is replaced with the current version.
pub const VERSION_PLACEHOLDER: &str = "<version>";

// ============================================================================
// Manifest
// ============================================================================

/// Persisted description of one package.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    /// A concrete download URL the manifest was derived from (informational).
    #[serde(default)]
    pub example_url: String,
    /// Latest version tbm knows about.
    #[serde(default)]
    pub version: String,
    /// Architecture name (e.g. `x64`) to its download/deploy entry.
    #[serde(default)]
    pub architecture: BTreeMap<String, ArchSpec>,
    /// How to discover the latest upstream version.
    #[serde(default)]
    pub checkver: Checkver,
}

impl Manifest {
    /// Returns the entry for the given architecture, if the package ships one.
    pub fn arch(&self, name: &str) -> Option<&ArchSpec> {
        self.architecture.get(name)
    }
}

// ============================================================================
// Architecture Entry
// ============================================================================

/// Platform-specific download and deployment instructions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchSpec {
    /// Download URL, possibly containing [`VERSION_PLACEHOLDER`].
    pub url: String,
    /// File name the downloaded asset is saved as inside the work dir.
    pub asset_name: String,
    /// Whether the asset must be unpacked before deployment.
    #[serde(default)]
    pub extract: bool,
    /// Source path (relative to the work dir) to file name in the bin dir.
    #[serde(default)]
    pub bin: BTreeMap<String, String>,
    /// Source path (relative to the work dir) to directory name under the folder root.
    #[serde(default)]
    pub folder: BTreeMap<String, String>,
}

// ============================================================================
// Checkver
// ============================================================================

/// Where and how to look for a new version.
///
/// `pattern` is a regular expression whose first capture group is the version.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Checkver {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub pattern: String,
    /// Keys tbm does not interpret, kept so a rewrite doesn't drop them.
    #[serde(flatten)]
    pub extra: BTreeMap<String, JsonValue>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "example_url": "https://example.com/foo-1.0.tar.gz",
        "version": "1.0",
        "architecture": {
            "x64": {
                "url": "https://example.com/foo-<version>.tar.gz",
                "asset_name": "foo.tar.gz",
                "extract": true,
                "bin": { "foo-1.0/foo": "foo" },
                "folder": { "foo-1.0/share": "share/foo" }
            }
        },
        "checkver": {
            "url": "https://example.com/releases",
            "pattern": "v(\\d+\\.\\d+)",
            "comment": "tags page"
        }
    }"#;

    #[test]
    fn test_parse_full_manifest() {
        let manifest: Manifest = serde_json::from_str(SAMPLE).unwrap();
        assert_eq!(manifest.version, "1.0");

        let x64 = manifest.arch("x64").unwrap();
        assert!(x64.extract);
        assert_eq!(x64.asset_name, "foo.tar.gz");
        assert_eq!(x64.bin.get("foo-1.0/foo").map(String::as_str), Some("foo"));
        assert_eq!(x64.folder.len(), 1);

        assert_eq!(manifest.checkver.pattern, r"v(\d+\.\d+)");
        assert_eq!(
            manifest.checkver.extra.get("comment"),
            Some(&JsonValue::String("tags page".to_string()))
        );
    }

    #[test]
    fn test_missing_optional_fields_default() {
        let manifest: Manifest = serde_json::from_str(
            r#"{ "version": "2", "architecture": { "x64": { "url": "u", "asset_name": "a" } } }"#,
        )
        .unwrap();

        let x64 = manifest.arch("x64").unwrap();
        assert!(!x64.extract);
        assert!(x64.bin.is_empty());
        assert!(x64.folder.is_empty());
        assert!(manifest.checkver.url.is_empty());
        assert!(manifest.arch("arm64").is_none());
    }
}
