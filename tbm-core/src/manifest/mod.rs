//! Package manifests.
//!
//! # Architecture
//!
//! - `types`: The manifest document (`Manifest`, `ArchSpec`, `Checkver`)
//! - `store`: Loading, `<version>` substitution and persistence
//! - `scaffold`: Starter manifests from GitHub release URLs

pub mod scaffold;
pub mod store;
pub mod types;

pub use scaffold::{is_archive, scaffold_from_release_url, Scaffold, ScaffoldError};
pub use store::{substitute_version, to_pretty_json, LoadedManifest, ManifestError, ManifestStore};
pub use types::{ArchSpec, Checkver, Manifest, VERSION_PLACEHOLDER};
