//! tbm Core Library
//!
//! This crate provides the core functionality for tbm, a personal package
//! manager for prebuilt Linux binaries. It includes:
//!
//! - Manifest storage (one `<id>.json` per package in a bucket directory)
//! - Upstream version detection via page scraping
//! - Concurrent update checks that rewrite manifests in place
//! - Download, extraction and deployment of packages
//! - Scaffolding manifests from GitHub release URLs
//! - Configuration management (settings, default paths)

pub mod checkver;
pub mod config;
pub mod installer;
pub mod manifest;
pub mod paths;
pub mod update;

// Re-exports for convenience
pub use config::{Settings, CONCURRENCY};

// Re-export manifest types
pub use manifest::{
    scaffold_from_release_url, ArchSpec, Checkver, LoadedManifest, Manifest, ManifestError,
    ManifestStore, Scaffold, ScaffoldError,
};

// Re-export version checking and updates
pub use checkver::{HttpVersionChecker, VersionCheck, VersionChecker};
pub use update::{CheckOutcome, CheckStatus, UpdateOrchestrator, UpdateReport};

// Re-export installer
pub use installer::{
    AssumeNo, AssumeYes, ConfirmOverwrite, InstallError, InstallEvent, InstallLayout,
    InstallReport, Installer, StdinConfirm,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
