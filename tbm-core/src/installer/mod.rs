//! Single-package installation.
//!
//! Installing a package walks a fixed sequence:
//!
//! ```text
//! Start -> Download -> (Extract | SkipExtract) -> Deploy folders -> Deploy binaries -> Done
//! ```
//!
//! Any fatal step stops the sequence and nothing is rolled back. All file
//! operations are resolved against an explicit work directory
//! (`{cache}/<id>/`); the process working directory is never changed.
//!
//! # Architecture
//!
//! - `download`: Streaming asset download
//! - `extract`: The external extraction utility
//! - `confirm`: Overwrite confirmation policies
//! - `deploy`: Folder and binary deployment

pub mod confirm;
pub mod deploy;
pub mod download;
pub mod extract;

use std::collections::HashMap;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::Settings;
use crate::manifest::{Manifest, ManifestError, ManifestStore};
use crate::paths;

pub use confirm::{AssumeNo, AssumeYes, ConfirmOverwrite, StdinConfirm};
pub use deploy::{MappingOutcome, MappingStatus, BINARY_MODE};
pub use download::DownloadError;
pub use extract::{CommandExtractor, ExtractError, Extractor};

// ============================================================================
// Error Types
// ============================================================================

/// Errors that abort the installation of one package.
#[derive(Debug, Error)]
pub enum InstallError {
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error("no `{0}` entry in manifest")]
    UnsupportedArchitecture(String),

    #[error("asset name must be a plain file name: {0:?}")]
    InvalidAssetName(String),

    #[error("destination must be a relative path inside its root: {0:?}")]
    InvalidDestination(String),

    #[error("{} overlaps a destination of {owner}", .path.display())]
    DestinationConflict { path: PathBuf, owner: String },

    #[error("folder destination {} overlaps the bin directory", .0.display())]
    OverlapsBinDir(PathBuf),

    #[error(transparent)]
    Download(#[from] DownloadError),

    #[error("extraction failed: {0}")]
    Extract(#[from] ExtractError),

    #[error("deployment task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl InstallError {
    pub(crate) fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

// ============================================================================
// Layout, Events, Report
// ============================================================================

/// Where an install reads and writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallLayout {
    /// Root of per-package work directories.
    pub cache_dir: PathBuf,
    /// Destination of bin mappings.
    pub bin_dir: PathBuf,
    /// Destination root of folder mappings.
    pub folder_root: PathBuf,
}

impl InstallLayout {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            cache_dir: settings.cache_dir.clone(),
            bin_dir: settings.bin_dir.clone(),
            folder_root: settings.folder_root.clone(),
        }
    }

    pub fn work_dir(&self, id: &str) -> PathBuf {
        paths::work_dir(&self.cache_dir, id)
    }
}

/// Progress notifications emitted while installing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallEvent {
    Downloading { url: String },
    Downloaded { bytes: u64 },
    Extracting { asset: String },
    Deploying { source: PathBuf, destination: PathBuf },
    Skipped { destination: PathBuf },
}

/// What an install did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallReport {
    pub id: String,
    pub asset_path: PathBuf,
    pub bytes_downloaded: u64,
    pub extracted: bool,
    pub folders: Vec<MappingOutcome>,
    pub binaries: Vec<MappingOutcome>,
}

impl InstallReport {
    /// Folder mappings left untouched because the overwrite was declined.
    pub fn skipped_folders(&self) -> impl Iterator<Item = &MappingOutcome> {
        self.folders.iter().filter(|o| o.is_skipped())
    }
}

/// Source and destination of one mapping, resolved to absolute paths.
#[derive(Debug, Clone)]
struct PlannedMapping {
    source: PathBuf,
    destination: PathBuf,
}

// ============================================================================
// Installer
// ============================================================================

/// Installs packages one at a time.
///
/// Destinations deployed during the lifetime of an `Installer` are
/// remembered, so two different packages in one run cannot write to the same
/// path or to a path inside another package's destination.
pub struct Installer {
    layout: InstallLayout,
    architecture: String,
    client: reqwest::Client,
    extractor: Arc<dyn Extractor>,
    confirm: Arc<dyn ConfirmOverwrite>,
    claimed: HashMap<PathBuf, String>,
}

impl Installer {
    pub fn new(
        layout: InstallLayout,
        architecture: impl Into<String>,
        client: reqwest::Client,
        extractor: Arc<dyn Extractor>,
        confirm: Arc<dyn ConfirmOverwrite>,
    ) -> Self {
        Self {
            layout,
            architecture: architecture.into(),
            client,
            extractor,
            confirm,
            claimed: HashMap::new(),
        }
    }

    /// Builds an installer using the configured layout, extractor and timeouts.
    pub fn from_settings(
        settings: &Settings,
        confirm: Arc<dyn ConfirmOverwrite>,
    ) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(settings.download_timeout())
            .build()?;
        let extractor = CommandExtractor::new(&settings.extractor, settings.extract_timeout());

        Ok(Self::new(
            InstallLayout::from_settings(settings),
            settings.architecture.clone(),
            client,
            Arc::new(extractor),
            confirm,
        ))
    }

    pub fn layout(&self) -> &InstallLayout {
        &self.layout
    }

    pub fn architecture(&self) -> &str {
        &self.architecture
    }

    /// Loads `id` from `store` and installs it.
    pub async fn install_package<F>(
        &mut self,
        store: &ManifestStore,
        id: &str,
        on_event: F,
    ) -> Result<InstallReport, InstallError>
    where
        F: Fn(InstallEvent),
    {
        let loaded = store.load(id)?;
        self.install_with(id, &loaded.resolved, on_event).await
    }

    /// Installs `id` from an already resolved manifest.
    pub async fn install(
        &mut self,
        id: &str,
        manifest: &Manifest,
    ) -> Result<InstallReport, InstallError> {
        self.install_with(id, manifest, |_| {}).await
    }

    /// Installs `id`, reporting progress through `on_event`.
    pub async fn install_with<F>(
        &mut self,
        id: &str,
        manifest: &Manifest,
        on_event: F,
    ) -> Result<InstallReport, InstallError>
    where
        F: Fn(InstallEvent),
    {
        let target = manifest
            .arch(&self.architecture)
            .ok_or_else(|| InstallError::UnsupportedArchitecture(self.architecture.clone()))?;

        if !is_plain_file_name(&target.asset_name) {
            return Err(InstallError::InvalidAssetName(target.asset_name.clone()));
        }

        let work_dir = self.layout.work_dir(id);
        let folders = plan(&work_dir, &self.layout.folder_root, &target.folder)?;
        let binaries = plan(&work_dir, &self.layout.bin_dir, &target.bin)?;
        self.check_conflicts(id, &folders, &binaries)?;

        // Prepare
        tokio::fs::create_dir_all(&work_dir)
            .await
            .map_err(|e| InstallError::io(&work_dir, e))?;
        debug!(package = %id, work_dir = %work_dir.display(), "Work directory ready");

        // Download
        let asset_path = work_dir.join(&target.asset_name);
        on_event(InstallEvent::Downloading {
            url: target.url.clone(),
        });
        let bytes_downloaded =
            download::download_file(&self.client, &target.url, &asset_path).await?;
        on_event(InstallEvent::Downloaded {
            bytes: bytes_downloaded,
        });

        // Extract
        if target.extract {
            on_event(InstallEvent::Extracting {
                asset: target.asset_name.clone(),
            });
            self.extractor.extract(&work_dir, &target.asset_name).await?;
        } else {
            debug!(package = %id, "Extraction not required");
        }

        // Deploy
        for mapping in folders.iter().chain(binaries.iter()) {
            self.claimed
                .insert(mapping.destination.clone(), id.to_string());
        }

        let mut report = InstallReport {
            id: id.to_string(),
            asset_path,
            bytes_downloaded,
            extracted: target.extract,
            folders: Vec::with_capacity(folders.len()),
            binaries: Vec::with_capacity(binaries.len()),
        };

        for mapping in &folders {
            on_event(InstallEvent::Deploying {
                source: mapping.source.clone(),
                destination: mapping.destination.clone(),
            });
            let confirm = Arc::clone(&self.confirm);
            let (pkg, source, destination) = (
                id.to_string(),
                mapping.source.clone(),
                mapping.destination.clone(),
            );
            let outcome = run_blocking(move || {
                deploy::deploy_folder(&pkg, &source, &destination, confirm.as_ref())
            })
            .await?;
            if outcome.is_skipped() {
                on_event(InstallEvent::Skipped {
                    destination: outcome.destination.clone(),
                });
            }
            report.folders.push(outcome);
        }

        for mapping in &binaries {
            on_event(InstallEvent::Deploying {
                source: mapping.source.clone(),
                destination: mapping.destination.clone(),
            });
            let (pkg, source, destination) = (
                id.to_string(),
                mapping.source.clone(),
                mapping.destination.clone(),
            );
            let outcome =
                run_blocking(move || deploy::deploy_binary(&pkg, &source, &destination)).await?;
            report.binaries.push(outcome);
        }

        info!(
            package = %id,
            folders = report.folders.len(),
            binaries = report.binaries.len(),
            "Install complete"
        );
        Ok(report)
    }

    /// Rejects destinations that overlap each other, the bin directory, or a
    /// destination already deployed by another package.
    ///
    /// Two paths overlap when one is equal to or inside the other, since
    /// replacing the outer one deletes the inner one.
    fn check_conflicts(
        &self,
        id: &str,
        folders: &[PlannedMapping],
        binaries: &[PlannedMapping],
    ) -> Result<(), InstallError> {
        if let Some(folder) = folders
            .iter()
            .find(|m| overlaps(&m.destination, &self.layout.bin_dir))
        {
            return Err(InstallError::OverlapsBinDir(folder.destination.clone()));
        }

        let destinations: Vec<&Path> = folders
            .iter()
            .chain(binaries)
            .map(|m| m.destination.as_path())
            .collect();

        for (i, destination) in destinations.iter().enumerate() {
            if destinations[i + 1..]
                .iter()
                .any(|other| overlaps(destination, other))
            {
                return Err(InstallError::DestinationConflict {
                    path: destination.to_path_buf(),
                    owner: id.to_string(),
                });
            }

            let claimed_by_other = self
                .claimed
                .iter()
                .find(|(path, owner)| owner.as_str() != id && overlaps(destination, path));
            if let Some((_, owner)) = claimed_by_other {
                return Err(InstallError::DestinationConflict {
                    path: destination.to_path_buf(),
                    owner: owner.clone(),
                });
            }
        }

        Ok(())
    }
}

/// Runs a blocking deployment step on the blocking thread pool.
///
/// Folder deployment may wait on an interactive prompt and copies whole
/// trees with `std::fs`.
async fn run_blocking<T, F>(f: F) -> Result<T, InstallError>
where
    F: FnOnce() -> Result<T, InstallError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await?
}

fn overlaps(a: &Path, b: &Path) -> bool {
    a.starts_with(b) || b.starts_with(a)
}

/// Resolves `source -> name` mappings against the work dir and a destination root.
fn plan<'a>(
    work_dir: &Path,
    root: &Path,
    mappings: impl IntoIterator<Item = (&'a String, &'a String)>,
) -> Result<Vec<PlannedMapping>, InstallError> {
    mappings
        .into_iter()
        .map(|(source, name)| {
            if !is_contained(name) {
                return Err(InstallError::InvalidDestination(name.clone()));
            }
            Ok(PlannedMapping {
                source: work_dir.join(source),
                destination: root.join(name),
            })
        })
        .collect()
}

fn is_plain_file_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

/// True for non-empty relative paths that cannot climb out of their root.
fn is_contained(name: &str) -> bool {
    let path = Path::new(name);
    path.components().any(|c| matches!(c, Component::Normal(_)))
        && path
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::ArchSpec;
    use async_trait::async_trait;
    use std::collections::BTreeMap;
    use std::fs;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Creates the files a real extractor would, and records the call.
    #[derive(Default)]
    struct FakeExtractor {
        calls: Mutex<Vec<(PathBuf, String)>>,
        fail: bool,
    }

    #[async_trait]
    impl Extractor for FakeExtractor {
        async fn extract(&self, work_dir: &Path, asset_name: &str) -> Result<(), ExtractError> {
            self.calls
                .lock()
                .unwrap()
                .push((work_dir.to_path_buf(), asset_name.to_string()));
            if self.fail {
                return Err(ExtractError::Failed {
                    program: PathBuf::from("extract.sh"),
                    code: "1".to_string(),
                    stderr: "corrupt archive".to_string(),
                });
            }
            fs::create_dir_all(work_dir.join("pkg/share")).unwrap();
            fs::write(work_dir.join("pkg/tool"), "tool binary").unwrap();
            fs::write(work_dir.join("pkg/share/data.txt"), "data").unwrap();
            Ok(())
        }
    }

    struct Fixture {
        _temp: TempDir,
        layout: InstallLayout,
    }

    fn fixture() -> Fixture {
        let temp = TempDir::new().unwrap();
        let layout = InstallLayout {
            cache_dir: temp.path().join("cache"),
            bin_dir: temp.path().join("home/.local/bin"),
            folder_root: temp.path().join("home/.local"),
        };
        Fixture {
            _temp: temp,
            layout,
        }
    }

    fn installer(
        layout: &InstallLayout,
        extractor: Arc<FakeExtractor>,
        confirm: Arc<dyn ConfirmOverwrite>,
    ) -> Installer {
        Installer::new(layout.clone(), "x64", reqwest::Client::new(), extractor, confirm)
    }

    fn manifest(url: String, extract: bool, bin: &[(&str, &str)], folder: &[(&str, &str)]) -> Manifest {
        let to_map = |pairs: &[(&str, &str)]| -> BTreeMap<String, String> {
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect()
        };
        Manifest {
            version: "1.0".to_string(),
            architecture: BTreeMap::from([(
                "x64".to_string(),
                ArchSpec {
                    url,
                    asset_name: "pkg.tar.gz".to_string(),
                    extract,
                    bin: to_map(bin),
                    folder: to_map(folder),
                },
            )]),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_install_extracts_and_deploys() {
        let fx = fixture();
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/pkg.tar.gz")
            .with_body("archive")
            .create_async()
            .await;

        let extractor = Arc::new(FakeExtractor::default());
        let mut installer = installer(&fx.layout, extractor.clone(), Arc::new(AssumeNo));
        let manifest = manifest(
            format!("{}/pkg.tar.gz", server.url()),
            true,
            &[("pkg/tool", "tool")],
            &[("pkg/share", "share/pkg")],
        );

        let events = Mutex::new(Vec::new());
        let report = installer
            .install_with("pkg", &manifest, |e| events.lock().unwrap().push(e))
            .await
            .unwrap();

        let work_dir = fx.layout.cache_dir.join("pkg");
        assert_eq!(report.asset_path, work_dir.join("pkg.tar.gz"));
        assert_eq!(fs::read_to_string(&report.asset_path).unwrap(), "archive");
        assert!(report.extracted);
        assert_eq!(
            *extractor.calls.lock().unwrap(),
            vec![(work_dir, "pkg.tar.gz".to_string())]
        );

        assert_eq!(
            fs::read_to_string(fx.layout.bin_dir.join("tool")).unwrap(),
            "tool binary"
        );
        assert_eq!(
            fs::read_to_string(fx.layout.folder_root.join("share/pkg/data.txt")).unwrap(),
            "data"
        );

        let events = events.lock().unwrap();
        assert!(matches!(events.first(), Some(InstallEvent::Downloading { .. })));
        assert!(events.contains(&InstallEvent::Downloaded { bytes: 7 }));
        assert_eq!(report.bytes_downloaded, 7);
        assert!(events
            .iter()
            .any(|e| matches!(e, InstallEvent::Extracting { asset } if asset == "pkg.tar.gz")));
    }

    #[tokio::test]
    async fn test_install_skips_declined_folder_but_deploys_binaries() {
        let fx = fixture();
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/pkg.tar.gz")
            .with_body("archive")
            .create_async()
            .await;

        let existing = fx.layout.folder_root.join("share/pkg");
        fs::create_dir_all(&existing).unwrap();
        fs::write(existing.join("user.txt"), "mine").unwrap();

        let mut installer = installer(
            &fx.layout,
            Arc::new(FakeExtractor::default()),
            Arc::new(AssumeNo),
        );
        let manifest = manifest(
            format!("{}/pkg.tar.gz", server.url()),
            true,
            &[("pkg/tool", "tool")],
            &[("pkg/share", "share/pkg")],
        );

        let report = installer.install("pkg", &manifest).await.unwrap();

        assert_eq!(report.skipped_folders().count(), 1);
        assert_eq!(fs::read_to_string(existing.join("user.txt")).unwrap(), "mine");
        assert!(!existing.join("data.txt").exists());
        assert!(fx.layout.bin_dir.join("tool").exists());
    }

    #[tokio::test]
    async fn test_extract_failure_aborts_before_deploy() {
        let fx = fixture();
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/pkg.tar.gz")
            .with_body("archive")
            .create_async()
            .await;

        let extractor = Arc::new(FakeExtractor {
            fail: true,
            ..Default::default()
        });
        let mut installer = installer(&fx.layout, extractor, Arc::new(AssumeYes));
        let manifest = manifest(
            format!("{}/pkg.tar.gz", server.url()),
            true,
            &[("pkg/tool", "tool")],
            &[],
        );

        let err = installer.install("pkg", &manifest).await.unwrap_err();

        assert!(matches!(err, InstallError::Extract(_)));
        assert!(fx.layout.cache_dir.join("pkg/pkg.tar.gz").exists());
        assert!(!fx.layout.bin_dir.join("tool").exists());
    }

    #[tokio::test]
    async fn test_download_failure_is_install_error() {
        let fx = fixture();
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/pkg.tar.gz")
            .with_status(500)
            .create_async()
            .await;

        let extractor = Arc::new(FakeExtractor::default());
        let mut installer = installer(&fx.layout, extractor.clone(), Arc::new(AssumeYes));
        let manifest = manifest(format!("{}/pkg.tar.gz", server.url()), true, &[], &[]);

        let err = installer.install("pkg", &manifest).await.unwrap_err();

        assert!(matches!(err, InstallError::Download(_)));
        assert!(extractor.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_architecture() {
        let fx = fixture();
        let mut installer = Installer::new(
            fx.layout.clone(),
            "arm64",
            reqwest::Client::new(),
            Arc::new(FakeExtractor::default()),
            Arc::new(AssumeYes),
        );
        let manifest = manifest("http://unused".to_string(), false, &[], &[]);

        let err = installer.install("pkg", &manifest).await.unwrap_err();
        assert!(matches!(err, InstallError::UnsupportedArchitecture(arch) if arch == "arm64"));
    }

    #[tokio::test]
    async fn test_unsafe_names_are_rejected_before_download() {
        let fx = fixture();
        let mut installer = installer(
            &fx.layout,
            Arc::new(FakeExtractor::default()),
            Arc::new(AssumeYes),
        );

        let escaping = manifest("http://unused".to_string(), false, &[("a", "../../etc/a")], &[]);
        let err = installer.install("pkg", &escaping).await.unwrap_err();
        assert!(matches!(err, InstallError::InvalidDestination(_)));

        let mut bad_asset = manifest("http://unused".to_string(), false, &[], &[]);
        bad_asset
            .architecture
            .get_mut("x64")
            .unwrap()
            .asset_name = "../pkg.tar.gz".to_string();
        let err = installer.install("pkg", &bad_asset).await.unwrap_err();
        assert!(matches!(err, InstallError::InvalidAssetName(_)));

        assert!(!fx.layout.cache_dir.join("pkg").exists());
    }

    #[tokio::test]
    async fn test_destination_claimed_by_other_package_conflicts() {
        let fx = fixture();
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/pkg.tar.gz")
            .with_body("archive")
            .expect_at_least(1)
            .create_async()
            .await;
        let url = format!("{}/pkg.tar.gz", server.url());

        let mut installer = installer(
            &fx.layout,
            Arc::new(FakeExtractor::default()),
            Arc::new(AssumeYes),
        );
        let first = manifest(url.clone(), true, &[("pkg/tool", "tool")], &[]);
        installer.install("first", &first).await.unwrap();
        installer.install("first", &first).await.unwrap();

        let second = manifest(url, true, &[("pkg/tool", "tool")], &[]);
        let err = installer.install("second", &second).await.unwrap_err();
        assert!(
            matches!(err, InstallError::DestinationConflict { ref owner, .. } if owner == "first")
        );
    }

    #[tokio::test]
    async fn test_folder_over_bin_dir_is_rejected_and_binaries_survive() {
        let fx = fixture();
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/pkg.tar.gz")
            .with_body("archive")
            .create_async()
            .await;
        let url = format!("{}/pkg.tar.gz", server.url());

        let mut installer = installer(
            &fx.layout,
            Arc::new(FakeExtractor::default()),
            Arc::new(AssumeYes),
        );
        let first = manifest(url.clone(), true, &[("pkg/tool", "tool")], &[]);
        installer.install("first", &first).await.unwrap();

        let second = manifest(url.clone(), true, &[], &[("pkg/bin", "bin")]);
        let err = installer.install("second", &second).await.unwrap_err();
        assert!(matches!(err, InstallError::OverlapsBinDir(ref path) if *path == fx.layout.bin_dir));

        let inside = manifest(url, true, &[], &[("pkg/share", "bin/share")]);
        let err = installer.install("third", &inside).await.unwrap_err();
        assert!(matches!(err, InstallError::OverlapsBinDir(_)));

        assert_eq!(
            fs::read_to_string(fx.layout.bin_dir.join("tool")).unwrap(),
            "tool binary"
        );
    }

    #[tokio::test]
    async fn test_folder_containing_other_package_destination_conflicts() {
        let fx = fixture();
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/pkg.tar.gz")
            .with_body("archive")
            .create_async()
            .await;
        let url = format!("{}/pkg.tar.gz", server.url());

        let mut installer = installer(
            &fx.layout,
            Arc::new(FakeExtractor::default()),
            Arc::new(AssumeYes),
        );
        let first = manifest(url.clone(), true, &[], &[("pkg/share", "share/pkg")]);
        installer.install("first", &first).await.unwrap();

        let outer = manifest(url.clone(), true, &[], &[("pkg/share", "share")]);
        let err = installer.install("second", &outer).await.unwrap_err();
        assert!(
            matches!(err, InstallError::DestinationConflict { ref owner, .. } if owner == "first")
        );

        let inner = manifest(url, true, &[], &[("pkg/share", "share/pkg/extra")]);
        let err = installer.install("third", &inner).await.unwrap_err();
        assert!(
            matches!(err, InstallError::DestinationConflict { ref owner, .. } if owner == "first")
        );

        assert_eq!(
            fs::read_to_string(fx.layout.folder_root.join("share/pkg/data.txt")).unwrap(),
            "data"
        );
    }

    #[tokio::test]
    async fn test_nested_destinations_within_one_package_conflict() {
        let fx = fixture();
        let mut installer = installer(
            &fx.layout,
            Arc::new(FakeExtractor::default()),
            Arc::new(AssumeYes),
        );
        let nested = manifest(
            "http://unused".to_string(),
            true,
            &[],
            &[("pkg/share", "share"), ("pkg/tool", "share/tool")],
        );

        let err = installer.install("pkg", &nested).await.unwrap_err();

        assert!(
            matches!(err, InstallError::DestinationConflict { ref owner, .. } if owner == "pkg")
        );
        assert!(!fx.layout.cache_dir.join("pkg").exists());
    }

    /// Records the thread each confirmation is asked on.
    #[derive(Default)]
    struct ThreadRecorder {
        threads: Mutex<Vec<std::thread::ThreadId>>,
    }

    impl ConfirmOverwrite for ThreadRecorder {
        fn confirm_overwrite(&self, _id: &str, _destination: &Path) -> bool {
            self.threads
                .lock()
                .unwrap()
                .push(std::thread::current().id());
            false
        }
    }

    #[tokio::test]
    async fn test_confirmation_runs_off_the_async_thread() {
        let fx = fixture();
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/pkg.tar.gz")
            .with_body("archive")
            .create_async()
            .await;
        fs::create_dir_all(fx.layout.folder_root.join("share/pkg")).unwrap();

        let recorder = Arc::new(ThreadRecorder::default());
        let mut installer = installer(
            &fx.layout,
            Arc::new(FakeExtractor::default()),
            recorder.clone(),
        );
        let manifest = manifest(
            format!("{}/pkg.tar.gz", server.url()),
            true,
            &[],
            &[("pkg/share", "share/pkg")],
        );

        let report = installer.install("pkg", &manifest).await.unwrap();

        assert_eq!(report.skipped_folders().count(), 1);
        let threads = recorder.threads.lock().unwrap();
        assert_eq!(threads.len(), 1);
        assert_ne!(threads[0], std::thread::current().id());
    }

    #[test]
    fn test_name_validation() {
        assert!(is_plain_file_name("foo.tar.gz"));
        assert!(!is_plain_file_name("a/b"));
        assert!(!is_plain_file_name(".."));
        assert!(!is_plain_file_name(""));
        assert!(!is_plain_file_name("/abs"));

        assert!(is_contained("share/foo"));
        assert!(is_contained("foo"));
        assert!(!is_contained("/usr/bin/foo"));
        assert!(!is_contained("../foo"));
        assert!(!is_contained(""));
        assert!(!is_contained("."));
    }

    #[test]
    fn test_layout_from_settings() {
        let settings = Settings::with_defaults().unwrap();
        let layout = InstallLayout::from_settings(&settings);
        assert_eq!(layout.bin_dir, settings.bin_dir);
        assert_eq!(layout.work_dir("foo"), settings.cache_dir.join("foo"));
    }
}
