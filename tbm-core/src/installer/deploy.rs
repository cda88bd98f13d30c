//! Deployment of extracted files into their final locations.
//!
//! Folders and binaries are treated differently on purpose: a folder
//! destination may hold user data, so replacing one needs confirmation,
//! while a binary is always replaced in place.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

use super::confirm::ConfirmOverwrite;
use super::InstallError;

/// Permission bits given to every deployed binary.
pub const BINARY_MODE: u32 = 0o755;

// ============================================================================
// Outcomes
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MappingStatus {
    Deployed,
    /// The destination existed and the overwrite was declined.
    Skipped,
}

/// Result of deploying one bin or folder mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingOutcome {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub status: MappingStatus,
}

impl MappingOutcome {
    fn new(source: &Path, destination: &Path, status: MappingStatus) -> Self {
        Self {
            source: source.to_path_buf(),
            destination: destination.to_path_buf(),
            status,
        }
    }

    pub fn is_skipped(&self) -> bool {
        self.status == MappingStatus::Skipped
    }
}

// ============================================================================
// Folder Deployment
// ============================================================================

/// Copies `source` (file or directory) to `destination`.
///
/// If `destination` already exists, `confirm` is asked first. On "no" the
/// destination is left untouched and the mapping is reported as skipped; on
/// "yes" it is removed and replaced by a full recursive copy.
pub fn deploy_folder(
    id: &str,
    source: &Path,
    destination: &Path,
    confirm: &dyn ConfirmOverwrite,
) -> Result<MappingOutcome, InstallError> {
    if fs::symlink_metadata(source).is_err() {
        return Err(InstallError::io(source, io::ErrorKind::NotFound.into()));
    }

    if let Ok(meta) = fs::symlink_metadata(destination) {
        if !confirm.confirm_overwrite(id, destination) {
            info!(package = %id, destination = %destination.display(), "Overwrite declined");
            return Ok(MappingOutcome::new(source, destination, MappingStatus::Skipped));
        }

        let removed = if meta.is_dir() {
            fs::remove_dir_all(destination)
        } else {
            fs::remove_file(destination)
        };
        removed.map_err(|e| InstallError::io(destination, e))?;
        debug!(package = %id, destination = %destination.display(), "Removed old destination");
    }

    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent).map_err(|e| InstallError::io(parent, e))?;
    }

    copy_recursive(source, destination)?;
    info!(
        package = %id,
        source = %source.display(),
        destination = %destination.display(),
        "Folder deployed"
    );
    Ok(MappingOutcome::new(source, destination, MappingStatus::Deployed))
}

/// Recursively copies a file or directory tree, keeping symlinks as symlinks.
fn copy_recursive(source: &Path, destination: &Path) -> Result<(), InstallError> {
    for entry in WalkDir::new(source) {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(source).to_path_buf();
            InstallError::io(&path, e.into())
        })?;

        let relative = entry.path().strip_prefix(source).unwrap_or(Path::new(""));
        let target = if relative.as_os_str().is_empty() {
            destination.to_path_buf()
        } else {
            destination.join(relative)
        };
        let file_type = entry.file_type();

        if file_type.is_dir() {
            fs::create_dir_all(&target).map_err(|e| InstallError::io(&target, e))?;
        } else if file_type.is_symlink() {
            copy_symlink(entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target).map_err(|e| InstallError::io(&target, e))?;
        }
    }

    Ok(())
}

#[cfg(unix)]
fn copy_symlink(link: &Path, target: &Path) -> Result<(), InstallError> {
    let points_to = fs::read_link(link).map_err(|e| InstallError::io(link, e))?;
    std::os::unix::fs::symlink(points_to, target).map_err(|e| InstallError::io(target, e))
}

#[cfg(not(unix))]
fn copy_symlink(link: &Path, target: &Path) -> Result<(), InstallError> {
    fs::copy(link, target)
        .map(|_| ())
        .map_err(|e| InstallError::io(target, e))
}

// ============================================================================
// Binary Deployment
// ============================================================================

/// Installs `source` as `destination` with mode 0755.
///
/// Any existing file at `destination` is replaced without asking. The old
/// file is unlinked first so a running binary can still be replaced.
pub fn deploy_binary(
    id: &str,
    source: &Path,
    destination: &Path,
) -> Result<MappingOutcome, InstallError> {
    if !source.is_file() {
        return Err(InstallError::io(source, io::ErrorKind::NotFound.into()));
    }

    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent).map_err(|e| InstallError::io(parent, e))?;
    }

    match fs::remove_file(destination) {
        Ok(()) => debug!(package = %id, destination = %destination.display(), "Replacing binary"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(InstallError::io(destination, e)),
    }

    fs::copy(source, destination).map_err(|e| InstallError::io(destination, e))?;
    set_mode(destination, BINARY_MODE)?;

    info!(
        package = %id,
        source = %source.display(),
        destination = %destination.display(),
        "Binary deployed"
    );
    Ok(MappingOutcome::new(source, destination, MappingStatus::Deployed))
}

/// Sets exact permission bits on a file (Unix only).
#[allow(unused_variables)]
fn set_mode(path: &Path, mode: u32) -> Result<(), InstallError> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;

        fs::set_permissions(path, fs::Permissions::from_mode(mode))
            .map_err(|e| InstallError::io(path, e))?;
    }

    Ok(())
}
