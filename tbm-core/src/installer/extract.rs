//! Archive extraction through an external utility.
//!
//! tbm does not unpack archives itself. The configured extractor is run as
//! `<extractor> <asset_name>` with the package's work directory as its
//! current directory, and is expected to unpack the asset in place.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, info};

/// Maximum characters of extractor stderr kept in an error.
const MAX_STDERR_CHARS: usize = 2_000;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("failed to run {}: {source}", .program.display())]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{} exited with {code}: {stderr}", .program.display())]
    Failed {
        program: PathBuf,
        code: String,
        stderr: String,
    },

    #[error("{} did not finish within {}s", .program.display(), .limit.as_secs())]
    TimedOut { program: PathBuf, limit: Duration },
}

/// Unpacks a downloaded asset inside a work directory.
#[async_trait]
pub trait Extractor: Send + Sync {
    async fn extract(&self, work_dir: &Path, asset_name: &str) -> Result<(), ExtractError>;
}

/// Runs an external executable to extract archives.
#[derive(Debug, Clone)]
pub struct CommandExtractor {
    program: PathBuf,
    limit: Duration,
}

impl CommandExtractor {
    pub fn new(program: impl Into<PathBuf>, limit: Duration) -> Self {
        Self {
            program: program.into(),
            limit,
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }
}

#[async_trait]
impl Extractor for CommandExtractor {
    async fn extract(&self, work_dir: &Path, asset_name: &str) -> Result<(), ExtractError> {
        info!(
            program = %self.program.display(),
            work_dir = %work_dir.display(),
            asset = asset_name,
            "Extracting"
        );

        let mut cmd = Command::new(&self.program);
        cmd.arg(asset_name)
            .current_dir(work_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = match timeout(self.limit, cmd.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(source)) => {
                return Err(ExtractError::Spawn {
                    program: self.program.clone(),
                    source,
                })
            }
            Err(_) => {
                return Err(ExtractError::TimedOut {
                    program: self.program.clone(),
                    limit: self.limit,
                })
            }
        };

        debug!(
            stdout = %String::from_utf8_lossy(&output.stdout),
            "Extractor output"
        );

        if !output.status.success() {
            let code = output
                .status
                .code()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "signal".to_string());
            let stderr: String = String::from_utf8_lossy(&output.stderr)
                .trim()
                .chars()
                .take(MAX_STDERR_CHARS)
                .collect();

            return Err(ExtractError::Failed {
                program: self.program.clone(),
                code,
                stderr,
            });
        }

        Ok(())
    }
}
