//! Streaming asset download.

use futures::StreamExt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("download of {url} failed with status {status}")]
    Status { url: String, status: u16 },

    #[error("failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

// ============================================================================
// Download Function
// ============================================================================

/// Downloads `url` into `dest`, replacing any existing file.
///
/// Returns the number of bytes written.
///
/// # Errors
///
/// Returns an error if the request fails, the server answers with a
/// non-success status, or the file cannot be written.
pub async fn download_file(
    client: &reqwest::Client,
    url: &str,
    dest: &Path,
) -> Result<u64, DownloadError> {
    info!("Downloading {} to {}", url, dest.display());

    let request_err = |source| DownloadError::Request {
        url: url.to_string(),
        source,
    };
    let write_err = |source| DownloadError::Write {
        path: dest.to_path_buf(),
        source,
    };

    let response = client.get(url).send().await.map_err(request_err)?;

    let status = response.status();
    if !status.is_success() {
        return Err(DownloadError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    debug!("Content-Length: {:?}", response.content_length());

    let mut file = File::create(dest).await.map_err(write_err)?;
    let mut stream = response.bytes_stream();
    let mut bytes_downloaded: u64 = 0;

    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result.map_err(request_err)?;
        file.write_all(&chunk).await.map_err(write_err)?;

        bytes_downloaded += chunk.len() as u64;
    }

    file.flush().await.map_err(write_err)?;

    info!(
        "Download complete: {} bytes written to {}",
        bytes_downloaded,
        dest.display()
    );

    Ok(bytes_downloaded)
}
