//! Artifact Downloader
//!
//! Fetches SDK component archives from remote repositories or a local mirror.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use async_trait::async_trait;
use reqwest::Client;
use sha2::{Sha256, Digest};
use tokio::io::AsyncWriteExt;
use tracing::{info, debug, warn};

use sdkdeps_core::ArtifactCoordinate;

use crate::repository::{location_file_name, IvyPatterns};

/// Download progress callback: location, bytes so far, total bytes (0 if unknown)
pub type ProgressCallback = Arc<dyn Fn(&str, u64, u64) + Send + Sync>;

/// Download error types
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Checksum mismatch for {coordinate}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        coordinate: String,
        expected: String,
        actual: String,
    },
    #[error("Could not find {coordinate}; tried: {}", .tried.join(", "))]
    NotFound {
        coordinate: String,
        tried: Vec<String>,
    },
}

/// Somewhere artifacts can be fetched from
#[async_trait]
pub trait ArtifactSource: Send + Sync {
    /// Write the artifact for `coord` to `target`
    async fn fetch(&self, coord: &ArtifactCoordinate, target: &Path) -> Result<(), DownloadError>;

    /// Locations `fetch` would try, in order
    fn locations(&self, coord: &ArtifactCoordinate) -> Vec<String>;
}

/// Downloads over HTTP(S), trying every pattern in turn
pub struct HttpSource {
    client: Client,
    patterns: IvyPatterns,
    progress: Option<ProgressCallback>,
}

impl HttpSource {
    /// Create a new HTTP source
    pub fn new(patterns: IvyPatterns, timeout_secs: u64) -> Result<Self, DownloadError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(concat!("sdkdeps/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            patterns,
            progress: None,
        })
    }

    /// Report download progress through `callback`
    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    /// Download a single location. `Ok(false)` means the server is unreachable or does not have it.
    async fn download_file(&self, url: &str, target: &Path) -> Result<bool, DownloadError> {
        debug!("Trying {}", url);

        let response = match self.client.get(url).send().await {
            Ok(response) => response,
            // Only failures before the status line; body errors below are fatal
            Err(e) if e.is_connect() || e.is_timeout() => {
                warn!("Could not reach {}: {}", url, e);
                return Ok(false);
            }
            Err(e) => return Err(e.into()),
        };

        if !response.status().is_success() {
            debug!("{} answered HTTP {}", url, response.status());
            return Ok(false);
        }

        let total_size = response.content_length().unwrap_or(0);
        let mut downloaded: u64 = 0;

        let mut file = tokio::fs::File::create(target).await?;
        let mut stream = response.bytes_stream();

        use futures::StreamExt;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            downloaded += chunk.len() as u64;

            if let Some(ref callback) = self.progress {
                callback(url, downloaded, total_size);
            }
        }

        file.flush().await?;

        info!("Downloaded {} ({} bytes)", url, downloaded);
        Ok(true)
    }
}

#[async_trait]
impl ArtifactSource for HttpSource {
    async fn fetch(&self, coord: &ArtifactCoordinate, target: &Path) -> Result<(), DownloadError> {
        let tried = self.patterns.candidates(coord);

        for url in &tried {
            match self.download_file(url, target).await {
                Ok(true) => return Ok(()),
                Ok(false) => {}
                Err(e) => return Err(e),
            }
        }

        Err(DownloadError::NotFound {
            coordinate: coord.notation(),
            tried,
        })
    }

    fn locations(&self, coord: &ArtifactCoordinate) -> Vec<String> {
        self.patterns.candidates(coord)
    }
}

/// A local directory holding artifacts under their remote file names
pub struct MirrorSource {
    root: PathBuf,
    patterns: IvyPatterns,
}

impl MirrorSource {
    pub fn new(root: PathBuf, patterns: IvyPatterns) -> Self {
        Self { root, patterns }
    }
}

#[async_trait]
impl ArtifactSource for MirrorSource {
    async fn fetch(&self, coord: &ArtifactCoordinate, target: &Path) -> Result<(), DownloadError> {
        let tried = self.locations(coord);

        for candidate in &tried {
            let path = Path::new(candidate);
            if path.is_file() {
                info!("Copying {} from mirror", path.display());
                tokio::fs::copy(path, target).await?;
                return Ok(());
            }
        }

        Err(DownloadError::NotFound {
            coordinate: coord.notation(),
            tried,
        })
    }

    fn locations(&self, coord: &ArtifactCoordinate) -> Vec<String> {
        let mut locations: Vec<String> = Vec::new();
        for url in self.patterns.candidates(coord) {
            let local = self.root.join(location_file_name(&url)).to_string_lossy().to_string();
            if !locations.contains(&local) {
                locations.push(local);
            }
        }
        locations
    }
}

/// SHA-256 of a file, hex encoded
pub async fn sha256_file(path: &Path) -> Result<String, DownloadError> {
    let data = tokio::fs::read(path).await?;
    let mut hasher = Sha256::new();
    hasher.update(&data);
    Ok(hex::encode(hasher.finalize()))
}

/// Verify file checksum
pub async fn verify_checksum(path: &Path, expected: &str) -> Result<bool, DownloadError> {
    debug!("Verifying checksum for {:?}", path);

    let actual = sha256_file(path).await?;

    if actual.eq_ignore_ascii_case(expected) {
        debug!("Checksum verified");
        Ok(true)
    } else {
        warn!("Checksum mismatch: expected {}, got {}", expected, actual);
        Ok(false)
    }
}
