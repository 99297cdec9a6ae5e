//! Download Cache
//!
//! Keeps fetched archives under `<root>/<group>/<name>/<version>/<file>` so a
//! component is downloaded once per machine.

use std::path::{Path, PathBuf};
use tracing::{info, debug};

use sdkdeps_core::ArtifactCoordinate;

use crate::downloader::{verify_checksum, sha256_file, ArtifactSource, DownloadError};

/// Filesystem cache of downloaded artifacts
#[derive(Debug, Clone)]
pub struct ArtifactCache {
    root: PathBuf,
}

impl ArtifactCache {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Where the artifact for `coord` is stored
    pub fn path_for(&self, coord: &ArtifactCoordinate) -> PathBuf {
        self.root
            .join(&coord.group)
            .join(&coord.name)
            .join(&coord.version)
            .join(coord.file_name())
    }

    /// Cached artifact, if present
    pub fn lookup(&self, coord: &ArtifactCoordinate) -> Option<PathBuf> {
        let path = self.path_for(coord);
        path.is_file().then_some(path)
    }

    /// Return the cached artifact, fetching it from `source` first if needed
    pub async fn resolve(
        &self,
        coord: &ArtifactCoordinate,
        source: &dyn ArtifactSource,
        sha256: Option<&str>,
    ) -> Result<PathBuf, DownloadError> {
        let path = match self.lookup(coord) {
            Some(path) => {
                debug!("Cache hit for {}: {:?}", coord, path);
                path
            }
            None => self.fetch_into_cache(coord, source).await?,
        };

        if let Some(expected) = sha256 {
            if !verify_checksum(&path, expected).await? {
                let actual = sha256_file(&path).await?;
                tokio::fs::remove_file(&path).await?;
                return Err(DownloadError::ChecksumMismatch {
                    coordinate: coord.notation(),
                    expected: expected.to_string(),
                    actual,
                });
            }
        }

        Ok(path)
    }

    async fn fetch_into_cache(
        &self,
        coord: &ArtifactCoordinate,
        source: &dyn ArtifactSource,
    ) -> Result<PathBuf, DownloadError> {
        let path = self.path_for(coord);
        let partial = path.with_file_name(format!("{}.part", coord.file_name()));

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        info!("Fetching {}", coord);
        if let Err(e) = source.fetch(coord, &partial).await {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(e);
        }

        tokio::fs::rename(&partial, &path).await?;
        Ok(path)
    }

    /// Remove every cached artifact
    pub async fn clear(&self) -> Result<(), DownloadError> {
        if self.root.exists() {
            info!("Clearing cache at {:?}", self.root);
            tokio::fs::remove_dir_all(&self.root).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Writes fixed bytes and counts how often it was asked
    struct CountingSource {
        body: Option<&'static [u8]>,
        calls: AtomicUsize,
    }

    impl CountingSource {
        fn serving(body: &'static [u8]) -> Self {
            Self { body: Some(body), calls: AtomicUsize::new(0) }
        }

        fn failing() -> Self {
            Self { body: None, calls: AtomicUsize::new(0) }
        }
    }

    #[async_trait]
    impl ArtifactSource for CountingSource {
        async fn fetch(&self, coord: &ArtifactCoordinate, target: &Path) -> Result<(), DownloadError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.body {
                Some(body) => {
                    tokio::fs::write(target, body).await?;
                    Ok(())
                }
                None => {
                    tokio::fs::write(target, b"half").await?;
                    Err(DownloadError::NotFound { coordinate: coord.notation(), tried: vec![] })
                }
            }
        }

        fn locations(&self, _coord: &ArtifactCoordinate) -> Vec<String> {
            vec!["memory".to_string()]
        }
    }

    #[tokio::test]
    async fn test_second_resolve_is_cache_hit() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ArtifactCache::new(dir.path().to_path_buf());
        let source = CountingSource::serving(b"archive");
        let coord = ArtifactCoordinate::new("platform", "26_r02", "zip");

        let first = cache.resolve(&coord, &source, None).await.unwrap();
        let second = cache.resolve(&coord, &source, None).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first, dir.path().join("google/platform/26_r02/platform-26_r02.zip"));
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_fetch_leaves_nothing_behind() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ArtifactCache::new(dir.path().to_path_buf());
        let coord = ArtifactCoordinate::new("tools", "r24.3.4", "zip");

        let result = cache.resolve(&coord, &CountingSource::failing(), None).await;
        assert!(matches!(result, Err(DownloadError::NotFound { .. })));

        let dir_of_artifact = cache.path_for(&coord).parent().unwrap().to_path_buf();
        assert_eq!(std::fs::read_dir(dir_of_artifact).unwrap().count(), 0);
        assert!(cache.lookup(&coord).is_none());
    }

    #[tokio::test]
    async fn test_checksum_mismatch_evicts() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ArtifactCache::new(dir.path().to_path_buf());
        let source = CountingSource::serving(b"abc");
        let coord = ArtifactCoordinate::new("dx", "5.0.0_r2", "tar.gz");

        let err = cache.resolve(&coord, &source, Some("deadbeef")).await.unwrap_err();
        assert!(matches!(err, DownloadError::ChecksumMismatch { .. }));
        assert!(cache.lookup(&coord).is_none());

        let ok = cache
            .resolve(
                &coord,
                &source,
                Some("ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"),
            )
            .await
            .unwrap();
        assert!(ok.is_file());
    }

    #[tokio::test]
    async fn test_clear() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ArtifactCache::new(dir.path().join("cache"));
        let coord = ArtifactCoordinate::new("dx", "1", "zip");
        cache.resolve(&coord, &CountingSource::serving(b"x"), None).await.unwrap();

        cache.clear().await.unwrap();
        assert!(!cache.root().exists());
    }
}
