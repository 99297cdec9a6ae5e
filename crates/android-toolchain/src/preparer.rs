//! SDK Preparer
//!
//! Fetches every declared component through the cache and unpacks it into the
//! SDK directory, skipping components whose marker is present.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use futures::{StreamExt, TryStreamExt};
use serde::Serialize;
use tracing::{info, debug};

use sdkdeps_core::{AppConfig, ComponentRole, ComponentSpec, HostOs, SdkError};

use crate::cache::ArtifactCache;
use crate::downloader::{ArtifactSource, DownloadError};
use crate::extractor::{ArchiveError, ExtractOptions, ExtractReport, Extractor};
use crate::marker::Marker;

/// Errors while preparing the SDK or its artifacts
#[derive(Debug, thiserror::Error)]
pub enum PrepareError {
    #[error(transparent)]
    Config(#[from] SdkError),
    #[error(transparent)]
    Download(#[from] DownloadError),
    #[error(transparent)]
    Archive(#[from] ArchiveError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("No component is declared as {0}")]
    NoComponentForRole(&'static str),
    #[error("Background task failed: {0}")]
    Task(String),
}

/// What a preparation step did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    /// Output was already present; nothing was written
    UpToDate,
    /// Component archive was unpacked
    Extracted(ExtractReport),
    /// A single output file was written
    Written(PathBuf),
}

/// Summary of one component for listings
#[derive(Debug, Clone, Serialize)]
pub struct ComponentStatus {
    pub id: String,
    pub notation: String,
    pub target_dir: PathBuf,
    pub cached: Option<PathBuf>,
    pub prepared: bool,
    pub locations: Vec<String>,
}

/// Prepares the Android SDK described by an [`AppConfig`]
pub struct SdkPreparer {
    config: AppConfig,
    cache: ArtifactCache,
    source: Arc<dyn ArtifactSource>,
    host: Option<HostOs>,
}

impl SdkPreparer {
    pub fn new(config: AppConfig, source: Arc<dyn ArtifactSource>, host: Option<HostOs>) -> Self {
        let cache = ArtifactCache::new(config.cache_dir.clone());
        Self {
            config,
            cache,
            source,
            host,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn cache(&self) -> &ArtifactCache {
        &self.cache
    }

    pub fn sdk_dir(&self) -> PathBuf {
        self.config.sdk_dir()
    }

    fn marker(&self, spec: &ComponentSpec) -> Marker {
        Marker::for_component(spec, &self.sdk_dir())
    }

    /// First component feeding `role`
    pub fn component_for_role(&self, role: ComponentRole) -> Result<&ComponentSpec, PrepareError> {
        self.config
            .components
            .iter()
            .find(|c| c.has_role(role))
            .ok_or(PrepareError::NoComponentForRole(role.as_str()))
    }

    /// Local archive of a component, downloading it if it is not cached
    pub async fn fetch(&self, spec: &ComponentSpec) -> Result<PathBuf, PrepareError> {
        spec.validate()?;
        let coord = spec.coordinate(self.host);
        let path = self
            .cache
            .resolve(&coord, self.source.as_ref(), spec.sha256.as_deref())
            .await?;
        Ok(path)
    }

    /// Archive of the component feeding `role`
    pub async fn artifact_for_role(&self, role: ComponentRole) -> Result<PathBuf, PrepareError> {
        let spec = self.component_for_role(role)?;
        self.fetch(spec).await
    }

    /// Fetch and unpack one component unless its marker is present
    pub async fn prepare_component(&self, spec: &ComponentSpec) -> Result<TaskOutcome, PrepareError> {
        spec.validate()?;
        if self.marker(spec).is_fresh() {
            debug!("{} is up to date", spec.id());
            return Ok(TaskOutcome::UpToDate);
        }

        let archive = self.fetch(spec).await?;
        self.unpack(spec, &archive).await
    }

    /// Unpack an already fetched archive and write the marker
    async fn unpack(&self, spec: &ComponentSpec, archive: &Path) -> Result<TaskOutcome, PrepareError> {
        let marker = self.marker(spec);
        if marker.is_fresh() {
            return Ok(TaskOutcome::UpToDate);
        }

        let kind = spec.archive_kind()?;
        let options = ExtractOptions::from_filter(&spec.filter, spec.strip_levels)?;
        let target = spec.target_dir(&self.sdk_dir());
        let archive = archive.to_path_buf();

        info!("Unpacking {} into {:?}", spec.id(), target);
        let report = tokio::task::spawn_blocking(move || {
            Extractor::extract(&archive, kind, &target, &options)
        })
        .await
        .map_err(|e| PrepareError::Task(e.to_string()))??;

        marker.mark().await?;
        Ok(TaskOutcome::Extracted(report))
    }

    /// Prepare every component: download stale ones concurrently, then unpack in order
    pub async fn prepare_sdk(&self) -> Result<Vec<(String, TaskOutcome)>, PrepareError> {
        self.config.validate()?;

        let stale: Vec<&ComponentSpec> = self
            .config
            .components
            .iter()
            .filter(|spec| !self.marker(spec).is_fresh())
            .collect();

        info!(
            "Preparing SDK in {:?}: {} of {} components need unpacking",
            self.sdk_dir(),
            stale.len(),
            self.config.components.len()
        );

        let archives: Vec<(String, PathBuf)> = futures::stream::iter(stale)
            .map(|spec| async move { Ok::<_, PrepareError>((spec.id(), self.fetch(spec).await?)) })
            .buffered(self.config.parallel_jobs.max(1))
            .try_collect()
            .await?;
        let archives: HashMap<String, PathBuf> = archives.into_iter().collect();

        let mut outcomes = Vec::with_capacity(self.config.components.len());
        for spec in &self.config.components {
            let outcome = match archives.get(&spec.id()) {
                Some(archive) => self.unpack(spec, archive).await?,
                None => TaskOutcome::UpToDate,
            };
            outcomes.push((spec.id(), outcome));
        }

        Ok(outcomes)
    }

    /// Per-component state for listings
    pub fn status(&self) -> Vec<ComponentStatus> {
        let sdk_dir = self.sdk_dir();
        self.config
            .components
            .iter()
            .map(|spec| {
                let coord = spec.coordinate(self.host);
                ComponentStatus {
                    id: spec.id(),
                    notation: coord.notation(),
                    target_dir: spec.target_dir(&sdk_dir),
                    cached: self.cache.lookup(&coord),
                    prepared: self.marker(spec).is_fresh(),
                    locations: self.source.locations(&coord),
                }
            })
            .collect()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::downloader::MirrorSource;
    use crate::extractor::tests::{write_tar_gz, write_zip};
    use crate::repository::IvyPatterns;
    use sdkdeps_core::{ExtractFilter, HOST_OS_PLACEHOLDER};

    pub(crate) struct Fixture {
        pub dir: tempfile::TempDir,
        pub preparer: SdkPreparer,
    }

    /// A preparer over a local mirror holding a platform, build-tools and dx archive
    pub(crate) fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let mirror = dir.path().join("mirror");
        std::fs::create_dir_all(&mirror).unwrap();

        write_zip(
            &mirror.join("platform_26_r02.zip"),
            &[
                ("android-8.0.0/", b""),
                ("android-8.0.0/android.jar", b"android-jar"),
                ("android-8.0.0/build.prop", b"ro.build=26"),
            ],
        );
        write_zip(
            &mirror.join("build-tools_r23.0.1-linux.zip"),
            &[
                ("android-6.0/aapt", b"aapt"),
                ("android-6.0/lib/dx.jar", b"dx-jar"),
            ],
        );
        write_tar_gz(
            &mirror.join("dx.tar.gz"),
            &[
                ("src/com/android/dx/Main.java", b"class Main {}"),
                ("src/com/android/dx/util/Bits.java", b"class Bits {}"),
                ("etc/dx", b"#!/bin/sh"),
            ],
        );

        let mut config = AppConfig::default();
        config.build_dir = dir.path().join("build");
        config.cache_dir = dir.path().join("cache");
        config.parallel_jobs = 2;
        config.components = vec![
            ComponentSpec::new("platform", "26_r02", "platforms/android-26")
                .role(ComponentRole::AndroidPlatform)
                .strip(1),
            ComponentSpec::new("dx", "5.0.0_r2", "sources/dx")
                .role(ComponentRole::DxSources)
                .strip(1)
                .ext("tar.gz")
                .filter(ExtractFilter {
                    include: vec!["src/**".to_string()],
                    include_empty_dirs: false,
                }),
            ComponentSpec::new("build-tools", "r23.0.1", "build-tools/23.0.1")
                .classifier(HOST_OS_PLACEHOLDER)
                .role(ComponentRole::BuildTools)
                .strip(1),
        ];

        let patterns = IvyPatterns::new(config.repositories.clone());
        let source = Arc::new(MirrorSource::new(mirror, patterns));
        let preparer = SdkPreparer::new(config, source, Some(HostOs::Linux));

        Fixture { dir, preparer }
    }

    #[tokio::test]
    async fn test_prepare_sdk_unpacks_everything() {
        let fx = fixture();
        let outcomes = fx.preparer.prepare_sdk().await.unwrap();

        assert_eq!(outcomes.len(), 3);
        assert!(outcomes.iter().all(|(_, o)| matches!(o, TaskOutcome::Extracted(_))));

        let sdk = fx.preparer.sdk_dir();
        assert!(sdk.join("platforms/android-26/android.jar").is_file());
        assert!(sdk.join("platforms/android-26/platform_26_r02.prepared").is_file());
        assert!(sdk.join("build-tools/23.0.1/lib/dx.jar").is_file());
        assert!(sdk.join("sources/dx/com/android/dx/Main.java").is_file());
        assert!(!sdk.join("sources/dx/dx").exists());
    }

    #[tokio::test]
    async fn test_marker_makes_prepare_a_no_op() {
        let fx = fixture();
        let spec = fx.preparer.config().components[0].clone();
        let sdk = fx.preparer.sdk_dir();

        let first = fx.preparer.prepare_component(&spec).await.unwrap();
        assert!(matches!(first, TaskOutcome::Extracted(ExtractReport { files: 2, .. })));

        // remove an unpacked file; with the marker in place it must not come back
        let build_prop = sdk.join("platforms/android-26/build.prop");
        std::fs::remove_file(&build_prop).unwrap();
        let second = fx.preparer.prepare_component(&spec).await.unwrap();
        assert_eq!(second, TaskOutcome::UpToDate);
        assert!(!build_prop.exists());

        // deleting the marker forces extraction again
        std::fs::remove_file(spec.marker_path(&sdk)).unwrap();
        let third = fx.preparer.prepare_component(&spec).await.unwrap();
        assert!(matches!(third, TaskOutcome::Extracted(_)));
        assert!(build_prop.is_file());
    }

    #[tokio::test]
    async fn test_fresh_component_is_not_downloaded() {
        let fx = fixture();
        let spec = fx.preparer.config().components[0].clone();
        Marker::for_component(&spec, &fx.preparer.sdk_dir()).mark().await.unwrap();

        let outcomes = fx.preparer.prepare_sdk().await.unwrap();
        assert_eq!(outcomes[0], (spec.id(), TaskOutcome::UpToDate));
        assert!(fx.preparer.cache().lookup(&spec.coordinate(Some(HostOs::Linux))).is_none());
    }

    #[tokio::test]
    async fn test_unknown_extension_fails_before_download() {
        let fx = fixture();
        let spec = ComponentSpec::new("platform", "26_r02", "platforms/android-26").ext("rar");

        let err = fx.preparer.prepare_component(&spec).await.unwrap_err();
        assert!(matches!(err, PrepareError::Config(SdkError::UnsupportedExtension(_))));
        assert!(err.to_string().contains("rar"));
        assert!(!fx.dir.path().join("cache").exists());
    }

    #[tokio::test]
    async fn test_missing_artifact_aborts() {
        let mut fx = fixture();
        fx.preparer.config.components.push(ComponentSpec::new("tools", "r24.3.4", ""));

        let err = fx.preparer.prepare_sdk().await.unwrap_err();
        assert!(matches!(err, PrepareError::Download(DownloadError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_status_and_roles() {
        let fx = fixture();
        let status = fx.preparer.status();
        assert_eq!(status[2].notation, "google:build-tools:r23.0.1:linux@zip");
        assert!(!status[2].prepared);
        assert!(status[2].cached.is_none());

        let archive = fx.preparer.artifact_for_role(ComponentRole::BuildTools).await.unwrap();
        assert!(archive.ends_with("build-tools-r23.0.1-linux.zip"));
        assert!(fx.preparer.status()[2].cached.is_some());
    }
}
