//! Android SDK component management
//!
//! Handles download, caching and unpacking of:
//! - Android platforms and build tools
//! - platform-tools and tools
//! - the legacy dx sources
//!
//! and publishes `android.jar`, `dx.jar` and the dx sources jar.

pub mod artifacts;
pub mod cache;
pub mod downloader;
pub mod extractor;
pub mod marker;
pub mod preparer;
pub mod repository;

pub use artifacts::PublishedArtifact;
pub use cache::ArtifactCache;
pub use downloader::{ArtifactSource, DownloadError, HttpSource, MirrorSource, ProgressCallback};
pub use extractor::{strip_leading_components, ArchiveError, ExtractOptions, ExtractReport, Extractor};
pub use marker::Marker;
pub use preparer::{ComponentStatus, PrepareError, SdkPreparer, TaskOutcome};
pub use repository::IvyPatterns;

use std::sync::Arc;
use sdkdeps_core::AppConfig;

/// Source matching the configuration: the offline mirror if set, otherwise HTTP
pub fn source_for(
    config: &AppConfig,
    progress: Option<ProgressCallback>,
) -> Result<Arc<dyn ArtifactSource>, DownloadError> {
    let patterns = IvyPatterns::new(config.repositories.clone());

    if let Some(ref mirror) = config.offline_mirror {
        return Ok(Arc::new(MirrorSource::new(mirror.clone(), patterns)));
    }

    let mut http = HttpSource::new(patterns, config.timeout_secs)?;
    if let Some(progress) = progress {
        http = http.with_progress(progress);
    }
    Ok(Arc::new(http))
}
