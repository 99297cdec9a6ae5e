//! Published artifacts
//!
//! Jars pulled out of the SDK components for other builds: `android.jar`,
//! `dx.jar` and a repackaged dx sources jar.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use serde::Serialize;
use tracing::{info, debug};
use walkdir::WalkDir;
use zip::write::FileOptions;
use zip::CompressionMethod;

use sdkdeps_core::component::MARKER_SUFFIX;
use sdkdeps_core::ComponentRole;

use crate::extractor::{ArchiveError, Extractor};
use crate::preparer::{PrepareError, SdkPreparer, TaskOutcome};

pub const ANDROID_JAR: &str = "android.jar";
pub const DX_JAR: &str = "dx.jar";
pub const DX_SOURCES_JAR: &str = "dx-sources.jar";

const MANIFEST: &str = "Manifest-Version: 1.0\r\n\r\n";

/// An output other builds can consume
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublishedArtifact {
    /// Configuration the artifact is published under
    pub configuration: String,
    pub path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classifier: Option<String>,
    /// Subcommand that produces it
    pub built_by: String,
}

impl SdkPreparer {
    /// Copy `android.jar` out of the platform archive
    pub async fn extract_android_jar(&self) -> Result<TaskOutcome, PrepareError> {
        self.extract_library_jar(ComponentRole::AndroidPlatform, ANDROID_JAR).await
    }

    /// Copy `dx.jar` out of the build-tools archive
    pub async fn extract_dx_jar(&self) -> Result<TaskOutcome, PrepareError> {
        self.extract_library_jar(ComponentRole::BuildTools, DX_JAR).await
    }

    async fn extract_library_jar(&self, role: ComponentRole, jar: &str) -> Result<TaskOutcome, PrepareError> {
        let target = self.config().libs_dir().join(jar);
        if target.is_file() {
            debug!("{:?} is up to date", target);
            return Ok(TaskOutcome::UpToDate);
        }

        let archive = self.artifact_for_role(role).await?;
        info!("Extracting {} from {:?}", jar, archive);

        let name = jar.to_string();
        let out = target.clone();
        tokio::task::spawn_blocking(move || Extractor::extract_single(&archive, &name, &out))
            .await
            .map_err(|e| PrepareError::Task(e.to_string()))??;

        Ok(TaskOutcome::Written(target))
    }

    /// Unpack the dx sources and pack them into `dx-sources.jar`
    pub async fn package_dx_sources_jar(&self) -> Result<TaskOutcome, PrepareError> {
        let spec = self.component_for_role(ComponentRole::DxSources)?.clone();
        self.prepare_component(&spec).await?;

        let sources = spec.target_dir(&self.sdk_dir());
        let target = self.config().libs_dir().join(DX_SOURCES_JAR);
        info!("Packing {:?} into {:?}", sources, target);

        let out = target.clone();
        let count = tokio::task::spawn_blocking(move || pack_jar(&sources, &out))
            .await
            .map_err(|e| PrepareError::Task(e.to_string()))??;

        debug!("{} files in {:?}", count, target);
        Ok(TaskOutcome::Written(target))
    }

    /// Everything this tool publishes, whether built yet or not
    pub fn published_artifacts(&self) -> Vec<PublishedArtifact> {
        let libs = self.config().libs_dir();
        let artifact = |configuration: &str, path: PathBuf, classifier: Option<&str>, built_by: &str| PublishedArtifact {
            configuration: configuration.to_string(),
            path,
            classifier: classifier.map(str::to_string),
            built_by: built_by.to_string(),
        };

        vec![
            artifact("androidSdk", self.sdk_dir(), None, "prepare"),
            artifact("androidJar", libs.join(ANDROID_JAR), None, "android-jar"),
            artifact("dxJar", libs.join(DX_JAR), None, "dx-jar"),
            artifact("dxJar", libs.join(DX_SOURCES_JAR), Some("sources"), "dx-sources"),
        ]
    }

    /// Delete the build directory
    pub async fn clean(&self) -> Result<(), PrepareError> {
        let build_dir = &self.config().build_dir;
        if build_dir.exists() {
            info!("Deleting {:?}", build_dir);
            tokio::fs::remove_dir_all(build_dir).await?;
        }
        Ok(())
    }
}

/// Write a jar holding every file under `src`, marker files excluded.
/// Returns the number of files packed.
pub fn pack_jar(src: &Path, target: &Path) -> Result<usize, ArchiveError> {
    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let partial = target.with_extension("jar.part");
    let mut zip = zip::ZipWriter::new(File::create(&partial)?);
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

    zip.add_directory("META-INF/", options)?;
    zip.start_file("META-INF/MANIFEST.MF", options)?;
    zip.write_all(MANIFEST.as_bytes())?;

    let mut count = 0;
    for entry in WalkDir::new(src).min_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|e| ArchiveError::Io(e.into()))?;
        let relative = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| ArchiveError::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))?;
        let name = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        if entry.file_type().is_dir() {
            zip.add_directory(format!("{}/", name), options)?;
        } else if entry.file_type().is_file() {
            if entry.depth() == 1 && name.ends_with(&format!(".{}", MARKER_SUFFIX)) {
                continue;
            }
            zip.start_file(name, options)?;
            let mut file = File::open(entry.path())?;
            std::io::copy(&mut file, &mut zip)?;
            count += 1;
        }
    }

    zip.finish()?;
    std::fs::rename(&partial, target)?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preparer::tests::fixture;
    use std::io::Read;

    fn jar_entries(path: &Path) -> Vec<String> {
        let mut zip = zip::ZipArchive::new(File::open(path).unwrap()).unwrap();
        (0..zip.len())
            .map(|i| zip.by_index(i).unwrap().name().to_string())
            .collect()
    }

    #[tokio::test]
    async fn test_extract_android_jar() {
        let fx = fixture();

        let outcome = fx.preparer.extract_android_jar().await.unwrap();
        let target = fx.preparer.config().libs_dir().join(ANDROID_JAR);
        assert_eq!(outcome, TaskOutcome::Written(target.clone()));
        assert_eq!(std::fs::read(&target).unwrap(), b"android-jar");

        // existing output is left alone
        std::fs::write(&target, b"local").unwrap();
        assert_eq!(fx.preparer.extract_android_jar().await.unwrap(), TaskOutcome::UpToDate);
        assert_eq!(std::fs::read(&target).unwrap(), b"local");
    }

    #[tokio::test]
    async fn test_extract_dx_jar() {
        let fx = fixture();
        fx.preparer.extract_dx_jar().await.unwrap();
        let target = fx.preparer.config().libs_dir().join(DX_JAR);
        assert_eq!(std::fs::read(target).unwrap(), b"dx-jar");
    }

    #[tokio::test]
    async fn test_dx_sources_jar() {
        let fx = fixture();
        let outcome = fx.preparer.package_dx_sources_jar().await.unwrap();
        let target = fx.preparer.config().libs_dir().join(DX_SOURCES_JAR);
        assert_eq!(outcome, TaskOutcome::Written(target.clone()));

        let entries = jar_entries(&target);
        assert_eq!(
            entries,
            vec![
                "META-INF/",
                "META-INF/MANIFEST.MF",
                "com/",
                "com/android/",
                "com/android/dx/",
                "com/android/dx/Main.java",
                "com/android/dx/util/",
                "com/android/dx/util/Bits.java",
            ]
        );

        let mut zip = zip::ZipArchive::new(File::open(&target).unwrap()).unwrap();
        let mut manifest = String::new();
        zip.by_name("META-INF/MANIFEST.MF").unwrap().read_to_string(&mut manifest).unwrap();
        assert!(manifest.starts_with("Manifest-Version: 1.0"));
    }

    #[test]
    fn test_published_artifacts() {
        let fx = fixture();
        let artifacts = fx.preparer.published_artifacts();
        assert_eq!(artifacts.len(), 4);
        assert_eq!(artifacts[3].configuration, "dxJar");
        assert_eq!(artifacts[3].classifier.as_deref(), Some("sources"));

        let json = serde_json::to_value(&artifacts).unwrap();
        assert_eq!(json[0]["configuration"], "androidSdk");
        assert!(json[0].get("classifier").is_none());
    }

    #[tokio::test]
    async fn test_clean() {
        let fx = fixture();
        fx.preparer.extract_android_jar().await.unwrap();
        assert!(fx.preparer.config().build_dir.exists());

        fx.preparer.clean().await.unwrap();
        assert!(!fx.preparer.config().build_dir.exists());
        // cache survives a clean
        assert!(fx.preparer.cache().root().exists());
    }
}
