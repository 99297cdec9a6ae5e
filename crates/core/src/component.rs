//! SDK Components
//!
//! The declarative table of Android SDK components: what to download, where to
//! unpack it, and how to filter the archive on the way.

use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::coordinate::{ArchiveKind, ArtifactCoordinate};
use crate::error::{Result, SdkError};

/// Classifier placeholder replaced with the host tools OS name
pub const HOST_OS_PLACEHOLDER: &str = "{os}";

/// Suffix of the marker file written after a successful extraction
pub const MARKER_SUFFIX: &str = "prepared";

/// Host operating system, as named in Android repository file names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HostOs {
    Windows,
    MacOsX,
    Linux,
}

impl HostOs {
    /// Detect the current host; `None` on platforms the repository has no tools for
    pub fn current() -> Option<Self> {
        if cfg!(windows) {
            Some(HostOs::Windows)
        } else if cfg!(target_os = "macos") {
            Some(HostOs::MacOsX)
        } else if cfg!(target_os = "linux") {
            Some(HostOs::Linux)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HostOs::Windows => "windows",
            HostOs::MacOsX => "macosx",
            HostOs::Linux => "linux",
        }
    }

    /// Tools OS name for an optional host, logging when the host is unknown
    pub fn tools_os(host: Option<HostOs>) -> &'static str {
        match host {
            Some(os) => os.as_str(),
            None => {
                error!("Unknown operating system for android tools: {}", std::env::consts::OS);
                ""
            }
        }
    }
}

/// Extra configurations a component also feeds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ComponentRole {
    /// Source of `android.jar`
    AndroidPlatform,
    /// Sources repackaged into the dx sources jar
    DxSources,
    /// Source of `dx.jar`
    BuildTools,
}

impl ComponentRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComponentRole::AndroidPlatform => "androidPlatform",
            ComponentRole::DxSources => "dxSources",
            ComponentRole::BuildTools => "buildTools",
        }
    }
}

/// File filter applied while unpacking
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractFilter {
    /// Glob patterns matched against the path inside the archive, before stripping
    #[serde(default)]
    pub include: Vec<String>,
    /// Create directory entries that end up with no files
    #[serde(default = "default_true")]
    pub include_empty_dirs: bool,
}

impl Default for ExtractFilter {
    fn default() -> Self {
        Self {
            include: Vec::new(),
            include_empty_dirs: true,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_ext() -> String {
    "zip".to_string()
}

/// One downloadable SDK component
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentSpec {
    pub name: String,
    pub version: String,
    /// Destination relative to the SDK root; empty for the root itself
    #[serde(default)]
    pub dest: String,
    /// Classifier, or `{os}` for the host tools OS
    #[serde(default)]
    pub classifier: String,
    #[serde(default)]
    pub roles: Vec<ComponentRole>,
    /// Leading path segments dropped from every archive entry
    #[serde(default)]
    pub strip_levels: usize,
    #[serde(default = "default_ext")]
    pub ext: String,
    /// Expected SHA-256 of the downloaded archive
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
    #[serde(default)]
    pub filter: ExtractFilter,
}

impl ComponentSpec {
    /// Create a plain zip component unpacked at `dest`
    pub fn new(name: &str, version: &str, dest: &str) -> Self {
        Self {
            name: name.to_string(),
            version: version.to_string(),
            dest: dest.to_string(),
            classifier: String::new(),
            roles: Vec::new(),
            strip_levels: 0,
            ext: default_ext(),
            sha256: None,
            filter: ExtractFilter::default(),
        }
    }

    pub fn classifier(mut self, classifier: &str) -> Self {
        self.classifier = classifier.to_string();
        self
    }

    pub fn role(mut self, role: ComponentRole) -> Self {
        self.roles.push(role);
        self
    }

    pub fn strip(mut self, levels: usize) -> Self {
        self.strip_levels = levels;
        self
    }

    pub fn ext(mut self, ext: &str) -> Self {
        self.ext = ext.to_string();
        self
    }

    pub fn filter(mut self, filter: ExtractFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Classifier with the host placeholder resolved
    pub fn resolved_classifier(&self, host: Option<HostOs>) -> String {
        if self.classifier == HOST_OS_PLACEHOLDER {
            HostOs::tools_os(host).to_string()
        } else {
            self.classifier.clone()
        }
    }

    /// Download coordinate of this component
    pub fn coordinate(&self, host: Option<HostOs>) -> ArtifactCoordinate {
        ArtifactCoordinate::new(&self.name, &self.version, &self.ext)
            .with_classifier(self.resolved_classifier(host))
    }

    /// Identifier of this component, e.g. `build-tools_r23.0.1`
    pub fn id(&self) -> String {
        format!("{}_{}", self.name, self.version)
    }

    /// Directory the archive is unpacked into
    pub fn target_dir(&self, sdk_root: &Path) -> PathBuf {
        if self.dest.is_empty() {
            sdk_root.to_path_buf()
        } else {
            sdk_root.join(&self.dest)
        }
    }

    /// Marker file whose presence means the component is unpacked
    pub fn marker_path(&self, sdk_root: &Path) -> PathBuf {
        self.target_dir(sdk_root)
            .join(format!("{}.{}", self.id(), MARKER_SUFFIX))
    }

    pub fn archive_kind(&self) -> Result<ArchiveKind> {
        ArchiveKind::from_extension(&self.ext)
    }

    pub fn has_role(&self, role: ComponentRole) -> bool {
        self.roles.contains(&role)
    }

    /// Check the declaration before anything is downloaded
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: &str| SdkError::InvalidComponent {
            name: self.name.clone(),
            reason: reason.to_string(),
        };

        if self.name.trim().is_empty() {
            return Err(invalid("name is empty"));
        }
        if self.version.trim().is_empty() {
            return Err(invalid("version is empty"));
        }
        if Path::new(&self.dest).is_absolute() || self.dest.split('/').any(|s| s == "..") {
            return Err(invalid("dest must stay inside the SDK directory"));
        }
        self.archive_kind()?;
        Ok(())
    }
}

/// The built-in component table
pub fn default_components() -> Vec<ComponentSpec> {
    vec![
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
        ComponentSpec::new("android_m2repository", "r44", "extras/android"),
        ComponentSpec::new("platform-tools", "r25.0.3", "").classifier(HOST_OS_PLACEHOLDER),
        ComponentSpec::new("tools", "r24.3.4", "").classifier(HOST_OS_PLACEHOLDER),
        ComponentSpec::new("build-tools", "r23.0.1", "build-tools/23.0.1")
            .classifier(HOST_OS_PLACEHOLDER)
            .role(ComponentRole::BuildTools)
            .strip(1),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_table() {
        let components = default_components();
        assert_eq!(components.len(), 6);
        for component in &components {
            component.validate().unwrap();
        }

        let dx = &components[1];
        assert_eq!(dx.archive_kind().unwrap(), ArchiveKind::TarGz);
        assert!(dx.has_role(ComponentRole::DxSources));
        assert!(!dx.filter.include_empty_dirs);
    }

    #[test]
    fn test_host_classifier() {
        let build_tools = ComponentSpec::new("build-tools", "r23.0.1", "build-tools/23.0.1")
            .classifier(HOST_OS_PLACEHOLDER);

        let coord = build_tools.coordinate(Some(HostOs::MacOsX));
        assert_eq!(coord.notation(), "google:build-tools:r23.0.1:macosx@zip");

        let coord = build_tools.coordinate(None);
        assert_eq!(coord.notation(), "google:build-tools:r23.0.1@zip");
    }

    #[test]
    fn test_target_dir_and_marker() {
        let root = Path::new("/out/androidSdk");

        let platform = ComponentSpec::new("platform", "26_r02", "platforms/android-26");
        assert_eq!(platform.target_dir(root), root.join("platforms/android-26"));
        assert_eq!(
            platform.marker_path(root),
            root.join("platforms/android-26").join("platform_26_r02.prepared")
        );

        let tools = ComponentSpec::new("tools", "r24.3.4", "");
        assert_eq!(tools.target_dir(root), root);
    }

    #[test]
    fn test_validate_rejects_bad_declarations() {
        let bad_ext = ComponentSpec::new("dx", "1", "sources/dx").ext("rar");
        assert!(matches!(bad_ext.validate(), Err(SdkError::UnsupportedExtension(_))));

        let escaping = ComponentSpec::new("dx", "1", "../outside");
        assert!(matches!(escaping.validate(), Err(SdkError::InvalidComponent { .. })));

        let unnamed = ComponentSpec::new("", "1", "x");
        assert!(unnamed.validate().is_err());
    }
}
