//! Artifact Coordinates
//!
//! Maps a logical SDK component to the coordinate used to download and cache it.

use std::fmt;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SdkError};

/// Group every Android repository artifact is published under
pub const DEFAULT_GROUP: &str = "google";

/// Archive formats an artifact can be unpacked from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArchiveKind {
    Zip,
    TarGz,
}

impl ArchiveKind {
    /// Parse a declared artifact extension
    pub fn from_extension(ext: &str) -> Result<Self> {
        match ext {
            "zip" => Ok(ArchiveKind::Zip),
            "tar.gz" => Ok(ArchiveKind::TarGz),
            other => Err(SdkError::UnsupportedExtension(other.to_string())),
        }
    }
}

/// A fully resolved download coordinate
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArtifactCoordinate {
    pub group: String,
    pub name: String,
    pub version: String,
    pub classifier: Option<String>,
    pub extension: String,
}

impl ArtifactCoordinate {
    /// Create a coordinate in the default group
    pub fn new(name: impl Into<String>, version: impl Into<String>, extension: impl Into<String>) -> Self {
        Self {
            group: DEFAULT_GROUP.to_string(),
            name: name.into(),
            version: version.into(),
            classifier: None,
            extension: extension.into(),
        }
    }

    /// Set the classifier; an empty classifier is treated as absent
    pub fn with_classifier(mut self, classifier: impl Into<String>) -> Self {
        let classifier = classifier.into();
        self.classifier = if classifier.is_empty() { None } else { Some(classifier) };
        self
    }

    /// Classifier, if present and non-empty
    pub fn classifier(&self) -> Option<&str> {
        self.classifier.as_deref().filter(|c| !c.is_empty())
    }

    /// Dependency notation: `group:name:version[:classifier]@ext`
    pub fn notation(&self) -> String {
        match self.classifier() {
            Some(classifier) => format!(
                "{}:{}:{}:{}@{}",
                self.group, self.name, self.version, classifier, self.extension
            ),
            None => format!("{}:{}:{}@{}", self.group, self.name, self.version, self.extension),
        }
    }

    /// Short identifier used for per-component work, e.g. `platform_26_r02`
    pub fn id(&self) -> String {
        format!("{}_{}", self.name, self.version)
    }

    /// File name of the artifact in the local cache
    pub fn file_name(&self) -> String {
        match self.classifier() {
            Some(classifier) => format!("{}-{}-{}.{}", self.name, self.version, classifier, self.extension),
            None => format!("{}-{}.{}", self.name, self.version, self.extension),
        }
    }
}

impl fmt::Display for ArtifactCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.notation())
    }
}
