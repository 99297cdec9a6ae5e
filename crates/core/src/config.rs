//! Configuration
//!
//! Manages all tool settings including:
//! - Build output and cache locations
//! - Artifact repository patterns
//! - The SDK component table
//! - Download behaviour

use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};
use directories::ProjectDirs;
use tracing::{info, debug};

use crate::component::{default_components, ComponentSpec};
use crate::error::{Result, SdkError};

/// Config file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "sdkdeps.toml";

/// Artifact patterns of the Android repositories, tried in order
pub const DEFAULT_ARTIFACT_PATTERNS: &[&str] = &[
    "https://dl-ssl.google.com/android/repository/[artifact]-[revision].[ext]",
    "https://dl-ssl.google.com/android/repository/[artifact]_[revision](-[classifier]).[ext]",
    "https://dl.google.com/android/repository/[artifact]_[revision](-[classifier]).[ext]",
    "https://android.googlesource.com/platform/dalvik/+archive/android-5.0.0_r2/[artifact].[ext]",
];

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Build output directory; the SDK lands in `androidSdk/`, jars in `libs/`
    #[serde(default = "default_build_dir")]
    pub build_dir: PathBuf,
    /// Download cache directory
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
    /// Local directory laid out like the repositories, used instead of the network
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offline_mirror: Option<PathBuf>,
    /// Ivy-style artifact patterns
    #[serde(default = "default_repositories")]
    pub repositories: Vec<String>,
    /// Maximum concurrent downloads
    #[serde(default = "default_parallel_jobs")]
    pub parallel_jobs: usize,
    /// HTTP timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_components")]
    pub components: Vec<ComponentSpec>,
}

fn default_build_dir() -> PathBuf {
    PathBuf::from("build")
}

fn default_cache_dir() -> PathBuf {
    AppConfig::platform_cache_dir().unwrap_or_else(|| PathBuf::from(".sdkdeps-cache"))
}

fn default_repositories() -> Vec<String> {
    DEFAULT_ARTIFACT_PATTERNS.iter().map(|p| p.to_string()).collect()
}

fn default_parallel_jobs() -> usize {
    num_cpus::get().min(4)
}

fn default_timeout_secs() -> u64 {
    300
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            build_dir: default_build_dir(),
            cache_dir: default_cache_dir(),
            offline_mirror: None,
            repositories: default_repositories(),
            parallel_jobs: default_parallel_jobs(),
            timeout_secs: default_timeout_secs(),
            components: default_components(),
        }
    }
}

impl AppConfig {
    /// Platform cache directory
    pub fn platform_cache_dir() -> Option<PathBuf> {
        ProjectDirs::from("org", "sdkdeps", "sdkdeps")
            .map(|dirs| dirs.cache_dir().to_path_buf())
    }

    /// Directory the SDK components are unpacked into
    pub fn sdk_dir(&self) -> PathBuf {
        self.build_dir.join("androidSdk")
    }

    /// Directory the extracted jars are published to
    pub fn libs_dir(&self) -> PathBuf {
        self.build_dir.join("libs")
    }

    /// Load configuration from file
    pub async fn load(path: &Path) -> Result<Self> {
        debug!("Loading config from {:?}", path);
        let contents = tokio::fs::read_to_string(path).await?;
        Self::from_toml(&contents)
    }

    /// Load `path`, or the default config file if present, or the built-in defaults
    pub async fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path).await,
            None => {
                let path = Path::new(DEFAULT_CONFIG_FILE);
                if path.exists() {
                    Self::load(path).await
                } else {
                    info!("No {} found, using defaults", DEFAULT_CONFIG_FILE);
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub async fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let contents = toml::to_string_pretty(self)?;
        tokio::fs::write(path, contents).await?;

        debug!("Config saved to {:?}", path);
        Ok(())
    }

    /// Reject declarations that could only fail later
    pub fn validate(&self) -> Result<()> {
        if self.repositories.is_empty() && self.offline_mirror.is_none() {
            return Err(SdkError::Config("no repositories configured".into()));
        }
        if self.parallel_jobs == 0 {
            return Err(SdkError::Config("parallel_jobs must be at least 1".into()));
        }

        let mut seen = std::collections::HashSet::new();
        for component in &self.components {
            component.validate()?;
            if !seen.insert(component.id()) {
                return Err(SdkError::Config(format!(
                    "component {} is declared twice",
                    component.id()
                )));
            }
        }
        Ok(())
    }
}
