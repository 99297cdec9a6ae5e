//! Freshness markers
//!
//! A component counts as unpacked while its `<id>.prepared` file exists.

use std::path::{Path, PathBuf};
use tracing::debug;

use sdkdeps_core::ComponentSpec;

const MARKER_CONTENT: &str = "prepared";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Marker {
    path: PathBuf,
}

impl Marker {
    pub fn at(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn for_component(spec: &ComponentSpec, sdk_root: &Path) -> Self {
        Self::at(spec.marker_path(sdk_root))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_fresh(&self) -> bool {
        self.path.is_file()
    }

    pub async fn mark(&self) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.path, MARKER_CONTENT).await?;
        debug!("Marked {:?}", self.path);
        Ok(())
    }

    pub async fn invalidate(&self) -> std::io::Result<()> {
        match tokio::fs::remove_file(&self.path).await {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}
