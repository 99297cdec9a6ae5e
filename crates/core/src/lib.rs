//! sdkdeps core - shared types
//!
//! Artifact coordinates, the SDK component table, configuration and errors
//! shared by the toolchain crate and the command-line tool.

pub mod component;
pub mod config;
pub mod coordinate;
pub mod error;

pub use component::{default_components, ComponentRole, ComponentSpec, ExtractFilter, HostOs, HOST_OS_PLACEHOLDER};
pub use config::AppConfig;
pub use coordinate::{ArchiveKind, ArtifactCoordinate};
pub use error::{Result, SdkError};
